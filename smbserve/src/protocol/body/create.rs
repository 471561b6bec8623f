use bitflags::bitflags;
use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};

use crate::protocol::body::access_mask::SMBAccessMask;
use crate::protocol::body::filetime::FileTime;

/// Identifier of an open file: a volatile part resolving the server-side
/// open and a persistent part for durable reconnects.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Default, Copy, Clone, Hash)]
pub struct SMBFileId {
    pub persistent: u64,
    pub volatile: u64,
}

impl SMBFileId {
    pub fn new(persistent: u64, volatile: u64) -> Self {
        Self { persistent, volatile }
    }
}

#[repr(u32)]
#[derive(Debug, Eq, PartialEq, TryFromPrimitive, Serialize, Deserialize, Copy, Clone)]
pub enum SMBCreateDisposition {
    Supersede = 0x0,
    Open = 0x1,
    Create = 0x2,
    OpenIf = 0x3,
    Overwrite = 0x4,
    OverwriteIf = 0x5,
}

#[repr(u32)]
#[derive(Debug, Eq, PartialEq, TryFromPrimitive, Serialize, Deserialize, Copy, Clone)]
pub enum SMBCreateAction {
    Superseded = 0x0,
    Opened = 0x1,
    Created = 0x2,
    Overwritten = 0x3,
}

bitflags! {
    #[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Default, Copy, Clone)]
    pub struct SMBCreateOptions: u32 {
        const DIRECTORY_FILE = 0x1;
        const WRITE_THROUGH = 0x2;
        const SEQUENTIAL_ONLY = 0x4;
        const NON_DIRECTORY_FILE = 0x40;
        const DELETE_ON_CLOSE = 0x1000;
    }
}

bitflags! {
    #[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Default, Copy, Clone)]
    pub struct SMBFileAttributes: u32 {
        const READONLY = 0x1;
        const HIDDEN = 0x2;
        const SYSTEM = 0x4;
        const DIRECTORY = 0x10;
        const ARCHIVE = 0x20;
        const NORMAL = 0x80;
    }
}

bitflags! {
    #[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Default, Copy, Clone)]
    pub struct SMBShareAccess: u32 {
        const READ = 0x1;
        const WRITE = 0x2;
        const DELETE = 0x4;
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct SMBCreateRequest {
    pub desired_access: SMBAccessMask,
    pub file_attributes: SMBFileAttributes,
    pub share_access: SMBShareAccess,
    pub disposition: SMBCreateDisposition,
    pub options: SMBCreateOptions,
    /// Path relative to the share root.
    pub path: String,
}

impl SMBCreateRequest {
    pub fn new<S: Into<String>>(path: S, desired_access: SMBAccessMask, disposition: SMBCreateDisposition) -> Self {
        Self {
            desired_access,
            file_attributes: SMBFileAttributes::NORMAL,
            share_access: SMBShareAccess::READ | SMBShareAccess::WRITE,
            disposition,
            options: SMBCreateOptions::empty(),
            path: path.into(),
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct SMBCreateResponse {
    pub file_id: SMBFileId,
    pub create_action: SMBCreateAction,
    pub creation_time: FileTime,
    pub file_attributes: SMBFileAttributes,
    pub end_of_file: u64,
}

/// Legacy-family open (NT create): the same operation with a 16-bit handle.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct LegacySMBOpenRequest {
    pub path: String,
    pub desired_access: SMBAccessMask,
    pub disposition: SMBCreateDisposition,
    pub options: SMBCreateOptions,
}

impl LegacySMBOpenRequest {
    pub fn new<S: Into<String>>(path: S, desired_access: SMBAccessMask, disposition: SMBCreateDisposition) -> Self {
        Self {
            path: path.into(),
            desired_access,
            disposition,
            options: SMBCreateOptions::empty(),
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct LegacySMBOpenResponse {
    pub fid: u16,
    pub create_action: SMBCreateAction,
    pub end_of_file: u64,
}
