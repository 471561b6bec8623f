use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::protocol::body::access_mask::SMBAccessMask;

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Copy, Clone)]
pub enum SMBShareType {
    Disk,
    Pipe,
    Print,
}

bitflags! {
    #[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Default, Copy, Clone)]
    pub struct SMBShareFlags: u32 {
        const MANUAL_CACHING = 0x0;
        const AUTO_CACHING = 0x10;
        const VDO_CACHING = 0x20;
        const NO_CACHING = 0x30;
        const DFS = 0x1;
        const DFS_ROOT = 0x2;
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct SMBTreeConnectRequest {
    /// UNC-ish path; the share name is the final component.
    pub path: String,
}

impl SMBTreeConnectRequest {
    pub fn new<S: Into<String>>(path: S) -> Self {
        Self { path: path.into() }
    }

    /// The share name component of the request path.
    pub fn share_name(&self) -> &str {
        self.path
            .rsplit(|c| c == '\\' || c == '/')
            .next()
            .unwrap_or(&self.path)
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct SMBTreeConnectResponse {
    pub share_type: SMBShareType,
    pub share_flags: SMBShareFlags,
    pub maximal_access: SMBAccessMask,
}

impl SMBTreeConnectResponse {
    pub fn disk() -> Self {
        Self {
            share_type: SMBShareType::Disk,
            share_flags: SMBShareFlags::MANUAL_CACHING,
            maximal_access: SMBAccessMask::GENERIC_ALL,
        }
    }

    pub fn ipc() -> Self {
        Self {
            share_type: SMBShareType::Pipe,
            share_flags: SMBShareFlags::MANUAL_CACHING,
            maximal_access: SMBAccessMask::GENERIC_READ
                | SMBAccessMask::GENERIC_WRITE
                | SMBAccessMask::SYNCHRONIZE,
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct LegacySMBTreeConnectRequest {
    pub path: String,
    /// Requested service string, e.g. "?????" or "A:".
    pub service: String,
}

impl LegacySMBTreeConnectRequest {
    pub fn new<S: Into<String>>(path: S) -> Self {
        Self {
            path: path.into(),
            service: "?????".into(),
        }
    }

    pub fn share_name(&self) -> &str {
        self.path
            .rsplit(|c| c == '\\' || c == '/')
            .next()
            .unwrap_or(&self.path)
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct LegacySMBTreeConnectResponse {
    pub service: String,
}
