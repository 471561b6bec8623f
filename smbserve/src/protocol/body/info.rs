use bitflags::bitflags;
use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};

use crate::protocol::body::create::{SMBFileAttributes, SMBFileId};
use crate::protocol::body::filetime::FileTime;

#[repr(u8)]
#[derive(Debug, Eq, PartialEq, TryFromPrimitive, Serialize, Deserialize, Copy, Clone)]
pub enum SMBInfoType {
    File = 0x1,
    FileSystem = 0x2,
    Security = 0x3,
    Quota = 0x4,
}

#[repr(u8)]
#[derive(Debug, Eq, PartialEq, TryFromPrimitive, Serialize, Deserialize, Copy, Clone, Hash)]
pub enum SMBFileInformationClass {
    Directory = 0x01,
    FullDirectory = 0x02,
    Basic = 0x04,
    Standard = 0x05,
    Internal = 0x06,
    Rename = 0x0A,
    Disposition = 0x0D,
    EndOfFile = 0x14,
    NetworkOpen = 0x22,
}

/// Typed file-information payloads; the wire layout of each class is the
/// frame codec's concern.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub enum FileInformation {
    Basic {
        creation_time: FileTime,
        last_access_time: FileTime,
        last_write_time: FileTime,
        change_time: FileTime,
        attributes: SMBFileAttributes,
    },
    Standard {
        allocation_size: u64,
        end_of_file: u64,
        delete_pending: bool,
        directory: bool,
    },
    NetworkOpen {
        creation_time: FileTime,
        last_write_time: FileTime,
        allocation_size: u64,
        end_of_file: u64,
        attributes: SMBFileAttributes,
    },
}

/// Typed set-information payloads.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub enum SetFileInformation {
    Rename { new_path: String, replace_if_exists: bool },
    Disposition { delete_pending: bool },
    EndOfFile { end_of_file: u64 },
    Basic { attributes: SMBFileAttributes },
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub enum FileSystemInformation {
    Volume { label: String, serial_number: u32 },
    Size { total_bytes: u64, free_bytes: u64 },
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct SMBQueryInfoRequest {
    pub info_type: SMBInfoType,
    pub file_info_class: SMBFileInformationClass,
    pub file_id: SMBFileId,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub enum SMBQueryInfoResponse {
    File(FileInformation),
    FileSystem(FileSystemInformation),
    Security(Vec<u8>),
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct SMBSetInfoRequest {
    pub info_type: SMBInfoType,
    pub file_id: SMBFileId,
    pub information: SetFileInformation,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct SMBSetInfoResponse {}

bitflags! {
    #[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Default, Copy, Clone)]
    pub struct SMBQueryDirectoryFlags: u8 {
        const RESTART_SCANS = 0x1;
        const RETURN_SINGLE_ENTRY = 0x2;
        const REOPEN = 0x10;
    }
}

/// One materialized directory-listing entry.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct SMBDirectoryEntry {
    pub file_name: String,
    pub attributes: SMBFileAttributes,
    pub creation_time: FileTime,
    pub last_write_time: FileTime,
    pub end_of_file: u64,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct SMBQueryDirectoryRequest {
    pub file_id: SMBFileId,
    pub file_info_class: SMBFileInformationClass,
    pub flags: SMBQueryDirectoryFlags,
    pub pattern: String,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct SMBQueryDirectoryResponse {
    pub entries: Vec<SMBDirectoryEntry>,
}
