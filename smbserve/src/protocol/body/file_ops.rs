use serde::{Deserialize, Serialize};

use crate::protocol::body::create::SMBFileId;
use crate::protocol::body::filetime::FileTime;

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct SMBReadRequest {
    pub file_id: SMBFileId,
    pub offset: u64,
    pub length: u32,
    pub minimum_count: u32,
}

impl SMBReadRequest {
    pub fn new(file_id: SMBFileId, offset: u64, length: u32) -> Self {
        Self {
            file_id,
            offset,
            length,
            minimum_count: 0,
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct SMBReadResponse {
    pub data: Vec<u8>,
    pub data_remaining: u32,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct SMBWriteRequest {
    pub file_id: SMBFileId,
    pub offset: u64,
    pub data: Vec<u8>,
}

impl SMBWriteRequest {
    pub fn new(file_id: SMBFileId, offset: u64, data: Vec<u8>) -> Self {
        Self { file_id, offset, data }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct SMBWriteResponse {
    pub count: u32,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct SMBFlushRequest {
    pub file_id: SMBFileId,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct SMBFlushResponse {}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct SMBCloseRequest {
    pub file_id: SMBFileId,
    /// Request post-close attribute reporting.
    pub post_query_attrib: bool,
}

impl SMBCloseRequest {
    pub fn new(file_id: SMBFileId) -> Self {
        Self {
            file_id,
            post_query_attrib: false,
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Default)]
pub struct SMBCloseResponse {
    pub creation_time: FileTime,
    pub end_of_file: u64,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct LegacySMBReadRequest {
    pub fid: u16,
    pub offset: u64,
    pub max_count: u32,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct LegacySMBReadResponse {
    pub data: Vec<u8>,
    /// Reads from a disk file report the all-ones sentinel here.
    pub available: u16,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct LegacySMBWriteRequest {
    pub fid: u16,
    pub offset: u64,
    pub data: Vec<u8>,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct LegacySMBWriteResponse {
    pub count: u32,
    pub available: u16,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct LegacySMBCloseRequest {
    pub fid: u16,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct LegacySMBCloseResponse {}

/// FID value addressing every file opened by the requester.
pub const LEGACY_FLUSH_ALL_FID: u16 = 0xFFFF;

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct LegacySMBFlushRequest {
    pub fid: u16,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct LegacySMBFlushResponse {}
