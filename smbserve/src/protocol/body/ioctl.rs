use serde::{Deserialize, Serialize};

use crate::protocol::body::create::SMBFileId;

/// Pipe transceive; one of the control codes that round-trips a file id.
pub const FSCTL_PIPE_TRANSCEIVE: u32 = 0x0011C017;
pub const FSCTL_DFS_GET_REFERRALS: u32 = 0x00060194;

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct SMBIoCtlRequest {
    pub ctl_code: u32,
    pub file_id: SMBFileId,
    pub input: Vec<u8>,
    pub max_output_length: u32,
    pub is_fsctl: bool,
}

impl SMBIoCtlRequest {
    pub fn new(ctl_code: u32, file_id: SMBFileId, input: Vec<u8>) -> Self {
        Self {
            ctl_code,
            file_id,
            input,
            max_output_length: 4096,
            is_fsctl: true,
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct SMBIoCtlResponse {
    pub ctl_code: u32,
    pub file_id: SMBFileId,
    pub output: Vec<u8>,
}
