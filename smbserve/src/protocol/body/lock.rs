use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::protocol::body::create::SMBFileId;

bitflags! {
    #[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Default, Copy, Clone)]
    pub struct SMBLockFlags: u32 {
        const SHARED_LOCK = 0x1;
        const EXCLUSIVE_LOCK = 0x2;
        const UNLOCK = 0x4;
        const FAIL_IMMEDIATELY = 0x10;
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct SMBLockElement {
    pub offset: u64,
    pub length: u64,
    pub flags: SMBLockFlags,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct SMBLockRequest {
    pub file_id: SMBFileId,
    pub locks: Vec<SMBLockElement>,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct SMBLockResponse {}
