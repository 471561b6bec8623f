use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::protocol::body::security_mode::SecurityMode;

bitflags! {
    #[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Default, Copy, Clone)]
    pub struct SMBSessionFlags: u16 {
        const IS_GUEST = 0x1;
        const IS_NULL = 0x2;
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct SMBSessionSetupRequest {
    pub security_mode: SecurityMode,
    pub previous_session_id: u64,
    /// Opaque token for the security provider.
    pub security_buffer: Vec<u8>,
}

impl SMBSessionSetupRequest {
    pub fn new(security_buffer: Vec<u8>) -> Self {
        Self {
            security_mode: SecurityMode::SIGNING_ENABLED,
            previous_session_id: 0,
            security_buffer,
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct SMBSessionSetupResponse {
    pub session_flags: SMBSessionFlags,
    pub security_buffer: Vec<u8>,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct LegacySMBSessionSetupRequest {
    pub max_buffer_size: u32,
    pub vc_number: u16,
    /// Opaque token for the security provider.
    pub security_buffer: Vec<u8>,
}

impl LegacySMBSessionSetupRequest {
    pub fn new(security_buffer: Vec<u8>) -> Self {
        Self {
            max_buffer_size: 65535,
            vc_number: 0,
            security_buffer,
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct LegacySMBSessionSetupResponse {
    pub guest: bool,
    pub security_buffer: Vec<u8>,
}
