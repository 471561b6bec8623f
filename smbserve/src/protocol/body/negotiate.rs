use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::protocol::body::capabilities::Capabilities;
use crate::protocol::body::filetime::FileTime;
use crate::protocol::body::security_mode::SecurityMode;

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct SMBNegotiateRequest {
    pub dialects: Vec<u16>,
    pub security_mode: SecurityMode,
    pub capabilities: Capabilities,
    pub client_guid: Uuid,
}

impl SMBNegotiateRequest {
    pub fn new(dialects: Vec<u16>, security_mode: SecurityMode, client_guid: Uuid) -> Self {
        Self {
            dialects,
            security_mode,
            capabilities: Capabilities::empty(),
            client_guid,
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct SMBNegotiateResponse {
    pub dialect: u16,
    pub security_mode: SecurityMode,
    pub capabilities: Capabilities,
    pub server_guid: Uuid,
    pub system_time: FileTime,
    pub server_start_time: FileTime,
    pub max_transact_size: u32,
    pub max_read_size: u32,
    pub max_write_size: u32,
    /// Initial token of the challenge/response exchange.
    pub security_buffer: Vec<u8>,
}

/// Legacy-family negotiate: the client offers dialect strings, the server
/// answers with the index of the one it picked.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct LegacySMBNegotiateRequest {
    pub dialects: Vec<String>,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct LegacySMBNegotiateResponse {
    pub dialect_index: u16,
    pub security_mode: SecurityMode,
    pub max_buffer_size: u32,
    pub system_time: FileTime,
    /// Challenge bytes for the credential exchange, when the provider
    /// produced one during negotiation.
    pub challenge: Vec<u8>,
}

/// Answer when none of the offered dialect strings is supported; the
/// sentinel index tells the client negotiation failed.
pub const NO_SUPPORTED_DIALECT_INDEX: u16 = 0xFFFF;

impl LegacySMBNegotiateResponse {
    pub fn not_supported() -> Self {
        Self {
            dialect_index: NO_SUPPORTED_DIALECT_INDEX,
            security_mode: SecurityMode::empty(),
            max_buffer_size: 0,
            system_time: FileTime::now(),
            challenge: Vec::new(),
        }
    }
}
