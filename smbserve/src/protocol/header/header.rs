use serde::{Deserialize, Serialize};

use smbserve_core::nt_status::NtStatus;

use crate::protocol::header::{LegacySMBCommandCode, LegacySMBFlags, LegacySMBFlags2, SMBCommandCode, SMBFlags};

pub trait Header {
    type CommandCode: Copy;

    fn command_code(&self) -> Self::CommandCode;
    fn status(&self) -> NtStatus;
}

/// Modern-family message header. One header per command, including each
/// command of a compound chain.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct SMBSyncHeader {
    pub command: SMBCommandCode,
    pub status: NtStatus,
    pub flags: SMBFlags,
    pub credit_charge: u16,
    pub credits: u16,
    pub message_id: u64,
    pub async_id: u64,
    pub tree_id: u32,
    pub session_id: u64,
    pub signature: [u8; 16],
}

impl Header for SMBSyncHeader {
    type CommandCode = SMBCommandCode;

    fn command_code(&self) -> SMBCommandCode {
        self.command
    }

    fn status(&self) -> NtStatus {
        self.status
    }
}

impl SMBSyncHeader {
    pub fn new(command: SMBCommandCode) -> Self {
        Self {
            command,
            status: NtStatus::Success,
            flags: SMBFlags::empty(),
            credit_charge: 1,
            credits: 1,
            message_id: 0,
            async_id: 0,
            tree_id: 0,
            session_id: 0,
            signature: [0; 16],
        }
    }

    pub fn request(command: SMBCommandCode, message_id: u64, session_id: u64, tree_id: u32) -> Self {
        Self {
            message_id,
            session_id,
            tree_id,
            ..Self::new(command)
        }
    }

    pub fn is_related_operations(&self) -> bool {
        self.flags.contains(SMBFlags::RELATED_OPERATIONS)
    }

    pub fn is_async(&self) -> bool {
        self.flags.contains(SMBFlags::ASYNC_COMMAND)
    }

    pub fn is_signed(&self) -> bool {
        self.flags.contains(SMBFlags::SIGNED)
    }

    /// Skeleton response header; the dispatch engine back-fills the
    /// identifier, credit, and signing fields from the request.
    pub fn create_response_header(&self, status: NtStatus) -> Self {
        Self {
            command: self.command,
            status,
            flags: SMBFlags::SERVER_TO_REDIR,
            credit_charge: 1,
            credits: 1,
            message_id: self.message_id,
            async_id: 0,
            tree_id: self.tree_id,
            session_id: self.session_id,
            signature: [0; 16],
        }
    }
}

/// Legacy-family message header, shared by every command in an AndX batch.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct LegacySMBHeader {
    pub command: LegacySMBCommandCode,
    pub status: NtStatus,
    pub flags: LegacySMBFlags,
    pub flags2: LegacySMBFlags2,
    pub tid: u16,
    pub pid: u16,
    pub uid: u16,
    pub mid: u16,
}

impl Header for LegacySMBHeader {
    type CommandCode = LegacySMBCommandCode;

    fn command_code(&self) -> LegacySMBCommandCode {
        self.command
    }

    fn status(&self) -> NtStatus {
        self.status
    }
}

impl LegacySMBHeader {
    pub fn request(command: LegacySMBCommandCode, mid: u16, pid: u16, uid: u16, tid: u16) -> Self {
        Self {
            command,
            status: NtStatus::Success,
            flags: LegacySMBFlags::empty(),
            flags2: LegacySMBFlags2::NT_STATUS_CODE | LegacySMBFlags2::UNICODE,
            tid,
            pid,
            uid,
            mid,
        }
    }

    /// Response header with identifier echo and the standard reply flags;
    /// flags2 capabilities are passed through from the request.
    pub fn create_response_header(&self) -> Self {
        let mut flags2 = LegacySMBFlags2::NT_STATUS_CODE;
        if self.flags2.contains(LegacySMBFlags2::LONG_NAMES_ALLOWED) {
            flags2 |= LegacySMBFlags2::LONG_NAMES_ALLOWED | LegacySMBFlags2::LONG_NAME_USED;
        }
        if self.flags2.contains(LegacySMBFlags2::EXTENDED_ATTRIBUTES) {
            flags2 |= LegacySMBFlags2::EXTENDED_ATTRIBUTES;
        }
        if self.flags2.contains(LegacySMBFlags2::EXTENDED_SECURITY) {
            flags2 |= LegacySMBFlags2::EXTENDED_SECURITY;
        }
        if self.flags2.contains(LegacySMBFlags2::UNICODE) {
            flags2 |= LegacySMBFlags2::UNICODE;
        }
        Self {
            command: self.command,
            status: NtStatus::Success,
            flags: LegacySMBFlags::CASE_INSENSITIVE | LegacySMBFlags::CANONICALIZED_PATHS | LegacySMBFlags::REPLY,
            flags2,
            tid: self.tid,
            pid: self.pid,
            uid: self.uid,
            mid: self.mid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_header_echoes_identifiers() {
        let request = SMBSyncHeader::request(SMBCommandCode::Read, 7, 0x1000, 3);
        let response = request.create_response_header(NtStatus::Success);
        assert_eq!(response.message_id, 7);
        assert_eq!(response.session_id, 0x1000);
        assert_eq!(response.tree_id, 3);
        assert!(response.flags.contains(SMBFlags::SERVER_TO_REDIR));
    }

    #[test]
    fn legacy_response_passes_through_capability_flags() {
        let mut request = LegacySMBHeader::request(LegacySMBCommandCode::Echo, 1, 2, 3, 4);
        request.flags2 |= LegacySMBFlags2::EXTENDED_SECURITY;
        let response = request.create_response_header();
        assert!(response.flags.contains(LegacySMBFlags::REPLY));
        assert!(response.flags2.contains(LegacySMBFlags2::EXTENDED_SECURITY));
        assert_eq!(response.mid, 1);
        assert_eq!(response.uid, 3);
        assert_eq!(response.tid, 4);
    }
}
