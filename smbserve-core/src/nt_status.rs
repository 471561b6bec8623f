use num_enum::TryFromPrimitive;
use serde::{Deserialize, Serialize};

/// Protocol status codes shared by both dialect families.
///
/// Values are the NT status space; the `0x...0002` entries are the
/// SMB-class DOS error mappings the legacy family uses for sequencing
/// and binding failures.
#[repr(u32)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TryFromPrimitive, Copy, Hash)]
pub enum NtStatus {
    Success = 0x0,
    Pending = 0x00000103,
    SecIContinueNeeded = 0x00090312,
    InvalidSmb = 0x00010002,
    SmbBadTid = 0x00050002,
    SmbBadCommand = 0x00160002,
    BufferOverflow = 0x80000005,
    NoMoreFiles = 0x80000006,
    InvalidInfoClass = 0xC0000003,
    InvalidHandle = 0xC0000008,
    InvalidDeviceRequest = 0xC0000010,
    EndOfFile = 0xC0000011,
    MoreProcessingRequired = 0xC0000016,
    InvalidParameter = 0xC000000D,
    AccessDenied = 0xC0000022,
    ObjectNameNotFound = 0xC0000034,
    ObjectNameCollision = 0xC0000035,
    SharingViolation = 0xC0000043,
    LogonFailure = 0xC000006D,
    NotSupported = 0xC00000BB,
    NetworkNameDeleted = 0xC00000C9,
    BadNetworkName = 0xC00000CC,
    RequestNotAccepted = 0xC00000D0,
    NotADirectory = 0xC0000103,
    Cancelled = 0xC0000120,
    FileClosed = 0xC0000128,
    UserSessionDeleted = 0xC0000203,
    NetworkSessionExpired = 0xC000035C,
    UnknownError = 0xFFFFFFFF,
}

impl NtStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, NtStatus::Success)
    }

    /// Statuses that still carry usable payload for a dependent compounded
    /// command: success and buffer-overflow.
    pub fn carries_payload(&self) -> bool {
        matches!(self, NtStatus::Success | NtStatus::BufferOverflow)
    }
}
