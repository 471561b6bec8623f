use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    #[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Default, Copy, Clone)]
    pub struct SMBFlags: u32 {
        const SERVER_TO_REDIR = 0x1;
        const ASYNC_COMMAND = 0x2;
        const RELATED_OPERATIONS = 0x4;
        const SIGNED = 0x8;
    }
}

bitflags! {
    #[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Default, Copy, Clone)]
    pub struct LegacySMBFlags: u8 {
        const CASE_INSENSITIVE = 0x08;
        const CANONICALIZED_PATHS = 0x10;
        const REPLY = 0x80;
    }
}

bitflags! {
    #[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Default, Copy, Clone)]
    pub struct LegacySMBFlags2: u16 {
        const LONG_NAMES_ALLOWED = 0x0001;
        const EXTENDED_ATTRIBUTES = 0x0002;
        const LONG_NAME_USED = 0x0040;
        const EXTENDED_SECURITY = 0x0800;
        const NT_STATUS_CODE = 0x4000;
        const UNICODE = 0x8000;
    }
}
