use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::protocol::body::create::SMBFileId;

bitflags! {
    #[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Default, Copy, Clone)]
    pub struct SMBCompletionFilter: u32 {
        const FILE_NAME = 0x001;
        const DIR_NAME = 0x002;
        const ATTRIBUTES = 0x004;
        const SIZE = 0x008;
        const LAST_WRITE = 0x010;
        const LAST_ACCESS = 0x020;
        const CREATION = 0x040;
        const EA = 0x080;
        const SECURITY = 0x100;
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct SMBChangeNotifyRequest {
    pub file_id: SMBFileId,
    pub completion_filter: SMBCompletionFilter,
    pub watch_tree: bool,
    pub max_output_length: u32,
}

impl SMBChangeNotifyRequest {
    pub fn new(file_id: SMBFileId, completion_filter: SMBCompletionFilter) -> Self {
        Self {
            file_id,
            completion_filter,
            watch_tree: false,
            max_output_length: 4096,
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Default)]
pub struct SMBChangeNotifyResponse {
    /// Opaque notify-information buffer produced by the file store.
    pub buffer: Vec<u8>,
}

/// Legacy-family change watch, carried as an NT transaction.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct LegacySMBChangeNotifyRequest {
    pub fid: u16,
    pub completion_filter: SMBCompletionFilter,
    pub watch_tree: bool,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone, Default)]
pub struct LegacySMBChangeNotifyResponse {
    pub buffer: Vec<u8>,
}
