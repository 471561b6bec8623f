use serde::{Deserialize, Serialize};

use crate::protocol::body::info::SMBDirectoryEntry;

/// Legacy directory enumeration: a first call materializes the listing into
/// a server-side search and returns a cursor handle; follow-up calls page
/// through it.
#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct LegacySMBFindFirstRequest {
    /// Search pattern relative to the share root, e.g. `docs\*`.
    pub pattern: String,
    pub max_count: u16,
    pub close_at_end_of_search: bool,
}

impl LegacySMBFindFirstRequest {
    pub fn new<S: Into<String>>(pattern: S, max_count: u16) -> Self {
        Self {
            pattern: pattern.into(),
            max_count,
            close_at_end_of_search: false,
        }
    }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct LegacySMBFindFirstResponse {
    pub search_handle: u16,
    pub entries: Vec<SMBDirectoryEntry>,
    pub end_of_search: bool,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct LegacySMBFindNextRequest {
    pub search_handle: u16,
    pub max_count: u16,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct LegacySMBFindNextResponse {
    pub entries: Vec<SMBDirectoryEntry>,
    pub end_of_search: bool,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct LegacySMBFindCloseRequest {
    pub search_handle: u16,
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Clone)]
pub struct LegacySMBFindCloseResponse {}
