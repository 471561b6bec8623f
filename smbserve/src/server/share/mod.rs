use std::fmt::Debug;
use std::sync::Arc;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::protocol::body::access_mask::FileAccess;
use crate::protocol::body::tree_connect::SMBShareType;
use crate::server::session::SecurityContext;
use crate::store::FileStore;

pub mod file_system;
pub mod ipc;

bitflags! {
    #[derive(Serialize, Deserialize, PartialEq, Eq, Debug, Default, Copy, Clone)]
    pub struct ResourceType: u32 {
        const DISK = 0x0;
        const PRINT_QUEUE = 0x1;
        const DEVICE = 0x2;
        const IPC = 0x3;

        const SPECIAL = 0x80000000;
        const TEMPORARY = 0x40000000;
    }
}

impl From<ResourceType> for SMBShareType {
    fn from(value: ResourceType) -> Self {
        if value.contains(ResourceType::IPC) {
            SMBShareType::Pipe
        } else if value.contains(ResourceType::PRINT_QUEUE) {
            SMBShareType::Print
        } else {
            SMBShareType::Disk
        }
    }
}

/// Arguments handed to a share's access-decision hook.
#[derive(Debug)]
pub struct AccessRequest<'a> {
    pub user_name: &'a str,
    pub path: &'a str,
    pub requested_access: FileAccess,
    pub machine_name: &'a str,
    pub client_endpoint: &'a str,
}

/// Per-share access policy; absent means allow.
pub type AccessDecisionHook = Box<dyn Fn(&AccessRequest) -> bool + Send + Sync>;

/// A named share and its backing store, as bound by tree connects.
pub trait SharedResource: Send + Sync {
    fn name(&self) -> &str;
    fn resource_type(&self) -> ResourceType;
    fn file_store(&self) -> &Arc<dyn FileStore>;

    /// Share-level access decision for `path`; the default policy allows.
    fn has_access(&self, context: &SecurityContext, path: &str, requested_access: FileAccess) -> bool {
        let _ = (context, path, requested_access);
        true
    }

    /// Service string the legacy family reports for this share.
    fn service_name(&self) -> &'static str {
        if self.resource_type().contains(ResourceType::IPC) {
            "IPC"
        } else {
            "A:"
        }
    }
}
