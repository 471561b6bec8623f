use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use crate::server::share::{ResourceType, SharedResource};
use crate::store::FileStore;

/// The administrative named-pipe share (`IPC$`).
pub struct SMBIPCShare {
    name: String,
    file_store: Arc<dyn FileStore>,
}

impl Debug for SMBIPCShare {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SMBIPCShare").field("name", &self.name).finish()
    }
}

impl SMBIPCShare {
    pub fn new(file_store: Arc<dyn FileStore>) -> Self {
        Self {
            name: "IPC$".into(),
            file_store,
        }
    }
}

impl SharedResource for SMBIPCShare {
    fn name(&self) -> &str {
        &self.name
    }

    fn resource_type(&self) -> ResourceType {
        ResourceType::IPC
    }

    fn file_store(&self) -> &Arc<dyn FileStore> {
        &self.file_store
    }
}
