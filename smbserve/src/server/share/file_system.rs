use std::fmt::{Debug, Formatter};
use std::sync::Arc;

use crate::protocol::body::access_mask::FileAccess;
use crate::server::session::SecurityContext;
use crate::server::share::{AccessDecisionHook, AccessRequest, ResourceType, SharedResource};
use crate::store::FileStore;

/// A disk-type share over an arbitrary `FileStore` backing.
pub struct SMBFileSystemShare {
    name: String,
    file_store: Arc<dyn FileStore>,
    access_hook: Option<AccessDecisionHook>,
}

impl Debug for SMBFileSystemShare {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SMBFileSystemShare")
            .field("name", &self.name)
            .field("has_access_hook", &self.access_hook.is_some())
            .finish()
    }
}

impl SMBFileSystemShare {
    pub fn new<S: Into<String>>(name: S, file_store: Arc<dyn FileStore>) -> Self {
        Self {
            name: name.into(),
            file_store,
            access_hook: None,
        }
    }

    /// Install the access-decision hook invoked on every file operation.
    pub fn with_access_hook(mut self, hook: AccessDecisionHook) -> Self {
        self.access_hook = Some(hook);
        self
    }
}

impl SharedResource for SMBFileSystemShare {
    fn name(&self) -> &str {
        &self.name
    }

    fn resource_type(&self) -> ResourceType {
        ResourceType::DISK
    }

    fn file_store(&self) -> &Arc<dyn FileStore> {
        &self.file_store
    }

    fn has_access(&self, context: &SecurityContext, path: &str, requested_access: FileAccess) -> bool {
        match &self.access_hook {
            Some(hook) => hook(&AccessRequest {
                user_name: &context.user_name,
                path,
                requested_access,
                machine_name: &context.machine_name,
                client_endpoint: &context.client_endpoint,
            }),
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryFileStore;

    fn context() -> SecurityContext {
        SecurityContext {
            user_name: "alice".into(),
            machine_name: "ws".into(),
            client_endpoint: "10.0.0.1:445".into(),
            guest: false,
        }
    }

    #[test]
    fn default_policy_allows() {
        let share = SMBFileSystemShare::new("shared", Arc::new(MemoryFileStore::new()));
        assert!(share.has_access(&context(), "\\a.txt", FileAccess::ReadWrite));
    }

    #[test]
    fn hook_decides_access() {
        let share = SMBFileSystemShare::new("shared", Arc::new(MemoryFileStore::new()))
            .with_access_hook(Box::new(|request| !request.requested_access.includes_write()));
        assert!(share.has_access(&context(), "\\a.txt", FileAccess::Read));
        assert!(!share.has_access(&context(), "\\a.txt", FileAccess::Write));
        assert!(!share.has_access(&context(), "\\a.txt", FileAccess::ReadWrite));
    }
}
