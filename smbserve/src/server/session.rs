use std::collections::HashMap;
use std::sync::Arc;

use smbserve_core::logging::debug;

use crate::protocol::body::access_mask::FileAccess;
use crate::protocol::body::create::SMBFileId;
use crate::protocol::body::filetime::FileTime;
use crate::protocol::body::info::SMBDirectoryEntry;
use crate::server::open::{OpenFileInformation, OpenFileObject, OpenSearch};
use crate::server::share::SharedResource;
use crate::store::StoreHandle;

/// Authenticated principal data bound to a session.
#[derive(Debug, Clone)]
pub struct SecurityContext {
    pub user_name: String,
    pub machine_name: String,
    pub client_endpoint: String,
    pub guest: bool,
}

/// Read-only snapshot of one session, for the administrative surfaces.
#[derive(Debug, Clone)]
pub struct SessionInformation {
    pub session_id: u64,
    pub user_name: String,
    pub machine_name: String,
    pub creation_time: FileTime,
    pub open_files: Vec<OpenFileInformation>,
}

/// A tree id bound to a share for the lifetime of a tree connect.
pub struct SMBTreeConnect {
    tree_id: u32,
    share: Arc<dyn SharedResource>,
    creation_time: FileTime,
}

impl SMBTreeConnect {
    pub fn tree_id(&self) -> u32 {
        self.tree_id
    }

    pub fn share(&self) -> &Arc<dyn SharedResource> {
        &self.share
    }

    pub fn creation_time(&self) -> FileTime {
        self.creation_time
    }
}

/// Modern-family session: trees and opens keyed per session, signing state
/// derived at establishment.
pub struct SMBSession {
    session_id: u64,
    security_context: SecurityContext,
    signing_key: Option<[u8; 16]>,
    signing_required: bool,
    creation_time: FileTime,
    tree_connect_table: HashMap<u32, SMBTreeConnect>,
    open_table: HashMap<u64, OpenFileObject>,
    next_tree_id: u32,
    next_volatile_id: u64,
}

impl SMBSession {
    pub fn new(session_id: u64, security_context: SecurityContext, signing_key: Option<[u8; 16]>, signing_required: bool) -> Self {
        Self {
            session_id,
            security_context,
            signing_key,
            signing_required,
            creation_time: FileTime::now(),
            tree_connect_table: HashMap::new(),
            open_table: HashMap::new(),
            next_tree_id: 1,
            next_volatile_id: 1,
        }
    }

    pub fn id(&self) -> u64 {
        self.session_id
    }

    pub fn security_context(&self) -> &SecurityContext {
        &self.security_context
    }

    pub fn signing_key(&self) -> Option<[u8; 16]> {
        self.signing_key
    }

    pub fn signing_required(&self) -> bool {
        self.signing_required
    }

    pub fn creation_time(&self) -> FileTime {
        self.creation_time
    }

    pub fn tree_count(&self) -> usize {
        self.tree_connect_table.len()
    }

    pub fn open_count(&self) -> usize {
        self.open_table.len()
    }

    /// Bind a share under a fresh tree id. Ids skip zero and the all-ones
    /// sentinel; `None` means the id space is exhausted.
    pub fn add_connected_tree(&mut self, share: Arc<dyn SharedResource>) -> Option<u32> {
        for _ in 0..u32::MAX {
            let candidate = self.next_tree_id;
            self.next_tree_id = self.next_tree_id.wrapping_add(1);
            if candidate == 0 || candidate == u32::MAX {
                continue;
            }
            if !self.tree_connect_table.contains_key(&candidate) {
                self.tree_connect_table.insert(
                    candidate,
                    SMBTreeConnect {
                        tree_id: candidate,
                        share,
                        creation_time: FileTime::now(),
                    },
                );
                return Some(candidate);
            }
        }
        None
    }

    pub fn get_connected_tree(&self, tree_id: u32) -> Option<&SMBTreeConnect> {
        self.tree_connect_table.get(&tree_id)
    }

    /// Unbind a tree, closing every open file under it first.
    pub fn disconnect_tree(&mut self, tree_id: u32) {
        if let Some(tree) = self.tree_connect_table.get(&tree_id) {
            let store = tree.share.file_store().clone();
            let open_ids: Vec<u64> = self
                .open_table
                .iter()
                .filter(|(_, open)| open.tree_id() == tree_id)
                .map(|(id, _)| *id)
                .collect();
            for id in open_ids {
                if let Some(open) = self.open_table.remove(&id) {
                    let _ = store.close_file(open.handle());
                }
            }
            self.tree_connect_table.remove(&tree_id);
            debug!(tree_id, "tree disconnected");
        }
    }

    pub fn add_open_file(&mut self, tree_id: u32, share_name: &str, path: &str, handle: StoreHandle, access: FileAccess) -> SMBFileId {
        let volatile = self.next_volatile_id;
        self.next_volatile_id += 1;
        self.open_table.insert(
            volatile,
            OpenFileObject::new(tree_id, share_name.to_string(), path.to_string(), handle, access),
        );
        SMBFileId::new(volatile, volatile)
    }

    pub fn get_open_file(&self, volatile_id: u64) -> Option<&OpenFileObject> {
        self.open_table.get(&volatile_id)
    }

    pub fn remove_open_file(&mut self, volatile_id: u64) -> Option<OpenFileObject> {
        self.open_table.remove(&volatile_id)
    }

    pub fn open_files_information(&self) -> Vec<OpenFileInformation> {
        self.open_table.values().map(OpenFileInformation::from).collect()
    }

    /// Free all resources used by this session.
    pub fn close(&mut self) {
        let tree_ids: Vec<u32> = self.tree_connect_table.keys().copied().collect();
        for tree_id in tree_ids {
            self.disconnect_tree(tree_id);
        }
    }
}

/// Windows servers bound the per-session search table at 2048 entries.
const MAX_SEARCHES: usize = 2048;

/// Legacy-family session: 16-bit user id scoped to its connection, plus the
/// open-search table the older dialect requires.
pub struct LegacySMBSession {
    user_id: u16,
    security_context: SecurityContext,
    creation_time: FileTime,
    connected_trees: HashMap<u16, Arc<dyn SharedResource>>,
    open_files: HashMap<u16, OpenFileObject>,
    open_searches: HashMap<u16, OpenSearch>,
    next_search_handle: u16,
}

impl LegacySMBSession {
    pub fn new(user_id: u16, security_context: SecurityContext) -> Self {
        Self {
            user_id,
            security_context,
            creation_time: FileTime::now(),
            connected_trees: HashMap::new(),
            open_files: HashMap::new(),
            open_searches: HashMap::new(),
            next_search_handle: 1,
        }
    }

    pub fn user_id(&self) -> u16 {
        self.user_id
    }

    pub fn security_context(&self) -> &SecurityContext {
        &self.security_context
    }

    pub fn creation_time(&self) -> FileTime {
        self.creation_time
    }

    pub fn tree_count(&self) -> usize {
        self.connected_trees.len()
    }

    pub fn open_count(&self) -> usize {
        self.open_files.len()
    }

    pub fn search_count(&self) -> usize {
        self.open_searches.len()
    }

    pub fn add_connected_tree(&mut self, tree_id: u16, share: Arc<dyn SharedResource>) {
        self.connected_trees.insert(tree_id, share);
    }

    pub fn get_connected_tree(&self, tree_id: u16) -> Option<&Arc<dyn SharedResource>> {
        self.connected_trees.get(&tree_id)
    }

    pub fn is_tree_connected(&self, tree_id: u16) -> bool {
        self.connected_trees.contains_key(&tree_id)
    }

    pub fn tree_ids(&self) -> Vec<u16> {
        self.connected_trees.keys().copied().collect()
    }

    pub fn file_ids(&self) -> Vec<u16> {
        self.open_files.keys().copied().collect()
    }

    /// Unbind a tree, closing its open files and dropping its searches.
    pub fn disconnect_tree(&mut self, tree_id: u16) {
        if let Some(share) = self.connected_trees.get(&tree_id) {
            let store = share.file_store().clone();
            let file_ids: Vec<u16> = self
                .open_files
                .iter()
                .filter(|(_, open)| open.tree_id() == u32::from(tree_id))
                .map(|(id, _)| *id)
                .collect();
            for file_id in file_ids {
                if let Some(open) = self.open_files.remove(&file_id) {
                    let _ = store.close_file(open.handle());
                }
            }
            self.open_searches.retain(|_, search| search.tree_id() != u32::from(tree_id));
            self.connected_trees.remove(&tree_id);
            debug!(tree_id, "legacy tree disconnected");
        }
    }

    pub fn add_open_file(&mut self, file_id: u16, open: OpenFileObject) {
        self.open_files.insert(file_id, open);
    }

    pub fn get_open_file(&self, file_id: u16) -> Option<&OpenFileObject> {
        self.open_files.get(&file_id)
    }

    pub fn remove_open_file(&mut self, file_id: u16) -> Option<OpenFileObject> {
        self.open_files.remove(&file_id)
    }

    /// Search handles skip zero and the all-ones sentinel; ids are reused
    /// only after being freed.
    fn allocate_search_handle(&mut self) -> Option<u16> {
        if self.open_searches.len() >= MAX_SEARCHES {
            return None;
        }
        for offset in 0..u16::MAX {
            let candidate = self.next_search_handle.wrapping_add(offset);
            if candidate == 0 || candidate == 0xFFFF {
                continue;
            }
            if !self.open_searches.contains_key(&candidate) {
                self.next_search_handle = candidate.wrapping_add(1);
                return Some(candidate);
            }
        }
        None
    }

    pub fn add_open_search(&mut self, tree_id: u16, entries: Vec<SMBDirectoryEntry>) -> Option<u16> {
        let handle = self.allocate_search_handle()?;
        self.open_searches.insert(handle, OpenSearch::new(u32::from(tree_id), entries));
        Some(handle)
    }

    pub fn get_open_search_mut(&mut self, search_handle: u16) -> Option<&mut OpenSearch> {
        self.open_searches.get_mut(&search_handle)
    }

    pub fn remove_open_search(&mut self, search_handle: u16) -> Option<OpenSearch> {
        self.open_searches.remove(&search_handle)
    }

    pub fn open_files_information(&self) -> Vec<OpenFileInformation> {
        self.open_files.values().map(OpenFileInformation::from).collect()
    }

    /// Free all resources used by this session.
    pub fn close(&mut self) {
        let tree_ids: Vec<u16> = self.connected_trees.keys().copied().collect();
        for tree_id in tree_ids {
            self.disconnect_tree(tree_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::body::access_mask::SMBAccessMask;
    use crate::protocol::body::create::{SMBCreateDisposition, SMBCreateOptions, SMBFileAttributes, SMBShareAccess};
    use crate::server::share::file_system::SMBFileSystemShare;
    use crate::store::memory::MemoryFileStore;
    use crate::store::FileStore;

    fn context() -> SecurityContext {
        SecurityContext {
            user_name: "alice".into(),
            machine_name: "ws".into(),
            client_endpoint: "peer".into(),
            guest: false,
        }
    }

    fn share_over(store: Arc<MemoryFileStore>) -> Arc<dyn SharedResource> {
        Arc::new(SMBFileSystemShare::new("shared", store))
    }

    #[test]
    fn tree_ids_skip_zero_and_are_unique() {
        let mut session = SMBSession::new(1, context(), None, false);
        let share = share_over(Arc::new(MemoryFileStore::new()));
        let a = session.add_connected_tree(share.clone()).unwrap();
        let b = session.add_connected_tree(share).unwrap();
        assert_ne!(a, 0);
        assert_ne!(b, 0);
        assert_ne!(a, b);
    }

    #[test]
    fn disconnect_tree_closes_owned_opens() {
        let store = Arc::new(MemoryFileStore::new());
        let share = share_over(store.clone());
        let mut session = SMBSession::new(1, context(), None, false);
        let tree_id = session.add_connected_tree(share).unwrap();

        let (handle, _) = store
            .create_file(
                "f.txt",
                SMBAccessMask::GENERIC_ALL,
                SMBFileAttributes::NORMAL,
                SMBShareAccess::READ,
                SMBCreateDisposition::OpenIf,
                SMBCreateOptions::empty(),
            )
            .unwrap();
        let file_id = session.add_open_file(tree_id, "shared", "f.txt", handle, FileAccess::ReadWrite);
        assert!(session.get_open_file(file_id.volatile).is_some());

        session.disconnect_tree(tree_id);
        assert!(session.get_open_file(file_id.volatile).is_none());
        assert_eq!(session.tree_count(), 0);
        // The store handle was closed as part of the teardown.
        assert!(store.close_file(handle).is_err());
    }

    #[test]
    fn search_handles_skip_reserved_values() {
        let mut session = LegacySMBSession::new(1, context());
        for _ in 0..8 {
            let handle = session.add_open_search(1, Vec::new()).unwrap();
            assert_ne!(handle, 0);
            assert_ne!(handle, 0xFFFF);
        }
        assert_eq!(session.search_count(), 8);
    }

    #[test]
    fn legacy_close_releases_everything() {
        let store = Arc::new(MemoryFileStore::new());
        let share = share_over(store.clone());
        let mut session = LegacySMBSession::new(5, context());
        session.add_connected_tree(2, share);
        let (handle, _) = store
            .create_file(
                "f.txt",
                SMBAccessMask::GENERIC_ALL,
                SMBFileAttributes::NORMAL,
                SMBShareAccess::READ,
                SMBCreateDisposition::OpenIf,
                SMBCreateOptions::empty(),
            )
            .unwrap();
        session.add_open_file(7, OpenFileObject::new(2, "shared".into(), "f.txt".into(), handle, FileAccess::Read));
        session.add_open_search(2, Vec::new());

        session.close();
        assert_eq!(session.tree_count(), 0);
        assert_eq!(session.open_count(), 0);
        assert_eq!(session.search_count(), 0);
    }
}
