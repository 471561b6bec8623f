use crate::protocol::body::access_mask::FileAccess;
use crate::protocol::body::filetime::FileTime;
use crate::protocol::body::info::SMBDirectoryEntry;
use crate::store::StoreHandle;

/// Protocol-side record of a store handle returned by `create_file`.
#[derive(Debug, Clone)]
pub struct OpenFileObject {
    tree_id: u32,
    share_name: String,
    path: String,
    handle: StoreHandle,
    access: FileAccess,
    open_time: FileTime,
}

impl OpenFileObject {
    pub fn new(tree_id: u32, share_name: String, path: String, handle: StoreHandle, access: FileAccess) -> Self {
        Self {
            tree_id,
            share_name,
            path,
            handle,
            access,
            open_time: FileTime::now(),
        }
    }

    pub fn tree_id(&self) -> u32 {
        self.tree_id
    }

    pub fn share_name(&self) -> &str {
        &self.share_name
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn handle(&self) -> StoreHandle {
        self.handle
    }

    pub fn access(&self) -> FileAccess {
        self.access
    }

    pub fn open_time(&self) -> FileTime {
        self.open_time
    }
}

/// Cursor over a materialized directory listing (legacy family only).
#[derive(Debug, Clone)]
pub struct OpenSearch {
    tree_id: u32,
    entries: Vec<SMBDirectoryEntry>,
    enumeration_location: usize,
}

impl OpenSearch {
    pub fn new(tree_id: u32, entries: Vec<SMBDirectoryEntry>) -> Self {
        Self {
            tree_id,
            entries,
            enumeration_location: 0,
        }
    }

    pub fn tree_id(&self) -> u32 {
        self.tree_id
    }

    /// Page through the result set; the flag reports whether the cursor is
    /// exhausted afterwards.
    pub fn next_entries(&mut self, max_count: usize) -> (Vec<SMBDirectoryEntry>, bool) {
        let start = self.enumeration_location;
        let end = self.entries.len().min(start + max_count);
        self.enumeration_location = end;
        (self.entries[start..end].to_vec(), end == self.entries.len())
    }
}

/// Read-only snapshot of one open file, for the administrative surfaces.
#[derive(Debug, Clone)]
pub struct OpenFileInformation {
    pub share_name: String,
    pub path: String,
    pub access: FileAccess,
    pub open_time: FileTime,
}

impl From<&OpenFileObject> for OpenFileInformation {
    fn from(open: &OpenFileObject) -> Self {
        Self {
            share_name: open.share_name.clone(),
            path: open.path.clone(),
            access: open.access,
            open_time: open.open_time,
        }
    }
}
