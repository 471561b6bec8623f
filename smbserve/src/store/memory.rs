//! In-memory `FileStore` backing for tests and the demo server.

use std::collections::HashMap;
use std::sync::Mutex;

use smbserve_core::nt_status::NtStatus;

use crate::protocol::body::access_mask::SMBAccessMask;
use crate::protocol::body::change_notify::SMBCompletionFilter;
use crate::protocol::body::create::{
    SMBCreateAction, SMBCreateDisposition, SMBCreateOptions, SMBFileAttributes, SMBShareAccess,
};
use crate::protocol::body::filetime::FileTime;
use crate::protocol::body::info::{
    FileInformation, FileSystemInformation, SMBDirectoryEntry, SMBFileInformationClass, SetFileInformation,
};
use crate::store::{FileStore, NotifyCompletion, PendingWatchToken, StoreHandle, StoreResult};

#[derive(Debug, Clone)]
struct MemoryNode {
    data: Vec<u8>,
    directory: bool,
    attributes: SMBFileAttributes,
    creation_time: FileTime,
    last_write_time: FileTime,
}

impl MemoryNode {
    fn file() -> Self {
        Self {
            data: Vec::new(),
            directory: false,
            attributes: SMBFileAttributes::NORMAL,
            creation_time: FileTime::now(),
            last_write_time: FileTime::now(),
        }
    }

    fn directory() -> Self {
        Self {
            data: Vec::new(),
            directory: true,
            attributes: SMBFileAttributes::DIRECTORY,
            creation_time: FileTime::now(),
            last_write_time: FileTime::now(),
        }
    }
}

#[derive(Debug)]
struct OpenHandle {
    path: String,
    directory: bool,
    delete_on_close: bool,
}

struct PendingWatch {
    watch_path: String,
    watch_tree: bool,
    on_complete: NotifyCompletion,
}

#[derive(Default)]
struct MemoryStoreInner {
    nodes: HashMap<String, MemoryNode>,
    handles: HashMap<u64, OpenHandle>,
    watches: HashMap<u64, PendingWatch>,
    next_handle: u64,
    next_watch: u64,
}

/// A path-keyed in-memory tree of files and directories implementing the
/// whole `FileStore` surface, including change watches.
pub struct MemoryFileStore {
    inner: Mutex<MemoryStoreInner>,
}

fn normalize(path: &str) -> String {
    path.trim_matches(|c| c == '\\' || c == '/').replace('/', "\\")
}

fn parent_of(path: &str) -> String {
    match path.rfind('\\') {
        Some(index) => path[..index].to_string(),
        None => String::new(),
    }
}

fn matches_pattern(name: &str, pattern: &str) -> bool {
    if pattern.is_empty() || pattern == "*" || pattern == "*.*" {
        return true;
    }
    match pattern.split_once('*') {
        Some((prefix, suffix)) if !suffix.contains('*') => {
            let name = name.to_ascii_lowercase();
            name.starts_with(&prefix.to_ascii_lowercase()) && name.ends_with(&suffix.to_ascii_lowercase())
        }
        _ => name.eq_ignore_ascii_case(pattern),
    }
}

impl Default for MemoryFileStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryFileStore {
    pub fn new() -> Self {
        let mut inner = MemoryStoreInner::default();
        // Root directory always exists.
        inner.nodes.insert(String::new(), MemoryNode::directory());
        Self {
            inner: Mutex::new(inner),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryStoreInner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Complete every watch observing `path` (or an ancestor, for tree
    /// watches) outside the store lock.
    fn fire_watches(&self, path: &str) {
        let fired = {
            let mut inner = self.lock();
            let keys: Vec<u64> = inner
                .watches
                .iter()
                .filter(|(_, watch)| {
                    let dir = &watch.watch_path;
                    parent_of(path) == *dir
                        || (watch.watch_tree && (dir.is_empty() || path.starts_with(&format!("{}\\", dir))))
                })
                .map(|(key, _)| *key)
                .collect();
            keys.into_iter()
                .filter_map(|key| inner.watches.remove(&key))
                .collect::<Vec<_>>()
        };
        for watch in fired {
            (watch.on_complete)(NtStatus::Success, Vec::new());
        }
    }
}

impl FileStore for MemoryFileStore {
    fn create_file(
        &self,
        path: &str,
        _desired_access: SMBAccessMask,
        attributes: SMBFileAttributes,
        _share_access: SMBShareAccess,
        disposition: SMBCreateDisposition,
        options: SMBCreateOptions,
    ) -> StoreResult<(StoreHandle, SMBCreateAction)> {
        let path = normalize(path);
        let directory = options.contains(SMBCreateOptions::DIRECTORY_FILE);
        let mut created_path: Option<String> = None;
        let (handle, action) = {
            let mut inner = self.lock();
            if !path.is_empty() {
                let parent = parent_of(&path);
                match inner.nodes.get(&parent) {
                    Some(node) if node.directory => {}
                    _ => return Err(NtStatus::ObjectNameNotFound),
                }
            }
            let exists = inner.nodes.contains_key(&path);
            let action = match disposition {
                SMBCreateDisposition::Open => {
                    if !exists {
                        return Err(NtStatus::ObjectNameNotFound);
                    }
                    SMBCreateAction::Opened
                }
                SMBCreateDisposition::Create => {
                    if exists {
                        return Err(NtStatus::ObjectNameCollision);
                    }
                    SMBCreateAction::Created
                }
                SMBCreateDisposition::OpenIf => {
                    if exists {
                        SMBCreateAction::Opened
                    } else {
                        SMBCreateAction::Created
                    }
                }
                SMBCreateDisposition::Overwrite => {
                    if !exists {
                        return Err(NtStatus::ObjectNameNotFound);
                    }
                    SMBCreateAction::Overwritten
                }
                SMBCreateDisposition::OverwriteIf => {
                    if exists {
                        SMBCreateAction::Overwritten
                    } else {
                        SMBCreateAction::Created
                    }
                }
                SMBCreateDisposition::Supersede => {
                    if exists {
                        SMBCreateAction::Superseded
                    } else {
                        SMBCreateAction::Created
                    }
                }
            };
            if let Some(node) = inner.nodes.get(&path) {
                if node.directory != directory && matches!(action, SMBCreateAction::Opened) && directory {
                    return Err(NtStatus::NotADirectory);
                }
            }
            match action {
                SMBCreateAction::Created => {
                    let mut node = if directory { MemoryNode::directory() } else { MemoryNode::file() };
                    if !directory && !attributes.is_empty() {
                        node.attributes = attributes;
                    }
                    inner.nodes.insert(path.clone(), node);
                    created_path = Some(path.clone());
                }
                SMBCreateAction::Overwritten | SMBCreateAction::Superseded => {
                    if let Some(node) = inner.nodes.get_mut(&path) {
                        node.data.clear();
                        node.last_write_time = FileTime::now();
                    }
                }
                _ => {}
            }
            let is_directory = inner.nodes.get(&path).map(|n| n.directory).unwrap_or(directory);
            inner.next_handle += 1;
            let handle = inner.next_handle;
            inner.handles.insert(
                handle,
                OpenHandle {
                    path: path.clone(),
                    directory: is_directory,
                    delete_on_close: options.contains(SMBCreateOptions::DELETE_ON_CLOSE),
                },
            );
            (StoreHandle(handle), action)
        };
        if let Some(path) = created_path {
            self.fire_watches(&path);
        }
        Ok((handle, action))
    }

    fn close_file(&self, handle: StoreHandle) -> StoreResult<()> {
        let mut inner = self.lock();
        let open = inner.handles.remove(&handle.0).ok_or(NtStatus::InvalidHandle)?;
        if open.delete_on_close {
            inner.nodes.remove(&open.path);
        }
        Ok(())
    }

    fn read_file(&self, handle: StoreHandle, offset: u64, max_count: u32) -> StoreResult<Vec<u8>> {
        let inner = self.lock();
        let open = inner.handles.get(&handle.0).ok_or(NtStatus::InvalidHandle)?;
        let node = inner.nodes.get(&open.path).ok_or(NtStatus::ObjectNameNotFound)?;
        if node.directory {
            return Err(NtStatus::InvalidDeviceRequest);
        }
        let offset = offset as usize;
        if offset >= node.data.len() {
            return Err(NtStatus::EndOfFile);
        }
        let end = node.data.len().min(offset + max_count as usize);
        Ok(node.data[offset..end].to_vec())
    }

    fn write_file(&self, handle: StoreHandle, offset: u64, data: &[u8]) -> StoreResult<u32> {
        let path = {
            let mut inner = self.lock();
            let open = inner.handles.get(&handle.0).ok_or(NtStatus::InvalidHandle)?;
            if open.directory {
                return Err(NtStatus::InvalidDeviceRequest);
            }
            let path = open.path.clone();
            let node = inner.nodes.get_mut(&path).ok_or(NtStatus::ObjectNameNotFound)?;
            let offset = offset as usize;
            if node.data.len() < offset + data.len() {
                node.data.resize(offset + data.len(), 0);
            }
            node.data[offset..offset + data.len()].copy_from_slice(data);
            node.last_write_time = FileTime::now();
            path
        };
        self.fire_watches(&path);
        Ok(data.len() as u32)
    }

    fn flush_file_buffers(&self, handle: StoreHandle) -> StoreResult<()> {
        let inner = self.lock();
        inner.handles.get(&handle.0).map(|_| ()).ok_or(NtStatus::InvalidHandle)
    }

    fn query_directory(&self, handle: StoreHandle, pattern: &str) -> StoreResult<Vec<SMBDirectoryEntry>> {
        let inner = self.lock();
        let open = inner.handles.get(&handle.0).ok_or(NtStatus::InvalidHandle)?;
        if !open.directory {
            return Err(NtStatus::InvalidDeviceRequest);
        }
        let dir = open.path.clone();
        let mut entries: Vec<SMBDirectoryEntry> = inner
            .nodes
            .iter()
            .filter(|(path, _)| !path.is_empty() && parent_of(path) == dir)
            .filter_map(|(path, node)| {
                let name = path.rsplit('\\').next().unwrap_or(path);
                matches_pattern(name, pattern).then(|| SMBDirectoryEntry {
                    file_name: name.to_string(),
                    attributes: node.attributes,
                    creation_time: node.creation_time,
                    last_write_time: node.last_write_time,
                    end_of_file: node.data.len() as u64,
                })
            })
            .collect();
        entries.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(entries)
    }

    fn get_file_information(&self, handle: StoreHandle, info_class: SMBFileInformationClass) -> StoreResult<FileInformation> {
        let inner = self.lock();
        let open = inner.handles.get(&handle.0).ok_or(NtStatus::InvalidHandle)?;
        let node = inner.nodes.get(&open.path).ok_or(NtStatus::ObjectNameNotFound)?;
        match info_class {
            SMBFileInformationClass::Basic => Ok(FileInformation::Basic {
                creation_time: node.creation_time,
                last_access_time: node.last_write_time,
                last_write_time: node.last_write_time,
                change_time: node.last_write_time,
                attributes: node.attributes,
            }),
            SMBFileInformationClass::Standard => Ok(FileInformation::Standard {
                allocation_size: node.data.capacity() as u64,
                end_of_file: node.data.len() as u64,
                delete_pending: open.delete_on_close,
                directory: node.directory,
            }),
            SMBFileInformationClass::NetworkOpen => Ok(FileInformation::NetworkOpen {
                creation_time: node.creation_time,
                last_write_time: node.last_write_time,
                allocation_size: node.data.capacity() as u64,
                end_of_file: node.data.len() as u64,
                attributes: node.attributes,
            }),
            _ => Err(NtStatus::InvalidInfoClass),
        }
    }

    fn set_file_information(&self, handle: StoreHandle, information: SetFileInformation) -> StoreResult<()> {
        let mut inner = self.lock();
        let open = inner.handles.get(&handle.0).ok_or(NtStatus::InvalidHandle)?;
        let path = open.path.clone();
        match information {
            SetFileInformation::Rename { new_path, replace_if_exists } => {
                let new_path = normalize(&new_path);
                if inner.nodes.contains_key(&new_path) && !replace_if_exists {
                    return Err(NtStatus::ObjectNameCollision);
                }
                let node = inner.nodes.remove(&path).ok_or(NtStatus::ObjectNameNotFound)?;
                inner.nodes.insert(new_path.clone(), node);
                for open in inner.handles.values_mut() {
                    if open.path == path {
                        open.path = new_path.clone();
                    }
                }
                Ok(())
            }
            SetFileInformation::Disposition { delete_pending } => {
                if let Some(open) = inner.handles.get_mut(&handle.0) {
                    open.delete_on_close = delete_pending;
                }
                Ok(())
            }
            SetFileInformation::EndOfFile { end_of_file } => {
                let node = inner.nodes.get_mut(&path).ok_or(NtStatus::ObjectNameNotFound)?;
                node.data.resize(end_of_file as usize, 0);
                Ok(())
            }
            SetFileInformation::Basic { attributes } => {
                let node = inner.nodes.get_mut(&path).ok_or(NtStatus::ObjectNameNotFound)?;
                if !attributes.is_empty() {
                    node.attributes = attributes;
                }
                Ok(())
            }
        }
    }

    fn get_file_system_information(&self, info_class: SMBFileInformationClass) -> StoreResult<FileSystemInformation> {
        match info_class {
            SMBFileInformationClass::Directory | SMBFileInformationClass::FullDirectory => Err(NtStatus::InvalidInfoClass),
            _ => Ok(FileSystemInformation::Volume {
                label: "SMBSERVE".into(),
                serial_number: 0x5362,
            }),
        }
    }

    fn device_io_control(&self, handle: StoreHandle, _ctl_code: u32, input: &[u8], max_output_length: u32) -> StoreResult<Vec<u8>> {
        let inner = self.lock();
        inner.handles.get(&handle.0).ok_or(NtStatus::InvalidHandle)?;
        // Transceive-style echo, truncated to the caller's output window.
        let end = input.len().min(max_output_length as usize);
        Ok(input[..end].to_vec())
    }

    fn notify_change(
        &self,
        handle: StoreHandle,
        _completion_filter: SMBCompletionFilter,
        watch_tree: bool,
        _max_output_length: u32,
        on_complete: NotifyCompletion,
    ) -> StoreResult<PendingWatchToken> {
        let mut inner = self.lock();
        let open = inner.handles.get(&handle.0).ok_or(NtStatus::InvalidHandle)?;
        if !open.directory {
            return Err(NtStatus::InvalidDeviceRequest);
        }
        let watch_path = open.path.clone();
        inner.next_watch += 1;
        let token = inner.next_watch;
        inner.watches.insert(
            token,
            PendingWatch {
                watch_path,
                watch_tree,
                on_complete,
            },
        );
        Ok(PendingWatchToken(token))
    }

    fn cancel(&self, token: PendingWatchToken) {
        let watch = {
            let mut inner = self.lock();
            inner.watches.remove(&token.0)
        };
        if let Some(watch) = watch {
            (watch.on_complete)(NtStatus::Cancelled, Vec::new());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    fn open_if(store: &MemoryFileStore, path: &str) -> (StoreHandle, SMBCreateAction) {
        store
            .create_file(
                path,
                SMBAccessMask::GENERIC_ALL,
                SMBFileAttributes::NORMAL,
                SMBShareAccess::READ | SMBShareAccess::WRITE,
                SMBCreateDisposition::OpenIf,
                SMBCreateOptions::empty(),
            )
            .unwrap()
    }

    #[test]
    fn create_then_reopen_reports_opened() {
        let store = MemoryFileStore::new();
        let (handle, action) = open_if(&store, "a.txt");
        assert_eq!(action, SMBCreateAction::Created);
        store.close_file(handle).unwrap();

        let (handle, action) = open_if(&store, "a.txt");
        assert_eq!(action, SMBCreateAction::Opened);
        store.close_file(handle).unwrap();
    }

    #[test]
    fn open_missing_file_fails() {
        let store = MemoryFileStore::new();
        let result = store.create_file(
            "missing.txt",
            SMBAccessMask::GENERIC_READ,
            SMBFileAttributes::NORMAL,
            SMBShareAccess::READ,
            SMBCreateDisposition::Open,
            SMBCreateOptions::empty(),
        );
        assert_eq!(result.unwrap_err(), NtStatus::ObjectNameNotFound);
    }

    #[test]
    fn write_read_round_trip() {
        let store = MemoryFileStore::new();
        let (handle, _) = open_if(&store, "data.bin");
        let written = store.write_file(handle, 0, b"hello world").unwrap();
        assert_eq!(written, 11);
        let data = store.read_file(handle, 0, 64).unwrap();
        assert_eq!(data, b"hello world");
        let tail = store.read_file(handle, 6, 64).unwrap();
        assert_eq!(tail, b"world");
        assert_eq!(store.read_file(handle, 100, 4).unwrap_err(), NtStatus::EndOfFile);
    }

    #[test]
    fn directory_listing_respects_pattern() {
        let store = MemoryFileStore::new();
        let (dir, _) = store
            .create_file(
                "docs",
                SMBAccessMask::GENERIC_READ,
                SMBFileAttributes::DIRECTORY,
                SMBShareAccess::READ,
                SMBCreateDisposition::OpenIf,
                SMBCreateOptions::DIRECTORY_FILE,
            )
            .unwrap();
        open_if(&store, "docs\\a.txt");
        open_if(&store, "docs\\b.txt");
        open_if(&store, "docs\\c.log");

        let all = store.query_directory(dir, "*").unwrap();
        assert_eq!(all.len(), 3);
        let texts = store.query_directory(dir, "*.txt").unwrap();
        assert_eq!(texts.len(), 2);
        assert_eq!(texts[0].file_name, "a.txt");
    }

    #[test]
    fn watch_completes_once_on_cancel() {
        let store = MemoryFileStore::new();
        let (dir, _) = store
            .create_file(
                "watched",
                SMBAccessMask::GENERIC_READ,
                SMBFileAttributes::DIRECTORY,
                SMBShareAccess::READ,
                SMBCreateDisposition::OpenIf,
                SMBCreateOptions::DIRECTORY_FILE,
            )
            .unwrap();
        let fired = Arc::new(AtomicU32::new(0));
        let fired_clone = fired.clone();
        let token = store
            .notify_change(
                dir,
                SMBCompletionFilter::FILE_NAME,
                false,
                4096,
                Box::new(move |status, _| {
                    assert_eq!(status, NtStatus::Cancelled);
                    fired_clone.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
        store.cancel(token);
        store.cancel(token);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn watch_fires_on_child_creation() {
        let store = MemoryFileStore::new();
        let (dir, _) = store
            .create_file(
                "watched",
                SMBAccessMask::GENERIC_READ,
                SMBFileAttributes::DIRECTORY,
                SMBShareAccess::READ,
                SMBCreateDisposition::OpenIf,
                SMBCreateOptions::DIRECTORY_FILE,
            )
            .unwrap();
        let fired = Arc::new(AtomicU32::new(0));
        let fired_clone = fired.clone();
        store
            .notify_change(
                dir,
                SMBCompletionFilter::FILE_NAME,
                false,
                4096,
                Box::new(move |status, _| {
                    assert_eq!(status, NtStatus::Success);
                    fired_clone.fetch_add(1, Ordering::SeqCst);
                }),
            )
            .unwrap();
        open_if(&store, "watched\\new.txt");
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn delete_on_close_removes_node() {
        let store = MemoryFileStore::new();
        let (handle, _) = store
            .create_file(
                "temp.txt",
                SMBAccessMask::GENERIC_ALL,
                SMBFileAttributes::NORMAL,
                SMBShareAccess::READ,
                SMBCreateDisposition::OpenIf,
                SMBCreateOptions::DELETE_ON_CLOSE,
            )
            .unwrap();
        store.close_file(handle).unwrap();
        let result = store.create_file(
            "temp.txt",
            SMBAccessMask::GENERIC_READ,
            SMBFileAttributes::NORMAL,
            SMBShareAccess::READ,
            SMBCreateDisposition::Open,
            SMBCreateOptions::empty(),
        );
        assert_eq!(result.unwrap_err(), NtStatus::ObjectNameNotFound);
    }
}
