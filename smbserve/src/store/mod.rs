pub mod memory;

use smbserve_core::nt_status::NtStatus;

use crate::protocol::body::access_mask::SMBAccessMask;
use crate::protocol::body::change_notify::SMBCompletionFilter;
use crate::protocol::body::create::{
    SMBCreateAction, SMBCreateDisposition, SMBCreateOptions, SMBFileAttributes, SMBShareAccess,
};
use crate::protocol::body::info::{
    FileInformation, FileSystemInformation, SMBDirectoryEntry, SMBFileInformationClass, SetFileInformation,
};

/// Store operations succeed with a value or fail with a protocol status;
/// every non-success status is legal for callers to receive.
pub type StoreResult<T> = Result<T, NtStatus>;

/// Opaque handle a store returns from `create_file`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StoreHandle(pub u64);

/// Token identifying a registered change watch, used to abort it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingWatchToken(pub u64);

/// Completion callback for an asynchronous change watch. Fires exactly once,
/// from whatever execution context completes or cancels the watch.
pub type NotifyCompletion = Box<dyn FnOnce(NtStatus, Vec<u8>) + Send>;

/// The backend capability that executes file operations for a share.
///
/// Implementations are the file-system or named-pipe backing of a share; the
/// dispatch engine treats them uniformly.
pub trait FileStore: Send + Sync {
    fn create_file(
        &self,
        path: &str,
        desired_access: SMBAccessMask,
        attributes: SMBFileAttributes,
        share_access: SMBShareAccess,
        disposition: SMBCreateDisposition,
        options: SMBCreateOptions,
    ) -> StoreResult<(StoreHandle, SMBCreateAction)>;

    fn close_file(&self, handle: StoreHandle) -> StoreResult<()>;

    fn read_file(&self, handle: StoreHandle, offset: u64, max_count: u32) -> StoreResult<Vec<u8>>;

    fn write_file(&self, handle: StoreHandle, offset: u64, data: &[u8]) -> StoreResult<u32>;

    fn flush_file_buffers(&self, handle: StoreHandle) -> StoreResult<()>;

    fn query_directory(&self, handle: StoreHandle, pattern: &str) -> StoreResult<Vec<SMBDirectoryEntry>>;

    fn get_file_information(&self, handle: StoreHandle, info_class: SMBFileInformationClass) -> StoreResult<FileInformation>;

    fn set_file_information(&self, handle: StoreHandle, information: SetFileInformation) -> StoreResult<()>;

    fn get_file_system_information(&self, info_class: SMBFileInformationClass) -> StoreResult<FileSystemInformation>;

    fn get_security_information(&self, handle: StoreHandle) -> StoreResult<Vec<u8>> {
        let _ = handle;
        Err(NtStatus::NotSupported)
    }

    fn set_security_information(&self, handle: StoreHandle, descriptor: &[u8]) -> StoreResult<()> {
        let _ = (handle, descriptor);
        Err(NtStatus::NotSupported)
    }

    fn device_io_control(&self, handle: StoreHandle, ctl_code: u32, input: &[u8], max_output_length: u32) -> StoreResult<Vec<u8>>;

    /// Register a change watch. A successful return means the operation is
    /// pending; `on_complete` fires later, exactly once, with the final
    /// status (including `Cancelled`).
    fn notify_change(
        &self,
        handle: StoreHandle,
        completion_filter: SMBCompletionFilter,
        watch_tree: bool,
        max_output_length: u32,
        on_complete: NotifyCompletion,
    ) -> StoreResult<PendingWatchToken>;

    /// Ask the store to abort a pending watch. Completion still arrives
    /// through the registered callback; aborting an unknown or finished
    /// watch is a no-op.
    fn cancel(&self, token: PendingWatchToken);
}
