use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::store::{FileStore, PendingWatchToken};

/// One outstanding asynchronous operation, addressable by its cancel key
/// (async id for the modern family, PID/MID pair for the legacy family).
#[derive(Clone)]
pub struct PendingOperation {
    pub cancel_key: u64,
    pub file_id: u64,
    pub message_id: u64,
    pub token: PendingWatchToken,
    pub store: Arc<dyn FileStore>,
}

/// Tracker for in-flight long-running operations on one connection.
///
/// Internally synchronized and cheap to clone; store completion callbacks
/// hold a clone and remove their entry whenever they fire.
#[derive(Clone, Default)]
pub struct SMBPendingRequests {
    inner: Arc<Mutex<HashMap<u64, PendingOperation>>>,
}

/// Cancel key of a legacy-family pending operation.
pub fn legacy_cancel_key(pid: u16, mid: u16) -> u64 {
    (u64::from(pid) << 16) | u64::from(mid)
}

impl SMBPendingRequests {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, PendingOperation>> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn register(&self, operation: PendingOperation) {
        self.lock().insert(operation.cancel_key, operation);
    }

    /// Remove and return the entry for `cancel_key`; `None` means the
    /// operation already completed or never existed.
    pub fn take(&self, cancel_key: u64) -> Option<PendingOperation> {
        self.lock().remove(&cancel_key)
    }

    /// Remove and return the entry matching a message id (synchronous-style
    /// cancellation in the modern family).
    pub fn take_by_message_id(&self, message_id: u64) -> Option<PendingOperation> {
        let mut table = self.lock();
        let key = table
            .values()
            .find(|operation| operation.message_id == message_id)
            .map(|operation| operation.cancel_key)?;
        table.remove(&key)
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::MemoryFileStore;

    fn operation(cancel_key: u64, message_id: u64) -> PendingOperation {
        PendingOperation {
            cancel_key,
            file_id: 1,
            message_id,
            token: PendingWatchToken(cancel_key),
            store: Arc::new(MemoryFileStore::new()),
        }
    }

    #[test]
    fn take_removes_exactly_once() {
        let pending = SMBPendingRequests::new();
        pending.register(operation(5, 100));
        assert_eq!(pending.len(), 1);
        assert!(pending.take(5).is_some());
        assert!(pending.take(5).is_none());
        assert!(pending.is_empty());
    }

    #[test]
    fn lookup_by_message_id() {
        let pending = SMBPendingRequests::new();
        pending.register(operation(5, 100));
        pending.register(operation(6, 101));
        let taken = pending.take_by_message_id(101).unwrap();
        assert_eq!(taken.cancel_key, 6);
        assert!(pending.take_by_message_id(101).is_none());
    }

    #[test]
    fn legacy_key_packs_pid_and_mid() {
        assert_eq!(legacy_cancel_key(0x0001, 0x0002), 0x0001_0002);
        assert_ne!(legacy_cancel_key(1, 2), legacy_cancel_key(2, 1));
    }
}
