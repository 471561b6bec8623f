use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use smbserve_core::logging::debug;

use crate::protocol::body::dialect::SMBDialect;
use crate::protocol::body::filetime::FileTime;
use crate::server::pending::SMBPendingRequests;
use crate::server::send_queue::{SMBSendQueue, SMBSendReceiver};
use crate::server::session::{LegacySMBSession, SMBSession, SessionInformation};
use crate::util::auth::SecurityProvider;

/// Modern-family specialization: 64-bit session ids, unique per connection,
/// plus the in-progress (pre-authentication) id table.
pub struct Smb2ConnectionState {
    pub session_table: HashMap<u64, SMBSession>,
    pub preauth_session_table: HashMap<u64, SMBPreauthSession>,
    next_session_id: u64,
}

/// A session id handed out while its credential exchange is still running.
#[derive(Debug, Clone)]
pub struct SMBPreauthSession {
    session_id: u64,
    creation_time: FileTime,
}

impl SMBPreauthSession {
    pub fn new(session_id: u64) -> Self {
        Self {
            session_id,
            creation_time: FileTime::now(),
        }
    }

    pub fn session_id(&self) -> u64 {
        self.session_id
    }

    pub fn creation_time(&self) -> FileTime {
        self.creation_time
    }
}

impl Smb2ConnectionState {
    pub fn new() -> Self {
        Self {
            session_table: HashMap::new(),
            preauth_session_table: HashMap::new(),
            next_session_id: 1,
        }
    }

    /// Session ids are unique within the connection and never zero.
    pub fn allocate_session_id(&mut self) -> u64 {
        loop {
            let candidate = self.next_session_id;
            self.next_session_id = self.next_session_id.wrapping_add(1);
            if candidate != 0
                && !self.session_table.contains_key(&candidate)
                && !self.preauth_session_table.contains_key(&candidate)
            {
                return candidate;
            }
        }
    }

    pub fn get_session(&self, session_id: u64) -> Option<&SMBSession> {
        self.session_table.get(&session_id)
    }

    pub fn get_session_mut(&mut self, session_id: u64) -> Option<&mut SMBSession> {
        self.session_table.get_mut(&session_id)
    }

    pub fn remove_session(&mut self, session_id: u64) -> Option<SMBSession> {
        self.session_table.remove(&session_id)
    }
}

impl Default for Smb2ConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Legacy-family specialization: 16-bit ids allocated per connection across
/// all of its sessions, skipping zero and the all-ones sentinel.
pub struct LegacyConnectionState {
    pub session_table: HashMap<u16, LegacySMBSession>,
    pub preauth_user_ids: HashMap<u16, FileTime>,
    pub max_buffer_size: u32,
    next_uid: u16,
    next_tid: u16,
    next_fid: u16,
}

impl LegacyConnectionState {
    pub fn new() -> Self {
        Self {
            session_table: HashMap::new(),
            preauth_user_ids: HashMap::new(),
            max_buffer_size: 65535,
            next_uid: 1,
            next_tid: 1,
            next_fid: 1,
        }
    }

    fn allocate_id<F: Fn(&Self, u16) -> bool>(next: u16, state: &Self, in_use: F) -> Option<(u16, u16)> {
        for offset in 0..u16::MAX {
            let candidate = next.wrapping_add(offset);
            if candidate == 0 || candidate == 0xFFFF {
                continue;
            }
            if !in_use(state, candidate) {
                return Some((candidate, candidate.wrapping_add(1)));
            }
        }
        None
    }

    pub fn allocate_user_id(&mut self) -> Option<u16> {
        let (id, next) = Self::allocate_id(self.next_uid, self, |state, id| {
            state.session_table.contains_key(&id) || state.preauth_user_ids.contains_key(&id)
        })?;
        self.next_uid = next;
        Some(id)
    }

    pub fn allocate_tree_id(&mut self) -> Option<u16> {
        let (id, next) = Self::allocate_id(self.next_tid, self, |state, id| {
            state.session_table.values().any(|session| session.is_tree_connected(id))
        })?;
        self.next_tid = next;
        Some(id)
    }

    pub fn allocate_file_id(&mut self) -> Option<u16> {
        let (id, next) = Self::allocate_id(self.next_fid, self, |state, id| {
            state.session_table.values().any(|session| session.get_open_file(id).is_some())
        })?;
        self.next_fid = next;
        Some(id)
    }

    pub fn get_session(&self, user_id: u16) -> Option<&LegacySMBSession> {
        self.session_table.get(&user_id)
    }

    pub fn get_session_mut(&mut self, user_id: u16) -> Option<&mut LegacySMBSession> {
        self.session_table.get_mut(&user_id)
    }

    pub fn remove_session(&mut self, user_id: u16) -> Option<LegacySMBSession> {
        self.session_table.remove(&user_id)
    }
}

impl Default for LegacyConnectionState {
    fn default() -> Self {
        Self::new()
    }
}

/// Dialect-family specialization of a connection, entered exactly once at
/// negotiation.
pub enum SMBDialectFamilyState {
    NotSet,
    Legacy(LegacyConnectionState),
    Smb2(Smb2ConnectionState),
}

impl SMBDialectFamilyState {
    pub fn smb2(&self) -> Option<&Smb2ConnectionState> {
        match self {
            SMBDialectFamilyState::Smb2(state) => Some(state),
            _ => None,
        }
    }

    pub fn legacy(&self) -> Option<&LegacyConnectionState> {
        match self {
            SMBDialectFamilyState::Legacy(state) => Some(state),
            _ => None,
        }
    }
}

/// The mutable per-connection record, guarded by the connection lock.
pub struct SMBConnectionState<P: SecurityProvider> {
    pub dialect: SMBDialect,
    /// Credential exchange in progress; owned exclusively until a session
    /// establishes or logoff destroys it.
    pub auth_context: Option<P::Context>,
    pub family: SMBDialectFamilyState,
}

/// One transport channel.
///
/// The send queue handle and the last-send timestamp live outside the state
/// lock: the sender task keeps using them across the NotSet-to-family state
/// upgrade, and async store completions enqueue through them at any time.
pub struct SMBConnection<P: SecurityProvider> {
    connection_id: u64,
    client_endpoint: String,
    creation_time: FileTime,
    last_receive_time: Mutex<FileTime>,
    last_send_time: Arc<Mutex<FileTime>>,
    send_queue: SMBSendQueue,
    pending: SMBPendingRequests,
    next_async_id: AtomicU64,
    state: Mutex<SMBConnectionState<P>>,
}

/// Read-only snapshot of one connection, for the administrative surfaces.
#[derive(Debug, Clone)]
pub struct ConnectionInformation {
    pub connection_id: u64,
    pub client_endpoint: String,
    pub dialect: SMBDialect,
    pub creation_time: FileTime,
    pub sessions: Vec<SessionInformation>,
}

impl<P: SecurityProvider> SMBConnection<P> {
    pub fn new(connection_id: u64, client_endpoint: String) -> (Self, SMBSendReceiver) {
        let (send_queue, receiver) = SMBSendQueue::channel();
        let connection = Self {
            connection_id,
            client_endpoint,
            creation_time: FileTime::now(),
            last_receive_time: Mutex::new(FileTime::now()),
            last_send_time: Arc::new(Mutex::new(FileTime::now())),
            send_queue,
            pending: SMBPendingRequests::new(),
            next_async_id: AtomicU64::new(1),
            state: Mutex::new(SMBConnectionState {
                dialect: SMBDialect::NotSet,
                auth_context: None,
                family: SMBDialectFamilyState::NotSet,
            }),
        };
        (connection, receiver)
    }

    pub fn id(&self) -> u64 {
        self.connection_id
    }

    pub fn client_endpoint(&self) -> &str {
        &self.client_endpoint
    }

    pub fn creation_time(&self) -> FileTime {
        self.creation_time
    }

    pub fn send_queue(&self) -> &SMBSendQueue {
        &self.send_queue
    }

    pub fn pending(&self) -> &SMBPendingRequests {
        &self.pending
    }

    /// Async ids label interim responses and their later completions; they
    /// are allocated outside the state lock because completions race it.
    pub fn allocate_async_id(&self) -> u64 {
        self.next_async_id.fetch_add(1, Ordering::Relaxed)
    }

    /// The shared last-send cell handed to the sender task.
    pub fn last_send_time_cell(&self) -> Arc<Mutex<FileTime>> {
        self.last_send_time.clone()
    }

    pub fn last_send_time(&self) -> FileTime {
        match self.last_send_time.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn last_receive_time(&self) -> FileTime {
        match self.last_receive_time.lock() {
            Ok(guard) => *guard,
            Err(poisoned) => *poisoned.into_inner(),
        }
    }

    pub fn update_last_receive_time(&self) {
        let mut guard = match self.last_receive_time.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *guard = FileTime::now();
    }

    /// The connection lock; every session/tree/open table access goes
    /// through this guard.
    pub fn state(&self) -> MutexGuard<'_, SMBConnectionState<P>> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Free all resources used by the active sessions in this connection
    /// and destroy the in-progress authentication context.
    pub fn close(&self, provider: &P) {
        let mut state = self.state();
        if let Some(context) = state.auth_context.as_mut() {
            provider.delete_security_context(context);
        }
        state.auth_context = None;
        match &mut state.family {
            SMBDialectFamilyState::Smb2(smb2) => {
                for session in smb2.session_table.values_mut() {
                    session.close();
                }
                smb2.session_table.clear();
                smb2.preauth_session_table.clear();
            }
            SMBDialectFamilyState::Legacy(legacy) => {
                for session in legacy.session_table.values_mut() {
                    session.close();
                }
                legacy.session_table.clear();
                legacy.preauth_user_ids.clear();
            }
            SMBDialectFamilyState::NotSet => {}
        }
        self.send_queue.shutdown();
        debug!(connection_id = self.connection_id, "connection closed");
    }

    /// Snapshot taken under the connection lock.
    pub fn information(&self) -> ConnectionInformation {
        let state = self.state();
        let sessions = match &state.family {
            SMBDialectFamilyState::Smb2(smb2) => smb2
                .session_table
                .values()
                .map(|session| SessionInformation {
                    session_id: session.id(),
                    user_name: session.security_context().user_name.clone(),
                    machine_name: session.security_context().machine_name.clone(),
                    creation_time: session.creation_time(),
                    open_files: session.open_files_information(),
                })
                .collect(),
            SMBDialectFamilyState::Legacy(legacy) => legacy
                .session_table
                .values()
                .map(|session| SessionInformation {
                    session_id: u64::from(session.user_id()),
                    user_name: session.security_context().user_name.clone(),
                    machine_name: session.security_context().machine_name.clone(),
                    creation_time: session.creation_time(),
                    open_files: session.open_files_information(),
                })
                .collect(),
            SMBDialectFamilyState::NotSet => Vec::new(),
        };
        ConnectionInformation {
            connection_id: self.connection_id,
            client_endpoint: self.client_endpoint.clone(),
            dialect: state.dialect,
            creation_time: self.creation_time,
            sessions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn smb2_session_ids_skip_zero_and_in_use() {
        let mut state = Smb2ConnectionState::new();
        let a = state.allocate_session_id();
        let b = state.allocate_session_id();
        assert_ne!(a, 0);
        assert_ne!(b, 0);
        assert_ne!(a, b);
    }

    #[test]
    fn legacy_ids_skip_reserved_values() {
        let mut state = LegacyConnectionState::new();
        for _ in 0..16 {
            let uid = state.allocate_user_id().unwrap();
            assert_ne!(uid, 0);
            assert_ne!(uid, 0xFFFF);
            state.preauth_user_ids.insert(uid, FileTime::now());
        }
        let tid = state.allocate_tree_id().unwrap();
        assert_ne!(tid, 0);
        assert_ne!(tid, 0xFFFF);
    }
}
