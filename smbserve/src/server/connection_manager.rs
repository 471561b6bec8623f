use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use smbserve_core::logging::debug;

use crate::server::connection::{ConnectionInformation, SMBConnection};
use crate::server::send_queue::SMBSendReceiver;
use crate::util::auth::SecurityProvider;

/// Registry of live connections: add on transport accept, remove on
/// teardown, enumerate for diagnostics.
pub struct SMBConnectionManager<P: SecurityProvider> {
    connections: Mutex<HashMap<u64, Arc<SMBConnection<P>>>>,
    next_connection_id: AtomicU64,
}

impl<P: SecurityProvider> SMBConnectionManager<P> {
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(HashMap::new()),
            next_connection_id: AtomicU64::new(1),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<u64, Arc<SMBConnection<P>>>> {
        match self.connections.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn add_connection(&self, client_endpoint: String) -> (Arc<SMBConnection<P>>, SMBSendReceiver) {
        let connection_id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
        let (connection, receiver) = SMBConnection::new(connection_id, client_endpoint);
        let connection = Arc::new(connection);
        self.lock().insert(connection_id, connection.clone());
        debug!(connection_id, "connection registered");
        (connection, receiver)
    }

    /// Remove and tear down one connection: all of its sessions are closed
    /// before it leaves the registry.
    pub fn release_connection(&self, connection_id: u64, provider: &P) {
        let connection = self.lock().remove(&connection_id);
        if let Some(connection) = connection {
            connection.close(provider);
        }
    }

    pub fn connection_count(&self) -> usize {
        self.lock().len()
    }

    pub fn connections(&self) -> Vec<Arc<SMBConnection<P>>> {
        self.lock().values().cloned().collect()
    }

    pub fn connections_information(&self) -> Vec<ConnectionInformation> {
        self.connections().iter().map(|connection| connection.information()).collect()
    }

    /// Tear down every connection; the registry is empty afterwards.
    pub fn release_all(&self, provider: &P) {
        let connections: Vec<Arc<SMBConnection<P>>> = {
            let mut table = self.lock();
            table.drain().map(|(_, connection)| connection).collect()
        };
        for connection in connections {
            connection.close(provider);
        }
    }
}

impl<P: SecurityProvider> Default for SMBConnectionManager<P> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::auth::challenge::ChallengeAuthProvider;

    #[test]
    fn add_remove_enumerate() {
        let manager: SMBConnectionManager<ChallengeAuthProvider> = SMBConnectionManager::new();
        let provider = ChallengeAuthProvider::new(Vec::new(), true);
        let (first, _rx1) = manager.add_connection("10.0.0.1:50000".into());
        let (_second, _rx2) = manager.add_connection("10.0.0.2:50001".into());
        assert_eq!(manager.connection_count(), 2);

        let info = manager.connections_information();
        assert_eq!(info.len(), 2);

        manager.release_connection(first.id(), &provider);
        assert_eq!(manager.connection_count(), 1);

        manager.release_all(&provider);
        assert_eq!(manager.connection_count(), 0);
    }
}
