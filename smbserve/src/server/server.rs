use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use uuid::Uuid;

use smbserve_core::error::SMBError;
use smbserve_core::logging::{debug, info};
use smbserve_core::SMBResult;

use crate::protocol::body::capabilities::Capabilities;
use crate::protocol::body::filetime::FileTime;
use crate::protocol::message::SMBFrame;
use crate::server::connection::{ConnectionInformation, SMBConnection};
use crate::server::connection_manager::SMBConnectionManager;
use crate::server::send_queue::{run_sender, SMBSendReceiver};
use crate::server::share::SharedResource;
use crate::server::{smb1, smb2, FrameDisposition};
use crate::transport::{SMBFrameReadStream, SMBFrameWriteStream};
use crate::util::auth::SecurityProvider;

/// The protocol endpoint in the responder role: shares, the security
/// provider seam, and the registry of live connections.
pub struct SMBServer<P: SecurityProvider> {
    guid: Uuid,
    start_time: FileTime,
    security_provider: Arc<P>,
    share_list: RwLock<HashMap<String, Arc<dyn SharedResource>>>,
    connection_manager: SMBConnectionManager<P>,
    enable_smb3: bool,
    require_signing: bool,
    max_transact_size: u32,
    max_read_size: u32,
    max_write_size: u32,
}

pub struct SMBServerBuilder<P: SecurityProvider> {
    guid: Uuid,
    security_provider: Option<Arc<P>>,
    share_list: HashMap<String, Arc<dyn SharedResource>>,
    enable_smb3: bool,
    require_signing: bool,
    max_transact_size: u32,
    max_read_size: u32,
    max_write_size: u32,
}

impl<P: SecurityProvider> Default for SMBServerBuilder<P> {
    fn default() -> Self {
        Self {
            guid: Uuid::new_v4(),
            security_provider: None,
            share_list: HashMap::new(),
            enable_smb3: false,
            require_signing: false,
            max_transact_size: 1048576,
            max_read_size: 1048576,
            max_write_size: 1048576,
        }
    }
}

/// Share names resolve case-insensitively.
fn share_key(name: &str) -> String {
    name.to_ascii_uppercase()
}

impl<P: SecurityProvider> SMBServerBuilder<P> {
    pub fn security_provider(mut self, provider: P) -> Self {
        self.security_provider = Some(Arc::new(provider));
        self
    }

    pub fn guid(mut self, guid: Uuid) -> Self {
        self.guid = guid;
        self
    }

    pub fn add_share<S: SharedResource + 'static>(mut self, share: S) -> Self {
        self.share_list.insert(share_key(share.name()), Arc::new(share));
        self
    }

    pub fn enable_smb3(mut self, enable_smb3: bool) -> Self {
        self.enable_smb3 = enable_smb3;
        self
    }

    pub fn require_signing(mut self, require_signing: bool) -> Self {
        self.require_signing = require_signing;
        self
    }

    pub fn max_transact_size(mut self, max_transact_size: u32) -> Self {
        self.max_transact_size = max_transact_size;
        self
    }

    pub fn max_read_size(mut self, max_read_size: u32) -> Self {
        self.max_read_size = max_read_size;
        self
    }

    pub fn max_write_size(mut self, max_write_size: u32) -> Self {
        self.max_write_size = max_write_size;
        self
    }

    pub fn build(self) -> SMBResult<SMBServer<P>> {
        let security_provider = self
            .security_provider
            .ok_or_else(|| SMBError::precondition_failed("a security provider is required"))?;
        Ok(SMBServer {
            guid: self.guid,
            start_time: FileTime::now(),
            security_provider,
            share_list: RwLock::new(self.share_list),
            connection_manager: SMBConnectionManager::new(),
            enable_smb3: self.enable_smb3,
            require_signing: self.require_signing,
            max_transact_size: self.max_transact_size,
            max_read_size: self.max_read_size,
            max_write_size: self.max_write_size,
        })
    }
}

impl<P: SecurityProvider> SMBServer<P> {
    pub fn builder() -> SMBServerBuilder<P> {
        SMBServerBuilder::default()
    }

    pub fn guid(&self) -> Uuid {
        self.guid
    }

    pub fn start_time(&self) -> FileTime {
        self.start_time
    }

    pub fn security_provider(&self) -> &Arc<P> {
        &self.security_provider
    }

    pub fn enable_smb3(&self) -> bool {
        self.enable_smb3
    }

    pub fn require_signing(&self) -> bool {
        self.require_signing
    }

    pub fn max_transact_size(&self) -> u32 {
        self.max_transact_size
    }

    pub fn max_read_size(&self) -> u32 {
        self.max_read_size
    }

    pub fn max_write_size(&self) -> u32 {
        self.max_write_size
    }

    pub fn capabilities(&self) -> Capabilities {
        Capabilities::LARGE_MTU
    }

    fn shares(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Arc<dyn SharedResource>>> {
        match self.share_list.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn add_share<S: SharedResource + 'static>(&self, share: S) {
        let mut shares = match self.share_list.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        shares.insert(share_key(share.name()), Arc::new(share));
    }

    pub fn remove_share(&self, name: &str) {
        let mut shares = match self.share_list.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        shares.remove(&share_key(name));
    }

    pub fn share_named(&self, name: &str) -> Option<Arc<dyn SharedResource>> {
        self.shares().get(&share_key(name)).cloned()
    }

    pub fn share_names(&self) -> Vec<String> {
        self.shares().values().map(|share| share.name().to_string()).collect()
    }

    /// Register a fresh connection for a transport accept. The returned
    /// receiver is the connection's ordered response stream, to be drained
    /// by exactly one sender.
    pub fn accept_connection<S: Into<String>>(&self, client_endpoint: S) -> (Arc<SMBConnection<P>>, SMBSendReceiver) {
        self.connection_manager.add_connection(client_endpoint.into())
    }

    /// Tear one connection down: its sessions (and their trees, opens, and
    /// searches) are released before it leaves the registry.
    pub fn remove_connection(&self, connection: &Arc<SMBConnection<P>>) {
        self.connection_manager
            .release_connection(connection.id(), &self.security_provider);
    }

    pub fn connection_count(&self) -> usize {
        self.connection_manager.connection_count()
    }

    /// Administrative snapshot of every live connection with its sessions
    /// and open files.
    pub fn connections_information(&self) -> Vec<ConnectionInformation> {
        self.connection_manager.connections_information()
    }

    /// Tear down every connection; used at server stop.
    pub fn shutdown(&self) {
        info!("server shutting down");
        self.connection_manager.release_all(&self.security_provider);
    }

    /// Dispatch one received frame against the connection's state machine.
    pub fn process_frame(&self, connection: &Arc<SMBConnection<P>>, frame: SMBFrame) -> FrameDisposition {
        connection.update_last_receive_time();
        match frame {
            SMBFrame::Smb2(chain) => smb2::process_request_chain(self, connection, chain),
            SMBFrame::Legacy(message) => smb1::process_message(self, connection, message),
        }
    }

    /// Drive one connection to completion: a receive loop concurrent with a
    /// single sender task draining the ordered outbound queue.
    pub async fn serve_connection<R, W>(&self, mut reader: R, writer: W, client_endpoint: String)
    where
        R: SMBFrameReadStream,
        W: SMBFrameWriteStream + 'static,
    {
        let (connection, receiver) = self.accept_connection(client_endpoint);
        let sender = tokio::spawn(run_sender(receiver, writer, connection.last_send_time_cell()));

        while let Some(frame) = reader.next_frame().await {
            match self.process_frame(&connection, frame) {
                FrameDisposition::Continue => {}
                FrameDisposition::Disconnect => {
                    debug!(connection_id = connection.id(), "disconnecting by protocol rule");
                    break;
                }
            }
        }

        self.remove_connection(&connection);
        let _ = sender.await;
    }
}
