mod connection;
mod connection_manager;
mod open;
mod pending;
mod send_queue;
#[allow(clippy::module_inception)]
mod server;
mod session;
pub mod share;
mod smb1;
mod smb2;

pub use connection::{
    ConnectionInformation, LegacyConnectionState, SMBConnection, SMBConnectionState, SMBDialectFamilyState,
    SMBPreauthSession, Smb2ConnectionState,
};
pub use connection_manager::SMBConnectionManager;
pub use open::{OpenFileInformation, OpenFileObject, OpenSearch};
pub use pending::{legacy_cancel_key, PendingOperation, SMBPendingRequests};
pub use send_queue::{run_sender, SMBSendQueue, SMBSendReceiver};
pub use server::{SMBServer, SMBServerBuilder};
pub use session::{LegacySMBSession, SMBSession, SMBTreeConnect, SecurityContext, SessionInformation};

/// What the connection task should do after a frame was dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDisposition {
    Continue,
    /// A sequencing violation on the modern family: no response is legal,
    /// the transport must be closed.
    Disconnect,
}
