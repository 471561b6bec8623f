//! Frame-level transport abstractions.
//!
//! The byte-stream framing layer is an external collaborator: it turns a raw
//! socket stream into whole decoded [`SMBFrame`] values and back. The server
//! consumes these two traits only; the in-process channel implementation
//! below backs the tests and the demo binary.

use std::future::Future;

use tokio::sync::mpsc;

use smbserve_core::error::SMBError;
use smbserve_core::SMBResult;

use crate::protocol::message::SMBFrame;

pub trait SMBFrameReadStream: Send {
    /// Receive the next frame; `None` means the peer closed the transport.
    fn next_frame(&mut self) -> impl Future<Output = Option<SMBFrame>> + Send;
}

pub trait SMBFrameWriteStream: Send {
    fn write_frame(&mut self, frame: SMBFrame) -> impl Future<Output = SMBResult<()>> + Send;
}

pub struct ChannelFrameReader {
    rx: mpsc::UnboundedReceiver<SMBFrame>,
}

pub struct ChannelFrameWriter {
    tx: mpsc::UnboundedSender<SMBFrame>,
}

impl SMBFrameReadStream for ChannelFrameReader {
    async fn next_frame(&mut self) -> Option<SMBFrame> {
        self.rx.recv().await
    }
}

impl SMBFrameWriteStream for ChannelFrameWriter {
    async fn write_frame(&mut self, frame: SMBFrame) -> SMBResult<()> {
        self.tx
            .send(frame)
            .map_err(|_| SMBError::server_error("transport closed"))
    }
}

impl ChannelFrameReader {
    /// Non-blocking receive for callers polling outside a task.
    pub fn try_next_frame(&mut self) -> Option<SMBFrame> {
        self.rx.try_recv().ok()
    }
}

/// One duplex endpoint of an in-process frame transport.
pub struct ChannelFrameEndpoint {
    pub reader: ChannelFrameReader,
    pub writer: ChannelFrameWriter,
}

/// An in-process duplex frame transport: two connected endpoints, one for
/// each peer.
pub fn frame_channel_pair() -> (ChannelFrameEndpoint, ChannelFrameEndpoint) {
    let (client_tx, server_rx) = mpsc::unbounded_channel();
    let (server_tx, client_rx) = mpsc::unbounded_channel();
    (
        ChannelFrameEndpoint {
            reader: ChannelFrameReader { rx: client_rx },
            writer: ChannelFrameWriter { tx: client_tx },
        },
        ChannelFrameEndpoint {
            reader: ChannelFrameReader { rx: server_rx },
            writer: ChannelFrameWriter { tx: server_tx },
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::body::empty::SMBEchoRequest;
    use crate::protocol::body::SMBBody;
    use crate::protocol::header::{SMBCommandCode, SMBSyncHeader};
    use crate::protocol::message::SMBMessage;

    #[tokio::test]
    async fn endpoints_are_cross_connected() {
        let (mut client, mut server) = frame_channel_pair();
        let header = SMBSyncHeader::request(SMBCommandCode::Echo, 1, 0, 0);
        let frame = SMBFrame::single(SMBMessage::new(header, SMBBody::EchoRequest(SMBEchoRequest::default())));

        client.writer.write_frame(frame.clone()).await.unwrap();
        let received = server.reader.next_frame().await.unwrap();
        assert_eq!(received, frame);

        server.writer.write_frame(frame.clone()).await.unwrap();
        let received = client.reader.next_frame().await.unwrap();
        assert_eq!(received, frame);
    }
}
