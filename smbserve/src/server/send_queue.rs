use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;

use smbserve_core::error::SMBError;
use smbserve_core::logging::trace;
use smbserve_core::SMBResult;

use crate::protocol::body::filetime::FileTime;
use crate::protocol::message::SMBFrame;
use crate::transport::SMBFrameWriteStream;

enum OutboundPacket {
    Frame(SMBFrame),
    Shutdown,
}

/// Per-connection ordered outbound queue.
///
/// Any number of producers (dispatch completions, async store callbacks) may
/// enqueue concurrently; exactly one sender drains in FIFO order, so
/// responses leave the connection in the order they were enqueued.
#[derive(Clone)]
pub struct SMBSendQueue {
    tx: mpsc::UnboundedSender<OutboundPacket>,
}

pub struct SMBSendReceiver {
    rx: mpsc::UnboundedReceiver<OutboundPacket>,
}

impl SMBSendQueue {
    pub fn channel() -> (Self, SMBSendReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, SMBSendReceiver { rx })
    }

    pub fn enqueue(&self, frame: SMBFrame) -> SMBResult<()> {
        self.tx
            .send(OutboundPacket::Frame(frame))
            .map_err(|_| SMBError::server_error("send queue closed"))
    }

    /// Wake the sender and let it finish; used at connection teardown.
    pub fn shutdown(&self) {
        let _ = self.tx.send(OutboundPacket::Shutdown);
    }
}

impl SMBSendReceiver {
    pub async fn recv(&mut self) -> Option<SMBFrame> {
        match self.rx.recv().await {
            Some(OutboundPacket::Frame(frame)) => Some(frame),
            Some(OutboundPacket::Shutdown) | None => None,
        }
    }

    /// Non-blocking drain, used by tests driving the engine synchronously.
    pub fn try_recv(&mut self) -> Option<SMBFrame> {
        match self.rx.try_recv() {
            Ok(OutboundPacket::Frame(frame)) => Some(frame),
            _ => None,
        }
    }
}

/// The single per-connection sender: drains the queue in order, writes each
/// frame, and stamps the shared last-send timestamp.
pub async fn run_sender<W: SMBFrameWriteStream>(
    mut receiver: SMBSendReceiver,
    mut writer: W,
    last_send_time: Arc<Mutex<FileTime>>,
) {
    while let Some(frame) = receiver.recv().await {
        if writer.write_frame(frame).await.is_err() {
            break;
        }
        if let Ok(mut last_send) = last_send_time.lock() {
            *last_send = FileTime::now();
        }
        trace!("frame sent");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::body::empty::SMBEchoRequest;
    use crate::protocol::body::SMBBody;
    use crate::protocol::header::{SMBCommandCode, SMBSyncHeader};
    use crate::protocol::message::SMBMessage;

    fn frame(message_id: u64) -> SMBFrame {
        let header = SMBSyncHeader::request(SMBCommandCode::Echo, message_id, 0, 0);
        SMBFrame::single(SMBMessage::new(header, SMBBody::EchoRequest(SMBEchoRequest::default())))
    }

    #[test]
    fn frames_drain_in_enqueue_order() {
        let (queue, mut receiver) = SMBSendQueue::channel();
        queue.enqueue(frame(1)).unwrap();
        queue.enqueue(frame(2)).unwrap();
        queue.enqueue(frame(3)).unwrap();

        for expected in 1..=3u64 {
            match receiver.try_recv().unwrap() {
                SMBFrame::Smb2(chain) => assert_eq!(chain[0].header.message_id, expected),
                SMBFrame::Legacy(_) => panic!("unexpected legacy frame"),
            }
        }
        assert!(receiver.try_recv().is_none());
    }

    #[test]
    fn shutdown_ends_the_stream() {
        let (queue, mut receiver) = SMBSendQueue::channel();
        queue.enqueue(frame(1)).unwrap();
        queue.shutdown();
        assert!(receiver.try_recv().is_some());
        assert!(receiver.try_recv().is_none());
    }
}
