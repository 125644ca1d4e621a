//! Consumers for completed frames.

use filewire_protocol::Frame;
use std::net::SocketAddr;
use tokio::sync::mpsc;

/// Number of payload bytes shown in debug output.
const PREVIEW_LEN: usize = 32;

/// Receives every complete frame read by the server.
///
/// Called from the connection's own task, in arrival order for that
/// connection. Implementations must not block.
pub trait FrameSink: Send + Sync + 'static {
    fn on_frame(&self, peer: SocketAddr, frame: Frame);
}

/// Logs a short hex preview of each payload and drops it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl FrameSink for LogSink {
    fn on_frame(&self, peer: SocketAddr, frame: Frame) {
        let shown = frame.payload.len().min(PREVIEW_LEN);
        tracing::debug!(
            "[{}] Payload preview ({} of {} bytes): {:02x?}",
            peer,
            shown,
            frame.len(),
            &frame.payload[..shown]
        );
    }
}

/// A frame together with the peer that sent it.
#[derive(Debug, Clone)]
pub struct ReceivedFrame {
    pub peer: SocketAddr,
    pub frame: Frame,
}

/// Forwards frames over an unbounded channel.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ReceivedFrame>,
}

impl ChannelSink {
    /// Creates a sink and the receiver that gets its frames.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ReceivedFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl FrameSink for ChannelSink {
    fn on_frame(&self, peer: SocketAddr, frame: Frame) {
        if self.tx.send(ReceivedFrame { peer, frame }).is_err() {
            tracing::debug!("[{}] Frame dropped, receiver is gone", peer);
        }
    }
}
