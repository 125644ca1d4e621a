//! Protocol error types.

use thiserror::Error;

/// Protocol-level errors that can occur while framing or deframing.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: u64, max: u64 },

    #[error("truncated header: connection closed after {received} of 8 header bytes")]
    TruncatedHeader { received: usize },

    #[error("truncated frame: expected {expected} payload bytes, received {received}")]
    TruncatedFrame { expected: u64, received: u64 },

    #[error("decoder is closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProtocolError {
    /// Returns whether the peer went away in the middle of a frame.
    pub fn is_truncated(&self) -> bool {
        matches!(
            self,
            ProtocolError::TruncatedHeader { .. } | ProtocolError::TruncatedFrame { .. }
        )
    }
}
