//! Server error types.

use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

/// Server errors.
///
/// `Bind` and `Accept` end the listener. Everything else is local to one
/// connection.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("accept failed: {0}")]
    Accept(#[source] std::io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(#[from] filewire_protocol::ProtocolError),

    #[error("no data received for {0:?}")]
    ReadTimeout(Duration),

    #[error("server shutting down")]
    ShuttingDown,
}

impl ServerError {
    /// Returns whether this error stops the listener itself.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ServerError::Bind { .. } | ServerError::Accept(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use filewire_protocol::ProtocolError;
    use std::io;

    #[test]
    fn test_fatal_classification() {
        let bind = ServerError::Bind {
            addr: "127.0.0.1:3000".parse().unwrap(),
            source: io::Error::new(io::ErrorKind::AddrInUse, "address in use"),
        };
        assert!(bind.is_fatal());
        assert!(bind.to_string().contains("127.0.0.1:3000"));

        let accept = ServerError::Accept(io::Error::new(io::ErrorKind::Other, "too many files"));
        assert!(accept.is_fatal());

        let truncated = ServerError::from(ProtocolError::TruncatedFrame {
            expected: 10,
            received: 3,
        });
        assert!(!truncated.is_fatal());
        assert!(!ServerError::ReadTimeout(Duration::from_secs(1)).is_fatal());
        assert!(!ServerError::ShuttingDown.is_fatal());
    }
}
