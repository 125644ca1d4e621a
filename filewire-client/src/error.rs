//! Client error types.

use thiserror::Error;

/// Client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not connected")]
    NotConnected,

    #[error("connection closed")]
    ConnectionClosed,

    #[error("operation timed out")]
    Timeout,

    #[error("short write: transport accepted {written} of {expected} bytes")]
    ShortWrite { written: u64, expected: u64 },

    #[error("random source failed: {0}")]
    Entropy(String),
}

impl ClientError {
    /// Returns whether a caller may retry the operation on a new connection.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ClientError::Io(_) | ClientError::Timeout | ClientError::ShortWrite { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable() {
        assert!(ClientError::Timeout.is_retryable());
        assert!(ClientError::ShortWrite {
            written: 1,
            expected: 2
        }
        .is_retryable());
        assert!(ClientError::from(std::io::Error::from(std::io::ErrorKind::BrokenPipe)).is_retryable());

        assert!(!ClientError::NotConnected.is_retryable());
        assert!(!ClientError::ConnectionClosed.is_retryable());
        assert!(!ClientError::Entropy("unavailable".into()).is_retryable());
    }

    #[test]
    fn test_short_write_display() {
        let err = ClientError::ShortWrite {
            written: 1200,
            expected: 4000,
        };
        assert_eq!(
            err.to_string(),
            "short write: transport accepted 1200 of 4000 bytes"
        );
    }
}
