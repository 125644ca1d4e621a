//! High-level client API.

use crate::connection::{Connection, ConnectionConfig};
use crate::error::ClientError;
use crate::payload::random_payload;

/// One-shot client: every call opens its own connection and closes it when
/// done.
#[derive(Debug, Clone)]
pub struct Client {
    config: ConnectionConfig,
}

impl Client {
    /// Creates a new client with the given configuration.
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Connects, sends a single frame, and closes the connection.
    pub async fn send_once(&self, payload: &[u8]) -> Result<u64, ClientError> {
        self.send_all(&[payload]).await
    }

    /// Sends each payload as its own frame, in order, over one connection.
    ///
    /// Returns the total number of payload bytes written.
    pub async fn send_all<P: AsRef<[u8]>>(&self, payloads: &[P]) -> Result<u64, ClientError> {
        let mut conn = Connection::new(self.config.clone());
        conn.connect().await?;

        let mut total = 0;
        for payload in payloads {
            total += conn.send_frame(payload.as_ref()).await?;
        }

        conn.close().await?;
        Ok(total)
    }

    /// Generates a random payload of `size` bytes and sends it as one frame.
    ///
    /// Returns the payload that was sent.
    pub async fn send_random(&self, size: usize) -> Result<Vec<u8>, ClientError> {
        let payload = random_payload(size)?;
        self.send_once(&payload).await?;
        Ok(payload)
    }
}
