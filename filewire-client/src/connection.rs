//! Connection management.

use crate::error::ClientError;
use filewire_protocol::encode_header;
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

/// Connection configuration.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    /// Server address.
    pub addr: SocketAddr,
    /// Connection timeout.
    pub connect_timeout: Duration,
    /// Upper bound for writing one whole frame (None = wait indefinitely).
    pub write_timeout: Option<Duration>,
}

impl ConnectionConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            connect_timeout: Duration::from_secs(10),
            write_timeout: None,
        }
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionState {
    Disconnected,
    Established,
    Closed,
}

/// A connection to a filewire server.
///
/// Owned by a single task; frames are written in call order.
pub struct Connection {
    config: ConnectionConfig,
    stream: Option<TcpStream>,
    state: ConnectionState,
    frames_sent: u64,
    bytes_sent: u64,
}

impl Connection {
    /// Creates a new connection (not yet connected).
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config,
            stream: None,
            state: ConnectionState::Disconnected,
            frames_sent: 0,
            bytes_sent: 0,
        }
    }

    /// Connects to the server.
    pub async fn connect(&mut self) -> Result<(), ClientError> {
        if self.state == ConnectionState::Closed {
            return Err(ClientError::ConnectionClosed);
        }

        tracing::debug!("Connecting to {}...", self.config.addr);

        let stream = tokio::time::timeout(
            self.config.connect_timeout,
            TcpStream::connect(self.config.addr),
        )
        .await
        .map_err(|_| {
            tracing::debug!("Connection timeout");
            ClientError::Timeout
        })?
        .map_err(|e| {
            tracing::debug!("Connection failed: {}", e);
            ClientError::Io(e)
        })?;

        stream.set_nodelay(true).ok();

        self.stream = Some(stream);
        self.state = ConnectionState::Established;
        tracing::debug!("Connected to {}", self.config.addr);
        Ok(())
    }

    /// Sends one frame and returns the number of payload bytes written.
    ///
    /// On any failure the connection is closed, since the peer may have seen
    /// part of the frame.
    pub async fn send_frame(&mut self, payload: &[u8]) -> Result<u64, ClientError> {
        if self.state == ConnectionState::Closed {
            return Err(ClientError::ConnectionClosed);
        }
        let stream = self.stream.as_mut().ok_or(ClientError::NotConnected)?;

        let result = match self.config.write_timeout {
            Some(limit) => tokio::time::timeout(limit, write_frame(stream, payload))
                .await
                .unwrap_or(Err(ClientError::Timeout)),
            None => write_frame(stream, payload).await,
        };

        match result {
            Ok(n) => {
                self.frames_sent += 1;
                self.bytes_sent += n;
                tracing::info!("Written {} bytes over the network", n);
                Ok(n)
            }
            Err(e) => {
                tracing::debug!("Send to {} failed: {}", self.config.addr, e);
                self.stream = None;
                self.state = ConnectionState::Closed;
                Err(e)
            }
        }
    }

    /// Returns whether the connection is established.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Established
    }

    /// Returns the number of frames sent successfully.
    pub fn frames_sent(&self) -> u64 {
        self.frames_sent
    }

    /// Returns the number of payload bytes sent successfully.
    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Closes the connection, shutting down the write side gracefully.
    pub async fn close(&mut self) -> Result<(), ClientError> {
        self.state = ConnectionState::Closed;
        if let Some(mut stream) = self.stream.take() {
            tracing::debug!("Shutting down writer");
            stream.shutdown().await?;
        }
        Ok(())
    }
}

/// Writes one frame: the 8-byte length header, then the payload.
///
/// Returns only after every byte was accepted by `writer` and flushed.
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<u64, ClientError>
where
    W: AsyncWrite + Unpin,
{
    write_exact(writer, &encode_header(payload.len() as u64)).await?;
    write_exact(writer, payload).await?;
    writer.flush().await?;
    Ok(payload.len() as u64)
}

/// Writes all of `buf`, failing if the writer stops accepting bytes.
async fn write_exact<W>(writer: &mut W, buf: &[u8]) -> Result<(), ClientError>
where
    W: AsyncWrite + Unpin,
{
    let mut written = 0;
    while written < buf.len() {
        match writer.write(&buf[written..]).await {
            Ok(0) => {
                return Err(ClientError::ShortWrite {
                    written: written as u64,
                    expected: buf.len() as u64,
                })
            }
            Ok(n) => written += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(ClientError::Io(e)),
        }
    }
    Ok(())
}
