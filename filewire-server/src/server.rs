//! TCP server implementation.

use crate::error::ServerError;
use crate::sink::FrameSink;
use filewire_protocol::{Decoder, DEFAULT_MAX_FRAME_SIZE, DEFAULT_PORT};
use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use uuid::Uuid;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address to bind to.
    pub bind_addr: SocketAddr,
    /// How long a connection may stay silent before it is closed.
    pub read_timeout: Option<Duration>,
    /// Maximum concurrent connections.
    pub max_connections: usize,
    /// Largest payload a frame may declare.
    pub max_frame_size: u64,
    /// Per-connection socket read buffer size.
    pub read_buffer_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, DEFAULT_PORT)),
            read_timeout: None,
            max_connections: 1000,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            read_buffer_size: crate::config::DEFAULT_READ_BUFFER_SIZE,
        }
    }
}

impl ServerConfig {
    pub fn new(bind_addr: SocketAddr) -> Self {
        Self {
            bind_addr,
            ..Default::default()
        }
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    pub fn with_max_frame_size(mut self, max: u64) -> Self {
        self.max_frame_size = max;
        self
    }

    pub fn with_max_connections(mut self, max: usize) -> Self {
        self.max_connections = max;
        self
    }
}

/// Server statistics.
#[derive(Debug, Default)]
pub struct ServerStats {
    pub connections_total: AtomicU64,
    pub connections_active: AtomicU64,
    pub frames_total: AtomicU64,
    pub bytes_total: AtomicU64,
    pub errors_total: AtomicU64,
    /// Connections that closed partway through a frame.
    pub truncated_total: AtomicU64,
}

/// TCP server for filewire.
///
/// Created in the listening state by [`Server::bind`]; [`Server::run`] accepts
/// until shutdown or a fatal accept error.
pub struct Server {
    config: ServerConfig,
    listener: TcpListener,
    local_addr: SocketAddr,
    sink: Arc<dyn FrameSink>,
    stats: Arc<ServerStats>,
    shutdown: broadcast::Sender<()>,
    shutdown_requested: AtomicBool,
    running: AtomicBool,
}

impl Server {
    /// Binds the listening socket.
    pub async fn bind(config: ServerConfig, sink: Arc<dyn FrameSink>) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(config.bind_addr)
            .await
            .map_err(|source| ServerError::Bind {
                addr: config.bind_addr,
                source,
            })?;
        let local_addr = listener.local_addr()?;
        let (shutdown_tx, _) = broadcast::channel(1);

        Ok(Self {
            config,
            listener,
            local_addr,
            sink,
            stats: Arc::new(ServerStats::default()),
            shutdown: shutdown_tx,
            shutdown_requested: AtomicBool::new(false),
            running: AtomicBool::new(false),
        })
    }

    /// Returns the address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Runs the accept loop.
    pub async fn run(&self) -> Result<(), ServerError> {
        let mut shutdown_rx = self.shutdown.subscribe();
        if self.shutdown_requested.load(Ordering::SeqCst) {
            tracing::info!("Server shut down before accepting");
            return Ok(());
        }
        self.running.store(true, Ordering::SeqCst);
        tracing::info!("Server listening on {}", self.local_addr);

        let result = loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((stream, addr)) => self.dispatch(stream, addr),
                        Err(e) if is_transient_accept_error(&e) => {
                            tracing::warn!("Accept error (continuing): {}", e);
                        }
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                            break Err(ServerError::Accept(e));
                        }
                    }
                }
                _ = shutdown_rx.recv() => {
                    tracing::info!("Server shutting down");
                    break Ok(());
                }
            }
        };

        self.running.store(false, Ordering::SeqCst);
        result
    }

    /// Hands an accepted connection to its own task.
    fn dispatch(&self, stream: TcpStream, addr: SocketAddr) {
        if self.stats.connections_active.load(Ordering::Relaxed)
            >= self.config.max_connections as u64
        {
            tracing::warn!("Connection limit reached, rejecting {}", addr);
            return;
        }

        self.stats.connections_total.fetch_add(1, Ordering::Relaxed);
        self.stats.connections_active.fetch_add(1, Ordering::Relaxed);

        let sink = self.sink.clone();
        let stats = self.stats.clone();
        let config = self.config.clone();
        let mut conn_shutdown = self.shutdown.subscribe();

        tokio::spawn(async move {
            let result =
                Self::handle_connection(stream, addr, sink, &stats, &config, &mut conn_shutdown)
                    .await;

            match result {
                Ok(()) | Err(ServerError::ShuttingDown) => {}
                Err(ServerError::Protocol(e)) if e.is_truncated() => {
                    tracing::warn!("[{}] Connection error: {}", addr, e);
                    stats.errors_total.fetch_add(1, Ordering::Relaxed);
                    stats.truncated_total.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    tracing::warn!("[{}] Connection error: {}", addr, e);
                    stats.errors_total.fetch_add(1, Ordering::Relaxed);
                }
            }

            stats.connections_active.fetch_sub(1, Ordering::Relaxed);
            tracing::info!("Client disconnected: {}", addr);
        });
    }

    /// Reads frames from one connection until it closes.
    async fn handle_connection(
        mut stream: TcpStream,
        addr: SocketAddr,
        sink: Arc<dyn FrameSink>,
        stats: &ServerStats,
        config: &ServerConfig,
        shutdown: &mut broadcast::Receiver<()>,
    ) -> Result<(), ServerError> {
        let conn_id = Uuid::new_v4();
        tracing::info!("Client connected: {} (conn={})", addr, conn_id);

        let mut decoder = Decoder::with_max_frame_size(config.max_frame_size);
        let mut buf = vec![0u8; config.read_buffer_size];

        loop {
            let n = tokio::select! {
                result = read_chunk(&mut stream, &mut buf, config.read_timeout) => result?,
                _ = shutdown.recv() => {
                    tracing::debug!("[{}] Shutdown signal received", addr);
                    return Err(ServerError::ShuttingDown);
                }
            };

            if n == 0 {
                tracing::debug!("[{}] Connection closed by client", addr);
                decoder.finish()?;
                return Ok(());
            }

            tracing::trace!("[{}] Read {} bytes", addr, n);
            decoder.extend(&buf[..n])?;

            while let Some(frame) = decoder.decode_frame()? {
                stats.frames_total.fetch_add(1, Ordering::Relaxed);
                stats.bytes_total.fetch_add(frame.len(), Ordering::Relaxed);
                tracing::info!("[{}] Received {} bytes over the network", addr, frame.len());
                sink.on_frame(addr, frame);
            }
        }
    }

    /// Initiates server shutdown.
    ///
    /// Takes effect even if [`Server::run`] has not started yet.
    pub fn shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
        let _ = self.shutdown.send(());
    }

    /// Returns whether the accept loop is running.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Returns server statistics.
    pub fn stats(&self) -> &ServerStats {
        &self.stats
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }
}

/// Reads the next chunk, bounded by the idle timeout if one is set.
async fn read_chunk(
    stream: &mut TcpStream,
    buf: &mut [u8],
    timeout: Option<Duration>,
) -> Result<usize, ServerError> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, stream.read(buf))
            .await
            .map_err(|_| ServerError::ReadTimeout(limit))?
            .map_err(ServerError::Io),
        None => Ok(stream.read(buf).await?),
    }
}

/// Accept errors that concern a single pending connection, not the listener.
fn is_transient_accept_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}
