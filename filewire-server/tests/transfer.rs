//! End-to-end transfer tests: real listener, real sockets.

use filewire_client::{write_frame, Client, ConnectionConfig};
use filewire_protocol::encode_header;
use filewire_server::{ChannelSink, ReceivedFrame, Server, ServerConfig};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc::UnboundedReceiver;

const WAIT: Duration = Duration::from_secs(5);

struct TestServer {
    server: Arc<Server>,
    frames: UnboundedReceiver<ReceivedFrame>,
}

impl TestServer {
    async fn start(config: ServerConfig) -> Self {
        let (sink, frames) = ChannelSink::new();
        let server = Arc::new(Server::bind(config, Arc::new(sink)).await.unwrap());

        let runner = server.clone();
        tokio::spawn(async move {
            let _ = runner.run().await;
        });

        Self { server, frames }
    }

    async fn start_default() -> Self {
        Self::start(ServerConfig::new("127.0.0.1:0".parse().unwrap())).await
    }

    fn addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    fn client(&self) -> Client {
        Client::new(ConnectionConfig::new(self.addr()))
    }

    async fn next_frame(&mut self) -> ReceivedFrame {
        tokio::time::timeout(WAIT, self.frames.recv())
            .await
            .expect("timed out waiting for a frame")
            .expect("sink channel closed")
    }

    /// Waits until the server has counted at least `n` connection errors.
    async fn wait_for_errors(&self, n: u64) {
        tokio::time::timeout(WAIT, async {
            while self.server.stats().errors_total.load(Ordering::Relaxed) < n {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("timed out waiting for a connection error");
    }

    /// Waits until exactly `n` connections are being served.
    async fn wait_for_active(&self, n: u64) {
        tokio::time::timeout(WAIT, async {
            while self.server.stats().connections_active.load(Ordering::Relaxed) != n {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("timed out waiting for active connections");
    }
}

/// Reads until the peer closes; resets count as closed.
async fn read_until_closed(stream: &mut TcpStream) {
    let mut buf = [0u8; 1];
    let n = tokio::time::timeout(WAIT, stream.read(&mut buf))
        .await
        .expect("peer did not close the connection")
        .unwrap_or(0);
    assert_eq!(n, 0);
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.server.shutdown();
    }
}

#[tokio::test]
async fn test_round_trip() {
    let mut server = TestServer::start_default().await;
    let client = server.client();

    let payload: Vec<u8> = (0..=255u8).cycle().take(10_000).collect();
    let sent = client.send_once(&payload).await.unwrap();
    assert_eq!(sent, 10_000);

    let received = server.next_frame().await;
    assert_eq!(received.frame.len(), 10_000);
    assert_eq!(received.frame.payload.as_ref(), payload.as_slice());
}

#[tokio::test]
async fn test_round_trip_empty_payload() {
    let mut server = TestServer::start_default().await;

    let sent = server.client().send_once(&[]).await.unwrap();
    assert_eq!(sent, 0);

    let received = server.next_frame().await;
    assert!(received.frame.is_empty());
}

#[tokio::test]
async fn test_random_4000_byte_transfer() {
    let mut server = TestServer::start_default().await;

    let payload = server.client().send_random(4000).await.unwrap();
    assert_eq!(payload.len(), 4000);

    let received = server.next_frame().await;
    assert_eq!(received.frame.len(), 4000);
    assert_eq!(received.frame.payload.as_ref(), payload.as_slice());

    let stats = server.server.stats();
    assert_eq!(stats.frames_total.load(Ordering::Relaxed), 1);
    assert_eq!(stats.bytes_total.load(Ordering::Relaxed), 4000);
}

#[tokio::test]
async fn test_multiple_frames_per_connection() {
    let mut server = TestServer::start_default().await;

    let payloads = [vec![1u8; 10], Vec::new(), vec![3u8; 500]];
    let total = server.client().send_all(&payloads).await.unwrap();
    assert_eq!(total, 510);

    for expected in &payloads {
        let received = server.next_frame().await;
        assert_eq!(received.frame.payload.as_ref(), expected.as_slice());
    }
}

#[tokio::test]
async fn test_truncated_frame_is_not_delivered() {
    let mut server = TestServer::start_default().await;

    let mut stream = TcpStream::connect(server.addr()).await.unwrap();
    stream.write_all(&encode_header(100)).await.unwrap();
    stream.write_all(&[0xEE; 40]).await.unwrap();
    stream.shutdown().await.unwrap();

    server.wait_for_errors(1).await;
    assert!(server.frames.try_recv().is_err());
    assert_eq!(server.server.stats().frames_total.load(Ordering::Relaxed), 0);
    assert_eq!(server.server.stats().truncated_total.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn test_truncation_after_complete_frames() {
    let mut server = TestServer::start_default().await;

    let mut stream = TcpStream::connect(server.addr()).await.unwrap();
    write_frame(&mut stream, b"complete").await.unwrap();
    stream.write_all(&encode_header(64)).await.unwrap();
    stream.write_all(b"partial").await.unwrap();
    stream.shutdown().await.unwrap();

    let received = server.next_frame().await;
    assert_eq!(received.frame.payload.as_ref(), b"complete");

    server.wait_for_errors(1).await;
    assert!(server.frames.try_recv().is_err());
    assert_eq!(server.server.stats().truncated_total.load(Ordering::Relaxed), 1);
}

#[tokio::test]
async fn test_clean_close_is_not_an_error() {
    let mut server = TestServer::start_default().await;

    server.client().send_once(b"bye").await.unwrap();
    server.next_frame().await;

    tokio::time::timeout(WAIT, async {
        while server.server.stats().connections_active.load(Ordering::Relaxed) > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .unwrap();
    assert_eq!(server.server.stats().errors_total.load(Ordering::Relaxed), 0);
}

#[tokio::test]
async fn test_header_is_awaited_before_payload() {
    let mut server = TestServer::start_default().await;

    let header = encode_header(6);
    let mut stream = TcpStream::connect(server.addr()).await.unwrap();

    stream.write_all(&header[..3]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(server.frames.try_recv().is_err());

    stream.write_all(&header[3..]).await.unwrap();
    stream.write_all(b"pay").await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(server.frames.try_recv().is_err());

    stream.write_all(b"load").await.unwrap();
    let received = server.next_frame().await;
    assert_eq!(received.frame.payload.as_ref(), b"payloa");

    // The trailing "d" is the first byte of the next header, not payload.
    stream.write_all(&[0u8; 7]).await.unwrap();
    stream.shutdown().await.unwrap();
    server.wait_for_errors(1).await;
    assert!(server.frames.try_recv().is_err());
}

#[tokio::test]
async fn test_connection_isolation() {
    let mut server = TestServer::start_default().await;
    let addr = server.addr();

    let mut tasks = Vec::new();
    for (fill, sizes) in [(0xAAu8, vec![300usize, 7, 2048]), (0xBB, vec![1, 4096, 0, 64])] {
        tasks.push(tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            let local = stream.local_addr().unwrap();
            for size in &sizes {
                write_frame(&mut stream, &vec![fill; *size]).await.unwrap();
                tokio::task::yield_now().await;
            }
            stream.shutdown().await.unwrap();
            (local, fill, sizes)
        }));
    }

    let mut expected = HashMap::new();
    for task in tasks {
        let (local, fill, sizes) = task.await.unwrap();
        expected.insert(local, (fill, sizes));
    }

    let total: usize = expected.values().map(|(_, sizes)| sizes.len()).sum();
    let mut seen: HashMap<SocketAddr, Vec<usize>> = HashMap::new();
    for _ in 0..total {
        let received = server.next_frame().await;
        let fill = expected[&received.peer].0;
        assert!(received.frame.payload.iter().all(|b| *b == fill));
        seen.entry(received.peer)
            .or_default()
            .push(received.frame.payload.len());
    }

    for (peer, (_, sizes)) in expected {
        assert_eq!(seen.remove(&peer).unwrap_or_default(), sizes);
    }
}

#[tokio::test]
async fn test_oversized_frame_is_rejected() {
    let config = ServerConfig::new("127.0.0.1:0".parse().unwrap()).with_max_frame_size(1024);
    let mut server = TestServer::start(config).await;

    let mut stream = TcpStream::connect(server.addr()).await.unwrap();
    stream.write_all(&encode_header(2048)).await.unwrap();

    server.wait_for_errors(1).await;
    assert!(server.frames.try_recv().is_err());
    assert_eq!(server.server.stats().truncated_total.load(Ordering::Relaxed), 0);

    read_until_closed(&mut stream).await;
}

#[tokio::test]
async fn test_idle_connection_times_out() {
    let config = ServerConfig::new("127.0.0.1:0".parse().unwrap())
        .with_read_timeout(Duration::from_millis(100));
    let server = TestServer::start(config).await;

    let mut stream = TcpStream::connect(server.addr()).await.unwrap();
    stream.write_all(&encode_header(10)).await.unwrap();

    read_until_closed(&mut stream).await;
    server.wait_for_errors(1).await;
}

#[tokio::test]
async fn test_failed_connection_does_not_affect_others() {
    let mut server = TestServer::start_default().await;

    let mut bad = TcpStream::connect(server.addr()).await.unwrap();
    bad.write_all(&encode_header(10)).await.unwrap();
    bad.write_all(b"abc").await.unwrap();
    bad.shutdown().await.unwrap();
    server.wait_for_errors(1).await;

    server.client().send_once(b"still alive").await.unwrap();
    let received = server.next_frame().await;
    assert_eq!(received.frame.payload.as_ref(), b"still alive");
    assert!(server.server.is_running());
}

#[tokio::test]
async fn test_connections_over_limit_are_dropped() {
    let config = ServerConfig::new("127.0.0.1:0".parse().unwrap()).with_max_connections(1);
    let mut server = TestServer::start(config).await;

    let mut first = TcpStream::connect(server.addr()).await.unwrap();
    write_frame(&mut first, b"first").await.unwrap();
    assert_eq!(server.next_frame().await.frame.payload.as_ref(), b"first");

    let mut second = TcpStream::connect(server.addr()).await.unwrap();
    let _ = write_frame(&mut second, b"second").await;
    read_until_closed(&mut second).await;

    assert!(server.frames.try_recv().is_err());
    let stats = server.server.stats();
    assert_eq!(stats.connections_total.load(Ordering::Relaxed), 1);
    assert_eq!(stats.connections_active.load(Ordering::Relaxed), 1);
    drop(first);
}

#[tokio::test]
async fn test_shutdown_closes_open_connections() {
    let mut server = TestServer::start_default().await;

    let mut stream = TcpStream::connect(server.addr()).await.unwrap();
    stream.write_all(&encode_header(100)).await.unwrap();
    stream.write_all(&[0x11; 50]).await.unwrap();
    server.wait_for_active(1).await;

    server.server.shutdown();

    read_until_closed(&mut stream).await;
    server.wait_for_active(0).await;

    let stats = server.server.stats();
    assert_eq!(stats.errors_total.load(Ordering::Relaxed), 0);
    assert_eq!(stats.truncated_total.load(Ordering::Relaxed), 0);
    assert!(server.frames.try_recv().is_err());
}
