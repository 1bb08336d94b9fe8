//! Single-connection TCP transport.
//!
//! The producer binds and accepts exactly one consumer; the consumer dials.
//! Each side owns one direction only: the producer holds a [`FrameWriter`],
//! the consumer a [`FrameReader`]. There is no reconnection. Any I/O error
//! is surfaced as a classified [`StreamError::Connection`].

mod line_codec;

pub use line_codec::{Arrival, WireLineCodec};

use futures::{SinkExt, Stream};
use pin_project_lite::pin_project;
use std::net::SocketAddr;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::Instant;
use tokio_util::codec::{FramedRead, FramedWrite};
use tracing::{debug, info};

use crate::{ConnectionErrorKind, Result, StreamError};

/// Default maximum accepted line length (16 MiB)
pub const DEFAULT_MAX_LINE_BYTES: usize = 16 * 1024 * 1024;

/// Bound listening socket on the producer side.
pub struct Listener {
    inner: TcpListener,
    local_addr: SocketAddr,
}

impl Listener {
    /// Bind to `host:port`. Port 0 picks a free port.
    pub async fn bind(host: &str, port: u16) -> Result<Self> {
        let inner = TcpListener::bind((host, port))
            .await
            .map_err(|e| StreamError::connection(format!("bind {}:{}", host, port), e))?;
        let local_addr = inner.local_addr().map_err(|e| StreamError::connection("bind", e))?;
        info!("Listening for a consumer on {}", local_addr);
        Ok(Self { inner, local_addr })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Block until exactly one consumer connects.
    ///
    /// Consumes the listener, so no second connection is ever accepted.
    pub async fn accept(self) -> Result<FrameWriter> {
        let (stream, peer) =
            self.inner.accept().await.map_err(|e| StreamError::connection("accept", e))?;
        info!("Consumer connected from {}", peer);
        FrameWriter::new(stream, peer)
    }
}

/// Bind and wait for the single consumer.
pub async fn listen(host: &str, port: u16) -> Result<FrameWriter> {
    Listener::bind(host, port).await?.accept().await
}

/// Write half of the connection, owned by the producer loop.
pub struct FrameWriter {
    sink: FramedWrite<TcpStream, WireLineCodec>,
    peer: SocketAddr,
    bytes_sent: u64,
}

impl FrameWriter {
    fn new(stream: TcpStream, peer: SocketAddr) -> Result<Self> {
        stream.set_nodelay(true).map_err(|e| StreamError::connection("configure socket", e))?;
        let sink = FramedWrite::new(stream, WireLineCodec::new(usize::MAX));
        Ok(Self { sink, peer, bytes_sent: 0 })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    pub fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// Write one line and flush it.
    pub async fn send_line(&mut self, line: String) -> Result<()> {
        let len = line.strip_suffix('\n').unwrap_or(&line).len() as u64 + 1;
        self.sink.send(line).await.map_err(|e| StreamError::connection("write frame", e))?;
        self.bytes_sent += len;
        Ok(())
    }

    /// Flush and shut down the write side.
    pub async fn close(mut self) -> Result<()> {
        debug!("Closing connection to {}", self.peer);
        self.sink.close().await.map_err(|e| StreamError::connection("close", e))
    }
}

/// Connect to the producer once.
pub async fn dial(host: &str, port: u16, max_line_bytes: usize) -> Result<FrameReader> {
    let stream = TcpStream::connect((host, port))
        .await
        .map_err(|e| StreamError::connection(format!("connect {}:{}", host, port), e))?;
    FrameReader::new(stream, max_line_bytes)
}

/// Connect to the producer, retrying while it is not listening yet.
///
/// Retries every `retry_every` until `timeout` has elapsed.
pub async fn dial_with_retry(
    host: &str,
    port: u16,
    max_line_bytes: usize,
    timeout: Duration,
    retry_every: Duration,
) -> Result<FrameReader> {
    let deadline = Instant::now() + timeout;
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match dial(host, port, max_line_bytes).await {
            Ok(reader) => return Ok(reader),
            Err(e) if Instant::now() + retry_every < deadline && is_not_listening(&e) => {
                if attempts == 1 {
                    info!("Waiting for producer on {}:{}...", host, port);
                } else {
                    debug!("Dial attempt {} failed: {}", attempts, e);
                }
                tokio::time::sleep(retry_every).await;
            }
            Err(e) => return Err(e),
        }
    }
}

fn is_not_listening(error: &StreamError) -> bool {
    matches!(
        error,
        StreamError::Connection { kind: ConnectionErrorKind::Other, source: Some(io), .. }
            if matches!(io.kind(), std::io::ErrorKind::ConnectionRefused)
    )
}

pin_project! {
    /// Read half of the connection, owned by the ingestion engine.
    ///
    /// Yields one [`Arrival`] per delimiter observed, in arrival order. Partial
    /// reads are buffered until their delimiter arrives. The stream ends when
    /// the producer closes the connection, or after yielding a connection error.
    pub struct FrameReader {
        #[pin]
        lines: FramedRead<TcpStream, WireLineCodec>,
        peer: SocketAddr,
    }
}

impl FrameReader {
    fn new(stream: TcpStream, max_line_bytes: usize) -> Result<Self> {
        let peer = stream.peer_addr().map_err(|e| StreamError::connection("connect", e))?;
        info!("Connected to producer at {}", peer);
        let lines = FramedRead::new(stream, WireLineCodec::new(max_line_bytes));
        Ok(Self { lines, peer })
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }
}

impl Stream for FrameReader {
    type Item = Result<Arrival>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.project();
        match this.lines.poll_next(cx) {
            Poll::Ready(Some(Ok(arrival))) => Poll::Ready(Some(Ok(arrival))),
            Poll::Ready(Some(Err(e))) => {
                Poll::Ready(Some(Err(StreamError::connection("read frame line", e))))
            }
            Poll::Ready(None) => Poll::Ready(None),
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn lines_flow_from_writer_to_reader() {
        let listener = Listener::bind("127.0.0.1", 0).await.unwrap();
        let port = listener.local_addr().port();

        let accept = tokio::spawn(listener.accept());
        let mut reader = dial("127.0.0.1", port, 1024).await.unwrap();
        let mut writer = accept.await.unwrap().unwrap();

        writer.send_line("first".to_string()).await.unwrap();
        writer.send_line("second\n".to_string()).await.unwrap();
        assert_eq!(writer.bytes_sent(), 13);
        writer.close().await.unwrap();

        assert_eq!(reader.next().await.unwrap().unwrap(), Ok("first".to_string()));
        assert_eq!(reader.next().await.unwrap().unwrap(), Ok("second".to_string()));
        assert!(reader.next().await.is_none());
    }

    #[tokio::test]
    async fn split_writes_are_reassembled() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let producer = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            stream.write_all(b"{\"frame_id\":").await.unwrap();
            stream.flush().await.unwrap();
            tokio::time::sleep(Duration::from_millis(20)).await;
            stream.write_all(b"7}\n").await.unwrap();
        });

        let mut reader = dial("127.0.0.1", port, 1024).await.unwrap();
        assert_eq!(reader.next().await.unwrap().unwrap(), Ok("{\"frame_id\":7}".to_string()));
        producer.await.unwrap();
    }

    #[tokio::test]
    async fn dial_without_listener_is_a_connection_error() {
        // Bind then drop to find a port nobody listens on
        let port = {
            let probe = TcpListener::bind("127.0.0.1:0").await.unwrap();
            probe.local_addr().unwrap().port()
        };

        let err = match dial("127.0.0.1", port, 1024).await {
            Ok(_) => panic!("dial should fail without a listener"),
            Err(e) => e,
        };
        assert!(err.is_fatal());
        assert!(is_not_listening(&err));
    }

    #[tokio::test]
    async fn dial_with_retry_waits_for_late_listener() {
        let port = {
            let probe = TcpListener::bind("127.0.0.1:0").await.unwrap();
            probe.local_addr().unwrap().port()
        };

        let late = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(150)).await;
            listen("127.0.0.1", port).await
        });

        let reader = dial_with_retry(
            "127.0.0.1",
            port,
            1024,
            Duration::from_secs(5),
            Duration::from_millis(25),
        )
        .await
        .unwrap();
        assert_eq!(reader.peer_addr().port(), port);

        let writer = late.await.unwrap().unwrap();
        writer.close().await.unwrap();
    }

    #[tokio::test]
    async fn writing_to_a_vanished_consumer_fails() {
        let listener = Listener::bind("127.0.0.1", 0).await.unwrap();
        let port = listener.local_addr().port();

        let accept = tokio::spawn(listener.accept());
        let reader = dial("127.0.0.1", port, 1024).await.unwrap();
        let mut writer = accept.await.unwrap().unwrap();
        drop(reader);

        let line = "x".repeat(64 * 1024);
        let mut failure = None;
        for _ in 0..200 {
            if let Err(e) = writer.send_line(line.clone()).await {
                failure = Some(e);
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        let failure = failure.expect("writes to a closed peer must eventually fail");
        assert!(failure.connection_kind().is_some());
    }
}
