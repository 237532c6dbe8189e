//! Connection Handler Module
//!
//! This module handles individual client connections. Each client gets its
//! own handler task that runs in a loop, reading bytes and writing replies.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. ConnectionHandler spawned
//!        │
//!        ▼
//! 3. ┌──────────────────────────────────┐
//!    │      Main Loop                   │
//!    │                                  │
//!    │  ┌─────────────────────────────┐ │
//!    │  │ Execute every complete      │ │
//!    │  │ frame already buffered      │ │
//!    │  └───────────┬─────────────────┘ │
//!    │              ▼                   │
//!    │  ┌─────────────────────────────┐ │
//!    │  │ Write + flush the replies   │ │
//!    │  └───────────┬─────────────────┘ │
//!    │              ▼                   │
//!    │  ┌─────────────────────────────┐ │
//!    │  │ Read more bytes             │ │
//!    │  └───────────┬─────────────────┘ │
//!    │              ▼                   │
//!    │         [Loop back]              │
//!    └──────────────────────────────────┘
//!        │
//!        ▼
//! 4. EOF, malformed frame, or I/O error
//!        │
//!        ▼
//! 5. Handler task ends
//! ```
//!
//! ## Buffer Management
//!
//! TCP is a stream protocol: a read may return part of a frame, or several
//! frames at once. Incoming bytes accumulate in a `BytesMut` and are only
//! consumed once a whole frame has been decoded. The connection's
//! `RespParser` remembers how long the pending frame must be, so a large
//! value arriving over many reads is decoded once rather than per read.
//! A partial frame left in the buffer at EOF is discarded without error.
//!
//! The keyspace lock is taken inside `CommandHandler::process`, which never
//! awaits, so it is never held across a socket read or write.

use crate::commands::CommandHandler;
use crate::protocol::{ParseError, RespParser, RespValue};
use bytes::{Buf, BytesMut};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, trace, warn};

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Per-connection limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionLimits {
    /// Largest amount of unparsed input held for one connection
    pub max_buffer_size: usize,
    /// Array nesting limit handed to the parser
    pub max_depth: Option<usize>,
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        Self {
            max_buffer_size: 1024 * 1024,
            max_depth: Some(32),
        }
    }
}

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands processed
    pub commands_processed: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn commands_processed(&self, count: usize) {
        self.commands_processed
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written
            .fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Handles a single client connection.
///
/// Generic over the stream so the loop can be driven by anything that reads
/// and writes bytes: a `TcpStream` in the server, mock I/O in tests.
pub struct ConnectionHandler<S> {
    stream: BufWriter<S>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Bytes received but not yet decoded
    buffer: BytesMut,

    command_handler: CommandHandler,

    parser: RespParser,

    limits: ConnectionLimits,

    stats: Arc<ConnectionStats>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new connection handler.
    pub fn new(
        stream: S,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
        limits: ConnectionLimits,
    ) -> Self {
        stats.connection_opened();

        let parser = match limits.max_depth {
            Some(depth) => RespParser::with_max_depth(depth),
            None => RespParser::new(),
        };

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            command_handler,
            parser,
            limits,
            stats,
        }
    }

    /// Runs the main connection loop.
    ///
    /// Returns `Ok(())` when the client closes the connection, even if a
    /// partial frame was still buffered.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        debug!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => debug!(client = %self.addr, "Client disconnected"),
            Err(ConnectionError::Io(io_err))
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %self.addr, "Connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "Connection closed with error"),
        }

        self.stats.connection_closed();
        result
    }

    /// The main read-execute-respond loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            if !self.buffer.is_empty() {
                self.drain_buffer().await?;
            }

            if !self.read_more_data().await? {
                if !self.buffer.is_empty() {
                    debug!(
                        client = %self.addr,
                        discarded = self.buffer.len(),
                        "Discarding partial frame at end of stream"
                    );
                }
                return Ok(());
            }
        }
    }

    /// Executes every complete frame in the buffer and sends the replies.
    async fn drain_buffer(&mut self) -> Result<(), ConnectionError> {
        let processed = self.command_handler.process(&mut self.parser, &self.buffer);
        self.buffer.advance(processed.consumed);
        self.stats.commands_processed(processed.frames);

        trace!(
            client = %self.addr,
            frames = processed.frames,
            consumed = processed.consumed,
            remaining = self.buffer.len(),
            "Processed buffered input"
        );

        if !processed.output.is_empty() {
            self.send(&processed.output).await?;
        }

        match processed.error {
            Some(e) => {
                // Alignment with the byte stream is lost; nothing after this
                // point can be trusted.
                warn!(client = %self.addr, error = %e, "Malformed frame");
                Err(ConnectionError::Parse(e))
            }
            None => Ok(()),
        }
    }

    /// Reads more data from the stream into the buffer.
    ///
    /// Returns `false` at end of stream.
    async fn read_more_data(&mut self) -> Result<bool, ConnectionError> {
        if self.buffer.len() >= self.limits.max_buffer_size {
            warn!(
                client = %self.addr,
                size = self.buffer.len(),
                "Buffer size limit exceeded"
            );
            let reply = RespValue::error("ERR Protocol error: request too large").serialize();
            self.send(&reply).await?;
            return Err(ConnectionError::BufferFull);
        }

        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;
        if n == 0 {
            return Ok(false);
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");
        Ok(true)
    }

    async fn send(&mut self, bytes: &[u8]) -> Result<(), ConnectionError> {
        self.stream.write_all(bytes).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(bytes.len());
        trace!(client = %self.addr, bytes = bytes.len(), "Sent response");
        Ok(())
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed frame; an error reply was sent before closing
    #[error("malformed frame: {0}")]
    Parse(#[from] ParseError),

    /// Buffer size limit exceeded without a complete frame
    #[error("buffer size limit exceeded")]
    BufferFull,
}

/// Handles a client connection to completion.
///
/// Errors are logged, never propagated; one connection failing has no
/// effect on any other.
pub async fn handle_connection<S>(
    stream: S,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
    limits: ConnectionLimits,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let handler = ConnectionHandler::new(stream, addr, command_handler, stats, limits);
    if let Err(e) = handler.run().await {
        trace!(client = %addr, error = %e, "Connection ended with error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Keyspace;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    fn test_addr() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    fn mock_handler<S>(stream: S) -> ConnectionHandler<S>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        ConnectionHandler::new(
            stream,
            test_addr(),
            CommandHandler::new(Arc::new(Keyspace::new())),
            Arc::new(ConnectionStats::new()),
            ConnectionLimits::default(),
        )
    }

    async fn create_test_server() -> (SocketAddr, Arc<Keyspace>, Arc<ConnectionStats>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let keyspace = Arc::new(Keyspace::new());
        let stats = Arc::new(ConnectionStats::new());

        let keyspace_clone = Arc::clone(&keyspace);
        let stats_clone = Arc::clone(&stats);

        tokio::spawn(async move {
            while let Ok((stream, client_addr)) = listener.accept().await {
                let handler = CommandHandler::new(Arc::clone(&keyspace_clone));
                let stats = Arc::clone(&stats_clone);
                tokio::spawn(handle_connection(
                    stream,
                    client_addr,
                    handler,
                    stats,
                    ConnectionLimits::default(),
                ));
            }
        });

        (addr, keyspace, stats)
    }

    async fn read_exactly(client: &mut TcpStream, len: usize) -> Vec<u8> {
        let mut buf = vec![0u8; len];
        tokio::time::timeout(
            tokio::time::Duration::from_secs(2),
            client.read_exact(&mut buf),
        )
        .await
        .unwrap()
        .unwrap();
        buf
    }

    #[tokio::test]
    async fn test_frame_split_across_reads() {
        let stream = tokio_test::io::Builder::new()
            .read(b"*2\r\n$4\r\nEC")
            .read(b"HO\r\n$5\r\nhel")
            .read(b"lo\r")
            .read(b"\n")
            .write(b"$5\r\nhello\r\n")
            .build();

        mock_handler(stream).run().await.unwrap();
    }

    #[tokio::test]
    async fn test_large_value_over_many_reads() {
        let value = vec![b'v'; 8 * 1024];
        let mut request = b"*3\r\n$3\r\nSET\r\n$3\r\nbig\r\n$8192\r\n".to_vec();
        request.extend_from_slice(&value);
        request.extend_from_slice(b"\r\n*2\r\n$3\r\nGET\r\n$3\r\nbig\r\n");

        let mut expected = b"+OK\r\n$8192\r\n".to_vec();
        expected.extend_from_slice(&value);
        expected.extend_from_slice(b"\r\n");

        let mut builder = tokio_test::io::Builder::new();
        for chunk in request.chunks(500) {
            builder.read(chunk);
        }
        let stream = builder.write(&expected).build();

        mock_handler(stream).run().await.unwrap();
    }

    #[tokio::test]
    async fn test_pipelined_frames_in_one_read() {
        let stream = tokio_test::io::Builder::new()
            .read(b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n")
            .write(b"+OK\r\n$3\r\nbar\r\n")
            .build();

        mock_handler(stream).run().await.unwrap();
    }

    #[tokio::test]
    async fn test_partial_frame_at_eof_is_discarded() {
        let stream = tokio_test::io::Builder::new()
            .read(b"*1\r\n$4\r\nPING\r\n*1\r\n$4\r\nPI")
            .write(b"+PONG\r\n")
            .build();

        mock_handler(stream).run().await.unwrap();
    }

    #[tokio::test]
    async fn test_malformed_frame_gets_error_reply() {
        let stream = tokio_test::io::Builder::new()
            .read(b"*1\r\n$4\r\nPING\r\n&oops\r\n")
            .write(b"+PONG\r\n-ERR Protocol error: unknown type prefix: 0x26\r\n")
            .build();

        let result = mock_handler(stream).run().await;
        assert!(matches!(
            result,
            Err(ConnectionError::Parse(ParseError::UnknownPrefix(b'&')))
        ));
    }

    #[tokio::test]
    async fn test_unknown_command_keeps_connection() {
        let stream = tokio_test::io::Builder::new()
            .read(b"*1\r\n$4\r\nNOPE\r\n")
            .write(b"-ERR unknown command 'NOPE'\r\n")
            .read(b"*1\r\n$4\r\nPING\r\n")
            .write(b"+PONG\r\n")
            .build();

        mock_handler(stream).run().await.unwrap();
    }

    #[tokio::test]
    async fn test_buffer_limit() {
        let stream = tokio_test::io::Builder::new()
            .read(b"$100\r\n0123456789")
            .write(b"-ERR Protocol error: request too large\r\n")
            .build();

        let handler = ConnectionHandler::new(
            stream,
            test_addr(),
            CommandHandler::new(Arc::new(Keyspace::new())),
            Arc::new(ConnectionStats::new()),
            ConnectionLimits {
                max_buffer_size: 16,
                max_depth: None,
            },
        );

        assert!(matches!(
            handler.run().await,
            Err(ConnectionError::BufferFull)
        ));
    }

    #[tokio::test]
    async fn test_ping_pong() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        client.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();
        assert_eq!(read_exactly(&mut client, 7).await, b"+PONG\r\n");
    }

    #[tokio::test]
    async fn test_set_get_across_connections() {
        let (addr, keyspace, _) = create_test_server().await;

        let mut writer = TcpStream::connect(addr).await.unwrap();
        writer
            .write_all(b"*3\r\n$3\r\nSET\r\n$5\r\ncolor\r\n$4\r\nteal\r\n")
            .await
            .unwrap();
        assert_eq!(read_exactly(&mut writer, 5).await, b"+OK\r\n");

        let mut reader = TcpStream::connect(addr).await.unwrap();
        reader
            .write_all(b"*2\r\n$3\r\nGET\r\n$5\r\ncolor\r\n")
            .await
            .unwrap();
        assert_eq!(read_exactly(&mut reader, 10).await, b"$4\r\nteal\r\n");

        assert_eq!(keyspace.len(), 1);
    }

    #[tokio::test]
    async fn test_byte_at_a_time_delivery() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();
        client.set_nodelay(true).unwrap();

        for byte in b"*2\r\n$4\r\nECHO\r\n$3\r\na\r\n\r\n" {
            client.write_all(&[*byte]).await.unwrap();
        }

        assert_eq!(read_exactly(&mut client, 9).await, b"$3\r\na\r\n\r\n");
    }

    #[tokio::test]
    async fn test_connection_stats() {
        let (addr, _, stats) = create_test_server().await;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();
        read_exactly(&mut client, 7).await;

        // Give the server time to record the write
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 1);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 1);
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 1);
        assert_eq!(stats.bytes_read.load(Ordering::Relaxed), 14);
        assert_eq!(stats.bytes_written.load(Ordering::Relaxed), 7);

        drop(client);
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }
}
