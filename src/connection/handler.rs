//! Connection Handler Module
//!
//! This module handles individual client connections.
//! Each client gets its own handler task that runs in a loop,
//! decoding requests and sending responses.
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
//! 3. ┌──────────────────────────────┐
//!    │      Main Loop               │
//!    │                              │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Read bytes from socket  │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Decode RESP request     │─┼──> malformed: close, no reply
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Execute command         │─┼──> fatal: reply -ERR, close
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Encode + flush response │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │         [Loop back]          │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. Client disconnects / error
//!        │
//!        ▼
//! 5. Handler task ends
//! ```
//!
//! ## Buffer Management
//!
//! We use a BytesMut buffer to accumulate incoming data. This is important
//! because TCP is a stream protocol - we might receive partial requests,
//! or multiple pipelined requests in a single read.

use crate::commands::{ExecError, Executor};
use crate::protocol::{encode_frame, parse_frame, DecodeError, DecoderLimits, EncodeError, Value};
use bytes::BytesMut;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, error, info, trace, warn};

/// Default cap on buffered, not yet decoded bytes (1 GB)
pub const DEFAULT_MAX_BUFFER_SIZE: usize = 1024 * 1024 * 1024;

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Per-connection settings shared by every handler.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionConfig {
    /// Limits applied while decoding requests
    pub limits: DecoderLimits,
    /// Largest amount of undecoded input a client may leave buffered
    pub max_buffer_size: usize,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            limits: DecoderLimits::default(),
            max_buffer_size: DEFAULT_MAX_BUFFER_SIZE,
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

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written.fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Handles a single client connection.
///
/// This struct manages the read buffer, decoding, and response sending
/// for one connected client. `S` is usually a `TcpStream`.
pub struct ConnectionHandler<S> {
    /// The stream for this connection
    stream: BufWriter<S>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Buffer for incoming data
    buffer: BytesMut,

    /// Scratch buffer for outgoing frames
    output: Vec<u8>,

    /// The command executor (shared storage behind it)
    executor: Executor,

    config: ConnectionConfig,

    /// Connection statistics (shared)
    stats: Arc<ConnectionStats>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Creates a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `stream` - The byte stream for this connection
    /// * `addr` - The client's socket address
    /// * `executor` - The executor for running commands
    /// * `config` - Decoder limits and buffer cap
    /// * `stats` - Shared connection statistics
    pub fn new(
        stream: S,
        addr: SocketAddr,
        executor: Executor,
        config: ConnectionConfig,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            output: Vec::with_capacity(INITIAL_BUFFER_SIZE),
            executor,
            config,
            stats,
        }
    }

    /// Runs the main connection loop.
    ///
    /// This method reads requests from the client, executes them,
    /// and sends back responses until the client disconnects or an error occurs.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected gracefully"),
            Err(e) => match e {
                ConnectionError::ClientDisconnected => {
                    debug!(client = %self.addr, "Client disconnected")
                }
                ConnectionError::IoError(io_err)
                    if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
                {
                    debug!(client = %self.addr, "Connection reset by client")
                }
                _ => warn!(client = %self.addr, error = %e, "Connection closed on error"),
            },
        }

        self.stats.connection_closed();
        result
    }

    /// The main read-execute-respond loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            // Drain every complete request already buffered (pipelining)
            while let Some(request) = self.try_parse_request()? {
                self.stats.command_processed();

                match self.executor.execute(request) {
                    Ok(response) => self.send_response(&response).await?,
                    Err(err) => {
                        let reply = Value::error(format!("ERR {}", err));
                        self.send_response(&reply).await?;
                        return Err(ConnectionError::CommandFailed(err));
                    }
                }
            }

            // Need more data - read from the socket
            self.read_more_data().await?;
        }
    }

    /// Attempts to decode a request from the buffer.
    fn try_parse_request(&mut self) -> Result<Option<Value>, ConnectionError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        match parse_frame(&self.buffer, self.config.limits) {
            Ok(Some((value, consumed))) => {
                let _ = self.buffer.split_to(consumed);
                trace!(
                    client = %self.addr,
                    consumed = consumed,
                    remaining = self.buffer.len(),
                    "Decoded request"
                );
                Ok(Some(value))
            }
            Ok(None) => {
                trace!(
                    client = %self.addr,
                    buffered = self.buffer.len(),
                    "Incomplete request, need more data"
                );
                Ok(None)
            }
            Err(e) => {
                warn!(client = %self.addr, error = %e, "Decode error");
                Err(ConnectionError::DecodeError(e))
            }
        }
    }

    /// Reads more data from the socket into the buffer.
    async fn read_more_data(&mut self) -> Result<(), ConnectionError> {
        // Check buffer size limit
        if self.buffer.len() >= self.config.max_buffer_size {
            error!(
                client = %self.addr,
                size = self.buffer.len(),
                "Buffer size limit exceeded"
            );
            return Err(ConnectionError::BufferFull);
        }

        // Ensure we have some capacity
        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(4096);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;

        if n == 0 {
            // Connection closed by client
            if self.buffer.is_empty() {
                return Err(ConnectionError::ClientDisconnected);
            } else {
                // Partial request in buffer
                return Err(ConnectionError::UnexpectedEof);
            }
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(())
    }

    /// Encodes a response and flushes it to the client.
    async fn send_response(&mut self, response: &Value) -> Result<(), ConnectionError> {
        self.output.clear();
        encode_frame(response, &mut self.output)?;

        self.stream.write_all(&self.output).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(self.output.len());
        trace!(
            client = %self.addr,
            bytes = self.output.len(),
            "Sent response"
        );
        Ok(())
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Malformed request framing
    #[error("Decode error: {0}")]
    DecodeError(#[from] DecodeError),

    /// A response could not be framed
    #[error("Encode error: {0}")]
    EncodeError(#[from] EncodeError),

    /// A command failed in storage; the error was reported before closing
    #[error("Command failed: {0}")]
    CommandFailed(#[from] ExecError),

    /// Client disconnected normally
    #[error("Client disconnected")]
    ClientDisconnected,

    /// Unexpected end of stream (partial request)
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    /// Buffer size limit exceeded
    #[error("Buffer size limit exceeded")]
    BufferFull,
}

/// Handles a client connection.
///
/// This is a convenience function that creates a ConnectionHandler
/// and runs it to completion.
pub async fn handle_connection<S>(
    stream: S,
    addr: SocketAddr,
    executor: Executor,
    config: ConnectionConfig,
    stats: Arc<ConnectionStats>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let handler = ConnectionHandler::new(stream, addr, executor, config, stats);
    if let Err(e) = handler.run().await {
        match e {
            ConnectionError::ClientDisconnected => {}
            ConnectionError::IoError(ref io_err)
                if io_err.kind() == std::io::ErrorKind::ConnectionReset => {}
            _ => {
                debug!(client = %addr, error = %e, "Connection ended with error");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{ShardedStorage, Storage, StorageError};
    use tokio::net::{TcpListener, TcpStream};
    use tokio_test::io::Builder;

    fn test_addr() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    fn test_executor() -> Executor {
        Executor::new(Arc::new(ShardedStorage::new()))
    }

    async fn run_mock(
        mock: tokio_test::io::Mock,
        executor: Executor,
    ) -> (Result<(), ConnectionError>, Arc<ConnectionStats>) {
        let stats = Arc::new(ConnectionStats::new());
        let handler = ConnectionHandler::new(
            mock,
            test_addr(),
            executor,
            ConnectionConfig::default(),
            Arc::clone(&stats),
        );
        (handler.run().await, stats)
    }

    async fn create_test_server() -> (SocketAddr, Arc<dyn Storage>, Arc<ConnectionStats>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let storage: Arc<dyn Storage> = Arc::new(ShardedStorage::new());
        let stats = Arc::new(ConnectionStats::new());

        let storage_clone = Arc::clone(&storage);
        let stats_clone = Arc::clone(&stats);

        tokio::spawn(async move {
            while let Ok((stream, client_addr)) = listener.accept().await {
                let executor = Executor::new(Arc::clone(&storage_clone));
                let stats = Arc::clone(&stats_clone);
                tokio::spawn(handle_connection(
                    stream,
                    client_addr,
                    executor,
                    ConnectionConfig::default(),
                    stats,
                ));
            }
        });

        (addr, storage, stats)
    }

    #[tokio::test]
    async fn test_mock_ping_then_disconnect() {
        let mock = Builder::new()
            .read(b"*1\r\n$4\r\nPING\r\n")
            .write(b"+pong\r\n")
            .build();

        let (result, stats) = run_mock(mock, test_executor()).await;
        assert!(matches!(result, Err(ConnectionError::ClientDisconnected)));
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 1);
        assert_eq!(stats.bytes_written.load(Ordering::Relaxed), 7);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_mock_request_split_across_reads() {
        let mock = Builder::new()
            .read(b"*2\r\n$4\r\nEC")
            .read(b"HO\r\n$2\r\nhi")
            .read(b"\r\n")
            .write(b"$2\r\nhi\r\n")
            .build();

        let (result, _) = run_mock(mock, test_executor()).await;
        assert!(matches!(result, Err(ConnectionError::ClientDisconnected)));
    }

    #[tokio::test]
    async fn test_mock_large_value_in_small_reads() {
        let value = vec![b'v'; 1024 * 1024];
        let mut frame = format!("*3\r\n$3\r\nSET\r\n$3\r\nbig\r\n${}\r\n", value.len())
            .into_bytes();
        frame.extend_from_slice(&value);
        frame.extend_from_slice(b"\r\n");

        let mut builder = Builder::new();
        for chunk in frame.chunks(16 * 1024) {
            builder.read(chunk);
        }
        builder.write(b"+OK\r\n");

        let storage: Arc<dyn Storage> = Arc::new(ShardedStorage::new());
        let (result, stats) = run_mock(builder.build(), Executor::new(Arc::clone(&storage))).await;
        assert!(matches!(result, Err(ConnectionError::ClientDisconnected)));
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 1);
        assert_eq!(storage.get(b"big").map(|v| v.len()), Ok(value.len()));
    }

    #[tokio::test]
    async fn test_mock_protocol_error_keeps_connection_open() {
        let mock = Builder::new()
            .read(b"*3\r\n$4\r\nPING\r\n$1\r\na\r\n$1\r\nb\r\n*1\r\n$4\r\nPING\r\n")
            .write(b"-ERR wrong number of arguments for 'ping' command\r\n")
            .write(b"+pong\r\n")
            .build();

        let (result, stats) = run_mock(mock, test_executor()).await;
        assert!(matches!(result, Err(ConnectionError::ClientDisconnected)));
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 2);
    }

    #[tokio::test]
    async fn test_mock_storage_error_replies_then_closes() {
        // The PING after the failing GET must never be answered
        let mock = Builder::new()
            .read(b"*2\r\n$3\r\nGET\r\n$7\r\nmissing\r\n*1\r\n$4\r\nPING\r\n")
            .write(b"-ERR key not found\r\n")
            .build();

        let (result, stats) = run_mock(mock, test_executor()).await;
        assert!(matches!(
            result,
            Err(ConnectionError::CommandFailed(ExecError::Storage(
                StorageError::NotFound
            )))
        ));
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_mock_decode_error_closes_without_reply() {
        let mock = Builder::new().read(b"$-2\r\n").build();

        let (result, stats) = run_mock(mock, test_executor()).await;
        assert!(matches!(
            result,
            Err(ConnectionError::DecodeError(DecodeError::InvalidLength { .. }))
        ));
        assert_eq!(stats.bytes_written.load(Ordering::Relaxed), 0);
    }

    #[tokio::test]
    async fn test_mock_partial_request_at_eof() {
        let mock = Builder::new().read(b"*1\r\n$4\r\nPI").build();

        let (result, _) = run_mock(mock, test_executor()).await;
        assert!(matches!(result, Err(ConnectionError::UnexpectedEof)));
    }

    #[tokio::test]
    async fn test_mock_buffer_limit() {
        let mock = Builder::new().read(b"$100\r\nabcdefgh").build();
        let stats = Arc::new(ConnectionStats::new());
        let config = ConnectionConfig {
            max_buffer_size: 8,
            ..ConnectionConfig::default()
        };
        let handler = ConnectionHandler::new(mock, test_addr(), test_executor(), config, stats);

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

        let mut buf = [0u8; 64];
        let n = client.read(&mut buf).await.unwrap();

        assert_eq!(&buf[..n], b"+pong\r\n");
    }

    #[tokio::test]
    async fn test_set_get() {
        let (addr, storage, _) = create_test_server().await;

        let mut client = TcpStream::connect(addr).await.unwrap();

        client
            .write_all(b"*3\r\n$3\r\nSET\r\n$4\r\nname\r\n$4\r\nAriz\r\n")
            .await
            .unwrap();

        let mut buf = [0u8; 64];
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"+OK\r\n");
        assert_eq!(storage.get(b"name").unwrap(), bytes::Bytes::from("Ariz"));

        client
            .write_all(b"*2\r\n$3\r\nGET\r\n$4\r\nname\r\n")
            .await
            .unwrap();

        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"$4\r\nAriz\r\n");
    }

    #[tokio::test]
    async fn test_pipelined_commands() {
        let (addr, _, _) = create_test_server().await;

        let mut client = TcpStream::connect(addr).await.unwrap();

        // Send multiple commands in one write (pipelining)
        client
            .write_all(b"*3\r\n$3\r\nSET\r\n$2\r\nk1\r\n$2\r\nv1\r\n*3\r\n$3\r\nSET\r\n$2\r\nk2\r\n$2\r\nv2\r\n*2\r\n$3\r\nGET\r\n$2\r\nk1\r\n*2\r\n$3\r\nGET\r\n$2\r\nk2\r\n")
            .await
            .unwrap();

        // Expected: +OK\r\n+OK\r\n$2\r\nv1\r\n$2\r\nv2\r\n (26 bytes)
        let expected = b"+OK\r\n+OK\r\n$2\r\nv1\r\n$2\r\nv2\r\n";
        let mut buf = vec![0u8; expected.len()];
        tokio::time::timeout(
            tokio::time::Duration::from_secs(2),
            client.read_exact(&mut buf),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(&buf[..], &expected[..]);
    }

    #[tokio::test]
    async fn test_fatal_error_closes_socket() {
        let (addr, _, _) = create_test_server().await;

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"*2\r\n$3\r\nGET\r\n$4\r\nnope\r\n")
            .await
            .unwrap();

        let mut response = Vec::new();
        tokio::time::timeout(
            tokio::time::Duration::from_secs(2),
            client.read_to_end(&mut response),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(response, b"-ERR key not found\r\n");
    }

    #[tokio::test]
    async fn test_connection_stats() {
        let (addr, _, stats) = create_test_server().await;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);

        let mut client = TcpStream::connect(addr).await.unwrap();

        // Give the server time to accept the connection
        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 1);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 1);

        client.write_all(b"*1\r\n$4\r\nPING\r\n").await.unwrap();
        let mut buf = [0u8; 64];
        let _ = client.read(&mut buf).await.unwrap();

        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        assert!(stats.commands_processed.load(Ordering::Relaxed) >= 1);
        assert!(stats.bytes_read.load(Ordering::Relaxed) > 0);
        assert!(stats.bytes_written.load(Ordering::Relaxed) > 0);

        drop(client);

        tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }
}
