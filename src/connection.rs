//! Framed connection over a raw TCP stream.
//!
//! [`FramedConnection`] turns an unstructured byte stream into a sequence of
//! discrete, length-delimited messages. I/O outcomes are surfaced as explicit
//! success/failure results; low-level transport errors are logged at the
//! failure site and never propagate as panics.
//!
//! A connection is either Disconnected (no handle) or Connected (owns exactly
//! one live socket); there is no other state. Client-side code creates it
//! Disconnected and calls [`connect`](FramedConnection::connect); server-side
//! code receives it already Connected from the accept loop.
//!
//! # Example
//!
//! ```ignore
//! use framewire::FramedConnection;
//!
//! let mut conn = FramedConnection::new();
//! if conn.connect("127.0.0.1", 5551).await {
//!     conn.write(b"hello").await;
//!     match conn.read().await {
//!         Ok(reply) => println!("got {} bytes", reply.len()),
//!         Err(err) => eprintln!("read failed: {err}"),
//!     }
//!     conn.disconnect().await;
//! }
//! ```

use std::fmt;
use std::io::ErrorKind;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time;
use tracing::{debug, error};

use crate::error::ReadError;
use crate::protocol::{self, DEFAULT_MAX_PAYLOAD_SIZE, PREFIX_SIZE};

/// Default wait applied to blocking operations unless overridden.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Configuration for a [`FramedConnection`].
#[derive(Debug, Clone, Copy)]
pub struct ConnectionConfig {
    /// Wait duration for connect attempts and message reads.
    pub timeout: Duration,
    /// Emit full diagnostic detail on error paths.
    pub debug: bool,
    /// Maximum accepted inbound declared payload length.
    pub max_payload_size: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            debug: false,
            max_payload_size: DEFAULT_MAX_PAYLOAD_SIZE,
        }
    }
}

/// A message-framed TCP connection.
///
/// Reads and writes are not safe to issue concurrently from multiple tasks
/// without external synchronization; the framing assumes a single reader and
/// a single writer at a time per direction. Dropping the connection closes
/// the socket.
pub struct FramedConnection {
    stream: Option<TcpStream>,
    config: ConnectionConfig,
}

impl FramedConnection {
    /// Create a disconnected connection with default configuration.
    pub fn new() -> Self {
        Self::with_config(ConnectionConfig::default())
    }

    /// Create a disconnected connection with the given configuration.
    pub fn with_config(config: ConnectionConfig) -> Self {
        Self {
            stream: None,
            config,
        }
    }

    /// Wrap an already-connected stream (server side, from an accept).
    pub fn from_stream(stream: TcpStream, config: ConnectionConfig) -> Self {
        Self {
            stream: Some(stream),
            config,
        }
    }

    /// Whether the connection currently owns a live socket.
    #[inline]
    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// The configured default wait duration.
    #[inline]
    pub fn timeout(&self) -> Duration {
        self.config.timeout
    }

    /// Attempt to establish a connection to `(host, port)`.
    ///
    /// Returns `true` on success. Returns `false` on any failure (resolution,
    /// refusal, timeout) with the connection remaining Disconnected, and also
    /// when already connected — connecting twice is a no-op failure that does
    /// not tear down the existing connection.
    pub async fn connect(&mut self, host: &str, port: u16) -> bool {
        if self.stream.is_some() {
            error!("connect failed: socket already connected");
            return false;
        }

        match time::timeout(self.config.timeout, TcpStream::connect((host, port))).await {
            Ok(Ok(stream)) => {
                self.stream = Some(stream);
                true
            }
            Ok(Err(err)) => {
                error!("connect to {host}:{port} failed: {err}");
                if self.config.debug {
                    debug!(error = ?err, "connect failure detail");
                }
                false
            }
            Err(_) => {
                error!(
                    "connect to {host}:{port} failed: no connection within {:?}",
                    self.config.timeout
                );
                false
            }
        }
    }

    /// Read one complete message, waiting up to the configured timeout.
    ///
    /// See [`read_timeout`](Self::read_timeout).
    pub async fn read(&mut self) -> Result<Bytes, ReadError> {
        self.read_inner(self.config.timeout).await
    }

    /// Read one complete message, waiting up to `wait` for data to arrive.
    ///
    /// Waits for the connection to become readable within the window
    /// ([`ReadError::Timeout`] on expiry), then reads exactly 4 prefix bytes
    /// and exactly the declared number of payload bytes, accumulating across
    /// as many underlying receives as needed. Either the complete message or
    /// a failure is returned — never a partial message.
    pub async fn read_timeout(&mut self, wait: Duration) -> Result<Bytes, ReadError> {
        self.read_inner(wait).await
    }

    async fn read_inner(&mut self, wait: Duration) -> Result<Bytes, ReadError> {
        let debug_mode = self.config.debug;
        let max_payload = self.config.max_payload_size;

        let Some(stream) = self.stream.as_mut() else {
            error!("read failed: socket is not connected");
            return Err(ReadError::NotConnected);
        };

        // Readiness wait, bounded by the window. The exact reads below only
        // start once the peer has begun sending.
        match time::timeout(wait, stream.readable()).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                error!("read failed: could not wait for readability: {err}");
                if debug_mode {
                    debug!(error = ?err, "readiness wait failure detail");
                }
                return Err(ReadError::Transport);
            }
            Err(_) => return Err(ReadError::Timeout),
        }

        let mut prefix = [0u8; PREFIX_SIZE];
        if let Err(err) = stream.read_exact(&mut prefix).await {
            let category = if err.kind() == ErrorKind::UnexpectedEof {
                // Connection closed mid-prefix (or cleanly, before one).
                ReadError::Framing
            } else {
                ReadError::Transport
            };
            error!("read failed: could not receive length prefix: {err}");
            if debug_mode {
                debug!(error = ?err, "prefix read failure detail");
            }
            return Err(category);
        }

        let Some(length) = protocol::decode_prefix(&prefix) else {
            error!("read failed: could not decode length prefix");
            return Err(ReadError::Framing);
        };

        if length > max_payload {
            error!("read failed: declared length {length} exceeds maximum {max_payload}");
            return Err(ReadError::Framing);
        }

        let mut payload = vec![0u8; length as usize];
        if length > 0 {
            if let Err(err) = stream.read_exact(&mut payload).await {
                error!("read failed: could not receive message payload: {err}");
                if debug_mode {
                    debug!(error = ?err, "payload read failure detail");
                }
                return Err(ReadError::Transport);
            }
        }

        Ok(Bytes::from(payload))
    }

    /// Frame `data` with its length prefix and send the whole buffer.
    ///
    /// Accepts anything byte-like; text is framed as its UTF-8 bytes. Returns
    /// `true` only if the entire framed buffer was sent; `false` on any
    /// failure, if not connected, or if the payload does not fit a 32-bit
    /// length.
    pub async fn write(&mut self, data: impl AsRef<[u8]>) -> bool {
        let data = data.as_ref();

        let Some(stream) = self.stream.as_mut() else {
            error!("write failed: socket is not connected");
            return false;
        };

        if data.len() > u32::MAX as usize {
            error!(
                "write failed: payload of {} bytes does not fit a 32-bit length prefix",
                data.len()
            );
            return false;
        }

        let frame = protocol::build_frame(data);
        let result = async {
            stream.write_all(&frame).await?;
            stream.flush().await
        }
        .await;

        match result {
            Ok(()) => true,
            Err(err) => {
                error!("write failed: could not send data: {err}");
                if self.config.debug {
                    debug!(error = ?err, "write failure detail");
                }
                false
            }
        }
    }

    /// Disconnect by shutting down the send direction and closing the socket.
    ///
    /// The shutdown flushes pending data and signals EOF to the peer; its
    /// errors are suppressed, since the peer may already have closed. Closing
    /// the socket (dropping the handle) is what releases the receive
    /// direction. The handle is cleared unconditionally, so this is
    /// idempotent and the connection can be reconnected afterwards. Dropping
    /// the connection closes the socket as well (without the orderly
    /// shutdown).
    pub async fn disconnect(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            let _ = stream.shutdown().await;
        }
    }
}

impl Default for FramedConnection {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FramedConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "FramedConnection(timeout={:?}, debug={}, connected={})",
            self.config.timeout,
            self.config.debug,
            self.is_connected()
        )
    }
}
