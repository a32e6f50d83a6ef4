//! # framewire
//!
//! A minimal message-framing layer over TCP, plus an accept-loop server that
//! dispatches each incoming connection to a handler task.
//!
//! ## Wire format
//!
//! Every message is `[4-byte big-endian u32 length][payload]`, repeated for
//! the life of the connection. No handshake, version byte, or checksum.
//!
//! ## Architecture
//!
//! - [`FramedConnection`] wraps one raw stream and exposes
//!   connect/read/write/disconnect with whole-message semantics and a
//!   configurable wait timeout. Failures are return values, never panics.
//! - [`Server`] owns one listening socket; its accept loop hands each new
//!   connection to a [`ConnectionHandler`] on its own task and supports a
//!   clean start/stop lifecycle.
//!
//! ## Example
//!
//! ```ignore
//! use framewire::{FramedConnection, Server};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut server = Server::new();
//!     server
//!         .start(
//!             |_addr, mut conn| async move {
//!                 if let Ok(msg) = conn.read().await {
//!                     conn.write(msg).await;
//!                 }
//!                 conn.disconnect().await;
//!             },
//!             5551,
//!             "127.0.0.1",
//!             false,
//!         )
//!         .await?;
//!
//!     let mut conn = FramedConnection::new();
//!     conn.connect("127.0.0.1", 5551).await;
//!     conn.write("ping").await;
//!     let reply = conn.read().await?;
//!     assert_eq!(&reply[..], b"ping");
//!
//!     conn.disconnect().await;
//!     server.stop().await;
//!     Ok(())
//! }
//! ```

pub mod connection;
pub mod error;
pub mod protocol;
pub mod server;

pub use connection::{ConnectionConfig, FramedConnection, DEFAULT_TIMEOUT};
pub use error::{ReadError, ERROR_SENTINEL, TIMEOUT_SENTINEL};
pub use server::{ConnectionHandler, Server, ShutdownHandle};
