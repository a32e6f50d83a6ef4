//! Accept-loop server.
//!
//! [`Server`] owns one listening socket and continuously converts incoming
//! connections into concurrent, independent handler invocations:
//!
//! ```text
//! Listener ─► accept loop ─┬─► task: handler(addr, FramedConnection)
//!   (100ms poll)           ├─► task: handler(addr, FramedConnection)
//!                          └─► ...
//! ```
//!
//! The accept loop runs on its own task (or borrows the caller's with
//! `blocking = true`) and never blocks on handler execution. Handlers own
//! their connection from dispatch onwards and are not tracked or joined by
//! the server.
//!
//! # Example
//!
//! ```ignore
//! use framewire::Server;
//!
//! let mut server = Server::new();
//! server
//!     .start(
//!         |addr, mut conn| async move {
//!             tracing::info!("connection from {addr}");
//!             if let Ok(msg) = conn.read().await {
//!                 conn.write(msg).await;
//!             }
//!             conn.disconnect().await;
//!         },
//!         5551,
//!         "127.0.0.1",
//!         false,
//!     )
//!     .await?;
//! // ...
//! server.stop().await;
//! ```

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error};

use crate::connection::{ConnectionConfig, FramedConnection};

/// Bound on each wait for a pending connection, so `stop` is observed
/// promptly instead of the loop blocking in accept indefinitely.
pub const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long `stop` waits for the accept loop to observe the shutdown flag.
pub const STOP_GRACE_PERIOD: Duration = Duration::from_millis(200);

/// Boxed future returned by connection handlers.
pub type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;

/// Cloneable handle that signals a server's accept loop to exit.
///
/// Obtained from [`Server::shutdown_handle`] before a blocking
/// [`start`](Server::start), since the blocking loop holds the server borrowed
/// until it exits; clearing the flag through the handle is what lets it exit.
#[derive(Clone)]
pub struct ShutdownHandle {
    running: Arc<AtomicBool>,
}

impl ShutdownHandle {
    /// Signal the accept loop to exit.
    ///
    /// The loop observes the flag within one poll interval. This only stops
    /// accepting; the listening socket is released by
    /// [`Server::stop`](Server::stop) (or the server being dropped).
    pub fn shutdown(&self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Handler invoked once per accepted connection.
///
/// The handler owns the connection for its lifetime and is responsible for
/// eventually disconnecting it. Implemented for any
/// `Fn(SocketAddr, FramedConnection) -> impl Future<Output = ()> + Send`
/// closure.
pub trait ConnectionHandler: Send + Sync + 'static {
    /// Handle one accepted connection.
    fn handle(&self, peer: SocketAddr, connection: FramedConnection) -> HandlerFuture;
}

impl<F, Fut> ConnectionHandler for F
where
    F: Fn(SocketAddr, FramedConnection) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    fn handle(&self, peer: SocketAddr, connection: FramedConnection) -> HandlerFuture {
        Box::pin(self(peer, connection))
    }
}

/// A TCP server that dispatches each accepted connection to a handler task.
///
/// Lifecycle: Idle → [`start`](Self::start) → Listening →
/// [`stop`](Self::stop) → Idle. Starting while already listening is a
/// programming error and panics; stopping while idle is a harmless no-op.
pub struct Server {
    listener: Option<Arc<TcpListener>>,
    running: Arc<AtomicBool>,
    debug: bool,
    accept_task: Option<JoinHandle<()>>,
}

impl Server {
    /// Create an idle server.
    pub fn new() -> Self {
        Self::with_debug(false)
    }

    /// Create an idle server; accepted connections inherit `debug`.
    pub fn with_debug(debug: bool) -> Self {
        Self {
            listener: None,
            running: Arc::new(AtomicBool::new(false)),
            debug,
            accept_task: None,
        }
    }

    /// Whether the accept loop is currently signalled to run.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Local address of the listening socket, if listening.
    ///
    /// Useful when binding to port 0 and letting the OS pick.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.listener.as_ref().and_then(|l| l.local_addr().ok())
    }

    /// A handle that can signal the accept loop to exit without borrowing
    /// the server.
    ///
    /// Take one before a blocking [`start`](Self::start): the blocking loop
    /// holds the server until it exits, so the handle is the only way to
    /// make it return.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            running: self.running.clone(),
        }
    }

    /// Bind to `(address, port)` and begin accepting connections.
    ///
    /// Each accepted connection is wrapped in a [`FramedConnection`]
    /// (inheriting the server's debug flag) and handed to `handler` on a new
    /// task. With `blocking = false` the accept loop runs on its own task and
    /// this returns immediately; with `blocking = true` the calling task runs
    /// the loop itself, and `start` only returns once a
    /// [`ShutdownHandle`] (taken via
    /// [`shutdown_handle`](Self::shutdown_handle) beforehand) clears the
    /// running flag. After a blocking `start` returns, call
    /// [`stop`](Self::stop) to release the listening socket.
    ///
    /// # Errors
    ///
    /// Returns the bind error if the listening socket cannot be created.
    ///
    /// # Panics
    ///
    /// Panics if the server is already listening. That is lifecycle misuse,
    /// not a recoverable condition; the existing listener is never replaced.
    pub async fn start<H>(
        &mut self,
        handler: H,
        port: u16,
        address: &str,
        blocking: bool,
    ) -> io::Result<()>
    where
        H: ConnectionHandler,
    {
        assert!(
            self.listener.is_none(),
            "server is already listening; call stop() before starting again"
        );

        let listener = Arc::new(TcpListener::bind((address, port)).await?);
        self.listener = Some(listener.clone());
        self.running.store(true, Ordering::Release);

        let running = self.running.clone();
        let handler: Arc<dyn ConnectionHandler> = Arc::new(handler);
        let debug_mode = self.debug;

        if blocking {
            accept_loop(listener, running, handler, debug_mode).await;
        } else {
            self.accept_task = Some(tokio::spawn(accept_loop(
                listener, running, handler, debug_mode,
            )));
        }

        Ok(())
    }

    /// Signal the accept loop to exit and release the listening socket.
    ///
    /// Waits a short fixed grace period for the loop to observe the flag,
    /// then tears down the listener. In-flight handler tasks are independent
    /// and keep running; connections already handed off are unaffected.
    /// Calling `stop` while idle only clears the flag.
    pub async fn stop(&mut self) {
        self.running.store(false, Ordering::Release);

        if self.listener.is_none() {
            return;
        }

        time::sleep(STOP_GRACE_PERIOD).await;

        if let Some(task) = self.accept_task.take() {
            task.abort();
            let _ = task.await;
        }
        self.listener = None;
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        // No async teardown here; aborting the accept task drops its listener
        // clone, and ours goes with the server.
        self.running.store(false, Ordering::Release);
        if let Some(task) = self.accept_task.take() {
            task.abort();
        }
    }
}

/// Accept connections until `running` goes false.
async fn accept_loop(
    listener: Arc<TcpListener>,
    running: Arc<AtomicBool>,
    handler: Arc<dyn ConnectionHandler>,
    debug_mode: bool,
) {
    while running.load(Ordering::Acquire) {
        match time::timeout(ACCEPT_POLL_INTERVAL, listener.accept()).await {
            // No pending connection within the poll bound; re-check the flag.
            Err(_) => continue,
            Ok(Ok((stream, peer))) => {
                let connection = FramedConnection::from_stream(
                    stream,
                    ConnectionConfig {
                        debug: debug_mode,
                        ..ConnectionConfig::default()
                    },
                );
                let handler = handler.clone();
                tokio::spawn(async move {
                    handler.handle(peer, connection).await;
                });
            }
            Ok(Err(err)) => {
                // Exit silently when the error is shutdown-induced.
                if !running.load(Ordering::Acquire) {
                    return;
                }
                error!("accept failed: {err}");
                if debug_mode {
                    debug!(error = ?err, "accept failure detail");
                }
            }
        }
    }
}
