//! Integration tests for framewire.
//!
//! These exercise the framed connection and the accept-loop server together
//! over real loopback sockets. Servers bind to port 0 and the tests pick the
//! assigned port up via `local_addr`.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use framewire::{ConnectionConfig, FramedConnection, ReadError, Server, TIMEOUT_SENTINEL};

/// Echo handler: one message in, the same message out, then disconnect.
async fn echo(_addr: SocketAddr, mut conn: FramedConnection) {
    if let Ok(msg) = conn.read().await {
        conn.write(msg).await;
    }
    conn.disconnect().await;
}

/// Start an echo server on an ephemeral loopback port, returning it with the
/// port it bound.
async fn start_echo_server() -> (Server, u16) {
    let mut server = Server::new();
    server
        .start(echo, 0, "127.0.0.1", false)
        .await
        .expect("bind loopback");
    let port = server.local_addr().expect("listening").port();
    (server, port)
}

#[tokio::test]
async fn test_end_to_end_echo() {
    let (mut server, port) = start_echo_server().await;

    let mut conn = FramedConnection::new();
    assert!(conn.connect("127.0.0.1", port).await);
    assert!(conn.write(b"ping").await);

    let reply = conn.read().await.expect("echo reply");
    assert_eq!(&reply[..], b"ping");

    conn.disconnect().await;
    server.stop().await;
}

#[tokio::test]
async fn test_empty_payload_roundtrip() {
    let (mut server, port) = start_echo_server().await;

    let mut conn = FramedConnection::new();
    assert!(conn.connect("127.0.0.1", port).await);
    assert!(conn.write(b"").await);

    let reply = conn.read().await.expect("echo reply");
    assert!(reply.is_empty());

    conn.disconnect().await;
    server.stop().await;
}

#[tokio::test]
async fn test_large_payload_spans_many_receives() {
    let (mut server, port) = start_echo_server().await;

    // Far beyond any single kernel read; the exact-read accumulation has to
    // stitch the message back together.
    let payload: Vec<u8> = (0..4 * 1024 * 1024u32).map(|i| (i % 251) as u8).collect();

    let mut conn = FramedConnection::new();
    assert!(conn.connect("127.0.0.1", port).await);
    assert!(conn.write(&payload).await);

    let reply = conn.read().await.expect("echo reply");
    assert_eq!(&reply[..], &payload[..]);

    conn.disconnect().await;
    server.stop().await;
}

#[tokio::test]
async fn test_text_is_framed_as_utf8() {
    let (mut server, port) = start_echo_server().await;

    let mut conn = FramedConnection::new();
    assert!(conn.connect("127.0.0.1", port).await);
    assert!(conn.write("héllo wörld").await);

    let reply = conn.read().await.expect("echo reply");
    assert_eq!(&reply[..], "héllo wörld".as_bytes());

    conn.disconnect().await;
    server.stop().await;
}

#[tokio::test]
async fn test_messages_arrive_in_send_order() {
    let mut server = Server::new();
    server
        .start(
            |_addr: SocketAddr, mut conn: FramedConnection| async move {
                // Echo every message until the client disconnects.
                while let Ok(msg) = conn.read().await {
                    if !conn.write(msg).await {
                        break;
                    }
                }
                conn.disconnect().await;
            },
            0,
            "127.0.0.1",
            false,
        )
        .await
        .expect("bind loopback");
    let port = server.local_addr().expect("listening").port();

    let mut conn = FramedConnection::new();
    assert!(conn.connect("127.0.0.1", port).await);

    for i in 0..20u32 {
        assert!(conn.write(i.to_be_bytes()).await);
    }
    for i in 0..20u32 {
        let reply = conn.read().await.expect("echo reply");
        assert_eq!(&reply[..], i.to_be_bytes());
    }

    conn.disconnect().await;
    server.stop().await;
}

#[tokio::test]
async fn test_read_timeout_on_silent_peer() {
    // Handler that accepts but never writes.
    let mut server = Server::new();
    server
        .start(
            |_addr: SocketAddr, conn: FramedConnection| async move {
                tokio::time::sleep(Duration::from_secs(5)).await;
                drop(conn);
            },
            0,
            "127.0.0.1",
            false,
        )
        .await
        .expect("bind loopback");
    let port = server.local_addr().expect("listening").port();

    let mut conn = FramedConnection::new();
    assert!(conn.connect("127.0.0.1", port).await);

    let window = Duration::from_millis(200);
    let start = Instant::now();
    let result = conn.read_timeout(window).await;
    let elapsed = start.elapsed();

    assert_eq!(result, Err(ReadError::Timeout));
    assert_eq!(result.unwrap_err().sentinel(), TIMEOUT_SENTINEL);
    assert!(elapsed >= window, "returned before the window expired");
    assert!(
        elapsed < window + Duration::from_secs(2),
        "timeout not bounded: {elapsed:?}"
    );

    conn.disconnect().await;
    server.stop().await;
}

#[tokio::test]
async fn test_disconnect_is_idempotent() {
    let (mut server, port) = start_echo_server().await;

    let mut conn = FramedConnection::new();
    assert!(conn.connect("127.0.0.1", port).await);
    assert!(conn.is_connected());

    conn.disconnect().await;
    assert!(!conn.is_connected());
    conn.disconnect().await;
    assert!(!conn.is_connected());

    server.stop().await;
}

#[tokio::test]
async fn test_failed_connect_leaves_connection_reusable() {
    // TEST-NET-1 address; connection attempts cannot succeed.
    let mut conn = FramedConnection::with_config(ConnectionConfig {
        timeout: Duration::from_millis(300),
        ..Default::default()
    });
    assert!(!conn.connect("203.0.113.1", 9).await);
    assert!(!conn.is_connected());

    // A later attempt against a live server succeeds.
    let (mut server, port) = start_echo_server().await;
    assert!(conn.connect("127.0.0.1", port).await);
    assert!(conn.is_connected());

    conn.disconnect().await;
    server.stop().await;
}

#[tokio::test]
async fn test_connect_while_connected_is_rejected() {
    let (mut server, port) = start_echo_server().await;

    let mut conn = FramedConnection::new();
    assert!(conn.connect("127.0.0.1", port).await);

    // Second attempt fails without tearing down the live connection.
    assert!(!conn.connect("127.0.0.1", port).await);
    assert!(conn.is_connected());

    assert!(conn.write(b"still alive").await);
    let reply = conn.read().await.expect("echo reply");
    assert_eq!(&reply[..], b"still alive");

    conn.disconnect().await;
    server.stop().await;
}

#[tokio::test]
async fn test_read_after_peer_closes_is_an_error() {
    // Handler that closes immediately without writing.
    let mut server = Server::new();
    server
        .start(
            |_addr: SocketAddr, mut conn: FramedConnection| async move {
                conn.disconnect().await;
            },
            0,
            "127.0.0.1",
            false,
        )
        .await
        .expect("bind loopback");
    let port = server.local_addr().expect("listening").port();

    let mut conn = FramedConnection::new();
    assert!(conn.connect("127.0.0.1", port).await);

    // The peer's close makes the socket readable with zero bytes: the prefix
    // read hits EOF, which is a framing failure, not a timeout.
    let result = conn.read_timeout(Duration::from_secs(2)).await;
    assert_eq!(result, Err(ReadError::Framing));
    assert_eq!(result.unwrap_err().sentinel(), framewire::ERROR_SENTINEL);

    conn.disconnect().await;
    server.stop().await;
}

#[tokio::test]
async fn test_stop_frees_the_port() {
    let (mut server, port) = start_echo_server().await;
    server.stop().await;

    // A fresh instance can bind the same port.
    let mut second = Server::new();
    second
        .start(echo, port, "127.0.0.1", false)
        .await
        .expect("rebinding a stopped port");

    let mut conn = FramedConnection::new();
    assert!(conn.connect("127.0.0.1", port).await);
    assert!(conn.write(b"after restart").await);
    let reply = conn.read().await.expect("echo reply");
    assert_eq!(&reply[..], b"after restart");

    conn.disconnect().await;
    second.stop().await;
}

#[tokio::test]
#[should_panic(expected = "already listening")]
async fn test_double_start_panics() {
    let mut server = Server::new();
    server
        .start(echo, 0, "127.0.0.1", false)
        .await
        .expect("bind loopback");

    // Second start without an intervening stop is lifecycle misuse.
    let _ = server.start(echo, 0, "127.0.0.1", false).await;
}

#[tokio::test]
async fn test_blocking_start_serves_connections() {
    let mut server = Server::new();
    server
        .start(echo, 0, "127.0.0.1", false)
        .await
        .expect("bind loopback");
    let port = server.local_addr().expect("listening").port();

    // The non-blocking server above gives us a port; now exercise blocking
    // mode on a second server plus a client against it.
    server.stop().await;

    // Blocking mode borrows its caller's task for the accept loop, so that
    // caller has to be a task of its own here; the shutdown handle is what
    // makes the loop return.
    let mut blocking_server = Server::new();
    let shutdown = blocking_server.shutdown_handle();
    let task = tokio::spawn(async move {
        blocking_server
            .start(echo, port, "127.0.0.1", true)
            .await
            .expect("bind loopback");
        blocking_server.stop().await;
        blocking_server
    });

    // Give the blocking loop a moment to bind and enter its poll cycle.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let mut conn = FramedConnection::new();
    assert!(conn.connect("127.0.0.1", port).await);
    assert!(conn.write(b"via blocking loop").await);
    let reply = conn.read().await.expect("echo reply");
    assert_eq!(&reply[..], b"via blocking loop");
    conn.disconnect().await;

    shutdown.shutdown();
    let blocking_server = tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("blocking start did not observe shutdown")
        .expect("server task");
    assert!(!blocking_server.is_running());
    assert!(blocking_server.local_addr().is_none());
}

#[tokio::test]
async fn test_shutdown_handle_stops_blocking_start() {
    let mut server = Server::new();
    let shutdown = server.shutdown_handle();

    let task = tokio::spawn(async move {
        server
            .start(echo, 0, "127.0.0.1", true)
            .await
            .expect("bind loopback");
        // start returning at all is the point; release the listener too.
        server.stop().await;
        server
    });

    // Let the loop bind and start polling before signalling it.
    tokio::time::sleep(Duration::from_millis(150)).await;
    shutdown.shutdown();

    let server = tokio::time::timeout(Duration::from_secs(2), task)
        .await
        .expect("blocking start did not observe shutdown")
        .expect("server task");
    assert!(!server.is_running());
    assert!(server.local_addr().is_none());
}

#[tokio::test]
async fn test_handlers_run_concurrently() {
    // Two clients held open at once prove the accept loop does not block on
    // handler execution.
    let mut server = Server::new();
    server
        .start(
            |_addr: SocketAddr, mut conn: FramedConnection| async move {
                while let Ok(msg) = conn.read().await {
                    if !conn.write(msg).await {
                        break;
                    }
                }
                conn.disconnect().await;
            },
            0,
            "127.0.0.1",
            false,
        )
        .await
        .expect("bind loopback");
    let port = server.local_addr().expect("listening").port();

    let mut first = FramedConnection::new();
    let mut second = FramedConnection::new();
    assert!(first.connect("127.0.0.1", port).await);
    assert!(second.connect("127.0.0.1", port).await);

    // Interleave: second answers while first's handler is still alive.
    assert!(second.write(b"two").await);
    assert_eq!(&second.read().await.expect("reply")[..], b"two");
    assert!(first.write(b"one").await);
    assert_eq!(&first.read().await.expect("reply")[..], b"one");

    first.disconnect().await;
    second.disconnect().await;
    server.stop().await;
}
