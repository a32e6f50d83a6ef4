//! Echo server + client demo.
//!
//! Starts an accept-loop server on loopback, connects a framed client to it,
//! sends one message, and prints the echoed reply.
//!
//! ```sh
//! cargo run --example echo
//! ```

use framewire::{FramedConnection, Server};
use std::net::SocketAddr;
use tracing::info;

async fn echo_handler(addr: SocketAddr, mut conn: FramedConnection) {
    info!("connection from {addr}");
    if let Ok(msg) = conn.read().await {
        conn.write(msg).await;
    }
    conn.disconnect().await;
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let mut server = Server::new();
    server.start(echo_handler, 0, "127.0.0.1", false).await?;
    let port = server.local_addr().expect("listening").port();
    info!("echo server listening on 127.0.0.1:{port}");

    let mut conn = FramedConnection::new();
    if !conn.connect("127.0.0.1", port).await {
        return Err("could not connect to the echo server".into());
    }

    conn.write("If you see this message, framewire is working!")
        .await;
    match conn.read().await {
        Ok(reply) => info!("reply: {}", String::from_utf8_lossy(&reply)),
        Err(err) => info!("read failed: {err}"),
    }

    conn.disconnect().await;
    server.stop().await;
    Ok(())
}
