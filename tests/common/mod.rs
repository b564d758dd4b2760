//! Local stand-ins for the REST and stream servers.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

pub const WAIT: Duration = Duration::from_secs(5);

/// Route crate logs to the test output; `RUST_LOG` overrides the default
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("orderbook_sync=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Server half of an accepted stream connection
pub type ServerSocket = WebSocketStream<TcpStream>;

pub struct Reply {
    pub status: &'static str,
    pub headers: &'static [(&'static str, &'static str)],
    pub body: &'static str,
}

impl Reply {
    pub fn ok(body: &'static str) -> Self {
        Self {
            status: "200 OK",
            headers: &[],
            body,
        }
    }
}

/// Serve `replies` in order and return the base URL plus a feed of request
/// lines (`GET /path?query HTTP/1.1`)
pub async fn serve_http(replies: Vec<Reply>) -> (String, mpsc::UnboundedReceiver<String>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        for reply in replies {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };

            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
                match socket.read(&mut chunk).await {
                    Ok(0) | Err(_) => break,
                    Ok(n) => buf.extend_from_slice(&chunk[..n]),
                }
            }
            let request = String::from_utf8_lossy(&buf);
            let line = request.lines().next().unwrap_or_default().to_string();
            let _ = tx.send(line);

            let mut response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n",
                reply.status,
                reply.body.len()
            );
            for (name, value) in reply.headers {
                response.push_str(&format!("{}: {}\r\n", name, value));
            }
            response.push_str("\r\n");
            response.push_str(reply.body);

            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });

    (format!("http://{}", addr), rx)
}

/// Accept stream connections on 127.0.0.1 and hand each completed handshake
/// to the returned receiver
pub async fn serve_ws() -> (String, mpsc::UnboundedReceiver<ServerSocket>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let tx = tx.clone();
            tokio::spawn(async move {
                if let Ok(ws) = accept_async(stream).await {
                    let _ = tx.send(ws);
                }
            });
        }
    });

    (format!("ws://{}", addr), rx)
}

/// Like [`serve_ws`], but hold each TCP connection for `delay` before
/// answering the handshake; the counter tracks TCP accepts
pub async fn serve_ws_slow(
    delay: Duration,
) -> (String, Arc<AtomicUsize>, mpsc::UnboundedReceiver<ServerSocket>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepted);
    let (tx, rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            let tx = tx.clone();
            tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                if let Ok(ws) = accept_async(stream).await {
                    let _ = tx.send(ws);
                }
            });
        }
    });

    (format!("ws://{}", addr), accepted, rx)
}

/// Next text frame as JSON, or `None` once the client is gone
pub async fn next_json(socket: &mut ServerSocket) -> Option<Value> {
    loop {
        match timeout(WAIT, socket.next()).await.ok()?? {
            Ok(Message::Text(text)) => return serde_json::from_str(&text).ok(),
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => continue,
        }
    }
}

/// Next accepted connection together with its first frame
pub async fn next_connection(
    conns: &mut mpsc::UnboundedReceiver<ServerSocket>,
) -> (ServerSocket, Value) {
    let mut socket = timeout(WAIT, conns.recv())
        .await
        .expect("no stream connection")
        .expect("server stopped");
    let first = next_json(&mut socket)
        .await
        .expect("connection delivered no frame");
    (socket, first)
}

/// Poll `check` until it holds or `WAIT` passes
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + WAIT;
    while tokio::time::Instant::now() < deadline {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
