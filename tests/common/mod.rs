//! Shared utilities for edge integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;

use axum::body::{to_bytes, Body};
use axum::http::Request;
use axum::{Json, Router};
use axum_server::accept::DefaultAcceptor;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

use chat_edge::config::{
    EdgeConfig, LocalConfig, ProxyTarget, RuntimeMode, TimeoutConfig, UpstreamScheme,
};
use chat_edge::http::local_app;
use chat_edge::net::Listener;
use chat_edge::{EdgeServer, Shutdown};

/// Start a backend that answers every request with a JSON description of it.
pub async fn start_echo_backend() -> SocketAddr {
    let app = Router::new().fallback(echo);
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

async fn echo(request: Request<Body>) -> (axum::http::StatusCode, [(&'static str, &'static str); 1], Json<Value>) {
    let (parts, body) = request.into_parts();
    let body = to_bytes(body, 16 * 1024 * 1024).await.unwrap_or_default();

    let headers: serde_json::Map<String, Value> = parts
        .headers
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_owned(),
                Value::String(value.to_str().unwrap_or_default().to_owned()),
            )
        })
        .collect();

    let status = if parts.uri.path().ends_with("/missing") {
        axum::http::StatusCode::NOT_FOUND
    } else {
        axum::http::StatusCode::OK
    };

    (
        status,
        [("x-backend", "echo")],
        Json(json!({
            "method": parts.method.as_str(),
            "path": parts.uri.path(),
            "query": parts.uri.query(),
            "headers": headers,
            "body_len": body.len(),
            "body": String::from_utf8_lossy(&body),
        })),
    )
}

/// How the raw upgrade backend answers.
#[derive(Debug, Clone, Copy)]
pub enum UpgradeBehavior {
    /// 101 plus `early` bytes in one write, then echo.
    Echo,
    /// 101 plus `early` bytes, then close.
    CloseAfterHandshake,
    /// 403 instead of 101.
    Refuse,
}

pub struct UpgradeBackend {
    pub addr: SocketAddr,
    /// Request head of every upgrade the backend received.
    pub heads: mpsc::UnboundedReceiver<String>,
    /// Signalled when an echoing tunnel sees its peer go away.
    pub closed: mpsc::UnboundedReceiver<()>,
}

/// Start a raw TCP backend that completes HTTP upgrades by hand.
pub async fn start_upgrade_backend(behavior: UpgradeBehavior, early: &'static [u8]) -> UpgradeBackend {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (tx, heads) = mpsc::unbounded_channel();
    let (closed_tx, closed) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let tx = tx.clone();
            let closed_tx = closed_tx.clone();
            tokio::spawn(async move {
                let Some(head) = read_head(&mut socket).await else {
                    return;
                };
                let _ = tx.send(head);

                if let UpgradeBehavior::Refuse = behavior {
                    let _ = socket
                        .write_all(b"HTTP/1.1 403 Forbidden\r\nContent-Length: 0\r\n\r\n")
                        .await;
                    return;
                }

                let mut response = b"HTTP/1.1 101 Switching Protocols\r\n\
                    Connection: Upgrade\r\n\
                    Upgrade: websocket\r\n\
                    X-Backend-Tunnel: 1\r\n\r\n"
                    .to_vec();
                response.extend_from_slice(early);
                if socket.write_all(&response).await.is_err() {
                    return;
                }

                if let UpgradeBehavior::CloseAfterHandshake = behavior {
                    return;
                }

                let mut buf = [0u8; 4096];
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => {
                            let _ = closed_tx.send(());
                            return;
                        }
                        Ok(n) => {
                            if socket.write_all(&buf[..n]).await.is_err() {
                                return;
                            }
                        }
                    }
                }
            });
        }
    });

    UpgradeBackend {
        addr,
        heads,
        closed,
    }
}

/// Read up to the end of an HTTP head. Returns the head as text.
pub async fn read_head(socket: &mut TcpStream) -> Option<String> {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        match socket.read(&mut byte).await {
            Ok(1) => head.push(byte[0]),
            _ => return None,
        }
    }
    Some(String::from_utf8_lossy(&head).into_owned())
}

/// An address with nothing listening on it.
pub async fn dead_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// Dev-mode config pointing at a plain-HTTP backend.
pub fn dev_config(backend: SocketAddr) -> EdgeConfig {
    let mut config = EdgeConfig::with_backend(ProxyTarget {
        host: backend.ip().to_string(),
        port: backend.port(),
        scheme: UpstreamScheme::Http,
        verify_tls: true,
    });
    config.mode = RuntimeMode::Dev;
    config.timeouts = TimeoutConfig {
        connect_secs: 2,
        response_secs: 5,
        shutdown_grace_secs: 1,
    };
    config
}

/// Run an edge without TLS on an ephemeral port. Dropping the returned
/// `Shutdown` stops it.
pub async fn start_edge(config: EdgeConfig) -> (SocketAddr, Shutdown) {
    let tcp = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = tcp.local_addr().unwrap();
    let listener = Listener::from_tcp(tcp, 64);

    let server = EdgeServer::new(config, local_app(&LocalConfig::default())).unwrap();
    let shutdown = Shutdown::new();
    let rx = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.serve(listener, DefaultAcceptor::new(), rx).await;
    });

    (addr, shutdown)
}

/// HTTP client that never goes through a system proxy.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder().no_proxy().build().unwrap()
}
