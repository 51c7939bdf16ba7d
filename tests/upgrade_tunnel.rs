//! WebSocket upgrade tunnelling through a running edge, checked at the byte level.

mod common;

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use common::{dev_config, start_edge, start_upgrade_backend, UpgradeBehavior};

const TIMEOUT: Duration = Duration::from_secs(5);
const EARLY: &[u8] = b"\x81\x05hello";

async fn send_upgrade(edge: SocketAddr, path: &str) -> TcpStream {
    let mut stream = TcpStream::connect(edge).await.unwrap();
    let request = format!(
        "GET {path} HTTP/1.1\r\n\
         Host: chat.example.test\r\n\
         Connection: Upgrade\r\n\
         Upgrade: websocket\r\n\
         Sec-WebSocket-Version: 13\r\n\
         Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
         Cookie: sessionid=abc\r\n\r\n"
    );
    stream.write_all(request.as_bytes()).await.unwrap();
    stream
}

/// Read until the response head is complete and at least `extra` bytes
/// follow it. Returns the head and everything after it.
async fn read_response(stream: &mut TcpStream, extra: usize) -> (String, Vec<u8>) {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        if let Some(end) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            let body_start = end + 4;
            if buf.len() >= body_start + extra {
                let head = String::from_utf8_lossy(&buf[..body_start]).into_owned();
                return (head, buf[body_start..].to_vec());
            }
        }
        let n = tokio::time::timeout(TIMEOUT, stream.read(&mut chunk))
            .await
            .expect("edge did not answer")
            .unwrap();
        assert!(n > 0, "connection closed before response completed: {buf:?}");
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// True once the peer has closed or reset the connection.
async fn closed_by_peer(stream: &mut TcpStream) -> bool {
    let mut rest = Vec::new();
    match tokio::time::timeout(TIMEOUT, stream.read_to_end(&mut rest)).await {
        Ok(Ok(_)) => rest.is_empty(),
        Ok(Err(_)) => true,
        Err(_) => false,
    }
}

#[tokio::test]
async fn upgrade_relays_handshake_early_bytes_and_traffic() {
    let mut backend = start_upgrade_backend(UpgradeBehavior::Echo, EARLY).await;
    let (edge, _shutdown) = start_edge(dev_config(backend.addr)).await;

    let mut client = send_upgrade(edge, "/ws/chat/room1/?session_token=abc").await;
    let (head, after) = read_response(&mut client, EARLY.len()).await;

    assert!(head.starts_with("HTTP/1.1 101"), "unexpected head: {head}");
    let lower = head.to_ascii_lowercase();
    assert!(lower.contains("x-backend-tunnel: 1"), "backend headers not mirrored: {head}");
    assert!(lower.contains("upgrade: websocket"));
    assert_eq!(after, EARLY);

    let forwarded = tokio::time::timeout(TIMEOUT, backend.heads.recv())
        .await
        .unwrap()
        .unwrap();
    assert!(forwarded.starts_with("GET /ws/chat/room1/?session_token=abc HTTP/1.1\r\n"));
    let forwarded = forwarded.to_ascii_lowercase();
    assert!(forwarded.contains("host: chat.example.test"));
    assert!(forwarded.contains("sec-websocket-key: dghlihnhbxbszsbub25jzq=="));
    assert!(forwarded.contains("cookie: sessionid=abc"));

    client.write_all(b"ping-bytes").await.unwrap();
    let mut echoed = [0u8; 10];
    tokio::time::timeout(TIMEOUT, client.read_exact(&mut echoed))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(&echoed, b"ping-bytes");
}

#[tokio::test]
async fn backend_close_tears_down_client() {
    let backend = start_upgrade_backend(UpgradeBehavior::CloseAfterHandshake, EARLY).await;
    let (edge, _shutdown) = start_edge(dev_config(backend.addr)).await;

    let mut client = send_upgrade(edge, "/ws/chat/room1/").await;
    let (head, after) = read_response(&mut client, EARLY.len()).await;
    assert!(head.starts_with("HTTP/1.1 101"));
    assert_eq!(after, EARLY);

    assert!(closed_by_peer(&mut client).await);
}

#[tokio::test]
async fn client_close_tears_down_backend() {
    let mut backend = start_upgrade_backend(UpgradeBehavior::Echo, b"").await;
    let (edge, _shutdown) = start_edge(dev_config(backend.addr)).await;

    let mut client = send_upgrade(edge, "/ws/chat/room1/").await;
    let (head, _) = read_response(&mut client, 0).await;
    assert!(head.starts_with("HTTP/1.1 101"));
    drop(client);

    tokio::time::timeout(TIMEOUT, backend.closed.recv())
        .await
        .expect("backend socket was not closed")
        .unwrap();
}

#[tokio::test]
async fn refused_upgrade_destroys_client_socket() {
    let mut backend = start_upgrade_backend(UpgradeBehavior::Refuse, b"").await;
    let (edge, _shutdown) = start_edge(dev_config(backend.addr)).await;

    let mut client = send_upgrade(edge, "/ws/chat/room1/").await;
    assert!(closed_by_peer(&mut client).await);

    // The backend did see the attempt.
    assert!(tokio::time::timeout(TIMEOUT, backend.heads.recv())
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn upgrade_on_unproxied_path_is_dropped() {
    let mut backend = start_upgrade_backend(UpgradeBehavior::Echo, b"").await;
    let (edge, _shutdown) = start_edge(dev_config(backend.addr)).await;

    let mut client = send_upgrade(edge, "/api/messages/").await;
    assert!(closed_by_peer(&mut client).await);

    let mut client = send_upgrade(edge, "/chat/room1").await;
    assert!(closed_by_peer(&mut client).await);

    assert!(backend.heads.try_recv().is_err());
}

#[tokio::test]
async fn unreachable_backend_destroys_client_socket() {
    let (edge, _shutdown) = start_edge(dev_config(common::dead_addr().await)).await;

    let mut client = send_upgrade(edge, "/ws/chat/room1/").await;
    assert!(closed_by_peer(&mut client).await);
}
