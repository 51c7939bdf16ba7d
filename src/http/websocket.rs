//! WebSocket upgrade forwarding.
//!
//! # Responsibilities
//! - Replay the client's upgrade request on a separate backend connection
//! - Answer the client with our own `101 Switching Protocols` carrying the
//!   backend's header block
//! - Relay raw bytes both ways until either peer goes away
//!
//! # Data Flow
//! ```text
//! Client ── GET /ws/… Upgrade ──→ Edge ── GET /ws/… Upgrade ──→ Backend
//! Client ←── 101 + backend headers ── Edge ←── 101 + headers [+ early bytes]
//! Client ←───────────── raw bytes ─────────────→ Backend
//! ```
//!
//! # Design Decisions
//! - Byte-level relay: frames are never parsed, masked or re-encoded
//! - Bytes the backend pipelined behind its 101 stay buffered in the backend
//!   connection and are the first thing relayed to the client
//! - The first direction to end tears down the whole tunnel; no half-open state
//! - Refused or failed upgrades surface as an error so the client socket is
//!   dropped instead of answered

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode, Version};
use axum::response::Response;
use hyper_util::rt::TokioIo;
use tokio::io::{AsyncRead, AsyncWrite};
use tracing::Instrument;

use crate::config::{ProxyTarget, TimeoutConfig};
use crate::http::error::EdgeError;
use crate::http::request::{restore_host, upstream_url};
use crate::http::response::mirror;
use crate::net::ConnectionTracker;
use crate::observability::metrics;

/// Which peer ended a tunnel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Client,
    Backend,
}

/// How a tunnel ended.
#[derive(Debug)]
pub struct TunnelClose {
    /// The peer whose read side finished first.
    pub side: Side,
    /// Bytes relayed away from that peer before it finished.
    pub bytes: u64,
    /// Set when the peer failed instead of closing cleanly.
    pub error: Option<std::io::Error>,
}

/// Relay bytes between the two sockets of a tunnel.
///
/// Returns as soon as either direction sees EOF or an error. Both sockets are
/// dropped on return, which closes them.
pub async fn relay<C, B>(client: C, backend: B) -> TunnelClose
where
    C: AsyncRead + AsyncWrite,
    B: AsyncRead + AsyncWrite,
{
    let (mut client_read, mut client_write) = tokio::io::split(client);
    let (mut backend_read, mut backend_write) = tokio::io::split(backend);

    let (side, result) = tokio::select! {
        result = tokio::io::copy(&mut client_read, &mut backend_write) => (Side::Client, result),
        result = tokio::io::copy(&mut backend_read, &mut client_write) => (Side::Backend, result),
    };

    match result {
        Ok(bytes) => TunnelClose { side, bytes, error: None },
        Err(e) => TunnelClose { side, bytes: 0, error: Some(e) },
    }
}

/// Forwards WebSocket upgrades to the backend.
#[derive(Clone)]
pub struct UpgradeForwarder {
    client: reqwest::Client,
    target: Arc<ProxyTarget>,
    response_timeout: Duration,
    tracker: ConnectionTracker,
}

impl UpgradeForwarder {
    pub fn new(
        target: Arc<ProxyTarget>,
        timeouts: &TimeoutConfig,
        tracker: ConnectionTracker,
    ) -> Result<Self, reqwest::Error> {
        // Upgrades only exist in HTTP/1.1, so never negotiate h2 with the backend.
        let client = reqwest::Client::builder()
            .http1_only()
            .danger_accept_invalid_certs(!target.verify_tls)
            .connect_timeout(Duration::from_secs(timeouts.connect_secs))
            .redirect(reqwest::redirect::Policy::none())
            .pool_max_idle_per_host(0)
            .no_proxy()
            .build()?;

        Ok(Self {
            client,
            target,
            response_timeout: Duration::from_secs(timeouts.response_secs),
            tracker,
        })
    }

    /// Perform the backend handshake and hand back the `101` for the client.
    ///
    /// The relay itself runs on a spawned task once the client side of the
    /// upgrade completes.
    pub async fn forward(&self, mut request: Request<Body>) -> Result<Response, EdgeError> {
        let client_upgrade = hyper::upgrade::on(&mut request);
        let (mut parts, _body) = request.into_parts();
        restore_host(&mut parts.headers, &parts.uri);
        let url = upstream_url(&self.target, &parts.uri)?;

        let handshake = self
            .client
            .request(parts.method, url)
            .version(Version::HTTP_11)
            .headers(parts.headers)
            .send();

        let response = tokio::time::timeout(self.response_timeout, handshake)
            .await
            .map_err(|_| EdgeError::UpstreamTimeout(self.response_timeout))??;

        let status = response.status();
        if status != StatusCode::SWITCHING_PROTOCOLS {
            return Err(EdgeError::UpgradeRefused(status));
        }

        let headers = response.headers().clone();
        let backend = response.upgrade().await?;
        let guard = self.tracker.track();

        tokio::spawn(
            async move {
                let _guard = guard;
                let client = match client_upgrade.await {
                    Ok(upgraded) => TokioIo::new(upgraded),
                    Err(e) => {
                        tracing::warn!(error = %e, "Client side of upgrade failed, closing backend");
                        return;
                    }
                };

                metrics::tunnel_opened();
                tracing::debug!("Tunnel open");
                let close = relay(client, backend).await;
                metrics::tunnel_closed();

                match close.error {
                    Some(e) => tracing::warn!(side = ?close.side, error = %e, "Tunnel failed, both sockets closed"),
                    None => tracing::debug!(side = ?close.side, bytes = close.bytes, "Tunnel closed"),
                }
            }
            .in_current_span(),
        );

        Ok(mirror(StatusCode::SWITCHING_PROTOCOLS, headers, Body::empty()))
    }
}
