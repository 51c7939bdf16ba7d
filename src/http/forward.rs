//! HTTP request forwarding to the backend.
//!
//! # Responsibilities
//! - Replay method, path, query and headers to the backend verbatim
//! - Stream the request body upstream and the response body back
//! - Turn every upstream failure into `502 Bad Gateway`
//!
//! # Data Flow
//! ```text
//! Client ── request body stream ──→ Edge ── request body stream ──→ Backend
//! Client ←── status, headers, body stream ── Edge ←── response ─── Backend
//! ```

use std::sync::Arc;
use std::time::Duration;

use axum::body::{Body, HttpBody};
use axum::http::Request;
use axum::response::Response;

use crate::config::{ProxyTarget, TimeoutConfig};
use crate::http::error::EdgeError;
use crate::http::request::{restore_host, upstream_url};
use crate::http::response::{bad_gateway, mirror};
use crate::observability::metrics;

/// Forwards single request/response pairs to the backend.
#[derive(Clone)]
pub struct HttpForwarder {
    client: reqwest::Client,
    target: Arc<ProxyTarget>,
    response_timeout: Duration,
}

impl HttpForwarder {
    pub fn new(target: Arc<ProxyTarget>, timeouts: &TimeoutConfig) -> Result<Self, reqwest::Error> {
        if !target.verify_tls {
            tracing::warn!(
                backend = %target.origin(),
                "Backend certificate validation is disabled"
            );
        }

        let client = reqwest::Client::builder()
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
        })
    }

    /// Forward one request. Never fails: upstream errors become a 502.
    pub async fn forward(&self, request: Request<Body>) -> Response {
        match self.try_forward(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, backend = %self.target.origin(), "Upstream error");
                metrics::record_upstream_failure(e.kind());
                bad_gateway()
            }
        }
    }

    async fn try_forward(&self, request: Request<Body>) -> Result<Response, EdgeError> {
        let (mut parts, body) = request.into_parts();
        restore_host(&mut parts.headers, &parts.uri);
        let url = upstream_url(&self.target, &parts.uri)?;

        let mut upstream = self
            .client
            .request(parts.method, url)
            .headers(parts.headers);

        // An empty body must stay empty: a streamed one would go out chunked.
        if !body.is_end_stream() {
            upstream = upstream.body(reqwest::Body::wrap_stream(body.into_data_stream()));
        }

        let response = tokio::time::timeout(self.response_timeout, upstream.send())
            .await
            .map_err(|_| EdgeError::UpstreamTimeout(self.response_timeout))??;

        let status = response.status();
        let headers = response.headers().clone();
        tracing::debug!(status = %status, "Upstream responded");

        Ok(mirror(status, headers, Body::from_stream(response.bytes_stream())))
    }
}
