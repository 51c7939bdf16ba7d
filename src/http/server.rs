//! Edge server: accept loop and per-request dispatch.
//!
//! # Responsibilities
//! - Accept connections through the bounded listener
//! - Run the TLS handshake with the startup-loaded certificate
//! - Serve HTTP/1.1 (with upgrades) and HTTP/2 on each connection
//! - Classify every request and dispatch it to the local app, the HTTP
//!   forwarder or the upgrade forwarder
//! - Drain in-flight connections on shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::http::Request;
use axum::response::Response;
use axum::Router;
use axum_server::accept::Accept;
use axum_server::tls_rustls::{RustlsAcceptor, RustlsConfig};
use hyper::body::Incoming;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tower::ServiceExt;
use tracing::Instrument;

use crate::config::{EdgeConfig, RouteKind};
use crate::http::error::EdgeError;
use crate::http::forward::HttpForwarder;
use crate::http::request::{is_upgrade_request, RequestId};
use crate::http::websocket::UpgradeForwarder;
use crate::net::{ConnectionTracker, Listener, ListenerError};
use crate::observability::{logging, metrics};
use crate::routing::RouteClassifier;

/// Shared, immutable state handed to every connection.
struct EdgeState {
    classifier: RouteClassifier,
    forwarder: HttpForwarder,
    upgrades: UpgradeForwarder,
    local: Router,
}

impl EdgeState {
    async fn dispatch(
        self: Arc<Self>,
        request: Request<Incoming>,
        peer: SocketAddr,
    ) -> Result<Response, EdgeError> {
        let start = Instant::now();
        let request = request.map(Body::new);
        let request_id = RequestId::new();
        let path = request.uri().path().to_owned();
        let kind = self.classifier.classify(&path);
        let span = logging::request_span(
            request_id.as_str(),
            request.method().as_str(),
            &path,
            kind.as_str(),
        );

        async move {
            tracing::debug!(peer = %peer, "Dispatching request");

            if is_upgrade_request(request.headers()) {
                return self.dispatch_upgrade(request, kind, start).await;
            }

            let response = match kind {
                RouteKind::Local => self.serve_local(request).await,
                // Plain requests on a WebSocket prefix still belong to the backend.
                RouteKind::HttpProxy | RouteKind::WsProxy => self.forwarder.forward(request).await,
            };

            metrics::record_request(kind.as_str(), response.status().as_u16(), start);
            Ok(response)
        }
        .instrument(span)
        .await
    }

    async fn dispatch_upgrade(
        &self,
        request: Request<Body>,
        kind: RouteKind,
        start: Instant,
    ) -> Result<Response, EdgeError> {
        if kind != RouteKind::WsProxy {
            tracing::warn!("Upgrade on a path that is not WebSocket-proxied, dropping connection");
            return Err(EdgeError::UpgradeNotRouted(request.uri().path().to_owned()));
        }

        match self.upgrades.forward(request).await {
            Ok(response) => {
                metrics::record_request(kind.as_str(), response.status().as_u16(), start);
                Ok(response)
            }
            Err(e) => {
                tracing::warn!(error = %e, "Upgrade failed, dropping client connection");
                metrics::record_upstream_failure(e.kind());
                Err(e)
            }
        }
    }

    async fn serve_local(&self, request: Request<Body>) -> Response {
        self.local
            .clone()
            .oneshot(request)
            .await
            .unwrap_or_else(|never| match never {})
    }
}

/// TLS-terminating edge server.
pub struct EdgeServer {
    state: Arc<EdgeState>,
    config: EdgeConfig,
    tracker: ConnectionTracker,
}

impl EdgeServer {
    /// Create a new edge server. `local` handles every `Local` route.
    pub fn new(config: EdgeConfig, local: Router) -> Result<Self, EdgeError> {
        let tracker = ConnectionTracker::new();
        let target = Arc::new(config.backend.clone());

        let state = EdgeState {
            classifier: RouteClassifier::new(&config.routes, config.mode),
            forwarder: HttpForwarder::new(target.clone(), &config.timeouts)?,
            upgrades: UpgradeForwarder::new(target, &config.timeouts, tracker.clone())?,
            local,
        };

        Ok(Self {
            state: Arc::new(state),
            config,
            tracker,
        })
    }

    /// Serve TLS connections until a shutdown signal arrives.
    pub async fn run(
        self,
        listener: Listener,
        tls: RustlsConfig,
        shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        self.serve(listener, RustlsAcceptor::new(tls), shutdown).await
    }

    /// Serve connections handed over by `acceptor` until a shutdown signal arrives.
    pub async fn serve<A>(
        self,
        listener: Listener,
        acceptor: A,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError>
    where
        A: Accept<TcpStream, ()> + Clone + Send + Sync + 'static,
        A::Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static,
        A::Future: Send + 'static,
    {
        tracing::info!(
            address = ?listener.local_addr().ok(),
            mode = %self.config.mode,
            backend = %self.config.backend.origin(),
            "Edge server starting"
        );

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer, permit) = match accepted {
                        Ok(conn) => conn,
                        Err(ListenerError::Accept(e)) => {
                            tracing::error!(error = %e, "Failed to accept connection");
                            continue;
                        }
                        Err(e) => return Err(e),
                    };

                    let guard = self.tracker.track();
                    let state = self.state.clone();
                    let acceptor = acceptor.clone();

                    tokio::spawn(async move {
                        let _permit = permit;
                        let _guard = guard;

                        let stream = match acceptor.accept(stream, ()).await {
                            Ok((stream, _)) => stream,
                            Err(e) => {
                                tracing::debug!(peer = %peer, error = %e, "TLS handshake failed");
                                return;
                            }
                        };

                        let service = service_fn(move |request| state.clone().dispatch(request, peer));
                        let builder = auto::Builder::new(TokioExecutor::new());
                        if let Err(e) = builder
                            .serve_connection_with_upgrades(TokioIo::new(stream), service)
                            .await
                        {
                            tracing::debug!(peer = %peer, error = %e, "Connection ended with error");
                        }
                    });
                }
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting");
                    break;
                }
            }
        }

        let grace = Duration::from_secs(self.config.timeouts.shutdown_grace_secs);
        if self.tracker.wait_for_drain(grace).await {
            tracing::info!("All connections drained");
        } else {
            tracing::warn!(
                remaining = self.tracker.active_count(),
                "Grace period elapsed with connections still open"
            );
        }

        tracing::info!("Edge server stopped");
        Ok(())
    }
}
