//! Startup orchestration.
//!
//! # Responsibilities
//! - Load TLS material
//! - Build the edge server and its upstream clients
//! - Bind the listener
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Subsystems initialize in order, not concurrently
//! - The listener binds last (traffic only when ready)

use std::path::Path;

use axum::Router;
use axum_server::tls_rustls::RustlsConfig;

use crate::config::EdgeConfig;
use crate::http::{EdgeError, EdgeServer};
use crate::net::{load_tls_config, Listener, ListenerError, TlsError};

/// Fatal startup failure.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("listener.tls is required: the edge never serves plaintext")]
    MissingTls,

    #[error("failed to load TLS material: {0}")]
    Tls(#[from] TlsError),

    #[error("failed to build upstream clients: {0}")]
    Server(#[from] EdgeError),

    #[error("failed to start listener: {0}")]
    Listener(#[from] ListenerError),
}

/// Everything needed to start serving.
pub struct Prepared {
    pub server: EdgeServer,
    pub listener: Listener,
    pub tls: RustlsConfig,
}

/// Initialize subsystems in order: TLS, server, listener.
pub async fn prepare(config: EdgeConfig, local: Router) -> Result<Prepared, StartupError> {
    let tls_paths = config.listener.tls.clone().ok_or(StartupError::MissingTls)?;
    let tls = load_tls_config(Path::new(&tls_paths.cert_path), Path::new(&tls_paths.key_path)).await?;

    let listener_config = config.listener.clone();
    let server = EdgeServer::new(config, local)?;
    let listener = Listener::bind(&listener_config).await?;

    Ok(Prepared {
        server,
        listener,
        tls,
    })
}
