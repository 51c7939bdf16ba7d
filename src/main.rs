//! Chat edge server.
//!
//! # Architecture Overview
//!
//! ```text
//! Client (TLS)
//!     → net::listener (bounded accept) → net::tls (handshake)
//!     → http::server (hyper connection, upgrades enabled)
//!     → routing::RouteClassifier
//!         Local     → http::local (application router)
//!         HttpProxy → http::forward  ──→ Backend
//!         WsProxy   → http::websocket ─→ Backend (101, then byte tunnel)
//! ```

use std::path::PathBuf;

use clap::Parser;

use chat_edge::config::{load_config, validate_config, ConfigError, RuntimeMode};
use chat_edge::http::local_app;
use chat_edge::lifecycle::{prepare, signals, Shutdown};
use chat_edge::observability::{logging, metrics};

#[derive(Parser)]
#[command(name = "chat-edge")]
#[command(about = "TLS-terminating edge for the chat application", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "chat-edge.toml")]
    config: PathBuf,

    /// Override the configured runtime mode.
    #[arg(long)]
    mode: Option<RuntimeMode>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = load_config(&cli.config)?;
    if let Some(mode) = cli.mode {
        config.mode = mode;
        validate_config(&config).map_err(ConfigError::Validation)?;
    }

    logging::init_logging(&config.observability);
    tracing::info!(
        config = ?cli.config,
        mode = %config.mode,
        bind_address = %config.listener.bind_address,
        max_connections = config.listener.max_connections,
        "chat-edge v0.1.0 starting"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let local = local_app(&config.local);
    let prepared = prepare(config, local).await?;

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        signals::wait_for_signal().await;
        shutdown.trigger();
    });

    prepared
        .server
        .run(prepared.listener, prepared.tls, server_shutdown)
        .await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
