//! Default local application.
//!
//! The edge treats the local application as an opaque `axum::Router`. The
//! binary mounts this one: a health probe plus an optional static directory.

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};
use tower_http::{services::ServeDir, trace::TraceLayer};

use crate::config::LocalConfig;

/// Build the default local application router.
pub fn local_app(config: &LocalConfig) -> Router {
    let router = Router::new().route("/healthz", get(healthz));

    let router = match &config.static_dir {
        Some(dir) => router.fallback_service(ServeDir::new(dir)),
        None => router,
    };

    router.layer(TraceLayer::new_for_http())
}

async fn healthz() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}
