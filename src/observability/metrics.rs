//! Metrics collection and exposition.
//!
//! # Metrics
//! - `edge_requests_total` (counter): requests by route kind and status
//! - `edge_request_duration_seconds` (histogram): time to response headers
//! - `edge_upstream_failures_total` (counter): failed upstream attempts by kind
//! - `edge_active_connections` (gauge): client connections currently open
//! - `edge_active_tunnels` (gauge): upgrade tunnels currently relaying

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

/// Install the Prometheus exporter with its own HTTP listener.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics endpoint listening"),
        Err(e) => tracing::error!(error = %e, "Failed to install metrics exporter"),
    }
}

pub fn record_request(route: &'static str, status: u16, start: Instant) {
    metrics::counter!(
        "edge_requests_total",
        "route" => route,
        "status" => status.to_string()
    )
    .increment(1);
    metrics::histogram!("edge_request_duration_seconds", "route" => route)
        .record(start.elapsed().as_secs_f64());
}

pub fn record_upstream_failure(kind: &'static str) {
    metrics::counter!("edge_upstream_failures_total", "kind" => kind).increment(1);
}

pub fn connection_opened() {
    metrics::gauge!("edge_active_connections").increment(1.0);
}

pub fn connection_closed() {
    metrics::gauge!("edge_active_connections").decrement(1.0);
}

pub fn tunnel_opened() {
    metrics::gauge!("edge_active_tunnels").increment(1.0);
}

pub fn tunnel_closed() {
    metrics::gauge!("edge_active_tunnels").decrement(1.0);
}
