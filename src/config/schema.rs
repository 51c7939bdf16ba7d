//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the edge.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the edge server.
///
/// `backend` has no default on purpose: the TLS-verification toggle toward
/// the backend must always be stated in the config file.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EdgeConfig {
    /// Runtime mode. Proxying only happens in `dev`.
    #[serde(default)]
    pub mode: RuntimeMode,

    /// Listener configuration (bind address, TLS).
    #[serde(default)]
    pub listener: ListenerConfig,

    /// Ordered routing table, first matching prefix wins.
    #[serde(default = "default_routes")]
    pub routes: Vec<RoutingRule>,

    /// The single backend service every proxied request goes to.
    pub backend: ProxyTarget,

    /// Timeout configuration.
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Local application settings.
    #[serde(default)]
    pub local: LocalConfig,
}

impl EdgeConfig {
    /// Build a config for the given backend with every other section defaulted.
    pub fn with_backend(backend: ProxyTarget) -> Self {
        Self {
            mode: RuntimeMode::default(),
            listener: ListenerConfig::default(),
            routes: default_routes(),
            backend,
            timeouts: TimeoutConfig::default(),
            observability: ObservabilityConfig::default(),
            local: LocalConfig::default(),
        }
    }
}

/// Runtime mode flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RuntimeMode {
    /// Development: the edge routes `/api`, `/media` and `/ws` to the backend itself.
    Dev,
    /// Production: an external load balancer routes by path, everything here is local.
    #[default]
    Prod,
}

impl std::str::FromStr for RuntimeMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "dev" => Ok(Self::Dev),
            "prod" => Ok(Self::Prod),
            other => Err(format!("unknown mode '{}', expected 'dev' or 'prod'", other)),
        }
    }
}

impl std::fmt::Display for RuntimeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuntimeMode::Dev => write!(f, "dev"),
            RuntimeMode::Prod => write!(f, "prod"),
        }
    }
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8443").
    pub bind_address: String,

    /// TLS material. Required by the binary; there is no plaintext fallback.
    pub tls: Option<TlsConfig>,

    /// Maximum concurrent connections (backpressure).
    pub max_connections: usize,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8443".to_string(),
            tls: None,
            max_connections: 10_000,
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// What the edge does with a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteKind {
    /// Hand off to the local application handler.
    Local,
    /// Forward the request/response pair to the backend.
    HttpProxy,
    /// Relay the WebSocket upgrade and its byte stream to the backend.
    WsProxy,
}

impl RouteKind {
    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteKind::Local => "local",
            RouteKind::HttpProxy => "http_proxy",
            RouteKind::WsProxy => "ws_proxy",
        }
    }
}

/// A single entry of the routing table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RoutingRule {
    /// Path prefix to match (case-sensitive).
    pub path_prefix: String,

    /// Route kind selected when the prefix matches.
    pub kind: RouteKind,
}

impl RoutingRule {
    pub fn new(path_prefix: impl Into<String>, kind: RouteKind) -> Self {
        Self {
            path_prefix: path_prefix.into(),
            kind,
        }
    }
}

/// The routing table used when the config file does not list routes.
pub fn default_routes() -> Vec<RoutingRule> {
    vec![
        RoutingRule::new("/api/", RouteKind::HttpProxy),
        RoutingRule::new("/media/", RouteKind::HttpProxy),
        RoutingRule::new("/ws/", RouteKind::WsProxy),
    ]
}

/// Upstream scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpstreamScheme {
    Http,
    Https,
}

impl UpstreamScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            UpstreamScheme::Http => "http",
            UpstreamScheme::Https => "https",
        }
    }
}

/// Backend target.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ProxyTarget {
    /// Backend host name or IP.
    pub host: String,

    /// Backend port.
    pub port: u16,

    /// Scheme used toward the backend.
    pub scheme: UpstreamScheme,

    /// Validate the backend certificate. Only a local self-signed development
    /// backend may turn this off.
    pub verify_tls: bool,
}

impl ProxyTarget {
    /// `scheme://host:port` without a trailing slash.
    pub fn origin(&self) -> String {
        format!("{}://{}:{}", self.scheme.as_str(), self.host, self.port)
    }

    /// True when the host names the local machine.
    pub fn is_loopback(&self) -> bool {
        match self.host.parse::<std::net::IpAddr>() {
            Ok(ip) => ip.is_loopback(),
            Err(_) => self.host.eq_ignore_ascii_case("localhost"),
        }
    }
}

/// Timeout configuration for various operations.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Upstream connection establishment timeout in seconds.
    pub connect_secs: u64,

    /// Time to wait for upstream response headers in seconds.
    pub response_secs: u64,

    /// How long in-flight connections may drain after a shutdown signal.
    pub shutdown_grace_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_secs: 5,
            response_secs: 30,
            shutdown_grace_secs: 10,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

/// Local application configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct LocalConfig {
    /// Directory served for local routes. `None` serves only `/healthz`.
    pub static_dir: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn minimal_config_fills_defaults() {
        let config: EdgeConfig = toml::from_str(
            r#"
            [backend]
            host = "127.0.0.1"
            port = 8000
            scheme = "http"
            verify_tls = true
            "#,
        )
        .unwrap();

        assert_eq!(config.mode, RuntimeMode::Prod);
        assert_eq!(config.routes, default_routes());
        assert_eq!(config.backend.origin(), "http://127.0.0.1:8000");
        assert!(config.listener.tls.is_none());
    }

    #[test]
    fn verify_tls_is_mandatory() {
        let result = toml::from_str::<EdgeConfig>(
            r#"
            [backend]
            host = "127.0.0.1"
            port = 8000
            scheme = "https"
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn route_kinds_parse_snake_case() {
        let config: EdgeConfig = toml::from_str(
            r#"
            mode = "dev"

            [[routes]]
            path_prefix = "/ws/"
            kind = "ws_proxy"

            [backend]
            host = "localhost"
            port = 8000
            scheme = "http"
            verify_tls = false
            "#,
        )
        .unwrap();

        assert_eq!(config.mode, RuntimeMode::Dev);
        assert_eq!(config.routes, vec![RoutingRule::new("/ws/", RouteKind::WsProxy)]);
        assert!(config.backend.is_loopback());
    }
}
