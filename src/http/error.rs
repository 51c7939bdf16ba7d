//! Errors raised while forwarding a request or an upgrade.

use std::time::Duration;

use axum::http::StatusCode;

/// Failure of a single forwarded request or upgrade.
///
/// Returning one of these from the connection service makes hyper drop the
/// client connection without writing a response.
#[derive(Debug, thiserror::Error)]
pub enum EdgeError {
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    #[error("upstream did not answer within {0:?}")]
    UpstreamTimeout(Duration),

    #[error("invalid upstream url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("backend refused upgrade with status {0}")]
    UpgradeRefused(StatusCode),

    #[error("upgrade requested for unrouted path {0}")]
    UpgradeNotRouted(String),
}

impl EdgeError {
    /// Label used for the upstream failure metric.
    pub fn kind(&self) -> &'static str {
        match self {
            EdgeError::Upstream(e) if e.is_connect() => "connect",
            EdgeError::Upstream(e) if e.is_timeout() => "timeout",
            EdgeError::Upstream(_) => "upstream",
            EdgeError::UpstreamTimeout(_) => "timeout",
            EdgeError::InvalidUrl(_) => "invalid_url",
            EdgeError::UpgradeRefused(_) => "upgrade_refused",
            EdgeError::UpgradeNotRouted(_) => "upgrade_not_routed",
        }
    }
}
