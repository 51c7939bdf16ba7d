//! Request inspection helpers.
//!
//! # Responsibilities
//! - Generate unique request ID (UUID v4) for log correlation
//! - Detect WebSocket/HTTP upgrade requests
//! - Build the upstream URL for a forwarded request
//!
//! # Design Decisions
//! - Request ID only lives in the log span; forwarded headers are never touched
//! - Path and query are replayed exactly as received

use axum::http::{header, HeaderMap, HeaderValue, Uri};
use url::Url;

use crate::config::ProxyTarget;

/// Per-request correlation ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// True when the request asks the server to switch protocols.
///
/// Requires both an `Upgrade` header and an `upgrade` token in `Connection`.
pub fn is_upgrade_request(headers: &HeaderMap) -> bool {
    let has_upgrade = headers.contains_key(header::UPGRADE);
    let connection_upgrade = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|token| token.trim().eq_ignore_ascii_case("upgrade"));

    has_upgrade && connection_upgrade
}

/// Give HTTP/2 requests back their `Host` header.
///
/// HTTP/2 clients carry the authority in `:authority`, which never appears in
/// the header map. An existing `Host` is left untouched.
pub fn restore_host(headers: &mut HeaderMap, uri: &Uri) {
    if headers.contains_key(header::HOST) {
        return;
    }
    if let Some(value) = uri
        .authority()
        .and_then(|authority| HeaderValue::from_str(authority.as_str()).ok())
    {
        headers.insert(header::HOST, value);
    }
}

/// Upstream URL: the backend origin plus the original path and query.
pub fn upstream_url(target: &ProxyTarget, uri: &Uri) -> Result<Url, url::ParseError> {
    let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
    Url::parse(&format!("{}{}", target.origin(), path_and_query))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UpstreamScheme;

    fn target() -> ProxyTarget {
        ProxyTarget {
            host: "127.0.0.1".into(),
            port: 8000,
            scheme: UpstreamScheme::Http,
            verify_tls: true,
        }
    }

    #[test]
    fn upgrade_needs_both_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
        assert!(!is_upgrade_request(&headers));

        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, Upgrade"));
        assert!(is_upgrade_request(&headers));

        headers.remove(header::UPGRADE);
        assert!(!is_upgrade_request(&headers));
    }

    #[test]
    fn upstream_url_keeps_path_and_query() {
        let uri: Uri = "/ws/chat/abc/?session_token=t%20k".parse().unwrap();
        let url = upstream_url(&target(), &uri).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8000/ws/chat/abc/?session_token=t%20k");
    }

    #[test]
    fn upstream_url_ignores_absolute_form_authority() {
        let uri: Uri = "http://edge.example:443/api/messages/".parse().unwrap();
        let url = upstream_url(&target(), &uri).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:8000/api/messages/");
    }

    #[test]
    fn request_ids_are_unique() {
        assert_ne!(RequestId::new(), RequestId::new());
    }

    #[test]
    fn host_restored_from_authority() {
        let uri: Uri = "https://chat.example.test:8443/api/messages/".parse().unwrap();
        let mut headers = HeaderMap::new();
        restore_host(&mut headers, &uri);
        assert_eq!(headers[header::HOST], "chat.example.test:8443");
    }

    #[test]
    fn existing_host_wins() {
        let uri: Uri = "https://edge.internal/api/".parse().unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(header::HOST, HeaderValue::from_static("chat.example.test"));
        restore_host(&mut headers, &uri);
        assert_eq!(headers[header::HOST], "chat.example.test");

        let mut headers = HeaderMap::new();
        restore_host(&mut headers, &"/api/".parse().unwrap());
        assert!(!headers.contains_key(header::HOST));
    }
}
