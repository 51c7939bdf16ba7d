//! Response construction.
//!
//! # Responsibilities
//! - Mirror an upstream status and header block onto a client response
//! - Map upstream failures to `502 Bad Gateway`
//!
//! # Design Decisions
//! - Streaming responses avoid buffering entire body
//! - Upstream headers are copied verbatim, nothing added or stripped

use axum::body::Body;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};

/// Build a client response from an upstream status, header block and body.
pub fn mirror(status: StatusCode, headers: HeaderMap, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    response
}

/// The response every failed forward ends in.
pub fn bad_gateway() -> Response {
    (StatusCode::BAD_GATEWAY, "Upstream request failed").into_response()
}
