//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP/TLS connection
//!     → server.rs (accept loop, protocol detection, dispatch)
//!     → routing (classify path: Local / HttpProxy / WsProxy)
//!     → local.rs      Local     → application router
//!     → forward.rs    HttpProxy → streamed request/response to backend
//!     → websocket.rs  WsProxy   → backend 101, then raw byte tunnel
//!     → response.rs (mirror upstream status/headers, 502 on failure)
//! ```

pub mod error;
pub mod forward;
pub mod local;
pub mod request;
pub mod response;
pub mod server;
pub mod websocket;

pub use error::EdgeError;
pub use forward::HttpForwarder;
pub use local::local_app;
pub use request::{is_upgrade_request, RequestId};
pub use server::EdgeServer;
pub use websocket::{relay, Side, TunnelClose, UpgradeForwarder};
