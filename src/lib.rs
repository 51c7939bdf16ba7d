//! TLS-terminating chat edge.
//!
//! Decides per request whether to serve the local application or forward to
//! the chat backend, and relays WebSocket upgrades to the backend byte for byte.

// Core subsystems
pub mod config;
pub mod http;
pub mod net;
pub mod routing;

// Cross-cutting concerns
pub mod lifecycle;
pub mod observability;

pub use config::EdgeConfig;
pub use http::EdgeServer;
pub use lifecycle::Shutdown;
