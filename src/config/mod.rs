//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → EdgeConfig (validated, immutable)
//!     → shared via Arc to all subsystems
//! ```
//!
//! # Design Decisions
//! - Config is loaded once and never reloaded; the routing table and backend
//!   target are constant for the process lifetime
//! - Sections have defaults to allow minimal configs, except `backend`
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    EdgeConfig, ListenerConfig, LocalConfig, LogFormat, ObservabilityConfig, ProxyTarget,
    RouteKind, RoutingRule, RuntimeMode, TimeoutConfig, TlsConfig, UpstreamScheme,
};
pub use validation::{validate_config, ValidationError};
