//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request path
//!     → router.rs (mode check, table scan)
//!     → matcher.rs (evaluate prefix conditions)
//!     → Return: RouteKind (Local / HttpProxy / WsProxy)
//!
//! Route Compilation (at startup):
//!     RoutingRule[]
//!     → Compile prefix matchers, keep configured order
//!     → Freeze as immutable RouteClassifier
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - No regex in hot path (prefix matching only)
//! - Deterministic: same input always classifies the same way
//! - First match wins; no match is local

pub mod matcher;
pub mod router;

pub use router::{classify, RouteClassifier};
