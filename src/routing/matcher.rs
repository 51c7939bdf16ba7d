//! Route matching logic.
//!
//! # Responsibilities
//! - Match path prefix (case-sensitive)
//!
//! # Design Decisions
//! - Path matching is case-sensitive
//! - Plain prefix comparison: no wildcards, no regex

use crate::config::RoutingRule;

/// Trait for matching request paths against conditions.
pub trait Matcher: Send + Sync + std::fmt::Debug {
    /// Returns true if the path matches this condition.
    fn matches(&self, path: &str) -> bool;
}

/// Matches the request path prefix.
#[derive(Debug, Clone)]
pub struct PathPrefixMatcher {
    prefix: String,
}

impl PathPrefixMatcher {
    /// Create a new path prefix matcher.
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }
}

impl From<&RoutingRule> for PathPrefixMatcher {
    fn from(rule: &RoutingRule) -> Self {
        Self::new(rule.path_prefix.clone())
    }
}

impl Matcher for PathPrefixMatcher {
    fn matches(&self, path: &str) -> bool {
        path.starts_with(&self.prefix)
    }
}
