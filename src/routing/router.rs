//! Route classification.
//!
//! # Responsibilities
//! - Store the compiled routing table
//! - Classify a request path as local, HTTP-proxied or WebSocket-proxied
//!
//! # Design Decisions
//! - Immutable after construction (thread-safe without locks)
//! - O(n) path prefix scan in table order (acceptable for typical route counts)
//! - Production mode short-circuits to `Local`: an external load balancer
//!   routes by path in front of the edge

use crate::config::{RouteKind, RoutingRule, RuntimeMode};
use crate::routing::matcher::{Matcher, PathPrefixMatcher};

/// Compiled routing table plus the runtime mode.
#[derive(Debug)]
pub struct RouteClassifier {
    mode: RuntimeMode,
    routes: Vec<(PathPrefixMatcher, RouteKind)>,
}

impl RouteClassifier {
    /// Compile the routing table, preserving configured order.
    pub fn new(rules: &[RoutingRule], mode: RuntimeMode) -> Self {
        let routes = rules
            .iter()
            .map(|rule| (PathPrefixMatcher::from(rule), rule.kind))
            .collect();
        Self { mode, routes }
    }

    /// Classify a request path. First matching prefix wins, no match is local.
    pub fn classify(&self, path: &str) -> RouteKind {
        if self.mode == RuntimeMode::Prod {
            return RouteKind::Local;
        }

        self.routes
            .iter()
            .find(|(matcher, _)| matcher.matches(path))
            .map(|(_, kind)| *kind)
            .unwrap_or(RouteKind::Local)
    }
}

const DEFAULT_TABLE: &[(&str, RouteKind)] = &[
    ("/api/", RouteKind::HttpProxy),
    ("/media/", RouteKind::HttpProxy),
    ("/ws/", RouteKind::WsProxy),
];

/// Classify against the default table (`/api/`, `/media/`, `/ws/`).
pub fn classify(path: &str, mode: RuntimeMode) -> RouteKind {
    if mode == RuntimeMode::Prod {
        return RouteKind::Local;
    }

    DEFAULT_TABLE
        .iter()
        .find(|(prefix, _)| path.starts_with(prefix))
        .map(|(_, kind)| *kind)
        .unwrap_or(RouteKind::Local)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::default_routes;

    const PATHS: &[&str] = &[
        "/",
        "/api/messages/",
        "/media/avatars/a.png",
        "/ws/chat/abc/",
        "/chat/abc",
        "/apiary",
        "/WS/chat/",
        "",
    ];

    #[test]
    fn prod_mode_is_always_local() {
        let classifier = RouteClassifier::new(&default_routes(), RuntimeMode::Prod);
        for path in PATHS {
            assert_eq!(classify(path, RuntimeMode::Prod), RouteKind::Local, "{path}");
            assert_eq!(classifier.classify(path), RouteKind::Local, "{path}");
        }
    }

    #[test]
    fn dev_mode_uses_prefix_table() {
        assert_eq!(classify("/api/messages/", RuntimeMode::Dev), RouteKind::HttpProxy);
        assert_eq!(classify("/media/avatars/a.png", RuntimeMode::Dev), RouteKind::HttpProxy);
        assert_eq!(classify("/ws/chat/abc/", RuntimeMode::Dev), RouteKind::WsProxy);
        assert_eq!(classify("/chat/abc", RuntimeMode::Dev), RouteKind::Local);
        assert_eq!(classify("/apiary", RuntimeMode::Dev), RouteKind::Local);
        assert_eq!(classify("/api", RuntimeMode::Dev), RouteKind::Local);
        assert_eq!(classify("/WS/chat/", RuntimeMode::Dev), RouteKind::Local);
    }

    #[test]
    fn compiled_table_matches_free_function() {
        let classifier = RouteClassifier::new(&default_routes(), RuntimeMode::Dev);
        for path in PATHS {
            assert_eq!(classifier.classify(path), classify(path, RuntimeMode::Dev), "{path}");
        }
    }

    #[test]
    fn first_match_wins() {
        let rules = vec![
            RoutingRule::new("/api/ws/", RouteKind::WsProxy),
            RoutingRule::new("/api/", RouteKind::HttpProxy),
            RoutingRule::new("/api/ws/never", RouteKind::Local),
        ];
        let classifier = RouteClassifier::new(&rules, RuntimeMode::Dev);

        assert_eq!(classifier.classify("/api/ws/never"), RouteKind::WsProxy);
        assert_eq!(classifier.classify("/api/users/"), RouteKind::HttpProxy);
    }

    #[test]
    fn empty_table_is_local() {
        let classifier = RouteClassifier::new(&[], RuntimeMode::Dev);
        assert_eq!(classifier.classify("/api/x"), RouteKind::Local);
    }
}
