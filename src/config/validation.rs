//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, ports valid)
//! - Refuse insecure backend settings outside development
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EdgeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use crate::config::schema::{EdgeConfig, RuntimeMode};

/// A single semantic problem found in a config.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("route prefix '{0}' must start with '/'")]
    RoutePrefix(String),

    #[error("backend host must not be empty")]
    EmptyBackendHost,

    #[error("backend port must not be 0")]
    ZeroBackendPort,

    #[error("backend.verify_tls = false is only allowed in dev mode")]
    InsecureBackendInProd,

    #[error("timeouts.{0} must be greater than 0")]
    ZeroTimeout(&'static str),

    #[error("listener.max_connections must be greater than 0")]
    ZeroMaxConnections,

    #[error("listener.tls.{0} must not be empty")]
    EmptyTlsPath(&'static str),
}

/// Validate a deserialized config.
pub fn validate_config(config: &EdgeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    for rule in &config.routes {
        if !rule.path_prefix.starts_with('/') {
            errors.push(ValidationError::RoutePrefix(rule.path_prefix.clone()));
        }
    }

    if config.backend.host.trim().is_empty() {
        errors.push(ValidationError::EmptyBackendHost);
    }
    if config.backend.port == 0 {
        errors.push(ValidationError::ZeroBackendPort);
    }
    if !config.backend.verify_tls {
        match config.mode {
            RuntimeMode::Prod => errors.push(ValidationError::InsecureBackendInProd),
            RuntimeMode::Dev if !config.backend.is_loopback() => {
                tracing::warn!(
                    host = %config.backend.host,
                    "Backend certificate validation disabled for a non-local host"
                );
            }
            RuntimeMode::Dev => {}
        }
    }

    if config.timeouts.connect_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("connect_secs"));
    }
    if config.timeouts.response_secs == 0 {
        errors.push(ValidationError::ZeroTimeout("response_secs"));
    }
    if config.listener.max_connections == 0 {
        errors.push(ValidationError::ZeroMaxConnections);
    }

    if let Some(tls) = &config.listener.tls {
        if tls.cert_path.is_empty() {
            errors.push(ValidationError::EmptyTlsPath("cert_path"));
        }
        if tls.key_path.is_empty() {
            errors.push(ValidationError::EmptyTlsPath("key_path"));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
