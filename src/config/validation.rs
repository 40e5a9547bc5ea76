//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Non-empty, well-formed backend list
//! - Value ranges (timeouts > 0, buffer sizes hyper accepts)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RedirectorConfig → Result<(), Vec<ValidationError>>

use crate::config::schema::{split_listen_addr, RedirectorConfig};
use crate::routing::BackendSet;

/// Smallest header buffer the HTTP/1 connection builder accepts.
pub const MIN_HEADER_BYTES: usize = 8192;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("empty servers list")]
    EmptyServers,
    #[error("server {index}: {reason}")]
    InvalidServer { index: usize, reason: String },
    #[error("invalid listen address {0:?}")]
    InvalidAddr(String),
    #[error("invalid metrics address {0:?}")]
    InvalidMetricsAddr(String),
    #[error("{field} must be greater than zero")]
    Zero { field: &'static str },
    #[error("MaxHeaderBytes must be at least {min}, got {actual}")]
    HeaderBytesTooSmall { min: usize, actual: usize },
}

pub fn validate_config(config: &RedirectorConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.servers.is_empty() {
        errors.push(ValidationError::EmptyServers);
    }
    for (index, server) in config.servers.iter().enumerate() {
        if let Err(e) = BackendSet::new([server]) {
            errors.push(ValidationError::InvalidServer {
                index,
                reason: e.to_string(),
            });
        }
    }

    if split_listen_addr(&config.addr).is_none() {
        errors.push(ValidationError::InvalidAddr(config.addr.clone()));
    }
    if let Some(metrics_addr) = &config.metrics_addr {
        if split_listen_addr(metrics_addr).is_none() {
            errors.push(ValidationError::InvalidMetricsAddr(metrics_addr.clone()));
        }
    }

    let positive = [
        ("CacheCapacity", config.cache_capacity as u64),
        ("ReadTimeoutSecs", config.read_timeout_secs),
        ("WriteTimeoutSecs", config.write_timeout_secs),
        ("MaxConnections", config.max_connections as u64),
    ];
    for (field, value) in positive {
        if value == 0 {
            errors.push(ValidationError::Zero { field });
        }
    }

    if config.max_header_bytes < MIN_HEADER_BYTES {
        errors.push(ValidationError::HeaderBytesTooSmall {
            min: MIN_HEADER_BYTES,
            actual: config.max_header_bytes,
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
