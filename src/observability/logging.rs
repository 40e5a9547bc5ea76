//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the global tracing subscriber
//! - Honor `RUST_LOG`, falling back to a per-binary default filter
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - The checksum client writes logs to stderr so stdout carries only the result

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter for the redirector service.
pub const DEFAULT_FILTER: &str = "redirector=info,tower_http=info";

/// Install a stdout fmt subscriber filtered by `RUST_LOG` or `default_filter`.
pub fn init(default_filter: &str) {
    tracing_subscriber::registry()
        .with(env_filter(default_filter))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Install a stderr fmt subscriber, used by command-line tools whose stdout
/// is machine-read.
pub fn init_stderr(default_filter: &str) {
    tracing_subscriber::registry()
        .with(env_filter(default_filter))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn env_filter(default_filter: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into())
}
