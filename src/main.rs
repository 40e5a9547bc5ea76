//! Affinity redirector.
//!
//! ```text
//!     Client Request         ┌──────────────────────────────────────────────┐
//!     ───────────────────────┼─▶ net (TLS listener) ─▶ http (redirect)      │
//!                            │                            │                 │
//!                            │                            ▼                 │
//!                            │                 routing: AffinityCache       │
//!                            │                   miss → AssignmentPolicy    │
//!                            │                            │                 │
//!     302/307 + Location     │                            ▼                 │
//!     ◀──────────────────────┼──────────────── backend[i] + canonical path  │
//!                            └──────────────────────────────────────────────┘
//!     Client follows Location to the storage backend.
//! ```
//!
//! Usage: `redirector redirector.json`

use std::path::PathBuf;

use clap::Parser;

use redirector::config::load_config;
use redirector::lifecycle::startup;
use redirector::observability::logging;

#[derive(Parser)]
#[command(name = "redirector")]
#[command(about = "HTTPS redirector with per-path backend affinity", long_about = None)]
struct Cli {
    /// JSON configuration file.
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    logging::init(logging::DEFAULT_FILTER);

    tracing::info!("redirector v{} starting", env!("CARGO_PKG_VERSION"));

    let config = load_config(&cli.config)?;

    tracing::info!(
        addr = %config.addr,
        servers = config.servers.len(),
        cache_capacity = config.cache_capacity,
        read_timeout_secs = config.read_timeout_secs,
        "Configuration loaded"
    );

    startup::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
