//! Startup orchestration.
//!
//! # Responsibilities
//! - Initialize subsystems in dependency order from validated configuration
//! - Load TLS material and bind the listener
//! - Run the redirect server until shutdown
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listener binds last, after everything it serves is ready

use std::path::Path;

use crate::config::schema::resolve_listen_addr;
use crate::config::RedirectorConfig;
use crate::http::RedirectServer;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::spawn_signal_handler;
use crate::net::{load_tls_acceptor, Listener, ListenerError, TlsError};
use crate::observability::metrics;
use crate::routing::BackendError;

/// Fatal startup or listener failure.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("listen address {addr:?}: {source}")]
    Addr {
        addr: String,
        source: std::io::Error,
    },
    #[error("configuration file: {0}")]
    Backends(#[from] BackendError),
    #[error(transparent)]
    Tls(#[from] TlsError),
    #[error(transparent)]
    Listener(#[from] ListenerError),
}

/// Bring the redirector up and serve until SIGINT/SIGTERM.
pub async fn run(config: RedirectorConfig) -> Result<(), StartupError> {
    let addr = config
        .listen_addr()
        .await
        .map_err(|source| StartupError::Addr {
            addr: config.addr.clone(),
            source,
        })?;

    if let Some(metrics_addr) = &config.metrics_addr {
        match resolve_listen_addr(metrics_addr).await {
            Ok(resolved) => metrics::init_metrics(resolved),
            Err(e) => tracing::error!(metrics_address = %metrics_addr, error = %e, "Metrics exporter disabled"),
        }
    }

    let server = RedirectServer::from_config(&config)?;
    let tls = load_tls_acceptor(Path::new(&config.cert), Path::new(&config.key))?;
    let listener = Listener::bind(addr, config.max_connections).await?;

    let shutdown = Shutdown::new();
    let signals = spawn_signal_handler(shutdown.clone());

    server.run(listener, tls, shutdown.subscribe()).await?;
    signals.abort();
    Ok(())
}
