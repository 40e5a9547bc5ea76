//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with the redirect handler on every path and method
//! - Wire up middleware (tracing, request ID)
//! - Run the TLS accept loop, one task per connection
//! - On shutdown, ask open connections to finish and wait for them

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::sync::broadcast;
use tokio_rustls::TlsAcceptor;
use tower_http::trace::TraceLayer;

use crate::config::RedirectorConfig;
use crate::http::redirect::redirect_handler;
use crate::http::request::request_id_layer;
use crate::net::connection::{serve_connection, ConnectionLimits, ConnectionTracker};
use crate::net::listener::{Accepted, Listener, ListenerError};
use crate::routing::cache::DEFAULT_CAPACITY;
use crate::routing::{AffinityRouter, BackendError, BackendSet, UniformRandom};

/// Application state injected into handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    pub router: Arc<AffinityRouter>,
}

/// Build the Axum router with all middleware layers.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .fallback(redirect_handler)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(request_id_layer())
}

/// HTTPS redirect server.
pub struct RedirectServer {
    app: Router,
    router: Arc<AffinityRouter>,
    limits: ConnectionLimits,
    tracker: ConnectionTracker,
    shutdown_grace: Duration,
}

impl RedirectServer {
    /// Create a server around an existing affinity router.
    pub fn new(router: Arc<AffinityRouter>, limits: ConnectionLimits) -> Self {
        let app = build_router(AppState {
            router: router.clone(),
        });
        Self {
            app,
            router,
            limits,
            tracker: ConnectionTracker::new(),
            shutdown_grace: Duration::from_secs(10),
        }
    }

    /// Create a server from validated configuration with uniform random
    /// assignment.
    pub fn from_config(config: &RedirectorConfig) -> Result<Self, BackendError> {
        let backends = BackendSet::new(&config.servers)?;
        let capacity = NonZeroUsize::new(config.cache_capacity)
            .or(NonZeroUsize::new(DEFAULT_CAPACITY))
            .unwrap_or(NonZeroUsize::MIN);
        let router = Arc::new(AffinityRouter::new(
            backends,
            capacity,
            Arc::new(UniformRandom::new()),
        ));
        let limits = ConnectionLimits {
            read_timeout: config.read_timeout(),
            write_timeout: config.write_timeout(),
            max_header_bytes: config.max_header_bytes,
        };

        tracing::info!(
            backends = router.backends().len(),
            cache_capacity = capacity.get(),
            "Affinity router ready"
        );

        let mut server = Self::new(router, limits);
        server.shutdown_grace = config.shutdown_grace();
        Ok(server)
    }

    /// The request router, for serving connections directly.
    pub fn app(&self) -> Router {
        self.app.clone()
    }

    pub fn router(&self) -> &Arc<AffinityRouter> {
        &self.router
    }

    pub fn limits(&self) -> &ConnectionLimits {
        &self.limits
    }

    /// Accept TLS connections until `shutdown` fires, then wait up to the
    /// grace period for open connections to finish.
    pub async fn run(
        self,
        listener: Listener,
        tls: TlsAcceptor,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), ListenerError> {
        if let Ok(addr) = listener.local_addr() {
            tracing::info!(address = %addr, "HTTPS redirector starting");
        }

        loop {
            let accepted = tokio::select! {
                accepted = listener.accept() => accepted,
                _ = shutdown.recv() => {
                    tracing::info!("Shutdown signal received, no longer accepting");
                    break;
                }
            };

            let Accepted { stream, peer, slot } = match accepted {
                Ok(accepted) => accepted,
                Err(ListenerError::Accept(e)) => {
                    tracing::warn!(error = %e, "Accept failed");
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let guard = self.tracker.track();
            let mut stop = shutdown.resubscribe();
            let tls = tls.clone();
            let app = self.app.clone();
            let limits = self.limits;

            tokio::spawn(async move {
                let _slot = slot;
                let connection_id = guard.id();

                let stream = match tokio::time::timeout(limits.read_timeout, tls.accept(stream)).await {
                    Ok(Ok(stream)) => stream,
                    Ok(Err(e)) => {
                        tracing::debug!(connection_id = %connection_id, peer = %peer, error = %e, "TLS handshake failed");
                        return;
                    }
                    Err(_) => {
                        tracing::debug!(connection_id = %connection_id, peer = %peer, "TLS handshake timed out");
                        return;
                    }
                };

                let stop = async move {
                    let _ = stop.recv().await;
                };
                if let Err(e) = serve_connection(stream, app, &limits, stop).await {
                    tracing::debug!(connection_id = %connection_id, peer = %peer, error = %e, "Connection ended with error");
                }
                drop(guard);
            });
        }

        let open = self.tracker.active_count();
        if open > 0 {
            tracing::info!(open_connections = open, "Draining connections");
            if tokio::time::timeout(self.shutdown_grace, self.tracker.wait_idle())
                .await
                .is_err()
            {
                tracing::warn!(
                    open_connections = self.tracker.active_count(),
                    "Shutdown grace period elapsed with connections still open"
                );
            }
        }

        tracing::info!("HTTPS redirector stopped");
        Ok(())
    }
}
