//! Connection serving and lifecycle tracking.
//!
//! # Responsibilities
//! - Drive one HTTP/1.1 connection through hyper with the configured limits
//! - Number connections for log correlation
//! - Count open connections so shutdown can wait for them to finish

use std::future::Future;
use std::pin::pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use hyper::server::conn::http1;
use hyper_util::rt::{TokioIo, TokioTimer};
use hyper_util::service::TowerToHyperService;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;

use crate::observability::metrics;

/// Serial number of a tracked connection, for log correlation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Per-connection resource bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionLimits {
    /// TLS handshake and request header deadline.
    pub read_timeout: Duration,
    /// Extra allowance for writing responses.
    pub write_timeout: Duration,
    /// Header buffer bound; hyper requires at least 8192.
    pub max_header_bytes: usize,
}

impl ConnectionLimits {
    /// Deadline for the whole connection.
    pub fn connection_deadline(&self) -> Duration {
        self.read_timeout + self.write_timeout
    }
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(60),
            max_header_bytes: 12288,
        }
    }
}

/// Why a connection ended abnormally.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    #[error("http: {0}")]
    Http(#[from] hyper::Error),
    #[error("connection exceeded its {0:?} deadline")]
    DeadlineExceeded(Duration),
}

/// Serve HTTP/1.1 requests from `io` with `app` until the peer closes,
/// an error occurs, or the connection deadline passes.
///
/// When `stop` resolves the connection finishes its in-flight response and
/// closes; an idle keep-alive connection closes at once. The transport never
/// adds a `Date` header.
pub async fn serve_connection<I, S>(
    io: I,
    app: Router,
    limits: &ConnectionLimits,
    stop: S,
) -> Result<(), ConnectionError>
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    S: Future<Output = ()>,
{
    let mut builder = http1::Builder::new();
    builder
        .timer(TokioTimer::new())
        .header_read_timeout(limits.read_timeout)
        .max_buf_size(limits.max_header_bytes)
        .auto_date_header(false);

    let connection = builder.serve_connection(TokioIo::new(io), TowerToHyperService::new(app));

    let drive = async {
        let mut connection = pin!(connection);
        let stop = pin!(stop);
        tokio::select! {
            result = connection.as_mut() => result,
            _ = stop => {
                connection.as_mut().graceful_shutdown();
                connection.await
            }
        }
    };

    let deadline = limits.connection_deadline();
    match tokio::time::timeout(deadline, drive).await {
        Ok(result) => result.map_err(ConnectionError::from),
        Err(_) => Err(ConnectionError::DeadlineExceeded(deadline)),
    }
}

/// Open-connection count, observable so shutdown can wait for zero.
#[derive(Debug, Clone)]
pub struct ConnectionTracker {
    open: Arc<watch::Sender<u64>>,
    serial: Arc<AtomicU64>,
}

impl ConnectionTracker {
    pub fn new() -> Self {
        let (open, _) = watch::channel(0);
        Self {
            open: Arc::new(open),
            serial: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Count a new connection until the returned guard drops.
    pub fn track(&self) -> ConnectionGuard {
        let mut now = 0;
        self.open.send_modify(|open| {
            *open += 1;
            now = *open;
        });
        metrics::record_active_connections(now);

        ConnectionGuard {
            open: Arc::clone(&self.open),
            id: ConnectionId(self.serial.fetch_add(1, Ordering::Relaxed) + 1),
        }
    }

    pub fn active_count(&self) -> u64 {
        *self.open.borrow()
    }

    /// Resolve once no tracked connection remains.
    pub async fn wait_idle(&self) {
        let mut open = self.open.subscribe();
        // The sender lives in `self`, so the channel cannot close here.
        let _ = open.wait_for(|count| *count == 0).await;
    }
}

impl Default for ConnectionTracker {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps one connection counted.
#[derive(Debug)]
pub struct ConnectionGuard {
    open: Arc<watch::Sender<u64>>,
    id: ConnectionId,
}

impl ConnectionGuard {
    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        let mut now = 0;
        self.open.send_modify(|open| {
            *open = open.saturating_sub(1);
            now = *open;
        });
        metrics::record_active_connections(now);
        tracing::trace!(connection_id = %self.id, "Connection released");
    }
}
