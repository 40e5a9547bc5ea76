//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept loop, connection limits)
//!     → tls.rs (TLS handshake, bounded by the read timeout)
//!     → connection.rs (hyper HTTP/1.1, header and deadline limits, tracking)
//!     → Hand off to HTTP layer
//! ```
//!
//! # Design Decisions
//! - Bounded accept queue prevents resource exhaustion
//! - Each connection tracked for graceful shutdown
//! - A slow or oversized client only ever loses its own connection

pub mod connection;
pub mod listener;
pub mod tls;

pub use connection::{serve_connection, ConnectionLimits, ConnectionTracker};
pub use listener::{Listener, ListenerError};
pub use tls::{load_tls_acceptor, TlsError};
