//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TLS connection
//!     → server.rs (accept loop, Axum router, middleware)
//!     → request.rs (request ID)
//!     → path.rs (canonical path)
//!     → [routing layer picks the backend]
//!     → redirect.rs (status, Location, authz forwarding)
//!     → Send to client
//! ```

pub mod path;
pub mod redirect;
pub mod request;
pub mod server;

pub use request::X_REQUEST_ID;
pub use server::{AppState, RedirectServer};
