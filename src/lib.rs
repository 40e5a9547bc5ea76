//! Affinity redirector library.
//!
//! An HTTPS front end that answers every request with a redirect to one of
//! N storage backends, remembering per path which backend it chose, plus the
//! checksum protocol spoken with the storage nodes.

pub mod checksum;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod routing;

pub use config::RedirectorConfig;
pub use http::RedirectServer;
pub use lifecycle::Shutdown;
pub use routing::{AffinityCache, AffinityRouter};
