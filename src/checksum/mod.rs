//! Checksum collaborator subsystem.
//!
//! # Data Flow
//! ```text
//! checksum-client <name>
//!     → store.rs (cached value? done)
//!     → client.rs (candidate 1 → candidate 2 → ... first usable reply)
//!         ↔ protocol.rs ("path\n" → 8 hex chars)
//!         ↔ server.rs on each storage node (Adler-32 of the file)
//!     → store.rs (remember the result)
//! ```
//!
//! # Design Decisions
//! - `00000001` is the "not usable" sentinel even though it is also the
//!   checksum of an empty file
//! - Sequential failover; a sentinel-only pass is retried once after a pause

pub mod client;
pub mod protocol;
pub mod server;
pub mod store;

pub use client::{ChecksumClient, ChecksumError, ClientConfig};
pub use protocol::{Checksum, SENTINEL};
pub use store::{ChecksumStore, MemoryStore, RedisStore};
