//! Affinity routing subsystem.
//!
//! # Data Flow
//! ```text
//! Canonical request path
//!     → cache.rs (AffinityCache lookup, promotes on hit)
//!     → on miss: policy.rs (AssignmentPolicy picks an index)
//!               → cache.rs (put, may evict the LRU entry)
//!     → backends.rs (index → base address)
//! ```
//!
//! # Design Decisions
//! - The cache is the only shared mutable state in the request path
//! - Backend set is immutable after startup and never empty
//! - Assignment is uniform at first sight; no health or load awareness
//! - Affinity is per process and lost on restart

pub mod backends;
pub mod cache;
pub mod policy;
pub mod router;

pub use backends::{BackendError, BackendSet};
pub use cache::AffinityCache;
pub use policy::{AssignmentPolicy, SeededRandom, UniformRandom};
pub use router::{AffinityRouter, RouteDecision};
