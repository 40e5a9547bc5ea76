//! Affinity routing decision.
//!
//! Combines the backend set, the affinity cache and the assignment policy
//! into a single lookup used by the redirect handler.

use std::num::NonZeroUsize;
use std::sync::Arc;

use crate::observability::metrics;
use crate::routing::backends::BackendSet;
use crate::routing::cache::AffinityCache;
use crate::routing::policy::AssignmentPolicy;

/// Outcome of routing one canonical path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteDecision {
    /// Index into the backend set.
    pub index: usize,
    /// Whether the index came from the affinity cache.
    pub cache_hit: bool,
}

/// Sticky path → backend router.
pub struct AffinityRouter {
    backends: BackendSet,
    cache: AffinityCache,
    policy: Arc<dyn AssignmentPolicy>,
}

impl std::fmt::Debug for AffinityRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AffinityRouter")
            .field("backends", &self.backends)
            .field("cache_len", &self.cache.len())
            .field("cache_capacity", &self.cache.capacity())
            .finish()
    }
}

impl AffinityRouter {
    pub fn new(
        backends: BackendSet,
        capacity: NonZeroUsize,
        policy: Arc<dyn AssignmentPolicy>,
    ) -> Self {
        Self {
            backends,
            cache: AffinityCache::new(capacity),
            policy,
        }
    }

    /// Resolve `path` (already canonical) to a backend, assigning one on a miss.
    ///
    /// Two concurrent misses for the same path may both assign; the later
    /// `put` wins. Any backend is a valid answer, so this is tolerated.
    pub fn route(&self, path: &str) -> RouteDecision {
        if let Some(index) = self.cache.get(path) {
            metrics::record_affinity_lookup(true);
            return RouteDecision {
                index,
                cache_hit: true,
            };
        }
        metrics::record_affinity_lookup(false);

        let count = self.backends.len();
        let index = self.policy.choose(count).min(count - 1);
        if let Some(evicted) = self.cache.put(path, index) {
            tracing::trace!(evicted = %evicted, "Affinity entry evicted");
            metrics::record_affinity_eviction();
        }
        metrics::record_cache_size(self.cache.len());

        RouteDecision {
            index,
            cache_hit: false,
        }
    }

    pub fn backends(&self) -> &BackendSet {
        &self.backends
    }

    pub fn cache(&self) -> &AffinityCache {
        &self.cache
    }
}
