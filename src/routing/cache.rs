//! Bounded LRU store of path → backend index.
//!
//! # Responsibilities
//! - Remember which backend a canonical path was sent to
//! - Promote entries on every hit so hot paths stay resident
//! - Evict the least recently used entry when capacity is exceeded
//!
//! # Design Decisions
//! - Nodes live in a `Vec` arena and link to each other by slot index,
//!   so promotion and eviction are O(1) without pointer cycles
//! - The arena never grows past `capacity`; an eviction reuses the tail slot
//! - One mutex guards map and list together; `get` needs it too because a
//!   hit rewrites the recency order

use std::collections::HashMap;
use std::num::NonZeroUsize;

use parking_lot::Mutex;

/// Default number of affinity entries kept per process.
pub const DEFAULT_CAPACITY: usize = 1024;

#[derive(Debug)]
struct Node {
    key: String,
    value: usize,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug)]
struct Lru {
    map: HashMap<String, usize>,
    nodes: Vec<Node>,
    /// Most recently used slot.
    head: Option<usize>,
    /// Least recently used slot.
    tail: Option<usize>,
}

impl Lru {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            map: HashMap::with_capacity(capacity),
            nodes: Vec::with_capacity(capacity),
            head: None,
            tail: None,
        }
    }

    fn unlink(&mut self, slot: usize) {
        let (prev, next) = {
            let node = &self.nodes[slot];
            (node.prev, node.next)
        };

        match prev {
            Some(p) => self.nodes[p].next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.nodes[n].prev = prev,
            None => self.tail = prev,
        }

        let node = &mut self.nodes[slot];
        node.prev = None;
        node.next = None;
    }

    fn push_front(&mut self, slot: usize) {
        self.nodes[slot].prev = None;
        self.nodes[slot].next = self.head;
        if let Some(old_head) = self.head {
            self.nodes[old_head].prev = Some(slot);
        }
        self.head = Some(slot);
        if self.tail.is_none() {
            self.tail = Some(slot);
        }
    }

    fn promote(&mut self, slot: usize) {
        if self.head == Some(slot) {
            return;
        }
        self.unlink(slot);
        self.push_front(slot);
    }
}

/// Thread-safe LRU cache recording the backend chosen for each path.
///
/// Created once at startup and shared behind an `Arc`. Entries only leave
/// through capacity eviction.
#[derive(Debug)]
pub struct AffinityCache {
    inner: Mutex<Lru>,
    capacity: NonZeroUsize,
}

impl AffinityCache {
    /// Create an empty cache holding at most `capacity` entries.
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            inner: Mutex::new(Lru::with_capacity(capacity.get())),
            capacity,
        }
    }

    /// Look up the backend index for `key`, promoting the entry on a hit.
    pub fn get(&self, key: &str) -> Option<usize> {
        let mut lru = self.inner.lock();
        let slot = *lru.map.get(key)?;
        lru.promote(slot);
        Some(lru.nodes[slot].value)
    }

    /// Insert or overwrite `key`, making it the most recently used entry.
    ///
    /// Returns the key that was evicted to make room, if any.
    pub fn put(&self, key: &str, value: usize) -> Option<String> {
        let mut lru = self.inner.lock();

        if let Some(&slot) = lru.map.get(key) {
            lru.nodes[slot].value = value;
            lru.promote(slot);
            return None;
        }

        if lru.nodes.len() < self.capacity.get() {
            let slot = lru.nodes.len();
            lru.nodes.push(Node {
                key: key.to_owned(),
                value,
                prev: None,
                next: None,
            });
            lru.map.insert(key.to_owned(), slot);
            lru.push_front(slot);
            return None;
        }

        // Full: recycle the tail slot for the new key.
        let slot = lru.tail?;
        lru.unlink(slot);
        let evicted = std::mem::replace(&mut lru.nodes[slot].key, key.to_owned());
        lru.nodes[slot].value = value;
        lru.map.remove(&evicted);
        lru.map.insert(key.to_owned(), slot);
        lru.push_front(slot);
        Some(evicted)
    }

    /// Number of entries currently cached.
    pub fn len(&self) -> usize {
        self.inner.lock().map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// Snapshot of the keys from most to least recently used.
    pub fn keys_by_recency(&self) -> Vec<String> {
        let lru = self.inner.lock();
        let mut keys = Vec::with_capacity(lru.map.len());
        let mut cursor = lru.head;
        while let Some(slot) = cursor {
            let node = &lru.nodes[slot];
            keys.push(node.key.clone());
            cursor = node.next;
        }
        keys
    }
}

impl Default for AffinityCache {
    fn default() -> Self {
        Self::new(NonZeroUsize::new(DEFAULT_CAPACITY).unwrap_or(NonZeroUsize::MIN))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn cache(capacity: usize) -> AffinityCache {
        AffinityCache::new(NonZeroUsize::new(capacity).unwrap())
    }

    /// Walk the list both ways and compare against the map.
    fn assert_consistent(cache: &AffinityCache) {
        let lru = cache.inner.lock();
        assert!(lru.nodes.len() <= cache.capacity());
        assert_eq!(lru.map.len(), lru.nodes.len());

        let mut forward = Vec::new();
        let mut cursor = lru.head;
        let mut prev = None;
        while let Some(slot) = cursor {
            assert_eq!(lru.nodes[slot].prev, prev);
            forward.push(lru.nodes[slot].key.clone());
            prev = Some(slot);
            cursor = lru.nodes[slot].next;
        }
        assert_eq!(lru.tail, prev);

        let listed: HashSet<_> = forward.iter().cloned().collect();
        let mapped: HashSet<_> = lru.map.keys().cloned().collect();
        assert_eq!(forward.len(), listed.len(), "duplicate key in list");
        assert_eq!(listed, mapped);
        for (key, &slot) in &lru.map {
            assert_eq!(&lru.nodes[slot].key, key);
        }
    }

    #[test]
    fn miss_then_hit_after_put() {
        let cache = cache(4);
        assert_eq!(cache.get("/data/a"), None);

        cache.put("/data/a", 2);
        assert_eq!(cache.get("/data/a"), Some(2));
        assert_eq!(cache.len(), 1);
        assert_consistent(&cache);
    }

    #[test]
    fn overflow_evicts_least_recently_inserted() {
        let cache = cache(3);
        assert_eq!(cache.put("/a", 0), None);
        assert_eq!(cache.put("/b", 1), None);
        assert_eq!(cache.put("/c", 2), None);

        assert_eq!(cache.put("/d", 0), Some("/a".to_string()));
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get("/a"), None);
        assert_eq!(cache.keys_by_recency(), vec!["/d", "/c", "/b"]);
        assert_consistent(&cache);
    }

    #[test]
    fn get_protects_entry_from_eviction() {
        let cache = cache(3);
        cache.put("/a", 0);
        cache.put("/b", 1);
        cache.put("/c", 2);

        // "/a" becomes most recent, so "/b" is now the oldest.
        assert_eq!(cache.get("/a"), Some(0));
        assert_eq!(cache.put("/d", 1), Some("/b".to_string()));

        assert_eq!(cache.get("/a"), Some(0));
        assert_eq!(cache.get("/b"), None);
        assert_consistent(&cache);
    }

    #[test]
    fn overwrite_updates_value_and_promotes() {
        let cache = cache(2);
        cache.put("/a", 0);
        cache.put("/b", 1);

        assert_eq!(cache.put("/a", 5), None);
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.keys_by_recency(), vec!["/a", "/b"]);

        assert_eq!(cache.put("/c", 3), Some("/b".to_string()));
        assert_eq!(cache.get("/a"), Some(5));
        assert_consistent(&cache);
    }

    #[test]
    fn repeated_access_is_idempotent() {
        let cache = cache(3);
        cache.put("/a", 1);
        cache.put("/b", 2);

        for _ in 0..10 {
            assert_eq!(cache.get("/b"), Some(2));
            assert_eq!(cache.keys_by_recency(), vec!["/b", "/a"]);
        }
        assert_consistent(&cache);
    }

    #[test]
    fn capacity_one_keeps_only_latest() {
        let cache = cache(1);
        cache.put("/a", 0);
        assert_eq!(cache.put("/b", 1), Some("/a".to_string()));
        assert_eq!(cache.get("/b"), Some(1));
        assert_eq!(cache.get("/a"), None);
        assert_eq!(cache.put("/b", 2), None);
        assert_eq!(cache.get("/b"), Some(2));
        assert_consistent(&cache);
    }

    #[test]
    fn promoting_tail_and_middle_keeps_links_intact() {
        let cache = cache(4);
        for (i, key) in ["/a", "/b", "/c", "/d"].iter().enumerate() {
            cache.put(key, i);
        }

        cache.get("/a"); // tail
        assert_consistent(&cache);
        cache.get("/c"); // middle
        assert_consistent(&cache);
        cache.get("/c"); // already head
        assert_consistent(&cache);

        assert_eq!(cache.keys_by_recency(), vec!["/c", "/a", "/d", "/b"]);
    }

    #[test]
    fn default_capacity() {
        let cache = AffinityCache::default();
        assert_eq!(cache.capacity(), DEFAULT_CAPACITY);
        assert!(cache.is_empty());

        for i in 0..=DEFAULT_CAPACITY {
            cache.put(&format!("/file/{}", i), i % 3);
        }
        assert_eq!(cache.len(), DEFAULT_CAPACITY);
        assert_eq!(cache.get("/file/0"), None);
        assert_eq!(cache.get("/file/1"), Some(1));
    }

    #[test]
    fn concurrent_access_preserves_invariants() {
        let cache = Arc::new(cache(64));
        let mut handles = Vec::new();

        for t in 0..8 {
            let cache = cache.clone();
            handles.push(std::thread::spawn(move || {
                for i in 0..2_000 {
                    let key = format!("/k/{}", (i * 7 + t) % 200);
                    match cache.get(&key) {
                        Some(value) => assert!(value < 8),
                        None => {
                            cache.put(&key, t);
                        }
                    }
                }
            }));
        }

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(cache.len() <= 64);
        assert_consistent(&cache);
    }
}
