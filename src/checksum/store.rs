//! Best-effort checksum result cache.
//!
//! # Design Decisions
//! - Enum dispatch over the backing stores, no trait objects
//! - Store errors and timeouts are logged and behave as a miss or a no-op;
//!   a lookup never fails or stalls because of the cache
//! - An unreachable Redis at startup degrades to `Disabled`

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::checksum::protocol::Checksum;

/// Error talking to an external store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redis: {0}")]
    Redis(#[from] redis::RedisError),
    #[error("redis did not answer within {0:?}")]
    Timeout(Duration),
}

/// Redis-backed store, keyed by file name with no expiry.
///
/// Every command is bounded by the same timeout as the initial connect, so a
/// stalled server costs one timeout per call instead of hanging the lookup.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    timeout: Duration,
}

impl RedisStore {
    pub async fn connect(url: &str, timeout: Duration) -> Result<Self, StoreError> {
        let client = redis::Client::open(url)?;
        let conn = tokio::time::timeout(timeout, client.get_connection_manager())
            .await
            .map_err(|_| StoreError::Timeout(timeout))??;
        Ok(Self { conn, timeout })
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let mut conn = self.conn.clone();
        tokio::time::timeout(self.timeout, conn.get(key))
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))?
            .map_err(StoreError::from)
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        tokio::time::timeout(self.timeout, conn.set(key, value))
            .await
            .map_err(|_| StoreError::Timeout(self.timeout))?
            .map_err(StoreError::from)
    }
}

/// In-process store; shared between clones.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<DashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Raw stored value for `key`.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.entries.get(key).map(|entry| entry.value().clone())
    }

    /// Store a raw value, bypassing validation.
    pub fn insert_raw(&self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }
}

/// Checksum cache consulted before any candidate server.
#[derive(Clone)]
pub enum ChecksumStore {
    Redis(RedisStore),
    Memory(MemoryStore),
    Disabled,
}

impl ChecksumStore {
    /// Connect to Redis, falling back to no cache if that fails.
    pub async fn redis_or_disabled(url: &str, timeout: Duration) -> Self {
        match RedisStore::connect(url, timeout).await {
            Ok(store) => {
                tracing::debug!(url = %url, "Checksum cache connected");
                ChecksumStore::Redis(store)
            }
            Err(e) => {
                tracing::warn!(url = %url, error = %e, "Checksum cache unavailable, continuing without it");
                ChecksumStore::Disabled
            }
        }
    }

    /// Cached checksum for `name`. Errors, malformed values and the
    /// sentinel all read as a miss.
    pub async fn get(&self, name: &str) -> Option<Checksum> {
        let raw = match self {
            ChecksumStore::Redis(store) => match store.get(name).await {
                Ok(value) => value,
                Err(e) => {
                    tracing::warn!(name = %name, error = %e, "Checksum cache read failed");
                    None
                }
            },
            ChecksumStore::Memory(store) => store.raw(name),
            ChecksumStore::Disabled => None,
        }?;

        Checksum::parse(raw.trim().as_bytes()).filter(|sum| !sum.is_sentinel())
    }

    /// Remember `checksum` for `name`. The sentinel is never stored.
    pub async fn put(&self, name: &str, checksum: &Checksum) {
        if checksum.is_sentinel() {
            return;
        }
        match self {
            ChecksumStore::Redis(store) => {
                if let Err(e) = store.set(name, checksum.as_str()).await {
                    tracing::warn!(name = %name, error = %e, "Checksum cache write failed");
                }
            }
            ChecksumStore::Memory(store) => store.insert_raw(name, checksum.as_str()),
            ChecksumStore::Disabled => {}
        }
    }
}

impl std::fmt::Debug for ChecksumStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChecksumStore::Redis(_) => f.write_str("ChecksumStore::Redis"),
            ChecksumStore::Memory(store) => write!(f, "ChecksumStore::Memory({} entries)", store.len()),
            ChecksumStore::Disabled => f.write_str("ChecksumStore::Disabled"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_round_trip() {
        let memory = MemoryStore::new();
        let store = ChecksumStore::Memory(memory.clone());

        assert!(store.get("f.root").await.is_none());

        let sum = Checksum::parse(b"3a8f0bd1").unwrap();
        store.put("f.root", &sum).await;
        assert_eq!(store.get("f.root").await, Some(sum));
        assert_eq!(memory.raw("f.root").as_deref(), Some("3a8f0bd1"));
    }

    #[tokio::test]
    async fn sentinel_never_cached() {
        let memory = MemoryStore::new();
        let store = ChecksumStore::Memory(memory.clone());

        store.put("empty", &Checksum::from_value(1)).await;
        assert!(memory.is_empty());

        memory.insert_raw("legacy", "00000001");
        assert!(store.get("legacy").await.is_none());
    }

    #[tokio::test]
    async fn malformed_cached_value_is_a_miss() {
        let memory = MemoryStore::new();
        memory.insert_raw("f", "garbage");
        let store = ChecksumStore::Memory(memory);
        assert!(store.get("f").await.is_none());
    }

    #[tokio::test]
    async fn disabled_is_always_empty() {
        let store = ChecksumStore::Disabled;
        store.put("f", &Checksum::from_value(0xdead_beef)).await;
        assert!(store.get("f").await.is_none());
    }

    #[tokio::test]
    async fn unreachable_redis_degrades() {
        // Nothing listens on the discard port.
        let store = ChecksumStore::redis_or_disabled("redis://127.0.0.1:9/", Duration::from_millis(500)).await;
        assert!(matches!(store, ChecksumStore::Disabled));
    }

    #[tokio::test]
    async fn silent_server_never_blocks() {
        // Accepts connections and never writes a byte.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let timeout = Duration::from_millis(200);
        let url = format!("redis://{}/", addr);
        let store = tokio::time::timeout(
            Duration::from_secs(2),
            ChecksumStore::redis_or_disabled(&url, timeout),
        )
        .await
        .unwrap();

        let sum = Checksum::from_value(0x1234_5678);
        tokio::time::timeout(Duration::from_secs(2), store.put("f", &sum))
            .await
            .unwrap();
        let cached = tokio::time::timeout(Duration::from_secs(2), store.get("f"))
            .await
            .unwrap();
        assert!(cached.is_none());
    }

    #[tokio::test]
    async fn invalid_redis_url_degrades() {
        let store = ChecksumStore::redis_or_disabled("not-a-url", Duration::from_millis(100)).await;
        assert!(matches!(store, ChecksumStore::Disabled));
    }
}
