//! In-process cache store backed by a concurrent hash map.

use super::CacheBackend;
use crate::error::Result;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Clone, Debug)]
struct StoredValue {
    data: Vec<u8>,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_expired(&self) -> bool {
        self.expires_at
            .map(|deadline| Instant::now() >= deadline)
            .unwrap_or(false)
    }
}

/// Thread-safe in-memory store.
///
/// Cloning is cheap and every clone shares the same map, so the cache
/// controller and the salt store can hold their own handle.
///
/// # Example
///
/// ```
/// # use user_query_cache::backend::{CacheBackend, InMemoryBackend};
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() -> user_query_cache::Result<()> {
/// let backend = InMemoryBackend::new();
/// backend.set("users:last_changed", b"salt".to_vec(), None).await?;
/// assert!(backend.exists("users:last_changed").await?);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    store: Arc<DashMap<String, StoredValue>>,
}

impl InMemoryBackend {
    /// Create an empty store.
    pub fn new() -> Self {
        InMemoryBackend {
            store: Arc::new(DashMap::new()),
        }
    }

    /// Number of stored entries, expired ones included until next read.
    pub async fn len(&self) -> usize {
        self.store.len()
    }

    /// Whether the store holds no entries.
    pub async fn is_empty(&self) -> bool {
        self.store.is_empty()
    }
}

impl CacheBackend for InMemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let expired = match self.store.get(key) {
            Some(entry) if !entry.is_expired() => {
                debug!("✓ InMemory GET {} -> HIT", key);
                return Ok(Some(entry.data.clone()));
            }
            Some(_) => true,
            None => false,
        };

        if expired {
            self.store.remove(key);
            debug!("InMemory GET {} -> EXPIRED", key);
        } else {
            debug!("InMemory GET {} -> MISS", key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        let expires_at = ttl.map(|d| Instant::now() + d);
        self.store.insert(
            key.to_string(),
            StoredValue {
                data: value,
                expires_at,
            },
        );

        if let Some(d) = ttl {
            debug!("✓ InMemory SET {} (TTL: {:?})", key, d);
        } else {
            debug!("✓ InMemory SET {}", key);
        }
        Ok(())
    }
}
