//! Cache store backends.
//!
//! The store is an external collaborator: anything that can get and set
//! opaque bytes by string key. Group namespacing (`users`) is applied by the
//! key builder before a key reaches the backend.

mod inmemory;

pub use inmemory::InMemoryBackend;

use crate::error::Result;
use std::time::Duration;

/// Key-value store the cache reads from and writes to.
///
/// Implementations must give read-your-writes consistency per key. No
/// cross-key transactions are needed, and entries are never deleted:
/// invalidation only moves salts.
#[allow(async_fn_in_trait)]
pub trait CacheBackend: Send + Sync + Clone {
    /// Fetch the value stored under `key`, `None` on miss.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Store `value` under `key`. `ttl` of `None` means no expiry.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()>;

    /// Whether `key` currently holds a value.
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }
}
