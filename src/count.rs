//! Cache for per-site user counts.
//!
//! Keyed on `count_users_{site}_{site salt}`, so anything that bumps a
//! site's users salt also retires its cached count.

use crate::backend::CacheBackend;
use crate::error::Result;
use crate::key::CacheKeyBuilder;
use crate::repository::UserCounter;
use crate::salt::{SaltScope, SaltStore};
use crate::value::{CacheValue, CountStrategy, SiteId, UserCounts};

tokio::task_local! {
    static COUNT_IN_PROGRESS: bool;
}

/// Whether the current task is inside a counter call made by the cache.
///
/// The host's count API usually routes back through the interception
/// point; nested calls must fall through to the real count instead of
/// recursing.
pub fn count_in_progress() -> bool {
    COUNT_IN_PROGRESS.try_with(|active| *active).unwrap_or(false)
}

#[derive(Clone)]
pub struct CountCache<B: CacheBackend> {
    backend: B,
    salts: SaltStore<B>,
    group: String,
}

impl<B: CacheBackend> CountCache<B> {
    pub fn new(backend: B, group: impl Into<String>) -> Self {
        let group = group.into();
        CountCache {
            salts: SaltStore::new(backend.clone(), group.clone()),
            backend,
            group,
        }
    }

    /// Cached counts for `site_id`, computing through `counter` on a miss.
    ///
    /// Returns `Ok(None)` when called re-entrantly from inside `counter`,
    /// meaning "not intercepted": the caller should count directly.
    pub async fn count_users<C: UserCounter>(
        &self,
        counter: &C,
        strategy: CountStrategy,
        site_id: SiteId,
    ) -> Result<Option<UserCounts>> {
        if count_in_progress() {
            debug!("Nested count for site {}, not intercepting", site_id);
            return Ok(None);
        }

        let salt = match self.salts.get_or_init(SaltScope::SiteUsers(site_id)).await {
            Ok(salt) => salt,
            Err(e) => {
                warn!("No salt for site {} ({}), counting uncached", site_id, e);
                return self.compute(counter, strategy, site_id).await.map(Some);
            }
        };

        let key = CacheKeyBuilder::grouped(&self.group, &CacheKeyBuilder::count_key(site_id, &salt));
        match self.backend.get(&key).await {
            Ok(Some(bytes)) => match UserCounts::deserialize_from_cache(&bytes) {
                Ok(counts) => {
                    debug!("✓ Count cache hit for site {}", site_id);
                    return Ok(Some(counts));
                }
                Err(e) => warn!("Discarding unreadable count entry {}: {}", key, e),
            },
            Ok(None) => debug!("✗ Count cache miss for site {}", site_id),
            Err(e) => warn!("Count cache read failed for {}: {}", key, e),
        }

        let counts = self.compute(counter, strategy, site_id).await?;
        match counts.serialize_for_cache() {
            Ok(bytes) => {
                if let Err(e) = self.backend.set(&key, bytes, None).await {
                    warn!("Failed to store count entry {}: {}", key, e);
                }
            }
            Err(e) => warn!("Failed to encode counts for site {}: {}", site_id, e),
        }
        Ok(Some(counts))
    }

    async fn compute<C: UserCounter>(
        &self,
        counter: &C,
        strategy: CountStrategy,
        site_id: SiteId,
    ) -> Result<UserCounts> {
        COUNT_IN_PROGRESS
            .scope(true, counter.count_users(strategy, site_id))
            .await
    }
}
