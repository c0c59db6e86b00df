//! Salt store: per-scope "last changed" markers.
//!
//! Invalidation never enumerates or deletes cached entries. Bumping a
//! scope's salt changes every key derived from it, so entries computed
//! under the old salt are simply never looked up again and age out of the
//! store on its own eviction schedule.

use crate::backend::CacheBackend;
use crate::error::{Error, Result};
use crate::key::{CacheKeyBuilder, GLOBAL_SALT_KEY};
use crate::value::{CacheValue, SiteId};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque, non-empty version token for a scope.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Salt(String);

impl Salt {
    /// New token, distinct from every previously generated one.
    ///
    /// UUIDv7 leads with a millisecond timestamp and carries a monotonic
    /// counter plus random bits, so two calls never collide.
    pub fn fresh() -> Self {
        Salt(Uuid::now_v7().simple().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Couple this salt to a foreign scope's marker.
    pub fn with_suffix(mut self, other: &Salt) -> Self {
        self.0.push_str(&other.0);
        self
    }
}

impl From<&str> for Salt {
    fn from(value: &str) -> Self {
        Salt(value.to_string())
    }
}

impl From<String> for Salt {
    fn from(value: String) -> Self {
        Salt(value)
    }
}

impl fmt::Display for Salt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl CacheValue for Salt {}

/// Scopes owned by the salt store.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SaltScope {
    /// Queries without a site id.
    GlobalUsers,
    /// Queries scoped to one site.
    SiteUsers(SiteId),
}

impl SaltScope {
    /// Key of this scope's salt inside the group.
    pub fn store_key(&self) -> String {
        match self {
            SaltScope::GlobalUsers => GLOBAL_SALT_KEY.to_string(),
            SaltScope::SiteUsers(site_id) => CacheKeyBuilder::site_salt_key(*site_id),
        }
    }
}

impl fmt::Display for SaltScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SaltScope::GlobalUsers => f.write_str("global-users"),
            SaltScope::SiteUsers(site_id) => write!(f, "site:{}-users", site_id),
        }
    }
}

/// Reads and bumps salts in the cache store.
#[derive(Clone)]
pub struct SaltStore<B: CacheBackend> {
    backend: B,
    group: String,
}

impl<B: CacheBackend> SaltStore<B> {
    pub fn new(backend: B, group: impl Into<String>) -> Self {
        SaltStore {
            backend,
            group: group.into(),
        }
    }

    fn key(&self, scope: SaltScope) -> String {
        CacheKeyBuilder::grouped(&self.group, &scope.store_key())
    }

    /// Current salt for `scope`, creating one if none is stored.
    ///
    /// An empty or undecodable stored value counts as absent. The returned
    /// salt is always the one written to the store.
    ///
    /// Creation is a read followed by a write, not a set-if-absent. Two
    /// requests racing on a missing salt each store their own and the later
    /// write wins, so the other request's entry is never hit again. That
    /// costs one extra miss, never a stale read.
    ///
    /// # Errors
    ///
    /// `Error::BackendError` if the store cannot be read or the fresh salt
    /// cannot be written. Callers must not cache against a salt they could
    /// not establish.
    pub async fn get_or_init(&self, scope: SaltScope) -> Result<Salt> {
        let key = self.key(scope);

        if let Some(bytes) = self.backend.get(&key).await? {
            match Salt::deserialize_from_cache(&bytes) {
                Ok(salt) if !salt.is_empty() => return Ok(salt),
                Ok(_) => debug!("Empty salt stored for {}, reinitializing", scope),
                Err(e) => warn!("Discarding unreadable salt for {}: {}", scope, e),
            }
        }

        let salt = Salt::fresh();
        self.write(&key, &salt).await?;
        debug!("Initialized salt for {}: {}", scope, salt);
        Ok(salt)
    }

    /// Overwrite `scope`'s salt with a fresh value.
    pub async fn bump(&self, scope: SaltScope) -> Result<()> {
        let salt = Salt::fresh();
        self.write(&self.key(scope), &salt).await?;
        debug!("» Bumped salt for {} -> {}", scope, salt);
        Ok(())
    }

    async fn write(&self, key: &str, salt: &Salt) -> Result<()> {
        let bytes = salt.serialize_for_cache()?;
        self.backend
            .set(key, bytes, None)
            .await
            .map_err(|e| match e {
                Error::BackendError(msg) => {
                    Error::BackendError(format!("failed to store salt {}: {}", key, msg))
                }
                other => other,
            })
    }
}
