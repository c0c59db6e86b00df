//! Builder for configuring a [`UserQueryCache`].

use crate::backend::CacheBackend;
use crate::config::CacheConfig;
use crate::controller::UserQueryCache;
use crate::error::Result;
use crate::observability::{CacheMetrics, NoOpMetrics};
use crate::repository::{PostsCache, UserRegistry};
use std::time::Duration;

/// Fluent builder for a [`UserQueryCache`].
///
/// # Example
///
/// ```ignore
/// let cache = UserQueryCache::builder(backend, registry, posts)
///     .with_base_prefix("wp_")
///     .with_placeholder_escape("{7f3a...}")
///     .with_metrics(Box::new(my_metrics))
///     .build()?;
/// ```
pub struct UserQueryCacheBuilder<B, R, P>
where
    B: CacheBackend,
    R: UserRegistry,
    P: PostsCache,
{
    backend: B,
    registry: R,
    posts: P,
    config: CacheConfig,
    metrics: Box<dyn CacheMetrics>,
}

impl<B, R, P> UserQueryCacheBuilder<B, R, P>
where
    B: CacheBackend,
    R: UserRegistry,
    P: PostsCache,
{
    pub(crate) fn new(backend: B, registry: R, posts: P) -> Self {
        Self {
            backend,
            registry,
            posts,
            config: CacheConfig::default(),
            metrics: Box::new(NoOpMetrics),
        }
    }

    /// Replace the whole configuration.
    pub fn with_config(mut self, config: CacheConfig) -> Self {
        self.config = config;
        self
    }

    /// Table prefix used to parse capability meta keys.
    pub fn with_base_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.base_prefix = prefix.into();
        self
    }

    /// Token stripped from query text before hashing.
    pub fn with_placeholder_escape(mut self, token: impl Into<String>) -> Self {
        self.config.placeholder_escape = Some(token.into());
        self
    }

    /// Expire cached results after `ttl`. Salts never expire.
    pub fn with_entry_ttl(mut self, ttl: Duration) -> Self {
        self.config.entry_ttl_secs = Some(ttl.as_secs());
        self
    }

    /// Set custom metrics handler.
    pub fn with_metrics(mut self, metrics: Box<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    /// Validate the configuration and build the cache.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if the configuration is invalid.
    pub fn build(self) -> Result<UserQueryCache<B, R, P>> {
        self.config.validate()?;
        Ok(UserQueryCache::from_parts(
            self.backend,
            self.registry,
            self.posts,
            self.config,
            self.metrics,
        ))
    }
}
