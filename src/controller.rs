//! Query cache controller - read-path interception and write-path invalidation.

use crate::backend::CacheBackend;
use crate::builder::UserQueryCacheBuilder;
use crate::config::CacheConfig;
use crate::count::CountCache;
use crate::error::{Error, Result};
use crate::events::{Invalidation, UserEvent};
use crate::key::{CacheKeyBuilder, CompositeKey};
use crate::membership;
use crate::observability::CacheMetrics;
use crate::query::{FieldSelection, QueryDescriptor, UserQuery};
use crate::repository::{PostsCache, QueryExecutor, UserCounter, UserRegistry, FOUND_ROWS_QUERY};
use crate::salt::{Salt, SaltScope, SaltStore};
use crate::value::{CacheValue, CountStrategy, QueryResults, SiteId, SiteRef, UserCounts, UserId, UserRows};
use futures::future::join_all;
use std::collections::BTreeSet;
use std::time::Instant;

/// State carried from [`UserQueryCache::prepare`] to
/// [`UserQueryCache::materialize`] for exactly one query.
///
/// Owned by the request that produced it and consumed by `materialize`,
/// so overlapping requests can never observe each other's cached payload.
#[derive(Debug)]
pub struct PendingRequest {
    key: Option<CompositeKey>,
    cached: Option<QueryResults>,
    sql: String,
    count_total: bool,
    started: Instant,
}

impl PendingRequest {
    /// Whether the store already holds the result.
    pub fn is_hit(&self) -> bool {
        self.cached.is_some()
    }

    /// Key the result will be stored under; `None` when no salt could be
    /// established and the query runs uncached.
    pub fn key(&self) -> Option<&CompositeKey> {
        self.key.as_ref()
    }

    /// SQL the executor should run, or `None` when it must not run at all.
    pub fn request(&self) -> Option<&str> {
        if self.is_hit() {
            None
        } else {
            Some(&self.sql)
        }
    }

    /// Pass the follow-up count query through, or suppress it on a hit.
    pub fn found_rows_query<'q>(&self, query: &'q str) -> Option<&'q str> {
        if self.is_hit() {
            None
        } else {
            Some(query)
        }
    }
}

/// Caches user listing and user count queries behind per-scope salts.
///
/// # Example
///
/// ```ignore
/// let cache = UserQueryCache::new(InMemoryBackend::new(), directory.clone(), directory);
///
/// let query = UserQuery::new(sql, QueryDescriptor::for_site(2).with_count_total(true));
/// let results = cache.execute(&query, &executor).await?;
///
/// cache.handle_event(&UserEvent::ProfileUpdated { user_id: 7 }).await;
/// ```
pub struct UserQueryCache<B, R, P>
where
    B: CacheBackend,
    R: UserRegistry,
    P: PostsCache,
{
    backend: B,
    salts: SaltStore<B>,
    counts: CountCache<B>,
    registry: R,
    posts: P,
    config: CacheConfig,
    metrics: Box<dyn CacheMetrics>,
}

impl<B, R, P> UserQueryCache<B, R, P>
where
    B: CacheBackend,
    R: UserRegistry,
    P: PostsCache,
{
    /// Cache with default configuration and no metrics.
    pub fn new(backend: B, registry: R, posts: P) -> Self {
        Self::from_parts(
            backend,
            registry,
            posts,
            CacheConfig::default(),
            Box::new(crate::observability::NoOpMetrics),
        )
    }

    /// Start a builder for configuration and metrics.
    pub fn builder(backend: B, registry: R, posts: P) -> UserQueryCacheBuilder<B, R, P> {
        UserQueryCacheBuilder::new(backend, registry, posts)
    }

    pub(crate) fn from_parts(
        backend: B,
        registry: R,
        posts: P,
        config: CacheConfig,
        metrics: Box<dyn CacheMetrics>,
    ) -> Self {
        info!(
            "✓ User query cache initialized (group: {}, prefix: {})",
            config.group, config.base_prefix
        );
        UserQueryCache {
            salts: SaltStore::new(backend.clone(), config.group.clone()),
            counts: CountCache::new(backend.clone(), config.group.clone()),
            backend,
            registry,
            posts,
            config,
            metrics,
        }
    }

    // ------------------------------------------------------------------
    // Read path
    // ------------------------------------------------------------------

    /// Phase 1: derive the key and look it up.
    ///
    /// Store failures are misses, not errors. If the scope's salt cannot be
    /// established the query still runs, but its result is not stored.
    pub async fn prepare(&self, query: &UserQuery) -> PendingRequest {
        let started = Instant::now();
        let hash = CacheKeyBuilder::hash_query(&query.sql, self.config.placeholder_escape.as_deref());

        let mut pending = PendingRequest {
            key: None,
            cached: None,
            sql: query.sql.clone(),
            count_total: query.descriptor.count_total,
            started,
        };

        let salt = match self.get_cache_salt(&query.descriptor).await {
            Ok(salt) => salt,
            Err(e) => {
                warn!("No salt for query {} ({}), running uncached", hash, e);
                self.metrics.record_error(hash.as_str(), &e.to_string());
                return pending;
            }
        };

        let key = CompositeKey::new(hash, salt);
        let store_key = key.store_key(&self.config.group);
        debug!("» User query lookup for key: {}", store_key);

        pending.cached = match self.backend.get(&store_key).await {
            Ok(Some(bytes)) => match QueryResults::deserialize_from_cache(&bytes) {
                Ok(results) => {
                    debug!("✓ Cache hit for {}", store_key);
                    Some(results)
                }
                Err(e) => {
                    warn!("Discarding unreadable entry {}: {}", store_key, e);
                    None
                }
            },
            Ok(None) => {
                debug!("✗ Cache miss for {}", store_key);
                None
            }
            Err(e) => {
                warn!("Cache read failed for {}: {}", store_key, e);
                self.metrics.record_error(&store_key, &e.to_string());
                None
            }
        };
        pending.key = Some(key);
        pending
    }

    /// Phase 2: return the cached result on a hit, or store the executor's
    /// result on a miss. Consumes the pending state.
    ///
    /// # Errors
    ///
    /// `Error::ValidationError` if the request missed but no executed
    /// result was supplied.
    pub async fn materialize(
        &self,
        pending: PendingRequest,
        executed: Option<QueryResults>,
    ) -> Result<QueryResults> {
        let PendingRequest {
            key,
            cached,
            count_total,
            started,
            ..
        } = pending;
        let key_str = key.as_ref().map(|k| k.to_string()).unwrap_or_default();

        if let Some(results) = cached {
            self.metrics.record_hit(&key_str, started.elapsed());
            return Ok(results);
        }

        let mut results = executed.ok_or_else(|| {
            Error::ValidationError("cache miss but the query was not executed".to_string())
        })?;
        if !count_total {
            results.total_count = 0;
        }

        if let Some(key) = key {
            self.store(&key, &results).await;
        }
        self.metrics.record_miss(&key_str, started.elapsed());
        Ok(results)
    }

    async fn store(&self, key: &CompositeKey, results: &QueryResults) {
        let store_key = key.store_key(&self.config.group);
        let bytes = match results.serialize_for_cache() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Failed to encode results for {}: {}", store_key, e);
                return;
            }
        };

        match self.backend.set(&store_key, bytes, self.config.entry_ttl()).await {
            Ok(()) => debug!("✓ Stored {} rows under {}", results.rows.len(), store_key),
            Err(e) => {
                warn!("Failed to store {}: {}", store_key, e);
                self.metrics.record_error(&store_key, &e.to_string());
            }
        }
    }

    /// Run `query` through both phases against `executor`.
    ///
    /// On a hit the executor is never invoked beyond clearing its
    /// last-result buffer. On a miss it runs the listing and, when the
    /// descriptor asks for a total, the `FOUND_ROWS` follow-up.
    pub async fn execute<E: QueryExecutor>(
        &self,
        query: &UserQuery,
        executor: &E,
    ) -> Result<QueryResults> {
        let pending = self.prepare(query).await;

        let executed = match pending.request() {
            None => {
                executor.clear_last_result();
                None
            }
            Some(sql) => Some(Self::run(executor, sql, &query.descriptor, &pending).await?),
        };

        self.materialize(pending, executed).await
    }

    async fn run<E: QueryExecutor>(
        executor: &E,
        sql: &str,
        descriptor: &QueryDescriptor,
        pending: &PendingRequest,
    ) -> Result<QueryResults> {
        let rows = match descriptor.fields {
            FieldSelection::Full => UserRows::Full(executor.get_results(sql).await?),
            FieldSelection::Column => UserRows::Column(executor.get_col(sql).await?),
        };

        let total_count = match pending.found_rows_query(FOUND_ROWS_QUERY) {
            Some(count_sql) if descriptor.count_total => executor
                .get_var(count_sql)
                .await?
                .and_then(|value| value.trim().parse().ok())
                .unwrap_or(0),
            _ => 0,
        };

        Ok(QueryResults { rows, total_count })
    }

    /// Salt for the scope `descriptor` falls in.
    ///
    /// Global queries use the global users salt. Site queries use the
    /// site's users salt, suffixed with the site's posts salt when the
    /// result depends on published posts. Site id `0` is not a site and
    /// falls back to the global salt.
    pub async fn get_cache_salt(&self, descriptor: &QueryDescriptor) -> Result<Salt> {
        let site_id = match descriptor.site_id {
            Some(site_id) if site_id != 0 => site_id,
            _ => return self.salts.get_or_init(SaltScope::GlobalUsers).await,
        };

        let salt = self.salts.get_or_init(SaltScope::SiteUsers(site_id)).await?;
        if !descriptor.has_published_posts {
            return Ok(salt);
        }

        let posts_salt = self.posts.last_changed(site_id).await?;
        Ok(salt.with_suffix(&posts_salt))
    }

    /// Cached user counts for `site_id` (current site when `None`).
    ///
    /// `Ok(None)` means the call was nested inside the counter and was not
    /// intercepted.
    pub async fn count_users<C: UserCounter>(
        &self,
        counter: &C,
        strategy: CountStrategy,
        site_id: Option<SiteId>,
    ) -> Result<Option<UserCounts>> {
        let site_id = site_id.unwrap_or_else(|| self.registry.current_site_id());
        self.counts.count_users(counter, strategy, site_id).await
    }

    // ------------------------------------------------------------------
    // Write path
    // ------------------------------------------------------------------

    /// Apply the invalidation an event calls for. Never fails; problems are
    /// logged and at worst leave a stale entry until the next bump.
    pub async fn handle_event(&self, event: &UserEvent) {
        debug!("» Handling {}", event.name());

        match event.invalidation() {
            Invalidation::User(user_id) => self.clear_user(user_id).await,
            Invalidation::UserAndSite(user_id, site_id) => {
                self.clear_user(user_id).await;
                self.clear_site(site_id).await;
            }
            Invalidation::Site(site_id) => self.clear_site(site_id).await,
            Invalidation::UserByLogin(login) => match self.registry.user_by_login(&login).await {
                Ok(Some(user_id)) => self.clear_user(user_id).await,
                Ok(None) => debug!("No user with login {:?}, nothing to invalidate", login),
                Err(e) => warn!("Failed to resolve login {:?}: {}", login, e),
            },
        }
    }

    /// Bump every site the user belongs to, then the global scope.
    pub async fn clear_user(&self, user_id: UserId) {
        let site_ids = match membership::get_user_site_ids(
            &self.registry,
            &self.config.base_prefix,
            user_id,
        )
        .await
        {
            Ok(site_ids) => site_ids,
            Err(e) => {
                warn!("Failed to resolve sites of user {}: {}", user_id, e);
                BTreeSet::new()
            }
        };

        join_all(site_ids.into_iter().map(|site_id| self.clear_site(site_id))).await;
        self.bump(SaltScope::GlobalUsers).await;
    }

    /// Bump one site's users salt.
    pub async fn clear_site(&self, site: impl Into<SiteRef>) {
        let site_id = site.into().id();
        self.bump(SaltScope::SiteUsers(site_id)).await;
    }

    async fn bump(&self, scope: SaltScope) {
        let scope_name = scope.to_string();
        match self.salts.bump(scope).await {
            Ok(()) => self.metrics.record_invalidation(&scope_name),
            Err(e) => {
                warn!("Failed to invalidate {}: {}", scope_name, e);
                self.metrics.record_error(&scope_name, &e.to_string());
            }
        }
    }

    /// Sites `user_id` belongs to.
    pub async fn get_user_site_ids(&self, user_id: UserId) -> Result<BTreeSet<SiteId>> {
        membership::get_user_site_ids(&self.registry, &self.config.base_prefix, user_id).await
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn salts(&self) -> &SaltStore<B> {
        &self.salts
    }

    /// Get backend reference (for advanced use).
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn registry(&self) -> &R {
        &self.registry
    }
}
