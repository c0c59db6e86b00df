//! External collaborators: query executor, registries, posts cache, counter.
//!
//! The cache never talks to a database or host directly. Everything it
//! needs from the outside world comes through the traits below; the
//! in-memory implementations back the tests and demos.

use crate::error::{Error, Result};
use crate::salt::Salt;
use crate::value::{CountStrategy, SiteId, UserCounts, UserId, UserRow};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Runs SQL on behalf of the cache.
#[allow(async_fn_in_trait)]
pub trait QueryExecutor: Send + Sync {
    /// First column of every row.
    async fn get_col(&self, sql: &str) -> Result<Vec<String>>;

    /// Every row, column name to value.
    async fn get_results(&self, sql: &str) -> Result<Vec<UserRow>>;

    /// Single scalar, e.g. `SELECT FOUND_ROWS()`.
    async fn get_var(&self, sql: &str) -> Result<Option<String>>;

    /// Forget the buffered rows of the last query.
    ///
    /// Called when a hit suppressed execution so downstream readers of the
    /// buffer do not see a previous query's rows.
    fn clear_last_result(&self);
}

/// User and site lookups used for membership resolution.
#[allow(async_fn_in_trait)]
pub trait UserRegistry: Send + Sync {
    /// Every metadata key stored for the user. Empty for unknown users.
    async fn user_meta_keys(&self, user_id: UserId) -> Result<Vec<String>>;

    /// Resolve a login name to a user id.
    async fn user_by_login(&self, login: &str) -> Result<Option<UserId>>;

    fn is_multisite(&self) -> bool;

    fn current_site_id(&self) -> SiteId;
}

/// Read-only view of the posts domain's change markers.
#[allow(async_fn_in_trait)]
pub trait PostsCache: Send + Sync {
    /// "Last changed" salt of the posts domain on `site_id`.
    async fn last_changed(&self, site_id: SiteId) -> Result<Salt>;
}

/// Computes user counts when the count cache misses.
#[allow(async_fn_in_trait)]
pub trait UserCounter: Send + Sync {
    async fn count_users(&self, strategy: CountStrategy, site_id: SiteId) -> Result<UserCounts>;
}

#[derive(Default)]
struct DirectoryState {
    meta_keys: DashMap<UserId, Vec<String>>,
    logins: DashMap<String, UserId>,
    posts_salts: DashMap<SiteId, Salt>,
    counts: DashMap<SiteId, UserCounts>,
    count_calls: AtomicUsize,
}

/// In-memory user/site registry, posts cache and counter.
///
/// # Example
///
/// ```
/// use user_query_cache::repository::{InMemoryDirectory, UserRegistry};
///
/// let directory = InMemoryDirectory::multisite();
/// directory.insert_user(7, "alice", &["wp_capabilities", "wp_5_capabilities"]);
/// assert!(directory.is_multisite());
/// ```
#[derive(Clone)]
pub struct InMemoryDirectory {
    state: Arc<DirectoryState>,
    multisite: bool,
    current_site_id: SiteId,
}

impl InMemoryDirectory {
    /// Single-site install; every user belongs to `current_site_id`.
    pub fn single_site(current_site_id: SiteId) -> Self {
        InMemoryDirectory {
            state: Arc::new(DirectoryState::default()),
            multisite: false,
            current_site_id,
        }
    }

    /// Multi-site install with site `1` as the current site.
    pub fn multisite() -> Self {
        InMemoryDirectory {
            state: Arc::new(DirectoryState::default()),
            multisite: true,
            current_site_id: 1,
        }
    }

    pub fn insert_user(&self, user_id: UserId, login: &str, meta_keys: &[&str]) {
        self.state
            .meta_keys
            .insert(user_id, meta_keys.iter().map(|k| k.to_string()).collect());
        self.state.logins.insert(login.to_string(), user_id);
    }

    pub fn add_meta_key(&self, user_id: UserId, key: &str) {
        self.state
            .meta_keys
            .entry(user_id)
            .or_default()
            .push(key.to_string());
    }

    /// Mark the posts domain of `site_id` as changed.
    pub fn touch_posts(&self, site_id: SiteId) {
        self.state.posts_salts.insert(site_id, Salt::fresh());
    }

    pub fn set_counts(&self, site_id: SiteId, counts: UserCounts) {
        self.state.counts.insert(site_id, counts);
    }

    /// Number of times the counter was invoked.
    pub fn count_calls(&self) -> usize {
        self.state.count_calls.load(Ordering::SeqCst)
    }
}

impl UserRegistry for InMemoryDirectory {
    async fn user_meta_keys(&self, user_id: UserId) -> Result<Vec<String>> {
        Ok(self
            .state
            .meta_keys
            .get(&user_id)
            .map(|keys| keys.value().clone())
            .unwrap_or_default())
    }

    async fn user_by_login(&self, login: &str) -> Result<Option<UserId>> {
        Ok(self.state.logins.get(login).map(|id| *id.value()))
    }

    fn is_multisite(&self) -> bool {
        self.multisite
    }

    fn current_site_id(&self) -> SiteId {
        self.current_site_id
    }
}

impl PostsCache for InMemoryDirectory {
    async fn last_changed(&self, site_id: SiteId) -> Result<Salt> {
        Ok(self
            .state
            .posts_salts
            .entry(site_id)
            .or_insert_with(Salt::fresh)
            .value()
            .clone())
    }
}

impl UserCounter for InMemoryDirectory {
    async fn count_users(&self, _strategy: CountStrategy, site_id: SiteId) -> Result<UserCounts> {
        self.state.count_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .state
            .counts
            .get(&site_id)
            .map(|counts| counts.value().clone())
            .unwrap_or_default())
    }
}

/// Canned query executor that records what it was asked to run.
#[derive(Clone, Default)]
pub struct InMemoryExecutor {
    column: Arc<Mutex<Vec<String>>>,
    rows: Arc<Mutex<Vec<UserRow>>>,
    vars: Arc<Mutex<HashMap<String, String>>>,
    executed: Arc<Mutex<Vec<String>>>,
    last_result_cleared: Arc<AtomicBool>,
    fail: Arc<AtomicBool>,
}

/// Count query issued after a listing that asked for a total.
pub const FOUND_ROWS_QUERY: &str = "SELECT FOUND_ROWS()";

impl InMemoryExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer single-column queries with `values` and FOUND_ROWS with `total`.
    pub fn with_column(self, values: &[&str], total: u64) -> Self {
        if let Ok(mut column) = self.column.lock() {
            *column = values.iter().map(|v| v.to_string()).collect();
        }
        self.set_var(FOUND_ROWS_QUERY, &total.to_string());
        self
    }

    /// Answer full-row queries with `rows` and FOUND_ROWS with `total`.
    pub fn with_rows(self, rows: Vec<UserRow>, total: u64) -> Self {
        if let Ok(mut stored) = self.rows.lock() {
            *stored = rows;
        }
        self.set_var(FOUND_ROWS_QUERY, &total.to_string());
        self
    }

    pub fn set_var(&self, sql: &str, value: &str) {
        if let Ok(mut vars) = self.vars.lock() {
            vars.insert(sql.to_string(), value.to_string());
        }
    }

    /// Make every subsequent query fail.
    pub fn fail_queries(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    /// Every statement executed so far, in order.
    pub fn executed(&self) -> Vec<String> {
        self.executed
            .lock()
            .map(|executed| executed.clone())
            .unwrap_or_default()
    }

    pub fn execution_count(&self) -> usize {
        self.executed.lock().map(|executed| executed.len()).unwrap_or(0)
    }

    pub fn last_result_cleared(&self) -> bool {
        self.last_result_cleared.load(Ordering::SeqCst)
    }

    fn record(&self, sql: &str) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(Error::ExecutorError(format!("query failed: {}", sql)));
        }
        self.last_result_cleared.store(false, Ordering::SeqCst);
        self.executed
            .lock()
            .map_err(|e| Error::ExecutorError(e.to_string()))?
            .push(sql.to_string());
        Ok(())
    }
}

impl QueryExecutor for InMemoryExecutor {
    async fn get_col(&self, sql: &str) -> Result<Vec<String>> {
        self.record(sql)?;
        let column = self
            .column
            .lock()
            .map_err(|e| Error::ExecutorError(e.to_string()))?;
        Ok(column.clone())
    }

    async fn get_results(&self, sql: &str) -> Result<Vec<UserRow>> {
        self.record(sql)?;
        let rows = self
            .rows
            .lock()
            .map_err(|e| Error::ExecutorError(e.to_string()))?;
        Ok(rows.clone())
    }

    async fn get_var(&self, sql: &str) -> Result<Option<String>> {
        self.record(sql)?;
        let vars = self
            .vars
            .lock()
            .map_err(|e| Error::ExecutorError(e.to_string()))?;
        Ok(vars.get(sql).cloned())
    }

    fn clear_last_result(&self) {
        self.last_result_cleared.store(true, Ordering::SeqCst);
    }
}
