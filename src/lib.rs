//! # user-query-cache
//!
//! A salted result cache for "list users" and "count users" queries.
//!
//! ## How it works
//!
//! - **Keys:** `sha256(normalized query) + salt(scope)`, where the scope is
//!   either the whole install (`global-users`) or one site (`site:<id>-users`)
//! - **Invalidation:** mutation events bump the affected salts, so every key
//!   computed under the old salt becomes unreachable. Nothing is enumerated
//!   or deleted; stale entries age out of the store on their own.
//! - **Two-phase reads:** [`UserQueryCache::prepare`] decides whether the
//!   executor runs at all, [`UserQueryCache::materialize`] substitutes the
//!   cached result or stores the fresh one. The state between the two is a
//!   [`PendingRequest`] value owned by the request.
//!
//! ## Quick Start
//!
//! ```ignore
//! use user_query_cache::{
//!     backend::InMemoryBackend,
//!     repository::{InMemoryDirectory, InMemoryExecutor},
//!     QueryDescriptor, UserEvent, UserQuery, UserQueryCache,
//! };
//!
//! let directory = InMemoryDirectory::multisite();
//! let cache = UserQueryCache::new(InMemoryBackend::new(), directory.clone(), directory);
//!
//! let query = UserQuery::new(
//!     "SELECT SQL_CALC_FOUND_ROWS wp_users.ID FROM wp_users ...",
//!     QueryDescriptor::for_site(2).with_count_total(true),
//! );
//! let results = cache.execute(&query, &executor).await?;   // miss: runs the executor
//! let again = cache.execute(&query, &executor).await?;     // hit: executor untouched
//!
//! cache.handle_event(&UserEvent::ProfileUpdated { user_id: 7 }).await;
//! ```

#[macro_use]
extern crate log;

pub mod backend;
pub mod builder;
pub mod config;
pub mod controller;
pub mod count;
pub mod error;
pub mod events;
pub mod key;
pub mod membership;
pub mod observability;
pub mod query;
pub mod repository;
pub mod salt;
pub mod serialization;
pub mod value;

// Re-exports for convenience
pub use backend::CacheBackend;
pub use builder::UserQueryCacheBuilder;
pub use config::CacheConfig;
pub use controller::{PendingRequest, UserQueryCache};
pub use error::{Error, Result};
pub use events::{Invalidation, UserEvent};
pub use key::{CacheKeyBuilder, CompositeKey};
pub use query::{FieldSelection, QueryDescriptor, SelectClauses, UserQuery};
pub use repository::{PostsCache, QueryExecutor, UserCounter, UserRegistry};
pub use salt::{Salt, SaltScope, SaltStore};
pub use value::{CacheValue, CountStrategy, QueryResults, SiteId, SiteRef, UserCounts, UserId, UserRows};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
