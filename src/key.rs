//! Cache key derivation.
//!
//! A query key is the pair `(hash(normalized query text), scope salt)`. The
//! pair is kept as a [`CompositeKey`] and only joined into a string when it
//! reaches the store, together with the group namespace:
//!
//! ```text
//! "{group}:{sha256-hex}{salt}"
//! ```

use crate::salt::Salt;
use crate::value::SiteId;
use sha2::{Digest, Sha256};
use std::borrow::Cow;
use std::fmt;

/// Group every entry and salt in this crate is stored under.
pub const USERS_GROUP: &str = "users";

/// Store key of the global users salt.
pub const GLOBAL_SALT_KEY: &str = "last_changed";

/// Content hash of a normalized query.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct QueryHash(String);

impl QueryHash {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for QueryHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Query hash and scope salt, before serialization to a store key.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CompositeKey {
    hash: QueryHash,
    salt: Salt,
}

impl CompositeKey {
    pub fn new(hash: QueryHash, salt: Salt) -> Self {
        CompositeKey { hash, salt }
    }

    pub fn hash(&self) -> &QueryHash {
        &self.hash
    }

    pub fn salt(&self) -> &Salt {
        &self.salt
    }

    /// Joined key as written to the store.
    pub fn store_key(&self, group: &str) -> String {
        CacheKeyBuilder::grouped(group, &format!("{}{}", self.hash, self.salt))
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.hash, self.salt)
    }
}

/// Builds every string key the crate hands to a backend.
pub struct CacheKeyBuilder;

impl CacheKeyBuilder {
    /// Namespace `key` under `group`: `"{group}:{key}"`.
    pub fn grouped(group: &str, key: &str) -> String {
        format!("{}:{}", group, key)
    }

    /// Undo placeholder escaping so identical queries hash identically.
    ///
    /// Query layers that escape `%` behind a per-process random token would
    /// otherwise never produce the same text twice.
    pub fn normalize<'a>(sql: &'a str, placeholder_escape: Option<&str>) -> Cow<'a, str> {
        match placeholder_escape {
            Some(token) if !token.is_empty() && sql.contains(token) => {
                Cow::Owned(sql.replace(token, "%"))
            }
            _ => Cow::Borrowed(sql),
        }
    }

    /// SHA-256 of the query text, hex encoded.
    pub fn query_hash(normalized_sql: &str) -> QueryHash {
        let mut hasher = Sha256::new();
        hasher.update(normalized_sql.as_bytes());
        QueryHash(hex::encode(hasher.finalize()))
    }

    /// Normalize then hash.
    pub fn hash_query(sql: &str, placeholder_escape: Option<&str>) -> QueryHash {
        Self::query_hash(&Self::normalize(sql, placeholder_escape))
    }

    /// Store key of a site's users salt.
    pub fn site_salt_key(site_id: SiteId) -> String {
        format!("site-{}-last_changed", site_id)
    }

    /// Store key of a cached site user count.
    pub fn count_key(site_id: SiteId, salt: &Salt) -> String {
        format!("count_users_{}_{}", site_id, salt)
    }
}
