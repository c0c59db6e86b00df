//! Runtime configuration.

use crate::error::{Error, Result};
use crate::key::USERS_GROUP;
use serde::Deserialize;
use std::time::Duration;

/// Default table prefix used to recognise capability meta keys.
pub const DEFAULT_BASE_PREFIX: &str = "wp_";

/// Configuration for the user query cache.
///
/// Loaded from defaults, JSON, or `USER_QUERY_CACHE_*` environment
/// variables.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Store group for entries and salts.
    pub group: String,
    /// Table prefix, e.g. `wp_` in `wp_5_capabilities`.
    pub base_prefix: String,
    /// Token the query layer substitutes for `%`; stripped before hashing.
    pub placeholder_escape: Option<String>,
    /// Optional expiry for cached entries. Salts never expire.
    pub entry_ttl_secs: Option<u64>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            group: USERS_GROUP.to_string(),
            base_prefix: DEFAULT_BASE_PREFIX.to_string(),
            placeholder_escape: None,
            entry_ttl_secs: None,
        }
    }
}

impl CacheConfig {
    /// Defaults overridden by environment variables:
    ///
    /// - `USER_QUERY_CACHE_GROUP`
    /// - `USER_QUERY_CACHE_BASE_PREFIX`
    /// - `USER_QUERY_CACHE_PLACEHOLDER_ESCAPE`
    /// - `USER_QUERY_CACHE_ENTRY_TTL_SECS`
    ///
    /// # Errors
    /// Returns `Error::ConfigError` if the TTL is not a number or the group is empty.
    pub fn from_env() -> Result<Self> {
        let mut config = CacheConfig::default();

        if let Ok(group) = std::env::var("USER_QUERY_CACHE_GROUP") {
            config.group = group;
        }
        if let Ok(prefix) = std::env::var("USER_QUERY_CACHE_BASE_PREFIX") {
            config.base_prefix = prefix;
        }
        if let Ok(token) = std::env::var("USER_QUERY_CACHE_PLACEHOLDER_ESCAPE") {
            config.placeholder_escape = Some(token).filter(|t| !t.is_empty());
        }
        if let Ok(ttl) = std::env::var("USER_QUERY_CACHE_ENTRY_TTL_SECS") {
            let secs = ttl.parse::<u64>().map_err(|e| {
                Error::ConfigError(format!("invalid USER_QUERY_CACHE_ENTRY_TTL_SECS {:?}: {}", ttl, e))
            })?;
            config.entry_ttl_secs = Some(secs);
        }

        config.validate()?;
        Ok(config)
    }

    /// Parse from JSON; missing fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: CacheConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.group.is_empty() {
            return Err(Error::ConfigError("cache group must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn entry_ttl(&self) -> Option<Duration> {
        self.entry_ttl_secs.map(Duration::from_secs)
    }
}
