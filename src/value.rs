//! Values stored in the cache and the trait that encodes them.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Identifier of a user.
pub type UserId = u64;

/// Identifier of a site (tenant).
pub type SiteId = u64;

/// Trait for everything the cache writes to the store.
///
/// Encoding always goes through the versioned envelope in
/// [`crate::serialization`]; implementors only opt in.
///
/// # Example
///
/// ```
/// use serde::{Deserialize, Serialize};
/// use user_query_cache::CacheValue;
///
/// #[derive(Serialize, Deserialize, Debug, PartialEq)]
/// struct Snapshot {
///     total: u64,
/// }
///
/// impl CacheValue for Snapshot {}
///
/// let bytes = Snapshot { total: 3 }.serialize_for_cache().unwrap();
/// assert_eq!(Snapshot::deserialize_from_cache(&bytes).unwrap(), Snapshot { total: 3 });
/// ```
pub trait CacheValue: Serialize + for<'de> Deserialize<'de> {
    /// Encode for the store.
    fn serialize_for_cache(&self) -> Result<Vec<u8>> {
        crate::serialization::serialize_for_cache(self)
    }

    /// Decode from the store, validating the envelope.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidCacheEntry`: bad magic or truncated envelope
    /// - `Error::VersionMismatch`: written by another schema version
    /// - `Error::DeserializationError`: corrupted payload
    fn deserialize_from_cache(bytes: &[u8]) -> Result<Self>
    where
        Self: Sized,
    {
        crate::serialization::deserialize_from_cache(bytes)
    }
}

/// A full user row as returned by the executor, column name to value.
pub type UserRow = BTreeMap<String, String>;

/// Rows produced by a user listing query.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum UserRows {
    /// Single-column selection (e.g. `fields = ids`).
    Column(Vec<String>),
    /// Full-row selection (`fields = all` or a field list).
    Full(Vec<UserRow>),
}

impl UserRows {
    /// Number of rows.
    pub fn len(&self) -> usize {
        match self {
            UserRows::Column(values) => values.len(),
            UserRows::Full(rows) => rows.len(),
        }
    }

    /// Whether no rows were returned.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for UserRows {
    fn default() -> Self {
        UserRows::Column(Vec::new())
    }
}

/// Rows plus total count for one user listing query.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResults {
    pub rows: UserRows,
    /// `FOUND_ROWS` total; `0` when the query did not ask for a count.
    pub total_count: u64,
}

impl CacheValue for QueryResults {}

/// Per-site user counts, as produced by the host's count API.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCounts {
    pub total_users: u64,
    /// Role name to number of users holding it.
    pub avail_roles: BTreeMap<String, u64>,
}

impl CacheValue for UserCounts {}

/// Counting strategy passed through to the counting collaborator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CountStrategy {
    #[default]
    Time,
    Memory,
}

/// A site identity object.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Site {
    pub id: SiteId,
    pub domain: String,
    pub path: String,
}

/// Either a site object or a bare site id.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SiteRef {
    Site(Site),
    Id(SiteId),
}

impl SiteRef {
    pub fn id(&self) -> SiteId {
        match self {
            SiteRef::Site(site) => site.id,
            SiteRef::Id(id) => *id,
        }
    }
}

impl From<Site> for SiteRef {
    fn from(site: Site) -> Self {
        SiteRef::Site(site)
    }
}

impl From<SiteId> for SiteRef {
    fn from(id: SiteId) -> Self {
        SiteRef::Id(id)
    }
}

/// A user as carried by password-reset notifications.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub login: String,
}
