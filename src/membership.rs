//! Which sites a user belongs to.
//!
//! Only used to decide which site salts a user-level change must bump.
//! On multi-site installs membership is encoded in capability meta keys:
//! `{prefix}capabilities` for site 1 and `{prefix}{id}_capabilities` for
//! every other site.

use crate::error::Result;
use crate::repository::UserRegistry;
use crate::value::{SiteId, UserId};
use std::collections::BTreeSet;

const CAPABILITIES: &str = "capabilities";
const CAPABILITIES_SUFFIX: &str = "_capabilities";

/// Site holding the unprefixed capability key.
pub const MAIN_SITE_ID: SiteId = 1;

/// Resolve the sites `user_id` is a member of.
pub async fn get_user_site_ids<R: UserRegistry>(
    registry: &R,
    base_prefix: &str,
    user_id: UserId,
) -> Result<BTreeSet<SiteId>> {
    let mut site_ids = BTreeSet::new();
    if user_id == 0 {
        return Ok(site_ids);
    }

    // Signed-out or unknown users have no meta, hence no sites.
    let keys = registry.user_meta_keys(user_id).await?;
    if keys.is_empty() {
        return Ok(site_ids);
    }

    if !registry.is_multisite() {
        site_ids.insert(registry.current_site_id());
        return Ok(site_ids);
    }

    site_ids.extend(
        keys.iter()
            .filter_map(|key| site_id_from_meta_key(base_prefix, key)),
    );
    Ok(site_ids)
}

/// Site id encoded in a capability meta key, if `key` is one.
pub fn site_id_from_meta_key(base_prefix: &str, key: &str) -> Option<SiteId> {
    let rest = key.strip_prefix(base_prefix)?;
    if rest == CAPABILITIES {
        return Some(MAIN_SITE_ID);
    }

    let segment = rest.strip_suffix(CAPABILITIES_SUFFIX)?;
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    segment.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::InMemoryDirectory;

    #[test]
    fn test_meta_key_parsing() {
        assert_eq!(site_id_from_meta_key("wp_", "wp_capabilities"), Some(1));
        assert_eq!(site_id_from_meta_key("wp_", "wp_5_capabilities"), Some(5));
        assert_eq!(site_id_from_meta_key("wp_", "wp_120_capabilities"), Some(120));
        assert_eq!(site_id_from_meta_key("wp_", "wp_abc_capabilities"), None);
        assert_eq!(site_id_from_meta_key("wp_", "wp_5_user_level"), None);
        assert_eq!(site_id_from_meta_key("wp_", "other_5_capabilities"), None);
        assert_eq!(site_id_from_meta_key("wp_", "wp__capabilities"), None);
        assert_eq!(site_id_from_meta_key("wp_", "wp_-5_capabilities"), None);
        assert_eq!(site_id_from_meta_key("wp_", "first_name"), None);
    }

    #[test]
    fn test_empty_prefix() {
        assert_eq!(site_id_from_meta_key("", "capabilities"), Some(1));
        assert_eq!(site_id_from_meta_key("", "7_capabilities"), Some(7));
    }

    #[tokio::test]
    async fn test_multisite_membership() {
        let directory = InMemoryDirectory::multisite();
        directory.insert_user(
            7,
            "alice",
            &["wp_capabilities", "wp_5_capabilities", "wp_x_capabilities", "nickname"],
        );

        let sites = get_user_site_ids(&directory, "wp_", 7)
            .await
            .expect("Failed to resolve");
        assert_eq!(sites.into_iter().collect::<Vec<_>>(), vec![1, 5]);
    }

    #[tokio::test]
    async fn test_single_site_membership() {
        let directory = InMemoryDirectory::single_site(4);
        directory.insert_user(7, "alice", &["nickname"]);

        let sites = get_user_site_ids(&directory, "wp_", 7)
            .await
            .expect("Failed to resolve");
        assert_eq!(sites.into_iter().collect::<Vec<_>>(), vec![4]);
    }

    #[tokio::test]
    async fn test_no_sites_for_empty_or_unknown_user() {
        let directory = InMemoryDirectory::single_site(1);
        directory.insert_user(7, "alice", &["nickname"]);

        assert!(get_user_site_ids(&directory, "wp_", 0).await.unwrap().is_empty());
        assert!(get_user_site_ids(&directory, "wp_", 99).await.unwrap().is_empty());
    }
}
