//! Mutation events that invalidate cached user queries.
//!
//! The host adapts its own notifications (including any renamed or
//! duplicate hook names across versions) into this closed set. Each event
//! maps to exactly one [`Invalidation`], which the cache then carries out.

use crate::value::{SiteId, SiteRef, User, UserId};

/// A change to user or site data.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum UserEvent {
    /// A user row was inserted.
    UserRegistered { user_id: UserId },
    /// Front-end self registration completed.
    NewUserRegistered { user_id: UserId },
    ProfileUpdated { user_id: UserId },
    UserDeleted { user_id: UserId },
    /// An administrator created the user from the dashboard.
    AdminCreatedUser { user_id: UserId },
    /// The host dropped its own object cache for the user.
    UserCacheCleaned { user_id: UserId },
    /// Network-wide deletion on a multi-site install.
    NetworkUserDeleted { user_id: UserId },
    MarkedSpam { user_id: UserId },
    AddedToSite {
        user_id: UserId,
        role: String,
        site_id: SiteId,
    },
    RemovedFromSite { user_id: UserId, site_id: SiteId },
    SiteCreated { site: SiteRef },
    SiteDeleted { site: SiteRef },
    PasswordReset { user: User },
    /// A reset key was issued; only the login name is known.
    PasswordKeyRetrieved { login: String },
    UserMetaAdded { user_id: UserId },
    UserMetaUpdated { meta_id: u64, user_id: UserId },
    UserMetaDeleted { meta_ids: Vec<u64>, user_id: UserId },
}

/// Salt bumps an event calls for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Invalidation {
    /// Bump the user's sites and the global scope.
    User(UserId),
    /// `User` followed by a bump of `site`.
    UserAndSite(UserId, SiteId),
    /// Bump one site.
    Site(SiteId),
    /// Resolve the login, then `User`; nothing if it does not resolve.
    UserByLogin(String),
}

impl UserEvent {
    pub fn invalidation(&self) -> Invalidation {
        match self {
            UserEvent::UserRegistered { user_id }
            | UserEvent::NewUserRegistered { user_id }
            | UserEvent::ProfileUpdated { user_id }
            | UserEvent::UserDeleted { user_id }
            | UserEvent::AdminCreatedUser { user_id }
            | UserEvent::UserCacheCleaned { user_id }
            | UserEvent::NetworkUserDeleted { user_id }
            | UserEvent::MarkedSpam { user_id }
            | UserEvent::UserMetaAdded { user_id }
            | UserEvent::UserMetaUpdated { user_id, .. }
            | UserEvent::UserMetaDeleted { user_id, .. } => Invalidation::User(*user_id),
            UserEvent::AddedToSite {
                user_id, site_id, ..
            }
            | UserEvent::RemovedFromSite { user_id, site_id } => {
                Invalidation::UserAndSite(*user_id, *site_id)
            }
            UserEvent::SiteCreated { site } | UserEvent::SiteDeleted { site } => {
                Invalidation::Site(site.id())
            }
            UserEvent::PasswordReset { user } => Invalidation::User(user.id),
            UserEvent::PasswordKeyRetrieved { login } => Invalidation::UserByLogin(login.clone()),
        }
    }

    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            UserEvent::UserRegistered { .. } => "user_registered",
            UserEvent::NewUserRegistered { .. } => "new_user_registered",
            UserEvent::ProfileUpdated { .. } => "profile_updated",
            UserEvent::UserDeleted { .. } => "user_deleted",
            UserEvent::AdminCreatedUser { .. } => "admin_created_user",
            UserEvent::UserCacheCleaned { .. } => "user_cache_cleaned",
            UserEvent::NetworkUserDeleted { .. } => "network_user_deleted",
            UserEvent::MarkedSpam { .. } => "marked_spam",
            UserEvent::AddedToSite { .. } => "added_to_site",
            UserEvent::RemovedFromSite { .. } => "removed_from_site",
            UserEvent::SiteCreated { .. } => "site_created",
            UserEvent::SiteDeleted { .. } => "site_deleted",
            UserEvent::PasswordReset { .. } => "password_reset",
            UserEvent::PasswordKeyRetrieved { .. } => "password_key_retrieved",
            UserEvent::UserMetaAdded { .. } => "user_meta_added",
            UserEvent::UserMetaUpdated { .. } => "user_meta_updated",
            UserEvent::UserMetaDeleted { .. } => "user_meta_deleted",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Site;

    #[test]
    fn test_user_level_events() {
        let events = [
            UserEvent::UserRegistered { user_id: 3 },
            UserEvent::NewUserRegistered { user_id: 3 },
            UserEvent::ProfileUpdated { user_id: 3 },
            UserEvent::UserDeleted { user_id: 3 },
            UserEvent::AdminCreatedUser { user_id: 3 },
            UserEvent::UserCacheCleaned { user_id: 3 },
            UserEvent::NetworkUserDeleted { user_id: 3 },
            UserEvent::MarkedSpam { user_id: 3 },
            UserEvent::UserMetaAdded { user_id: 3 },
        ];
        for event in events {
            assert_eq!(event.invalidation(), Invalidation::User(3), "{}", event.name());
        }
    }

    #[test]
    fn test_meta_update_uses_user_id_not_meta_id() {
        let updated = UserEvent::UserMetaUpdated {
            meta_id: 99,
            user_id: 3,
        };
        let deleted = UserEvent::UserMetaDeleted {
            meta_ids: vec![99, 100],
            user_id: 3,
        };
        assert_eq!(updated.invalidation(), Invalidation::User(3));
        assert_eq!(deleted.invalidation(), Invalidation::User(3));
    }

    #[test]
    fn test_membership_events() {
        let added = UserEvent::AddedToSite {
            user_id: 3,
            role: "editor".to_string(),
            site_id: 8,
        };
        let removed = UserEvent::RemovedFromSite {
            user_id: 3,
            site_id: 8,
        };
        assert_eq!(added.invalidation(), Invalidation::UserAndSite(3, 8));
        assert_eq!(removed.invalidation(), Invalidation::UserAndSite(3, 8));
    }

    #[test]
    fn test_site_events_accept_object_or_id() {
        let site = Site {
            id: 6,
            domain: "example.org".to_string(),
            path: "/six/".to_string(),
        };
        let created = UserEvent::SiteCreated { site: site.into() };
        let deleted = UserEvent::SiteDeleted { site: 6u64.into() };
        assert_eq!(created.invalidation(), Invalidation::Site(6));
        assert_eq!(deleted.invalidation(), Invalidation::Site(6));
    }

    #[test]
    fn test_password_events() {
        let reset = UserEvent::PasswordReset {
            user: User {
                id: 12,
                login: "bob".to_string(),
            },
        };
        let key = UserEvent::PasswordKeyRetrieved {
            login: "bob".to_string(),
        };
        assert_eq!(reset.invalidation(), Invalidation::User(12));
        assert_eq!(key.invalidation(), Invalidation::UserByLogin("bob".to_string()));
    }
}
