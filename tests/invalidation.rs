//! End-to-end invalidation scenarios against the in-memory collaborators.

use user_query_cache::backend::{CacheBackend, InMemoryBackend};
use user_query_cache::repository::{InMemoryDirectory, InMemoryExecutor};
use user_query_cache::value::{Site, User};
use user_query_cache::{QueryDescriptor, UserEvent, UserQuery, UserQueryCache, UserRows};

type Cache = UserQueryCache<InMemoryBackend, InMemoryDirectory, InMemoryDirectory>;

const SITE_A: u64 = 2;
const SITE_B: u64 = 3;
const MEMBER: u64 = 7;

fn setup() -> (Cache, InMemoryBackend, InMemoryDirectory) {
    let _ = env_logger::builder().is_test(true).try_init();

    let backend = InMemoryBackend::new();
    let directory = InMemoryDirectory::multisite();
    directory.insert_user(MEMBER, "alice", &["wp_2_capabilities", "first_name"]);
    directory.insert_user(8, "bob", &["wp_3_capabilities"]);
    let cache = UserQueryCache::new(backend.clone(), directory.clone(), directory.clone());
    (cache, backend, directory)
}

fn site_query(site_id: u64) -> UserQuery {
    UserQuery::new(
        format!(
            "SELECT SQL_CALC_FOUND_ROWS wp_users.ID FROM wp_users INNER JOIN wp_usermeta \
             ON (wp_users.ID = wp_usermeta.user_id) WHERE 1=1 AND wp_usermeta.meta_key = \
             'wp_{}_capabilities' ORDER BY user_login ASC LIMIT 0, 10",
            site_id
        ),
        QueryDescriptor::for_site(site_id).with_count_total(true),
    )
}

fn global_query() -> UserQuery {
    UserQuery::new(
        "SELECT SQL_CALC_FOUND_ROWS wp_users.ID FROM wp_users WHERE 1=1 ORDER BY user_login ASC",
        QueryDescriptor::global().with_count_total(true),
    )
}

/// Warm the cache for `query` and confirm the next lookup hits.
async fn warm(cache: &Cache, query: &UserQuery) {
    let executor = InMemoryExecutor::new().with_column(&["7", "9"], 2);
    cache.execute(query, &executor).await.expect("Failed to execute");
    assert!(cache.prepare(query).await.is_hit(), "warm-up did not populate cache");
}

#[tokio::test]
async fn scenario_site_query_invalidated_by_member_update() {
    let (cache, _, _) = setup();
    let executor = InMemoryExecutor::new().with_column(&["7", "9"], 2);
    let q1 = site_query(SITE_A);

    let first = cache.execute(&q1, &executor).await.expect("Failed to execute");
    assert_eq!(first.rows, UserRows::Column(vec!["7".to_string(), "9".to_string()]));
    assert_eq!(first.total_count, 2);
    assert_eq!(executor.execution_count(), 2);

    let second = cache.execute(&q1, &executor).await.expect("Failed to execute");
    assert_eq!(second, first);
    assert_eq!(executor.execution_count(), 2, "hit must not invoke the executor");

    cache
        .handle_event(&UserEvent::ProfileUpdated { user_id: MEMBER })
        .await;

    cache.execute(&q1, &executor).await.expect("Failed to execute");
    assert_eq!(executor.execution_count(), 4, "salt change must force a miss");
}

#[tokio::test]
async fn scenario_global_query_ignores_unrelated_sites() {
    let (cache, _, _) = setup();
    let query = global_query();
    warm(&cache, &query).await;

    cache.clear_site(SITE_B).await;
    cache
        .handle_event(&UserEvent::SiteCreated {
            site: Site {
                id: 40,
                domain: "example.org".to_string(),
                path: "/forty/".to_string(),
            }
            .into(),
        })
        .await;
    assert!(cache.prepare(&query).await.is_hit());

    cache.clear_user(8).await;
    assert!(!cache.prepare(&query).await.is_hit());
}

#[tokio::test]
async fn stale_entries_remain_physically_but_unreachable() {
    let (cache, backend, _) = setup();
    let query = site_query(SITE_A);
    warm(&cache, &query).await;

    let old_key = cache
        .prepare(&query)
        .await
        .key()
        .cloned()
        .expect("Key missing")
        .store_key("users");

    cache.clear_site(SITE_A).await;

    assert!(!cache.prepare(&query).await.is_hit());
    assert!(backend.exists(&old_key).await.expect("Failed to check"));
}

#[tokio::test]
async fn site_bump_is_isolated() {
    let (cache, _, _) = setup();
    let a = site_query(SITE_A);
    let b = site_query(SITE_B);
    let g = global_query();
    warm(&cache, &a).await;
    warm(&cache, &b).await;
    warm(&cache, &g).await;

    cache.clear_site(SITE_A).await;

    assert!(!cache.prepare(&a).await.is_hit());
    assert!(cache.prepare(&b).await.is_hit());
    assert!(cache.prepare(&g).await.is_hit());
}

#[tokio::test]
async fn every_user_event_invalidates_member_site_and_global() {
    let user_events = vec![
        UserEvent::UserRegistered { user_id: MEMBER },
        UserEvent::NewUserRegistered { user_id: MEMBER },
        UserEvent::ProfileUpdated { user_id: MEMBER },
        UserEvent::UserDeleted { user_id: MEMBER },
        UserEvent::AdminCreatedUser { user_id: MEMBER },
        UserEvent::UserCacheCleaned { user_id: MEMBER },
        UserEvent::NetworkUserDeleted { user_id: MEMBER },
        UserEvent::MarkedSpam { user_id: MEMBER },
        UserEvent::PasswordReset {
            user: User {
                id: MEMBER,
                login: "alice".to_string(),
            },
        },
        UserEvent::PasswordKeyRetrieved {
            login: "alice".to_string(),
        },
        UserEvent::UserMetaAdded { user_id: MEMBER },
        UserEvent::UserMetaUpdated {
            meta_id: 501,
            user_id: MEMBER,
        },
        UserEvent::UserMetaDeleted {
            meta_ids: vec![501],
            user_id: MEMBER,
        },
    ];

    for event in user_events {
        let (cache, _, _) = setup();
        let site = site_query(SITE_A);
        let other = site_query(SITE_B);
        let global = global_query();
        warm(&cache, &site).await;
        warm(&cache, &other).await;
        warm(&cache, &global).await;

        cache.handle_event(&event).await;

        assert!(!cache.prepare(&site).await.is_hit(), "{} kept site entry", event.name());
        assert!(!cache.prepare(&global).await.is_hit(), "{} kept global entry", event.name());
        assert!(cache.prepare(&other).await.is_hit(), "{} hit unrelated site", event.name());
    }
}

#[tokio::test]
async fn membership_events_invalidate_target_site() {
    let events = vec![
        UserEvent::AddedToSite {
            user_id: MEMBER,
            role: "author".to_string(),
            site_id: SITE_B,
        },
        UserEvent::RemovedFromSite {
            user_id: MEMBER,
            site_id: SITE_B,
        },
    ];

    for event in events {
        let (cache, _, _) = setup();
        let current = site_query(SITE_A);
        let target = site_query(SITE_B);
        let global = global_query();
        warm(&cache, &current).await;
        warm(&cache, &target).await;
        warm(&cache, &global).await;

        cache.handle_event(&event).await;

        assert!(!cache.prepare(&current).await.is_hit(), "{}", event.name());
        assert!(!cache.prepare(&target).await.is_hit(), "{}", event.name());
        assert!(!cache.prepare(&global).await.is_hit(), "{}", event.name());
    }
}

#[tokio::test]
async fn new_membership_is_picked_up_on_next_user_change() {
    let (cache, _, directory) = setup();
    let joined = site_query(9);
    let unrelated = site_query(SITE_B);
    warm(&cache, &joined).await;
    warm(&cache, &unrelated).await;

    cache.clear_user(MEMBER).await;
    assert!(cache.prepare(&joined).await.is_hit());

    directory.add_meta_key(MEMBER, "wp_9_capabilities");
    cache
        .handle_event(&UserEvent::ProfileUpdated { user_id: MEMBER })
        .await;

    assert!(!cache.prepare(&joined).await.is_hit());
    assert!(cache.prepare(&unrelated).await.is_hit());
}

#[tokio::test]
async fn site_events_invalidate_only_that_site() {
    let events = vec![
        UserEvent::SiteCreated {
            site: SITE_A.into(),
        },
        UserEvent::SiteDeleted {
            site: Site {
                id: SITE_A,
                domain: "example.org".to_string(),
                path: "/a/".to_string(),
            }
            .into(),
        },
    ];

    for event in events {
        let (cache, _, _) = setup();
        let site = site_query(SITE_A);
        let other = site_query(SITE_B);
        let global = global_query();
        warm(&cache, &site).await;
        warm(&cache, &other).await;
        warm(&cache, &global).await;

        cache.handle_event(&event).await;

        assert!(!cache.prepare(&site).await.is_hit(), "{}", event.name());
        assert!(cache.prepare(&other).await.is_hit(), "{}", event.name());
        assert!(cache.prepare(&global).await.is_hit(), "{}", event.name());
    }
}

#[tokio::test]
async fn published_posts_query_follows_posts_changes() {
    let (cache, _, directory) = setup();
    let query = UserQuery::new(
        "SELECT wp_users.ID FROM wp_users WHERE ID IN (SELECT post_author FROM wp_2_posts)",
        QueryDescriptor::for_site(SITE_A).with_published_posts(true),
    );
    warm(&cache, &query).await;

    directory.touch_posts(SITE_B);
    assert!(cache.prepare(&query).await.is_hit());

    directory.touch_posts(SITE_A);
    assert!(!cache.prepare(&query).await.is_hit());
}

#[tokio::test]
async fn concurrent_requests_keep_their_own_pending_state() {
    let (cache, _, _) = setup();
    let warm_query = site_query(SITE_A);
    let cold_query = site_query(SITE_B);
    warm(&cache, &warm_query).await;

    let (hit, miss) = tokio::join!(cache.prepare(&warm_query), cache.prepare(&cold_query));
    assert!(hit.is_hit());
    assert!(!miss.is_hit());

    let fresh = user_query_cache::QueryResults {
        rows: UserRows::Column(vec!["8".to_string()]),
        total_count: 1,
    };
    let (from_cache, from_executor) = tokio::join!(
        cache.materialize(hit, None),
        cache.materialize(miss, Some(fresh.clone()))
    );

    assert_eq!(
        from_cache.expect("Failed to materialize").rows,
        UserRows::Column(vec!["7".to_string(), "9".to_string()])
    );
    assert_eq!(from_executor.expect("Failed to materialize"), fresh);
}
