//! Basic usage of the user query cache.

use user_query_cache::{
    backend::InMemoryBackend,
    error::Result,
    repository::{InMemoryDirectory, InMemoryExecutor},
    CountStrategy, QueryDescriptor, SelectClauses, UserCounts, UserEvent, UserQuery,
    UserQueryCache,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .try_init()
        .ok();

    println!("\n=== User Query Cache - Basic Example ===\n");

    // 1. Wire up the collaborators
    println!("1. Initializing in-memory store, directory and executor...");
    let directory = InMemoryDirectory::multisite();
    directory.insert_user(7, "alice", &["wp_capabilities", "wp_2_capabilities"]);
    directory.insert_user(9, "bob", &["wp_2_capabilities"]);
    directory.set_counts(
        2,
        UserCounts {
            total_users: 2,
            ..Default::default()
        },
    );

    let cache = UserQueryCache::builder(InMemoryBackend::new(), directory.clone(), directory.clone())
        .with_base_prefix("wp_")
        .build()?;
    let executor = InMemoryExecutor::new().with_column(&["7", "9"], 2);
    println!("   ✓ Cache ready\n");

    let clauses = SelectClauses {
        fields: "SQL_CALC_FOUND_ROWS wp_users.ID".to_string(),
        from: "FROM wp_users INNER JOIN wp_usermeta ON (wp_users.ID = wp_usermeta.user_id)"
            .to_string(),
        where_clause: "WHERE 1=1 AND wp_usermeta.meta_key = 'wp_2_capabilities'".to_string(),
        orderby: "ORDER BY user_login ASC".to_string(),
        limit: "LIMIT 0, 10".to_string(),
    };
    let query = UserQuery::from_clauses(
        &clauses,
        QueryDescriptor::for_site(2).with_count_total(true),
    );

    // 2. First request - miss, executor runs
    println!("2. First request for site 2 users:");
    let results = cache.execute(&query, &executor).await?;
    println!(
        "   ✓ {} rows, total {} (statements run: {})\n",
        results.rows.len(),
        results.total_count,
        executor.execution_count()
    );

    // 3. Second request - hit, executor untouched
    println!("3. Same request again:");
    let results = cache.execute(&query, &executor).await?;
    println!(
        "   ✓ {} rows from cache (statements run: {})\n",
        results.rows.len(),
        executor.execution_count()
    );

    // 4. A member changes - site and global salts move
    println!("4. alice updates her profile:");
    cache
        .handle_event(&UserEvent::ProfileUpdated { user_id: 7 })
        .await;
    cache.execute(&query, &executor).await?;
    println!(
        "   ✓ Re-executed after invalidation (statements run: {})\n",
        executor.execution_count()
    );

    // 5. Cached user counts
    println!("5. Counting users on site 2 twice:");
    cache.count_users(&directory, CountStrategy::Time, Some(2)).await?;
    let counts = cache.count_users(&directory, CountStrategy::Time, Some(2)).await?;
    println!(
        "   ✓ total_users = {:?} (counter calls: {})\n",
        counts.map(|c| c.total_users),
        directory.count_calls()
    );

    println!("=== Example Complete ===\n");

    Ok(())
}
