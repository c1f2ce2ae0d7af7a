use std::sync::Arc;
use std::time::Duration;

use sqlx::AnyPool;
use sqlx::any::AnyPoolOptions;
use uuid::Uuid;

use common::time::now_epoch;
use store::cache::WorkCache;
use store::repository_sqlx::SqlxCacheRepository;

/// Isolated in-memory DB per test.
/// Unique name prevents test interference during parallel execution.
/// `cache=shared` allows multiple connections within the same pool to see the same in-memory DB.
async fn setup_db() -> AnyPool {
    sqlx::any::install_default_drivers();

    let db_name = Uuid::new_v4().to_string();
    let conn = format!("sqlite:file:{}?mode=memory&cache=shared", db_name);

    let pool = AnyPoolOptions::new()
        .max_connections(5)
        .connect(&conn)
        .await
        .expect("connect sqlite memory db");

    store::schema::migrate(&pool).await.expect("migrate");

    pool
}

async fn mk_cache() -> WorkCache {
    let pool = setup_db().await;
    WorkCache::new(Arc::new(SqlxCacheRepository::new(pool)))
}

#[tokio::test]
async fn sqlite_staleness_and_artifact_roundtrip() {
    let cache = mk_cache().await;
    let now = now_epoch();

    cache.set("sync:portfolio", now + 120).await.unwrap();
    assert_eq!(
        cache.expires_at("sync:portfolio").await.unwrap(),
        Some(now + 120)
    );

    cache
        .set_json("planner:plan", &vec!["BUY".to_string(), "HOLD".to_string()], now + 120)
        .await
        .unwrap();

    let plan: Vec<String> = cache.get_json("planner:plan").await.unwrap().unwrap();
    assert_eq!(plan, vec!["BUY", "HOLD"]);
}

#[tokio::test]
async fn sqlite_upsert_replaces_expiry() {
    let cache = mk_cache().await;
    let now = now_epoch();

    cache.set("sync:rates", now + 10).await.unwrap();
    cache.set("sync:rates", now + 3_600).await.unwrap();

    assert_eq!(
        cache.expires_at("sync:rates").await.unwrap(),
        Some(now + 3_600)
    );
}

#[tokio::test]
async fn sqlite_delete_by_prefix_is_literal() {
    let cache = mk_cache().await;
    let now = now_epoch();

    cache.set("dividend:detect", now + 60).await.unwrap();
    cache.set("dividend:analyze:US123", now + 60).await.unwrap();
    // Keys that a wildcard-happy LIKE would also match.
    cache.set("dividendXdetect", now + 60).await.unwrap();

    let removed = cache.delete_by_prefix("dividend:").await.unwrap();
    assert_eq!(removed, 2);

    assert!(cache.expires_at("dividendXdetect").await.unwrap().is_some());
}

#[tokio::test]
async fn sqlite_extend_from_current_expiry() {
    let cache = mk_cache().await;
    let now = now_epoch();

    cache.set("sequences", now + 500).await.unwrap();
    cache
        .extend_expiration("sequences", Duration::from_secs(300))
        .await
        .unwrap();

    assert_eq!(
        cache.expires_at("sequences").await.unwrap(),
        Some(now + 800)
    );
}
