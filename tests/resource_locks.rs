//! Exercises `ResourceRegistry`'s all-or-nothing multi-path locking against
//! a real SQLite-backed `LockRepository`.

mod common;

use chrono::Duration;

#[tokio::test]
async fn acquire_all_is_all_or_nothing_on_conflict() {
    let db = common::TestDb::new().await;
    let registry = common::resource_registry(&db);

    let ttl = Duration::minutes(30);
    registry.acquire("src/b.rs", "holder-a", ttl).await.unwrap();

    let paths = vec!["src/a.rs".to_string(), "src/b.rs".to_string(), "src/c.rs".to_string()];
    let outcome = registry.acquire_all(&paths, "holder-b", ttl).await.unwrap();
    assert_eq!(outcome, Err("src/b.rs".to_string()));

    // holder-b must not have kept `a.rs`, which it grabbed before the conflict.
    let still_free = registry.acquire("src/a.rs", "holder-c", ttl).await.unwrap();
    assert_eq!(still_free, taskforge::domain::models::AcquireOutcome::Ok);
}

#[tokio::test]
async fn acquire_all_succeeds_when_every_path_is_free() {
    let db = common::TestDb::new().await;
    let registry = common::resource_registry(&db);
    let ttl = Duration::minutes(30);

    let paths = vec!["src/x.rs".to_string(), "src/y.rs".to_string()];
    let outcome = registry.acquire_all(&paths, "holder-a", ttl).await.unwrap();
    assert_eq!(outcome, Ok(()));

    registry.release_all(&paths, "holder-a").await.unwrap();

    // Released, so another holder can now take them.
    let outcome = registry.acquire_all(&paths, "holder-b", ttl).await.unwrap();
    assert_eq!(outcome, Ok(()));
}

#[tokio::test]
async fn expired_locks_are_reaped() {
    let db = common::TestDb::new().await;
    let registry = common::resource_registry(&db);

    registry.acquire("src/stale.rs", "holder-a", Duration::seconds(-1)).await.unwrap();
    let reaped = registry.reap_expired().await.unwrap();
    assert_eq!(reaped, 1);

    let outcome = registry.acquire("src/stale.rs", "holder-b", Duration::minutes(5)).await.unwrap();
    assert_eq!(outcome, taskforge::domain::models::AcquireOutcome::Ok);
}
