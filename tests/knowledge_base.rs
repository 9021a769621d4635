//! Exercises knowledge-item merge-on-collision and glob-based applicability.

mod common;

use uuid::Uuid;

use taskforge::domain::models::{KnowledgeKind, KnowledgeQuery};

#[tokio::test]
async fn recording_the_same_gotcha_twice_averages_confidence_instead_of_duplicating() {
    let db = common::TestDb::new().await;
    let kb = common::knowledge_base(&db);

    let session_a = Uuid::new_v4();
    let session_b = Uuid::new_v4();

    let first = kb
        .record(KnowledgeKind::Gotcha, "forgot to await the lock release", "src/services/*.rs", 0.6, "qa-agent", session_a)
        .await
        .unwrap();
    assert_eq!(first.occurrence_count, 1);

    let second = kb
        .record(KnowledgeKind::Gotcha, "forgot to await the lock release", "src/services/*.rs", 0.8, "qa-agent", session_b)
        .await
        .unwrap();

    assert_eq!(second.id, first.id);
    assert_eq!(second.occurrence_count, 2);
    assert!((second.confidence - 0.7).abs() < 1e-9);
    assert_eq!(second.distinct_session_count(), 2);

    let all = kb.query(KnowledgeQuery::default()).await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn applicable_to_filters_by_glob_file_pattern() {
    let db = common::TestDb::new().await;
    let kb = common::knowledge_base(&db);
    let session = Uuid::new_v4();

    kb.record(KnowledgeKind::Pattern, "use CAS for status writes", "src/services/*.rs", 0.9, "build-agent", session)
        .await
        .unwrap();
    kb.record(KnowledgeKind::Decision, "adopted WAL mode", "src/infrastructure/database/*.rs", 0.95, "build-agent", session)
        .await
        .unwrap();

    let hits = kb.applicable_to("src/services/task_orchestrator.rs").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].content, "use CAS for status writes");

    let misses = kb.applicable_to("src/cli/mod.rs").await.unwrap();
    assert!(misses.is_empty());
}

#[tokio::test]
async fn is_universal_requires_both_confidence_and_distinct_session_thresholds() {
    let db = common::TestDb::new().await;
    let kb = common::knowledge_base(&db);

    let item = kb
        .record(KnowledgeKind::Pattern, "retry transient errors with backoff", "**/*.rs", 0.95, "build-agent", Uuid::new_v4())
        .await
        .unwrap();

    // Only observed once so far; confidence alone isn't enough.
    assert!(!kb.is_universal(&item));
}
