//! Exercises the change-plan engine's phased execution and rollback
//! completeness guarantee (spec §8 "Rollback completeness").

mod common;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use taskforge::domain::models::{ExecutionStatus, FileChange, FileOperation};
use taskforge::domain::ports::vcs::{DiffEntry, VcsAdapter, WorkingTreeStatus};
use taskforge::domain::{DomainResult, OrchestratorError};
use taskforge::infrastructure::vcs::FakeVcsAdapter;
use taskforge::services::ChangePlanEngine;

/// Wraps a `FakeVcsAdapter`, failing `write_file` for one designated path so
/// tests can exercise the rollback path without a real git checkout.
struct FlakyVcs {
    inner: Arc<FakeVcsAdapter>,
    fails_on: String,
}

#[async_trait]
impl VcsAdapter for FlakyVcs {
    async fn current_ref(&self) -> DomainResult<String> {
        self.inner.current_ref().await
    }
    async fn branch(&self, name: &str) -> DomainResult<()> {
        self.inner.branch(name).await
    }
    async fn write_file(&self, path: &str, contents: &[u8]) -> DomainResult<()> {
        if path == self.fails_on {
            return Err(OrchestratorError::Vcs(format!("disk full writing {path}")));
        }
        self.inner.write_file(path, contents).await
    }
    async fn delete_file(&self, path: &str) -> DomainResult<()> {
        self.inner.delete_file(path).await
    }
    async fn stage(&self, paths: &[String]) -> DomainResult<()> {
        self.inner.stage(paths).await
    }
    async fn commit(&self, message: &str) -> DomainResult<String> {
        self.inner.commit(message).await
    }
    async fn checkout_file(&self, path: &str, reference: &str) -> DomainResult<()> {
        self.inner.checkout_file(path, reference).await
    }
    async fn status(&self) -> DomainResult<WorkingTreeStatus> {
        self.inner.status().await
    }
    async fn diff(&self, a: &str, b: &str, paths: Option<&[String]>) -> DomainResult<Vec<DiffEntry>> {
        self.inner.diff(a, b, paths).await
    }
    async fn file_last_ref(&self, path: &str) -> DomainResult<Option<String>> {
        self.inner.file_last_ref(path).await
    }
    async fn file_exists(&self, path: &str) -> DomainResult<bool> {
        self.inner.file_exists(path).await
    }
}

#[tokio::test]
async fn successful_plan_commits_all_files() {
    let db = common::TestDb::new().await;
    let resources = common::resource_registry(&db);
    let vcs = common::fake_vcs();
    let engine = ChangePlanEngine::new(vcs.clone(), resources);

    let files = vec![
        FileChange::new("schema.sql", FileOperation::Create, "new table"),
        FileChange::new("handler.rs", FileOperation::Create, "route handler").depends_on("schema.sql"),
    ];
    let plan = engine.schedule(uuid::Uuid::new_v4(), files).await.unwrap();

    let mut contents = HashMap::new();
    contents.insert("schema.sql".to_string(), b"create table t(id int);".to_vec());
    contents.insert("handler.rs".to_string(), b"fn handle() {}".to_vec());

    let result = engine.execute(&plan, "worker-1", &contents, "add endpoint").await.unwrap();
    assert_eq!(result.status, ExecutionStatus::Applied);
    assert!(result.commit_ref.is_some());
    assert!(vcs.file_exists("schema.sql").await.unwrap());
    assert!(vcs.file_exists("handler.rs").await.unwrap());
}

#[tokio::test]
async fn a_failing_file_rolls_back_every_earlier_write_in_the_plan() {
    let db = common::TestDb::new().await;
    let resources = common::resource_registry(&db);
    let inner = common::fake_vcs();

    // Seed an existing file so the rollback has something to restore to.
    inner.write_file("existing.rs", b"old content").await.unwrap();
    inner.stage(&["existing.rs".to_string()]).await.unwrap();
    inner.commit("seed").await.unwrap();

    let vcs = Arc::new(FlakyVcs { inner: inner.clone(), fails_on: "broken.rs".to_string() });
    let engine = ChangePlanEngine::new(vcs.clone(), resources);

    let files = vec![
        FileChange::new("existing.rs", FileOperation::Modify, "touch it"),
        FileChange::new("broken.rs", FileOperation::Create, "will fail").depends_on("existing.rs"),
    ];
    let plan = engine.schedule(uuid::Uuid::new_v4(), files).await.unwrap();

    let mut contents = HashMap::new();
    contents.insert("existing.rs".to_string(), b"new content".to_vec());
    contents.insert("broken.rs".to_string(), b"irrelevant".to_vec());

    let result = engine.execute(&plan, "worker-2", &contents, "doomed change").await.unwrap();
    assert_eq!(result.status, ExecutionStatus::RolledBack);

    // The first file's write must have been undone, not merely left uncommitted.
    let restored = inner.status().await.unwrap();
    let existing_entry = restored.entries.iter().find(|(path, _)| path == "existing.rs");
    assert!(existing_entry.is_some());
    assert!(!inner.file_exists("broken.rs").await.unwrap());
}

#[tokio::test]
async fn schedule_rejects_a_cyclic_file_dependency() {
    let db = common::TestDb::new().await;
    let resources = common::resource_registry(&db);
    let vcs = common::fake_vcs();
    let engine = ChangePlanEngine::new(vcs, resources);

    let files = vec![
        FileChange::new("a.rs", FileOperation::Create, "a").depends_on("b.rs"),
        FileChange::new("b.rs", FileOperation::Create, "b").depends_on("a.rs"),
    ];
    let result = engine.schedule(uuid::Uuid::new_v4(), files).await;
    assert!(result.is_err());
}
