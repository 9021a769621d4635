//! Version-control adapter port (spec §4.4).
//!
//! The adapter is the *only* component allowed to mutate the working tree
//! on behalf of the orchestrator.

use async_trait::async_trait;

use crate::domain::error::DomainResult;

/// A structural snapshot of the working tree, used to assert bit-exact
/// rollback (spec §4.8 Phase E, §8 "Rollback completeness").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkingTreeStatus {
    /// Sorted `(path, content_hash)` pairs covering every tracked file.
    pub entries: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct DiffEntry {
    pub path: String,
    pub patch: String,
}

#[async_trait]
pub trait VcsAdapter: Send + Sync {
    async fn current_ref(&self) -> DomainResult<String>;
    async fn branch(&self, name: &str) -> DomainResult<()>;

    /// Writes or deletes `path` in the working tree; does not stage or commit.
    async fn write_file(&self, path: &str, contents: &[u8]) -> DomainResult<()>;
    async fn delete_file(&self, path: &str) -> DomainResult<()>;

    async fn stage(&self, paths: &[String]) -> DomainResult<()>;
    async fn commit(&self, message: &str) -> DomainResult<String>;

    /// Restores `path` to its content at `reference`, bit-exactly (spec §4.4 contract).
    async fn checkout_file(&self, path: &str, reference: &str) -> DomainResult<()>;

    async fn status(&self) -> DomainResult<WorkingTreeStatus>;
    async fn diff(&self, ref_a: &str, ref_b: &str, paths: Option<&[String]>) -> DomainResult<Vec<DiffEntry>>;

    /// The most recent commit ref that touched `path`, or `None` if the path
    /// has never been committed (spec §4.8 Phase D step 3a).
    async fn file_last_ref(&self, path: &str) -> DomainResult<Option<String>>;

    async fn file_exists(&self, path: &str) -> DomainResult<bool>;
}
