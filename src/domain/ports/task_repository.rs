//! Task repository port (spec §4.1).

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::error::DomainResult;
use crate::domain::models::{Task, TaskFilter, TaskStatus};

#[async_trait]
pub trait TaskRepository: Send + Sync {
    async fn create(&self, task: &Task) -> DomainResult<()>;
    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>>;

    /// Persists the task's current fields. `expected_status` implements the
    /// compare-and-set described in spec §5 ("a `SELECT … FOR UPDATE`-equivalent
    /// on the candidate row, or a compare-and-set on `status`"): the update only
    /// applies if the stored status still matches, so two concurrent
    /// orchestrators racing to dispatch the same task cannot both win.
    async fn update_cas(&self, task: &Task, expected_status: TaskStatus) -> DomainResult<bool>;

    async fn update(&self, task: &Task) -> DomainResult<()>;
    async fn delete(&self, id: Uuid) -> DomainResult<()>;
    async fn list(&self, filter: TaskFilter) -> DomainResult<Vec<Task>>;

    /// Tasks whose dependencies are all `completed` and required inputs are
    /// present, ordered by `(priority desc, created_at asc)` (spec §4.9 Routing).
    async fn get_ready_candidates(&self, limit: usize) -> DomainResult<Vec<Task>>;

    /// Tasks currently `pending_verification`, ordered by `(priority desc,
    /// created_at asc)`, awaiting a verification session (spec §4.9
    /// `pending_verification → completed`).
    async fn get_verification_candidates(&self, limit: usize) -> DomainResult<Vec<Task>>;

    /// Tasks currently `pending` with `next_retry_at <= now`.
    async fn get_due_retries(&self, now: chrono::DateTime<chrono::Utc>) -> DomainResult<Vec<Task>>;
}
