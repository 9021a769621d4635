//! Resource ownership and file-lock repository ports (spec §4.1, §4.3).

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::error::DomainResult;
use crate::domain::models::{FileLock, ResourceOwnership};

#[async_trait]
pub trait LockRepository: Send + Sync {
    /// Inserts the ownership row; fails if a conflicting owner already holds the path.
    async fn register_owner(&self, ownership: &ResourceOwnership) -> DomainResult<bool>;
    async fn get_owner(&self, path: &str) -> DomainResult<Option<ResourceOwnership>>;
    async fn release_owner(&self, path: &str, owner: &str) -> DomainResult<()>;

    /// Inserts a lock row iff no non-expired lock exists for `path`, or the
    /// existing lock is held by the same holder (reacquire/extend). Returns
    /// `true` on success, `false` on conflict. Must be atomic (spec §4.3,
    /// §5 "lock acquisition must be serializable").
    async fn try_acquire(&self, lock: &FileLock) -> DomainResult<bool>;
    async fn get_lock(&self, path: &str) -> DomainResult<Option<FileLock>>;
    async fn release(&self, path: &str, holder_id: &str) -> DomainResult<()>;

    /// Deletes all locks with `expires_at <= now`. Returns the number reaped.
    async fn reap_expired(&self, now: DateTime<Utc>) -> DomainResult<u64>;
}
