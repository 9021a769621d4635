//! Resource ownership and file-lock coordination (spec §4.3, §5).

use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::domain::error::OrchestratorError;
use crate::domain::models::{AcquireOutcome, FileLock, ResourceOwnership};
use crate::domain::ports::LockRepository;
use crate::domain::DomainResult;

pub struct ResourceRegistry {
    repository: Arc<dyn LockRepository>,
}

impl ResourceRegistry {
    pub fn new(repository: Arc<dyn LockRepository>) -> Self {
        Self { repository }
    }

    pub async fn register(&self, path: &str, owner: &str, resource_type: &str) -> DomainResult<()> {
        let ownership = ResourceOwnership {
            path: path.to_string(),
            owner: owner.to_string(),
            resource_type: resource_type.to_string(),
        };
        let registered = self.repository.register_owner(&ownership).await?;
        if !registered {
            if let Some(existing) = self.repository.get_owner(path).await? {
                if existing.owner != owner {
                    return Err(OrchestratorError::OwnershipConflict {
                        path: path.to_string(),
                        owner: existing.owner,
                    });
                }
            }
        }
        Ok(())
    }

    pub async fn release_ownership(&self, path: &str, owner: &str) -> DomainResult<()> {
        self.repository.release_owner(path, owner).await
    }

    pub async fn acquire(&self, path: &str, holder_id: &str, ttl: Duration) -> DomainResult<AcquireOutcome> {
        self.repository.reap_expired(Utc::now()).await?;
        let lock = FileLock::new(path, holder_id, ttl);
        if self.repository.try_acquire(&lock).await? {
            Ok(AcquireOutcome::Ok)
        } else {
            let held_by = self
                .repository
                .get_lock(path)
                .await?
                .map(|l| l.holder_id)
                .unwrap_or_else(|| "unknown".to_string());
            Ok(AcquireOutcome::Conflict { held_by })
        }
    }

    /// Acquires every path in canonical (lexicographic) order to avoid
    /// cross-task deadlock cycles (spec §4.3, §5). On the first conflict,
    /// releases everything already acquired and returns the conflicting path.
    pub async fn acquire_all(
        &self,
        paths: &[String],
        holder_id: &str,
        ttl: Duration,
    ) -> DomainResult<Result<(), String>> {
        let mut ordered: Vec<&String> = paths.iter().collect();
        ordered.sort();

        let mut acquired = Vec::new();
        for path in ordered {
            match self.acquire(path, holder_id, ttl).await? {
                AcquireOutcome::Ok => acquired.push(path.clone()),
                AcquireOutcome::Conflict { .. } => {
                    for held in &acquired {
                        self.release(held, holder_id).await?;
                    }
                    return Ok(Err(path.clone()));
                }
            }
        }
        Ok(Ok(()))
    }

    pub async fn release(&self, path: &str, holder_id: &str) -> DomainResult<()> {
        self.repository.release(path, holder_id).await
    }

    pub async fn release_all(&self, paths: &[String], holder_id: &str) -> DomainResult<()> {
        for path in paths {
            self.release(path, holder_id).await?;
        }
        Ok(())
    }

    pub async fn reap_expired(&self) -> DomainResult<u64> {
        self.repository.reap_expired(Utc::now()).await
    }
}
