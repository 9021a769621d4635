//! SQLite-backed [`LockRepository`] (spec §4.3, §5).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::domain::models::{FileLock, ResourceOwnership};
use crate::domain::ports::LockRepository;
use crate::domain::DomainResult;

pub struct LockRepositoryImpl {
    pool: SqlitePool,
}

impl LockRepositoryImpl {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LockRepository for LockRepositoryImpl {
    async fn register_owner(&self, ownership: &ResourceOwnership) -> DomainResult<bool> {
        let result = sqlx::query(
            "INSERT OR IGNORE INTO resource_ownership (path, owner, resource_type) VALUES (?, ?, ?)",
        )
        .bind(&ownership.path)
        .bind(&ownership.owner)
        .bind(&ownership.resource_type)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn get_owner(&self, path: &str) -> DomainResult<Option<ResourceOwnership>> {
        let row = sqlx::query("SELECT * FROM resource_ownership WHERE path = ?")
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| ResourceOwnership {
            path: r.get("path"),
            owner: r.get("owner"),
            resource_type: r.get("resource_type"),
        }))
    }

    async fn release_owner(&self, path: &str, owner: &str) -> DomainResult<()> {
        sqlx::query("DELETE FROM resource_ownership WHERE path = ? AND owner = ?")
            .bind(path)
            .bind(owner)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn try_acquire(&self, lock: &FileLock) -> DomainResult<bool> {
        let mut tx = self.pool.begin().await?;
        let now = Utc::now().to_rfc3339();

        sqlx::query("DELETE FROM file_locks WHERE path = ? AND expires_at <= ?")
            .bind(&lock.path)
            .bind(&now)
            .execute(&mut *tx)
            .await?;

        let existing = sqlx::query("SELECT holder_id FROM file_locks WHERE path = ?")
            .bind(&lock.path)
            .fetch_optional(&mut *tx)
            .await?;

        let acquired = match existing {
            Some(row) => {
                let holder: String = row.get("holder_id");
                if holder == lock.holder_id {
                    sqlx::query("UPDATE file_locks SET acquired_at = ?, expires_at = ? WHERE path = ?")
                        .bind(lock.acquired_at.to_rfc3339())
                        .bind(lock.expires_at.to_rfc3339())
                        .bind(&lock.path)
                        .execute(&mut *tx)
                        .await?;
                    true
                } else {
                    false
                }
            }
            None => {
                sqlx::query(
                    "INSERT INTO file_locks (path, holder_id, acquired_at, expires_at) VALUES (?, ?, ?, ?)",
                )
                .bind(&lock.path)
                .bind(&lock.holder_id)
                .bind(lock.acquired_at.to_rfc3339())
                .bind(lock.expires_at.to_rfc3339())
                .execute(&mut *tx)
                .await?;
                true
            }
        };

        tx.commit().await?;
        Ok(acquired)
    }

    async fn get_lock(&self, path: &str) -> DomainResult<Option<FileLock>> {
        let row = sqlx::query("SELECT * FROM file_locks WHERE path = ?")
            .bind(path)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| {
            Ok(FileLock {
                path: r.get("path"),
                holder_id: r.get("holder_id"),
                acquired_at: DateTime::parse_from_rfc3339(&r.get::<String, _>("acquired_at"))
                    .map(|d| d.with_timezone(&Utc))
                    .map_err(|e| crate::domain::error::OrchestratorError::Database(e.to_string()))?,
                expires_at: DateTime::parse_from_rfc3339(&r.get::<String, _>("expires_at"))
                    .map(|d| d.with_timezone(&Utc))
                    .map_err(|e| crate::domain::error::OrchestratorError::Database(e.to_string()))?,
            })
        })
        .transpose()
    }

    async fn release(&self, path: &str, holder_id: &str) -> DomainResult<()> {
        sqlx::query("DELETE FROM file_locks WHERE path = ? AND holder_id = ?")
            .bind(path)
            .bind(holder_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn reap_expired(&self, now: DateTime<Utc>) -> DomainResult<u64> {
        let result = sqlx::query("DELETE FROM file_locks WHERE expires_at <= ?")
            .bind(now.to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
