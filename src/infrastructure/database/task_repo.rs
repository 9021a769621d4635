//! SQLite-backed [`TaskRepository`] (spec §4.1, §4.9).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::error::OrchestratorError;
use crate::domain::models::{AgentType, LastError, Task, TaskFilter, TaskStatus};
use crate::domain::ports::TaskRepository;
use crate::domain::DomainResult;

pub struct TaskRepositoryImpl {
    pool: SqlitePool,
}

impl TaskRepositoryImpl {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    async fn replace_dependencies(&self, task: &Task) -> DomainResult<()> {
        sqlx::query("DELETE FROM task_dependencies WHERE task_id = ?")
            .bind(task.id.to_string())
            .execute(&self.pool)
            .await?;
        for dep in &task.dependencies {
            sqlx::query("INSERT INTO task_dependencies (task_id, depends_on_id) VALUES (?, ?)")
                .bind(task.id.to_string())
                .bind(dep.to_string())
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }

    async fn load_dependencies(&self, task_id: Uuid) -> DomainResult<Vec<Uuid>> {
        let rows = sqlx::query("SELECT depends_on_id FROM task_dependencies WHERE task_id = ?")
            .bind(task_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|r| {
                let s: String = r.get("depends_on_id");
                Uuid::parse_str(&s).map_err(|e| OrchestratorError::Database(e.to_string()))
            })
            .collect()
    }

    fn row_to_task_partial(row: &sqlx::sqlite::SqliteRow) -> DomainResult<Task> {
        let id: String = row.get("id");
        let status: String = row.get("status");
        let agent_type: String = row.get("assigned_agent_type");
        let last_error_kind: Option<String> = row.get("last_error_kind");
        let last_error = last_error_kind.map(|kind| LastError {
            kind: crate::domain::error::ErrorKind::from_str(&kind).unwrap_or(crate::domain::error::ErrorKind::Unknown),
            message: row.get::<Option<String>, _>("last_error_message").unwrap_or_default(),
            location: row.get("last_error_location"),
        });

        Ok(Task {
            id: Uuid::parse_str(&id).map_err(|e| OrchestratorError::Database(e.to_string()))?,
            display_id: row.get("display_id"),
            title: row.get("title"),
            spec_path: row.get("spec_path"),
            status: TaskStatus::from_str(&status)
                .ok_or_else(|| OrchestratorError::Database(format!("unknown task status: {status}")))?,
            assigned_agent_type: AgentType::from_str(&agent_type)
                .ok_or_else(|| OrchestratorError::Database(format!("unknown agent type: {agent_type}")))?,
            priority: row.get("priority"),
            retry_count: row.get::<i64, _>("retry_count") as u32,
            next_retry_at: row.get::<Option<String>, _>("next_retry_at")
                .map(|s| DateTime::parse_from_rfc3339(&s).map(|d| d.with_timezone(&Utc)))
                .transpose()
                .map_err(|e| OrchestratorError::Database(e.to_string()))?,
            dependencies: Vec::new(),
            last_error,
            completion_report: row.get("completion_report"),
            needs_review: row.get::<i64, _>("needs_review") != 0,
            review_reason: row.get("review_reason"),
            created_at: DateTime::parse_from_rfc3339(&row.get::<String, _>("created_at"))
                .map(|d| d.with_timezone(&Utc))
                .map_err(|e| OrchestratorError::Database(e.to_string()))?,
            updated_at: DateTime::parse_from_rfc3339(&row.get::<String, _>("updated_at"))
                .map(|d| d.with_timezone(&Utc))
                .map_err(|e| OrchestratorError::Database(e.to_string()))?,
        })
    }

    async fn hydrate(&self, mut task: Task) -> DomainResult<Task> {
        task.dependencies = self.load_dependencies(task.id).await?;
        Ok(task)
    }
}

#[async_trait]
impl TaskRepository for TaskRepositoryImpl {
    async fn create(&self, task: &Task) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO tasks (id, display_id, title, spec_path, status, assigned_agent_type, priority, \
             retry_count, next_retry_at, last_error_kind, last_error_message, last_error_location, \
             completion_report, needs_review, review_reason, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(task.id.to_string())
        .bind(&task.display_id)
        .bind(&task.title)
        .bind(&task.spec_path)
        .bind(task.status.as_str())
        .bind(task.assigned_agent_type.as_str())
        .bind(task.priority)
        .bind(task.retry_count as i64)
        .bind(task.next_retry_at.map(|d| d.to_rfc3339()))
        .bind(task.last_error.as_ref().map(|e| e.kind.as_str()))
        .bind(task.last_error.as_ref().map(|e| e.message.clone()))
        .bind(task.last_error.as_ref().and_then(|e| e.location.clone()))
        .bind(&task.completion_report)
        .bind(task.needs_review as i64)
        .bind(&task.review_reason)
        .bind(task.created_at.to_rfc3339())
        .bind(task.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.replace_dependencies(task).await
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>> {
        let row = sqlx::query("SELECT * FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => Ok(Some(self.hydrate(Self::row_to_task_partial(&row)?).await?)),
            None => Ok(None),
        }
    }

    async fn update_cas(&self, task: &Task, expected_status: TaskStatus) -> DomainResult<bool> {
        let result = sqlx::query(
            "UPDATE tasks SET status = ?, retry_count = ?, next_retry_at = ?, last_error_kind = ?, \
             last_error_message = ?, last_error_location = ?, completion_report = ?, needs_review = ?, \
             review_reason = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(task.status.as_str())
        .bind(task.retry_count as i64)
        .bind(task.next_retry_at.map(|d| d.to_rfc3339()))
        .bind(task.last_error.as_ref().map(|e| e.kind.as_str()))
        .bind(task.last_error.as_ref().map(|e| e.message.clone()))
        .bind(task.last_error.as_ref().and_then(|e| e.location.clone()))
        .bind(&task.completion_report)
        .bind(task.needs_review as i64)
        .bind(&task.review_reason)
        .bind(Utc::now().to_rfc3339())
        .bind(task.id.to_string())
        .bind(expected_status.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn update(&self, task: &Task) -> DomainResult<()> {
        sqlx::query(
            "UPDATE tasks SET title = ?, spec_path = ?, status = ?, priority = ?, retry_count = ?, \
             next_retry_at = ?, last_error_kind = ?, last_error_message = ?, last_error_location = ?, \
             completion_report = ?, needs_review = ?, review_reason = ?, updated_at = ? WHERE id = ?",
        )
        .bind(&task.title)
        .bind(&task.spec_path)
        .bind(task.status.as_str())
        .bind(task.priority)
        .bind(task.retry_count as i64)
        .bind(task.next_retry_at.map(|d| d.to_rfc3339()))
        .bind(task.last_error.as_ref().map(|e| e.kind.as_str()))
        .bind(task.last_error.as_ref().map(|e| e.message.clone()))
        .bind(task.last_error.as_ref().and_then(|e| e.location.clone()))
        .bind(&task.completion_report)
        .bind(task.needs_review as i64)
        .bind(&task.review_reason)
        .bind(Utc::now().to_rfc3339())
        .bind(task.id.to_string())
        .execute(&self.pool)
        .await?;
        self.replace_dependencies(task).await
    }

    async fn delete(&self, id: Uuid) -> DomainResult<()> {
        sqlx::query("DELETE FROM task_dependencies WHERE task_id = ? OR depends_on_id = ?")
            .bind(id.to_string())
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        sqlx::query("DELETE FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list(&self, filter: TaskFilter) -> DomainResult<Vec<Task>> {
        let mut query = "SELECT * FROM tasks WHERE 1=1".to_string();
        if let Some(status) = filter.status {
            query.push_str(&format!(" AND status = '{}'", status.as_str()));
        }
        if let Some(agent_type) = filter.agent_type {
            query.push_str(&format!(" AND assigned_agent_type = '{}'", agent_type.as_str()));
        }
        query.push_str(" ORDER BY priority DESC, created_at ASC");

        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        let mut tasks = Vec::with_capacity(rows.len());
        for row in &rows {
            tasks.push(self.hydrate(Self::row_to_task_partial(row)?).await?);
        }
        Ok(tasks)
    }

    async fn get_ready_candidates(&self, limit: usize) -> DomainResult<Vec<Task>> {
        let rows = sqlx::query(
            "SELECT * FROM tasks WHERE status = 'ready' ORDER BY priority DESC, created_at ASC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        let mut tasks = Vec::with_capacity(rows.len());
        for row in &rows {
            tasks.push(self.hydrate(Self::row_to_task_partial(row)?).await?);
        }
        Ok(tasks)
    }

    async fn get_verification_candidates(&self, limit: usize) -> DomainResult<Vec<Task>> {
        let rows = sqlx::query(
            "SELECT * FROM tasks WHERE status = 'pending_verification' ORDER BY priority DESC, created_at ASC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;
        let mut tasks = Vec::with_capacity(rows.len());
        for row in &rows {
            tasks.push(self.hydrate(Self::row_to_task_partial(row)?).await?);
        }
        Ok(tasks)
    }

    async fn get_due_retries(&self, now: DateTime<Utc>) -> DomainResult<Vec<Task>> {
        let rows = sqlx::query(
            "SELECT * FROM tasks WHERE status = 'pending' AND next_retry_at IS NOT NULL AND next_retry_at <= ?",
        )
        .bind(now.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;
        let mut tasks = Vec::with_capacity(rows.len());
        for row in &rows {
            tasks.push(self.hydrate(Self::row_to_task_partial(row)?).await?);
        }
        Ok(tasks)
    }
}
