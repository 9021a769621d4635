//! SQLite-backed [`SessionRepository`] and [`HeartbeatRepository`] (spec §4.7).

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::error::OrchestratorError;
use crate::domain::models::{AgentSession, AgentType, Heartbeat, HeartbeatStatus, SessionStatus};
use crate::domain::ports::{HeartbeatRepository, SessionRepository};
use crate::domain::DomainResult;

pub struct SessionRepositoryImpl {
    pool: SqlitePool,
}

impl SessionRepositoryImpl {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_session(row: &sqlx::sqlite::SqliteRow) -> DomainResult<AgentSession> {
        let id: String = row.get("id");
        let task_id: String = row.get("task_id");
        let agent_type: String = row.get("agent_type");
        let status: String = row.get("status");
        Ok(AgentSession {
            id: Uuid::parse_str(&id).map_err(|e| OrchestratorError::Database(e.to_string()))?,
            task_id: Uuid::parse_str(&task_id).map_err(|e| OrchestratorError::Database(e.to_string()))?,
            agent_type: AgentType::from_str(&agent_type)
                .ok_or_else(|| OrchestratorError::Database(format!("unknown agent type: {agent_type}")))?,
            process_id: row.get::<Option<i64>, _>("process_id").map(|p| p as u32),
            spawned_at: DateTime::parse_from_rfc3339(&row.get::<String, _>("spawned_at"))
                .map(|d| d.with_timezone(&Utc))
                .map_err(|e| OrchestratorError::Database(e.to_string()))?,
            status: SessionStatus::from_str(&status)
                .ok_or_else(|| OrchestratorError::Database(format!("unknown session status: {status}")))?,
            last_heartbeat_at: DateTime::parse_from_rfc3339(&row.get::<String, _>("last_heartbeat_at"))
                .map(|d| d.with_timezone(&Utc))
                .map_err(|e| OrchestratorError::Database(e.to_string()))?,
            exit_code: row.get::<Option<i64>, _>("exit_code").map(|c| c as i32),
            logs_ref: row.get("logs_ref"),
        })
    }
}

#[async_trait]
impl SessionRepository for SessionRepositoryImpl {
    async fn create(&self, session: &AgentSession) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO agent_sessions (id, task_id, agent_type, process_id, spawned_at, status, \
             last_heartbeat_at, exit_code, logs_ref) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(session.id.to_string())
        .bind(session.task_id.to_string())
        .bind(session.agent_type.as_str())
        .bind(session.process_id.map(|p| p as i64))
        .bind(session.spawned_at.to_rfc3339())
        .bind(session.status.as_str())
        .bind(session.last_heartbeat_at.to_rfc3339())
        .bind(session.exit_code.map(|c| c as i64))
        .bind(&session.logs_ref)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<AgentSession>> {
        let row = sqlx::query("SELECT * FROM agent_sessions WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_session).transpose()
    }

    async fn update(&self, session: &AgentSession) -> DomainResult<()> {
        sqlx::query(
            "UPDATE agent_sessions SET process_id = ?, status = ?, last_heartbeat_at = ?, exit_code = ?, \
             logs_ref = ? WHERE id = ?",
        )
        .bind(session.process_id.map(|p| p as i64))
        .bind(session.status.as_str())
        .bind(session.last_heartbeat_at.to_rfc3339())
        .bind(session.exit_code.map(|c| c as i64))
        .bind(&session.logs_ref)
        .bind(session.id.to_string())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_active_for_task(&self, task_id: Uuid) -> DomainResult<Option<AgentSession>> {
        let rows = sqlx::query("SELECT * FROM agent_sessions WHERE task_id = ?")
            .bind(task_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        for row in &rows {
            let session = Self::row_to_session(row)?;
            if session.status.is_active() || session.status == SessionStatus::Spawning {
                return Ok(Some(session));
            }
        }
        Ok(None)
    }

    async fn list_active(&self) -> DomainResult<Vec<AgentSession>> {
        let rows = sqlx::query(
            "SELECT * FROM agent_sessions WHERE status IN ('spawning', 'running', 'testing', 'validating')",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(Self::row_to_session).collect()
    }

    async fn list_stuck(&self, now: DateTime<Utc>, stuck_threshold: Duration) -> DomainResult<Vec<AgentSession>> {
        let sessions = self.list_active().await?;
        Ok(sessions
            .into_iter()
            .filter(|s| s.is_stuck(now, stuck_threshold))
            .collect())
    }
}

pub struct HeartbeatRepositoryImpl {
    pool: SqlitePool,
}

impl HeartbeatRepositoryImpl {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_heartbeat(row: &sqlx::sqlite::SqliteRow) -> DomainResult<Heartbeat> {
        let id: String = row.get("id");
        let session_id: String = row.get("session_id");
        let status: String = row.get("status");
        Ok(Heartbeat {
            id: Uuid::parse_str(&id).map_err(|e| OrchestratorError::Database(e.to_string()))?,
            session_id: Uuid::parse_str(&session_id).map_err(|e| OrchestratorError::Database(e.to_string()))?,
            ts: DateTime::parse_from_rfc3339(&row.get::<String, _>("ts"))
                .map(|d| d.with_timezone(&Utc))
                .map_err(|e| OrchestratorError::Database(e.to_string()))?,
            status: HeartbeatStatus::from_str(&status)
                .ok_or_else(|| OrchestratorError::Database(format!("unknown heartbeat status: {status}")))?,
            progress_percent: row.get::<Option<i64>, _>("progress_percent").map(|p| p as u8),
            current_step: row.get("current_step"),
            memory_mb: row.get::<Option<i64>, _>("memory_mb").map(|m| m as u64),
            cpu_percent: row.get::<Option<f64>, _>("cpu_percent").map(|c| c as f32),
        })
    }
}

#[async_trait]
impl HeartbeatRepository for HeartbeatRepositoryImpl {
    async fn append(&self, heartbeat: &Heartbeat) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO heartbeats (id, session_id, ts, status, progress_percent, current_step, \
             memory_mb, cpu_percent) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(heartbeat.id.to_string())
        .bind(heartbeat.session_id.to_string())
        .bind(heartbeat.ts.to_rfc3339())
        .bind(heartbeat.status.as_str())
        .bind(heartbeat.progress_percent.map(|p| p as i64))
        .bind(&heartbeat.current_step)
        .bind(heartbeat.memory_mb.map(|m| m as i64))
        .bind(heartbeat.cpu_percent.map(|c| c as f64))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_for_session(&self, session_id: Uuid) -> DomainResult<Vec<Heartbeat>> {
        let rows = sqlx::query("SELECT * FROM heartbeats WHERE session_id = ? ORDER BY ts ASC")
            .bind(session_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_heartbeat).collect()
    }

    async fn latest_for_session(&self, session_id: Uuid) -> DomainResult<Option<Heartbeat>> {
        let row = sqlx::query("SELECT * FROM heartbeats WHERE session_id = ? ORDER BY ts DESC LIMIT 1")
            .bind(session_id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_heartbeat).transpose()
    }
}
