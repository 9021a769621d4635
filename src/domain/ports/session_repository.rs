//! Session and heartbeat repository ports (spec §4.1, §4.7).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::error::DomainResult;
use crate::domain::models::{AgentSession, Heartbeat};

#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: &AgentSession) -> DomainResult<()>;
    async fn get(&self, id: Uuid) -> DomainResult<Option<AgentSession>>;
    async fn update(&self, session: &AgentSession) -> DomainResult<()>;

    /// The single active session for a task, if any (spec §3 invariant:
    /// at most one `running` session per task).
    async fn get_active_for_task(&self, task_id: Uuid) -> DomainResult<Option<AgentSession>>;

    async fn list_active(&self) -> DomainResult<Vec<AgentSession>>;

    /// Active sessions whose `last_heartbeat_at` is older than `stuck_threshold`
    /// (spec §4.7 stuck detection).
    async fn list_stuck(&self, now: DateTime<Utc>, stuck_threshold: chrono::Duration) -> DomainResult<Vec<AgentSession>>;
}

#[async_trait]
pub trait HeartbeatRepository: Send + Sync {
    async fn append(&self, heartbeat: &Heartbeat) -> DomainResult<()>;
    async fn list_for_session(&self, session_id: Uuid) -> DomainResult<Vec<Heartbeat>>;
    async fn latest_for_session(&self, session_id: Uuid) -> DomainResult<Option<Heartbeat>>;
}
