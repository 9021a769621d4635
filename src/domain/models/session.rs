//! Agent session domain model (spec §3, §4.7).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::task::AgentType;

/// Lifecycle state of an agent session (spec §4.7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Spawning,
    Running,
    Testing,
    Validating,
    Completed,
    Failed,
    Terminated,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Spawning => "spawning",
            Self::Running => "running",
            Self::Testing => "testing",
            Self::Validating => "validating",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Terminated => "terminated",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "spawning" => Some(Self::Spawning),
            "running" => Some(Self::Running),
            "testing" => Some(Self::Testing),
            "validating" => Some(Self::Validating),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "terminated" => Some(Self::Terminated),
            _ => None,
        }
    }

    /// Terminal states are write-once (spec §3 invariant).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Terminated)
    }

    /// States in which a session is considered "active" for the
    /// single-active-session-per-task invariant (spec §8).
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running | Self::Testing | Self::Validating)
    }
}

/// A live (or terminated) execution of an agent worker process bound to a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentSession {
    pub id: Uuid,
    pub task_id: Uuid,
    pub agent_type: AgentType,
    pub process_id: Option<u32>,
    pub spawned_at: DateTime<Utc>,
    pub status: SessionStatus,
    pub last_heartbeat_at: DateTime<Utc>,
    pub exit_code: Option<i32>,
    pub logs_ref: Option<String>,
}

impl AgentSession {
    pub fn new(task_id: Uuid, agent_type: AgentType) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            task_id,
            agent_type,
            process_id: None,
            spawned_at: now,
            status: SessionStatus::Spawning,
            last_heartbeat_at: now,
            exit_code: None,
            logs_ref: None,
        }
    }

    pub fn is_stuck(&self, now: DateTime<Utc>, stuck_threshold: chrono::Duration) -> bool {
        self.status.is_active() && now - self.last_heartbeat_at > stuck_threshold
    }
}

/// Maps a worker process exit code to the resulting session status (spec §4.6, §4.7).
pub fn session_status_for_exit_code(code: i32) -> SessionStatus {
    match code {
        0 => SessionStatus::Completed,
        1 => SessionStatus::Failed,
        _ => SessionStatus::Terminated,
    }
}
