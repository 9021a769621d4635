//! Heartbeat domain model (spec §3, §6).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HeartbeatStatus {
    Running,
    Testing,
    Validating,
    Stuck,
}

impl HeartbeatStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Testing => "testing",
            Self::Validating => "validating",
            Self::Stuck => "stuck",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "testing" => Some(Self::Testing),
            "validating" => Some(Self::Validating),
            "stuck" => Some(Self::Stuck),
            _ => None,
        }
    }
}

/// An append-only progress report emitted by a worker process.
///
/// Matches the JSON schema POSTed to the session manager's heartbeat
/// endpoint (spec §6): `{ agent_id, task_id, status, progress_percent?,
/// current_step?, memory_mb?, cpu_percent?, ts }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Heartbeat {
    pub id: Uuid,
    pub session_id: Uuid,
    pub ts: DateTime<Utc>,
    pub status: HeartbeatStatus,
    pub progress_percent: Option<u8>,
    pub current_step: Option<String>,
    pub memory_mb: Option<u64>,
    pub cpu_percent: Option<f32>,
}

impl Heartbeat {
    pub fn new(session_id: Uuid, status: HeartbeatStatus) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            ts: Utc::now(),
            status,
            progress_percent: None,
            current_step: None,
            memory_mb: None,
            cpu_percent: None,
        }
    }
}

/// Raw payload shape as received over the wire, before being stamped
/// with a server-assigned id and persisted as a [`Heartbeat`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatPayload {
    pub agent_id: Uuid,
    pub task_id: Uuid,
    pub status: HeartbeatStatus,
    pub progress_percent: Option<u8>,
    pub current_step: Option<String>,
    pub memory_mb: Option<u64>,
    pub cpu_percent: Option<f32>,
    pub ts: DateTime<Utc>,
}
