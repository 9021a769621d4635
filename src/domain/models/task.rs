//! Task domain model (spec §3, §4.9).
//!
//! Tasks are discrete units of work assigned to exactly one agent type
//! at a time. They form a DAG via `dependencies`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::error::ErrorKind;

/// Status of a task in the execution pipeline (spec §4.9 state machine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Ready,
    InProgress,
    PendingVerification,
    /// A verification session is active for this task (spec §4.9
    /// `pending_verification → completed`); mirrors how `in_progress` tracks
    /// an active build session, so a racing orchestrator can't dispatch a
    /// second verification session for the same task.
    Verifying,
    Completed,
    Failed,
    Blocked,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Pending
    }
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::InProgress => "in_progress",
            Self::PendingVerification => "pending_verification",
            Self::Verifying => "verifying",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Blocked => "blocked",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "ready" => Some(Self::Ready),
            "in_progress" => Some(Self::InProgress),
            "pending_verification" => Some(Self::PendingVerification),
            "verifying" => Some(Self::Verifying),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "blocked" => Some(Self::Blocked),
            _ => None,
        }
    }

    /// Completed and blocked are terminal for the purposes of task monotonicity
    /// (spec §8: a completed task never returns to a non-terminal status).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Blocked)
    }
}

/// Which kind of agent a task is routed to (spec §9 "Dynamic dispatch across agent types").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Ideation,
    Specification,
    Build,
    Qa,
    SelfImprovement,
}

impl AgentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ideation => "ideation",
            Self::Specification => "specification",
            Self::Build => "build",
            Self::Qa => "qa",
            Self::SelfImprovement => "self_improvement",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ideation" => Some(Self::Ideation),
            "specification" => Some(Self::Specification),
            "build" => Some(Self::Build),
            "qa" => Some(Self::Qa),
            "self_improvement" => Some(Self::SelfImprovement),
            _ => None,
        }
    }
}

/// The recorded cause of the most recent failure on a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LastError {
    pub kind: ErrorKind,
    pub message: String,
    pub location: Option<String>,
}

/// A single unit of work tracked by the orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub display_id: String,
    pub title: String,
    pub spec_path: Option<String>,
    pub status: TaskStatus,
    pub assigned_agent_type: AgentType,
    pub priority: i32,
    pub retry_count: u32,
    pub next_retry_at: Option<DateTime<Utc>>,
    pub dependencies: Vec<Uuid>,
    pub last_error: Option<LastError>,
    pub completion_report: Option<String>,
    /// Set when a cross-layer validation failure (spec §4.11) leaves the task's
    /// work preserved for inspection instead of rolling back.
    pub needs_review: bool,
    pub review_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    pub fn new(title: impl Into<String>, display_id: impl Into<String>, agent_type: AgentType) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            display_id: display_id.into(),
            title: title.into(),
            spec_path: None,
            status: TaskStatus::Pending,
            assigned_agent_type: agent_type,
            priority: 0,
            retry_count: 0,
            next_retry_at: None,
            dependencies: Vec::new(),
            last_error: None,
            completion_report: None,
            needs_review: false,
            review_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Invariant (spec §3): `ready` implies `spec_path` is set.
    pub fn has_required_inputs(&self) -> bool {
        self.spec_path.is_some()
    }
}

/// Filter criteria for listing tasks.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub agent_type: Option<AgentType>,
}
