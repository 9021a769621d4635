//! Event and activity domain models (spec §3, §4.2).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Monotonically increasing sequence number assigned by the event bus,
/// used to establish the global (timestamp, id) order from spec §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SequenceNumber(pub u64);

/// A durable, append-only event. `event_type` is an open, dotted namespace
/// (`task.started`, `alert.stuck_task`, ...) per spec §4.2.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: Uuid,
    pub sequence: SequenceNumber,
    pub event_type: String,
    pub source: String,
    pub payload: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl Event {
    pub fn new(event_type: impl Into<String>, source: impl Into<String>, payload: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            sequence: SequenceNumber(0),
            event_type: event_type.into(),
            source: source.into(),
            payload,
            timestamp: Utc::now(),
        }
    }

    /// Matches a dotted topic pattern such as `task.*` or `*` against this
    /// event's type, the same glob-over-dotted-segments rule the knowledge
    /// base uses for file patterns.
    pub fn matches_topic(&self, pattern: &str) -> bool {
        if pattern == "*" {
            return true;
        }
        if let Some(prefix) = pattern.strip_suffix(".*") {
            return self.event_type == prefix || self.event_type.starts_with(&format!("{prefix}."));
        }
        self.event_type == pattern
    }
}

/// A dead-lettered event: a subscriber failed to process this event
/// `attempts` times in a row (spec §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub event_id: Uuid,
    pub subscriber: String,
    pub attempts: u32,
    pub last_error: String,
}

/// A correlated record for observability (spec §3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    TaskAssigned,
    FileWrite,
    CommandExecuted,
    ErrorOccurred,
    Heartbeat,
    Spawned,
    Terminated,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TaskAssigned => "task_assigned",
            Self::FileWrite => "file_write",
            Self::CommandExecuted => "command_executed",
            Self::ErrorOccurred => "error_occurred",
            Self::Heartbeat => "heartbeat",
            Self::Spawned => "spawned",
            Self::Terminated => "terminated",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "task_assigned" => Some(Self::TaskAssigned),
            "file_write" => Some(Self::FileWrite),
            "command_executed" => Some(Self::CommandExecuted),
            "error_occurred" => Some(Self::ErrorOccurred),
            "heartbeat" => Some(Self::Heartbeat),
            "spawned" => Some(Self::Spawned),
            "terminated" => Some(Self::Terminated),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Activity {
    pub id: Uuid,
    pub session_id: Option<Uuid>,
    pub kind: ActivityKind,
    pub details: serde_json::Value,
    pub timestamp: DateTime<Utc>,
}

impl Activity {
    pub fn new(session_id: Option<Uuid>, kind: ActivityKind, details: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            session_id,
            kind,
            details,
            timestamp: Utc::now(),
        }
    }
}

/// Canonical event type names the orchestrator publishes (spec §4.2).
pub mod topics {
    pub const IDEATION_COMPLETED: &str = "ideation.completed";
    pub const TASKLIST_GENERATED: &str = "tasklist.generated";
    pub const TASKLIST_READY: &str = "tasklist.ready";
    pub const SPEC_APPROVED: &str = "spec.approved";
    pub const TASK_STARTED: &str = "task.started";
    pub const TASK_AWAITING_VERIFICATION: &str = "task.awaiting_verification";
    pub const TASK_COMPLETED: &str = "task.completed";
    pub const TASK_FAILED: &str = "task.failed";
    pub const TASK_BLOCKED: &str = "task.blocked";
    pub const BUILD_STARTED: &str = "build.started";
    pub const BUILD_COMPLETED: &str = "build.completed";
    pub const REVIEW_COMPLETED: &str = "review.completed";
    pub const ALERT_STUCK_TASK: &str = "alert.stuck_task";
    pub const ALERT_ROLLBACK_INCONSISTENT: &str = "alert.rollback_inconsistent";
    pub const AGENT_HEARTBEAT: &str = "agent.heartbeat";
    pub const AGENT_SPAWNED: &str = "agent.spawned";
    pub const AGENT_TERMINATED: &str = "agent.terminated";
    pub const GOTCHA_DISCOVERED: &str = "gotcha.discovered";
    pub const PATTERN_EXTRACTED: &str = "pattern.extracted";
}
