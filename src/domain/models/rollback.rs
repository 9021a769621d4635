//! Rollback-action domain model (spec §3, §4.8 Phase E).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackActionKind {
    RestoreFromRef,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollbackStatus {
    Pending,
    Success,
    Failed,
}

/// The undo step captured for one applied file operation, so the plan
/// executor can restore the working tree bit-exactly on failure
/// (spec §3, §4.8 Phase E).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackAction {
    pub id: Uuid,
    pub plan_id: Uuid,
    pub file: String,
    pub action: RollbackActionKind,
    /// Commit ref to restore from; `None` for newly created files, which are
    /// undone by deletion instead.
    pub reference: Option<String>,
    pub status: RollbackStatus,
}

impl RollbackAction {
    pub fn restore(plan_id: Uuid, file: impl Into<String>, reference: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            plan_id,
            file: file.into(),
            action: RollbackActionKind::RestoreFromRef,
            reference: Some(reference),
            status: RollbackStatus::Pending,
        }
    }

    pub fn delete(plan_id: Uuid, file: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            plan_id,
            file: file.into(),
            action: RollbackActionKind::Delete,
            reference: None,
            status: RollbackStatus::Pending,
        }
    }
}
