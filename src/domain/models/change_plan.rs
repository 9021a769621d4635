//! Change-plan domain model (spec §3, §4.8).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileOperation {
    Create,
    Modify,
    Delete,
}

/// A single file-level change within a plan (spec §4.8 Phase A).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileChange {
    pub path: String,
    pub operation: FileOperation,
    pub reason: String,
    /// Paths that must be applied before this one.
    pub dependencies: Vec<String>,
    pub priority: i32,
    /// Phase index assigned during scheduling (spec §4.8 Phase C).
    pub phase: Option<u32>,
    /// True iff no two files directly depend on each other within the same phase.
    /// Computed for informational purposes; the default executor still runs
    /// files within a phase sequentially (spec §4.8 Phase C, §9 Open Questions).
    pub can_run_in_parallel: bool,
}

impl FileChange {
    pub fn new(path: impl Into<String>, operation: FileOperation, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            operation,
            reason: reason.into(),
            dependencies: Vec::new(),
            priority: 0,
            phase: None,
            can_run_in_parallel: false,
        }
    }

    pub fn depends_on(mut self, path: impl Into<String>) -> Self {
        self.dependencies.push(path.into());
        self
    }
}

/// Area of a feature request a plan addresses (spec §4.8 Input, §4.11).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    Database,
    Api,
    Ui,
}

impl Layer {
    /// Declared dependency order for the feature coordinator (spec §4.11): DB before API before UI.
    pub fn sequence() -> [Layer; 3] {
        [Layer::Database, Layer::Api, Layer::Ui]
    }
}

/// A feature requirement that a change plan is built from (spec §4.8 Input).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureRequirement {
    pub id: Uuid,
    pub description: String,
    pub affected_areas: Vec<Layer>,
    pub pass_criteria: Vec<String>,
}

/// Outcome of validating or executing a plan (spec §9 "exception-based control flow").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Applied,
    RolledBack,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self { valid: true, errors: Vec::new() }
    }

    pub fn failed(errors: Vec<String>) -> Self {
        Self { valid: false, errors }
    }
}

/// An acyclic, phased set of file operations for one feature or task (spec §3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePlan {
    pub id: Uuid,
    pub feature_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub files: Vec<FileChange>,
    pub validation_result: Option<ValidationResult>,
}

impl ChangePlan {
    pub fn new(feature_id: Uuid, files: Vec<FileChange>) -> Self {
        Self {
            id: Uuid::new_v4(),
            feature_id,
            created_at: Utc::now(),
            files,
            validation_result: None,
        }
    }

    /// Number of phases in the schedule (spec §8 boundary: a single file still
    /// produces one phase).
    pub fn phase_count(&self) -> u32 {
        self.files
            .iter()
            .filter_map(|f| f.phase)
            .max()
            .map(|m| m + 1)
            .unwrap_or(0)
    }

    pub fn files_in_phase(&self, phase: u32) -> Vec<&FileChange> {
        self.files.iter().filter(|f| f.phase == Some(phase)).collect()
    }
}

/// Outcome of executing a plan end to end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanExecutionResult {
    pub plan_id: Uuid,
    pub status: ExecutionStatus,
    pub commit_ref: Option<String>,
    pub error: Option<String>,
}
