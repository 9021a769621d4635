//! Domain-level error types for the orchestration substrate.

use thiserror::Error;
use uuid::Uuid;

/// Classification of a task failure, used by the retry policy (spec §4.9, §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Transient,
    CodeError,
    TestFailure,
    ResourceConflict,
    Resource,
    Unknown,
    ValidationError,
    RollbackInconsistent,
    DeadlineExceeded,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transient => "transient",
            Self::CodeError => "code_error",
            Self::TestFailure => "test_failure",
            Self::ResourceConflict => "resource_conflict",
            Self::Resource => "resource",
            Self::Unknown => "unknown",
            Self::ValidationError => "validation_error",
            Self::RollbackInconsistent => "rollback_inconsistent",
            Self::DeadlineExceeded => "deadline_exceeded",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "transient" => Some(Self::Transient),
            "code_error" => Some(Self::CodeError),
            "test_failure" => Some(Self::TestFailure),
            "resource_conflict" => Some(Self::ResourceConflict),
            "resource" => Some(Self::Resource),
            "unknown" => Some(Self::Unknown),
            "validation_error" => Some(Self::ValidationError),
            "rollback_inconsistent" => Some(Self::RollbackInconsistent),
            "deadline_exceeded" => Some(Self::DeadlineExceeded),
            _ => None,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Domain-level errors that can occur anywhere in the orchestration substrate.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("session not found: {0}")]
    SessionNotFound(Uuid),

    #[error("invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("dependency cycle detected involving: {0}")]
    DependencyCycle(String),

    #[error("plan validation failed: {0}")]
    PlanValidationFailed(String),

    #[error("lock conflict on path: {0}")]
    LockConflict(String),

    #[error("ownership conflict on path {path}: already owned by {owner}")]
    OwnershipConflict { path: String, owner: String },

    #[error("rollback produced an inconsistent working tree: {0}")]
    RollbackInconsistent(String),

    #[error("version control error: {0}")]
    Vcs(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("agent type not registered: {0}")]
    UnknownAgentType(String),

    #[error("spawn precondition failed: {0}")]
    SpawnPreconditionFailed(String),

    #[error("task execution failed: {0}")]
    ExecutionFailed(String),
}

pub type DomainResult<T> = Result<T, OrchestratorError>;

impl From<sqlx::Error> for OrchestratorError {
    fn from(err: sqlx::Error) -> Self {
        OrchestratorError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for OrchestratorError {
    fn from(err: serde_json::Error) -> Self {
        OrchestratorError::Serialization(err.to_string())
    }
}
