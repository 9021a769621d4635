//! Domain models: the core entities described in spec §3.

pub mod change_plan;
pub mod config;
pub mod event;
pub mod heartbeat;
pub mod knowledge;
pub mod resource;
pub mod rollback;
pub mod session;
pub mod task;

pub use config::{
    Config, ConcurrencyConfig, DatabaseConfig, DispatcherConfig, KnowledgeConfig, LockConfig,
    MonitorConfig, RetryPolicyConfig, SessionConfig,
};
pub use change_plan::{
    ChangePlan, ExecutionStatus, FeatureRequirement, FileChange, FileOperation, Layer,
    PlanExecutionResult, ValidationResult,
};
pub use event::{Activity, ActivityKind, DeadLetterEntry, Event, SequenceNumber};
pub use heartbeat::{Heartbeat, HeartbeatPayload, HeartbeatStatus};
pub use knowledge::{KnowledgeItem, KnowledgeKind, KnowledgeQuery, PromotionPolicy};
pub use resource::{AcquireOutcome, FileLock, ResourceOwnership};
pub use rollback::{RollbackAction, RollbackActionKind, RollbackStatus};
pub use session::{session_status_for_exit_code, AgentSession, SessionStatus};
pub use task::{AgentType, LastError, Task, TaskFilter, TaskStatus};
