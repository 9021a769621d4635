//! Task Orchestrator (C9): the dispatcher tick that drives the task state
//! machine (spec §4.9).

use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use crate::domain::error::{ErrorKind, OrchestratorError};
use crate::domain::models::{
    event::topics, AgentType, Config, Event, LastError, Task, TaskFilter, TaskStatus,
};
use crate::domain::ports::TaskRepository;
use crate::domain::DomainResult;
use crate::services::agent_type_registry::AgentTypeRegistry;
use crate::services::dependency_resolver::DependencyResolver;
use crate::services::event_bus::EventBus;
use crate::services::resource_registry::ResourceRegistry;
use crate::services::retry_policy::RetryPolicy;
use crate::services::session_manager::SessionManager;

#[derive(Debug, Default, Clone, Copy)]
pub struct TickSummary {
    pub locks_reaped: u64,
    pub zombies_reaped: usize,
    pub promoted_to_ready: usize,
    pub spawned: usize,
}

pub struct Orchestrator {
    tasks: Arc<dyn TaskRepository>,
    sessions: Arc<SessionManager>,
    resources: Arc<ResourceRegistry>,
    agent_types: Arc<AgentTypeRegistry>,
    events: Arc<EventBus>,
    dependency_resolver: DependencyResolver,
    config: Config,
    max_concurrent_sessions: usize,
}

impl Orchestrator {
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        sessions: Arc<SessionManager>,
        resources: Arc<ResourceRegistry>,
        agent_types: Arc<AgentTypeRegistry>,
        events: Arc<EventBus>,
        config: Config,
    ) -> Self {
        let max_concurrent_sessions = config.concurrency.max_concurrent_sessions;
        Self {
            tasks,
            sessions,
            resources,
            agent_types,
            events,
            dependency_resolver: DependencyResolver::new(),
            config,
            max_concurrent_sessions,
        }
    }

    /// Poll interval a driver loop should use between ticks (spec §4.9
    /// Expansion "thin driver").
    pub fn tick_interval_secs(&self) -> u64 {
        self.config.dispatcher.tick_interval_secs
    }

    /// One idempotent dispatcher pass, safe to call repeatedly and
    /// concurrently from multiple orchestrator instances (spec §4.9 Routing,
    /// §5 "single cooperative loop per instance").
    pub async fn tick(&self) -> DomainResult<TickSummary> {
        let mut summary = TickSummary::default();

        summary.locks_reaped = self.resources.reap_expired().await?;

        let zombies = self.sessions.reap_zombies().await?;
        summary.zombies_reaped = zombies.len();
        for session in &zombies {
            if let Some(task) = self.tasks.get(session.task_id).await? {
                self.fail_task(
                    task,
                    LastError {
                        kind: ErrorKind::Unknown,
                        message: "session process exited unexpectedly".to_string(),
                        location: None,
                    },
                )
                .await?;
            }
        }

        summary.promoted_to_ready = self.promote_due_retries().await?;

        let active_count = self.sessions_in_flight().await?;
        let available_slots = self.max_concurrent_sessions.saturating_sub(active_count);
        summary.spawned = self.dispatch(available_slots).await?;

        Ok(summary)
    }

    async fn sessions_in_flight(&self) -> DomainResult<usize> {
        let in_progress = self
            .tasks
            .list(TaskFilter { status: Some(TaskStatus::InProgress), agent_type: None })
            .await?
            .len();
        let verifying = self
            .tasks
            .list(TaskFilter { status: Some(TaskStatus::Verifying), agent_type: None })
            .await?
            .len();
        Ok(in_progress + verifying)
    }

    /// `pending → ready`: tasks whose retry delay has elapsed and whose
    /// dependencies are all `completed` (spec §4.9 transition 1).
    async fn promote_due_retries(&self) -> DomainResult<usize> {
        let now = Utc::now();
        let due = self.tasks.get_due_retries(now).await?;
        if due.is_empty() {
            return Ok(0);
        }

        let all_tasks = self.tasks.list(TaskFilter::default()).await?;
        let mut promoted = 0;
        for mut task in due {
            if !self.dependency_resolver.dependencies_satisfied(&task, &all_tasks) {
                continue;
            }
            let expected = task.status;
            task.status = TaskStatus::Ready;
            task.updated_at = now;
            if self.tasks.update_cas(&task, expected).await? {
                promoted += 1;
            }
        }
        Ok(promoted)
    }

    /// Selects up to `slots` ready or verification candidates and spawns a
    /// session for each, atomically transitioning the winning task first so
    /// a concurrently racing orchestrator cannot double-spawn it (spec §4.9
    /// Routing step 3, §5 compare-and-set). Build candidates are served
    /// before verification candidates out of the same slot budget.
    async fn dispatch(&self, slots: usize) -> DomainResult<usize> {
        if slots == 0 {
            return Ok(0);
        }

        let spawned = self.dispatch_build(slots).await?;
        let remaining = slots.saturating_sub(spawned);
        Ok(spawned + self.dispatch_verification(remaining).await?)
    }

    /// `ready → in_progress`: spawns a build session routed to the task's
    /// own `assigned_agent_type` (spec §4.9 transition 2).
    async fn dispatch_build(&self, slots: usize) -> DomainResult<usize> {
        if slots == 0 {
            return Ok(0);
        }

        let candidates = self.tasks.get_ready_candidates(slots * 2).await?;
        let mut spawned = 0;

        for mut task in candidates {
            if spawned >= slots {
                break;
            }

            let expected = task.status;
            task.status = TaskStatus::InProgress;
            task.updated_at = Utc::now();
            if !self.tasks.update_cas(&task, expected).await? {
                continue;
            }

            match self.sessions.spawn(&task).await {
                Ok(session_id) => {
                    self.events
                        .publish(Event::new(
                            topics::TASK_STARTED,
                            format!("task:{}", task.id),
                            serde_json::json!({ "session_id": session_id }),
                        ))
                        .await?;
                    spawned += 1;
                }
                Err(e) => {
                    self.revert_task(task, TaskStatus::Ready).await?;
                    return Err(e);
                }
            }
        }

        Ok(spawned)
    }

    /// `pending_verification → verifying`: spawns a verification session
    /// always routed to the `qa` agent type, regardless of the task's own
    /// `assigned_agent_type` (spec §4.9 state machine).
    async fn dispatch_verification(&self, slots: usize) -> DomainResult<usize> {
        if slots == 0 {
            return Ok(0);
        }

        let candidates = self.tasks.get_verification_candidates(slots * 2).await?;
        let mut spawned = 0;

        for mut task in candidates {
            if spawned >= slots {
                break;
            }

            let expected = task.status;
            task.status = TaskStatus::Verifying;
            task.updated_at = Utc::now();
            if !self.tasks.update_cas(&task, expected).await? {
                continue;
            }

            let mut verification_task = task.clone();
            verification_task.assigned_agent_type = AgentType::Qa;

            match self.sessions.spawn(&verification_task).await {
                Ok(session_id) => {
                    self.events
                        .publish(Event::new(
                            topics::TASK_STARTED,
                            format!("task:{}", task.id),
                            serde_json::json!({ "session_id": session_id, "purpose": "verification" }),
                        ))
                        .await?;
                    spawned += 1;
                }
                Err(e) => {
                    self.revert_task(task, TaskStatus::PendingVerification).await?;
                    return Err(e);
                }
            }
        }

        Ok(spawned)
    }

    async fn revert_task(&self, mut task: Task, target: TaskStatus) -> DomainResult<()> {
        let expected = task.status;
        task.status = target;
        task.updated_at = Utc::now();
        self.tasks.update_cas(&task, expected).await?;
        Ok(())
    }

    /// Finalizes a worker's exit against its task. Routes by which kind of
    /// session exited: a build session (`in_progress`) that reports success
    /// moves to `pending_verification`; a verification session (`verifying`)
    /// that reports success moves to `completed` (spec §4.9
    /// `pending_verification → completed`). Either session type succeeding
    /// without a completion report is a `validation_error` failure (spec §8
    /// boundary behaviour); non-zero exits go through the retry policy.
    pub async fn on_session_exit(
        &self,
        session_id: Uuid,
        exit_code: i32,
        stderr_tail: &str,
    ) -> DomainResult<()> {
        self.sessions.record_exit(session_id, exit_code).await?;
        let observation = self.sessions.observe(session_id).await?;
        let task = self
            .tasks
            .get(observation.session.task_id)
            .await?
            .ok_or(OrchestratorError::TaskNotFound(observation.session.task_id))?;

        let is_verification = task.status == TaskStatus::Verifying;

        if exit_code == 0 {
            if task.completion_report.is_some() {
                if is_verification {
                    self.complete_task(task).await
                } else {
                    self.await_verification(task).await
                }
            } else {
                self.fail_task(
                    task,
                    LastError {
                        kind: ErrorKind::ValidationError,
                        message: "worker exited 0 without a completion report".to_string(),
                        location: None,
                    },
                )
                .await
            }
        } else {
            let agent_type = if is_verification { AgentType::Qa } else { task.assigned_agent_type };
            let handler = self.agent_types.get(agent_type)?;
            let kind = handler.classify_error(exit_code, stderr_tail);
            self.fail_task(task, LastError { kind, message: stderr_tail.to_string(), location: None })
                .await
        }
    }

    /// `in_progress → pending_verification`: a build session reported
    /// success; a verification session must still confirm the work (spec
    /// §4.9 transition 3).
    async fn await_verification(&self, mut task: Task) -> DomainResult<()> {
        let expected = task.status;
        task.status = TaskStatus::PendingVerification;
        task.updated_at = Utc::now();
        self.tasks.update_cas(&task, expected).await?;
        self.events
            .publish(Event::new(
                topics::TASK_AWAITING_VERIFICATION,
                format!("task:{}", task.id),
                serde_json::Value::Null,
            ))
            .await?;
        Ok(())
    }

    /// `verifying → completed`: a verification session confirmed the work
    /// (spec §4.9 `pending_verification → completed`, §8 Scenario 1).
    async fn complete_task(&self, mut task: Task) -> DomainResult<()> {
        let expected = task.status;
        task.status = TaskStatus::Completed;
        task.updated_at = Utc::now();
        self.tasks.update_cas(&task, expected).await?;
        self.events
            .publish(Event::new(
                topics::TASK_COMPLETED,
                format!("task:{}", task.id),
                serde_json::Value::Null,
            ))
            .await?;
        Ok(())
    }

    async fn fail_task(&self, task: Task, error: LastError) -> DomainResult<()> {
        fail_task(&self.tasks, &self.events, &self.config, task, error).await
    }
}

/// Applies the retry policy to a failed task and publishes `TASK_FAILED`.
/// Extracted as a free function so callers other than the orchestrator's own
/// tick (e.g. the monitor's heartbeat-interrupt path) can fail a task through
/// the exact same path (spec §4.10 Scenario 4).
pub async fn fail_task(
    tasks: &Arc<dyn TaskRepository>,
    events: &Arc<EventBus>,
    config: &Config,
    mut task: Task,
    error: LastError,
) -> DomainResult<()> {
    let policy = RetryPolicy::new(config);
    let expected = task.status;
    policy.apply(&mut task, error.clone(), Utc::now());
    tasks.update_cas(&task, expected).await?;
    events
        .publish(Event::new(
            topics::TASK_FAILED,
            format!("task:{}", task.id),
            serde_json::json!({ "kind": error.kind.as_str(), "message": error.message }),
        ))
        .await?;
    Ok(())
}
