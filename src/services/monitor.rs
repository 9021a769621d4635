//! Monitor & PM (C10): polls running sessions and escalates stale ones by a
//! tiered policy, with room for a human override transport (spec §4.10).

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};

use crate::domain::error::ErrorKind;
use crate::domain::models::{AgentSession, Config, LastError, TaskStatus};
use crate::domain::ports::{SessionRepository, TaskRepository};
use crate::domain::DomainResult;
use crate::services::event_bus::EventBus;
use crate::services::session_manager::SessionManager;
use crate::services::task_orchestrator::fail_task;

/// What the monitor decided to do about one session this tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorAction {
    Observe,
    Alert,
    Interrupt,
}

/// A human (or external automation) override request for a running session.
/// The transport that produces these (chat, email, ...) is out of scope;
/// only this contract is (spec §4.10 Expansion).
#[derive(Debug, Clone, Copy)]
pub struct Override {
    pub session_id: uuid::Uuid,
    pub action: OverrideAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OverrideAction {
    Skip,
    Retry,
}

/// Source of human overrides, polled once per monitor tick.
#[async_trait]
pub trait OverrideSource: Send + Sync {
    async fn poll(&self) -> DomainResult<Vec<Override>>;
}

/// An `OverrideSource` with nothing queued; the default when no transport is wired.
pub struct NoOverrides;

#[async_trait]
impl OverrideSource for NoOverrides {
    async fn poll(&self) -> DomainResult<Vec<Override>> {
        Ok(Vec::new())
    }
}

pub struct Monitor {
    sessions: Arc<dyn SessionRepository>,
    tasks: Arc<dyn TaskRepository>,
    session_manager: Arc<SessionManager>,
    overrides: Arc<dyn OverrideSource>,
    events: Arc<EventBus>,
    config: Config,
    warn_threshold: Duration,
    interrupt_threshold: Duration,
}

impl Monitor {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        tasks: Arc<dyn TaskRepository>,
        session_manager: Arc<SessionManager>,
        overrides: Arc<dyn OverrideSource>,
        events: Arc<EventBus>,
        config: Config,
    ) -> Self {
        let warn_threshold = Duration::seconds(config.session.warn_threshold_secs);
        let interrupt_threshold = Duration::seconds(config.session.interrupt_threshold_secs);
        Self {
            sessions,
            tasks,
            session_manager,
            overrides,
            events,
            config,
            warn_threshold,
            interrupt_threshold,
        }
    }

    /// Tiered policy: `age < warn_threshold` → observe, `warn_threshold ≤ age
    /// < interrupt_threshold` → alert, `age ≥ interrupt_threshold` → request
    /// cancellation (spec §4.10).
    pub fn classify(&self, age: Duration) -> MonitorAction {
        classify_action(age, self.warn_threshold, self.interrupt_threshold)
    }

    /// One polling pass: applies pending human overrides, then escalates any
    /// session whose heartbeat age has crossed the interrupt threshold.
    pub async fn tick(&self, now: DateTime<Utc>) -> DomainResult<Vec<(AgentSession, MonitorAction)>> {
        for over in self.overrides.poll().await? {
            let session = match self.sessions.get(over.session_id).await? {
                Some(s) => s,
                None => continue,
            };
            self.session_manager.cancel(over.session_id, "human override").await?;

            if let Some(mut task) = self.tasks.get(session.task_id).await? {
                let expected = task.status;
                match over.action {
                    OverrideAction::Skip => {
                        task.status = TaskStatus::Blocked;
                        task.needs_review = true;
                        task.review_reason = Some("skipped by human override".to_string());
                    }
                    OverrideAction::Retry => {
                        task.status = TaskStatus::Pending;
                        task.next_retry_at = None;
                    }
                }
                task.updated_at = now;
                self.tasks.update_cas(&task, expected).await?;
            }
        }

        self.session_manager.check_stuck(now).await?;

        let mut actions = Vec::new();
        for session in self.sessions.list_active().await? {
            let age = now - session.last_heartbeat_at;
            let action = self.classify(age);
            if action == MonitorAction::Interrupt {
                self.session_manager
                    .cancel(session.id, "heartbeat age exceeded interrupt_threshold")
                    .await?;

                if let Some(task) = self.tasks.get(session.task_id).await? {
                    fail_task(
                        &self.tasks,
                        &self.events,
                        &self.config,
                        task,
                        LastError {
                            kind: ErrorKind::DeadlineExceeded,
                            message: "session heartbeat age exceeded interrupt_threshold".to_string(),
                            location: None,
                        },
                    )
                    .await?;
                }
            }
            actions.push((session, action));
        }
        Ok(actions)
    }
}

fn classify_action(age: Duration, warn_threshold: Duration, interrupt_threshold: Duration) -> MonitorAction {
    if age >= interrupt_threshold {
        MonitorAction::Interrupt
    } else if age >= warn_threshold {
        MonitorAction::Alert
    } else {
        MonitorAction::Observe
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_age_is_observed() {
        let alert = Duration::seconds(600);
        let interrupt = Duration::seconds(1800);
        assert_eq!(classify_action(Duration::seconds(60), alert, interrupt), MonitorAction::Observe);
        assert_eq!(classify_action(Duration::seconds(700), alert, interrupt), MonitorAction::Alert);
        assert_eq!(classify_action(Duration::seconds(2000), alert, interrupt), MonitorAction::Interrupt);
    }
}
