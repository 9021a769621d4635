//! Session Manager (C7): spawns, tracks, and cancels agent worker
//! processes, and is the sole writer of `agent_sessions`/`heartbeats`
//! rows (spec §4.7).

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use tokio::process::Command;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::domain::error::OrchestratorError;
use crate::domain::models::{
    event::topics, session_status_for_exit_code, AgentSession, Event, Heartbeat, HeartbeatPayload,
    SessionStatus, Task,
};
use crate::domain::ports::{HeartbeatRepository, SessionRepository};
use crate::domain::DomainResult;
use crate::services::agent_type_registry::AgentTypeRegistry;
use crate::services::event_bus::EventBus;

pub struct SessionManager {
    sessions: Arc<dyn SessionRepository>,
    heartbeats: Arc<dyn HeartbeatRepository>,
    agent_types: Arc<AgentTypeRegistry>,
    events: Arc<EventBus>,
    grace_period: Duration,
    stuck_threshold: Duration,
}

impl SessionManager {
    pub fn new(
        sessions: Arc<dyn SessionRepository>,
        heartbeats: Arc<dyn HeartbeatRepository>,
        agent_types: Arc<AgentTypeRegistry>,
        events: Arc<EventBus>,
        grace_period: Duration,
        stuck_threshold: Duration,
    ) -> Self {
        Self { sessions, heartbeats, agent_types, events, grace_period, stuck_threshold }
    }

    /// Validates preconditions, records a `spawning` session, then launches
    /// the worker process. The session transitions to `running` on the
    /// first heartbeat, not here (spec §4.7 state table).
    #[instrument(skip(self, task), fields(task_id = %task.id))]
    pub async fn spawn(&self, task: &Task) -> DomainResult<Uuid> {
        if self.sessions.get_active_for_task(task.id).await?.is_some() {
            return Err(OrchestratorError::InvalidStateTransition {
                from: "active_session_exists".to_string(),
                to: "spawning".to_string(),
            });
        }

        let handler = self.agent_types.get(task.assigned_agent_type)?;
        handler
            .validate(task)
            .map_err(OrchestratorError::SpawnPreconditionFailed)?;

        let mut session = AgentSession::new(task.id, task.assigned_agent_type);
        self.sessions.create(&session).await?;

        let (command, args) = handler.spawn_command();
        let mut cmd = Command::new(command);
        cmd.args(args)
            .arg("--agent-id")
            .arg(session.id.to_string())
            .arg("--task-id")
            .arg(task.id.to_string());
        if let Some(spec_path) = &task.spec_path {
            cmd.arg("--spec-file").arg(spec_path);
        }
        cmd.kill_on_drop(false);

        match cmd.spawn() {
            Ok(child) => {
                session.process_id = child.id();
                self.sessions.update(&session).await?;
            }
            Err(e) => {
                session.status = SessionStatus::Terminated;
                self.sessions.update(&session).await?;
                return Err(OrchestratorError::ExecutionFailed(format!(
                    "failed to spawn {command}: {e}"
                )));
            }
        }

        Ok(session.id)
    }

    /// Upserts `last_heartbeat_at`, transitions `spawning → running` on the
    /// first heartbeat, and publishes `agent.heartbeat` (spec §4.7).
    #[instrument(skip(self, payload), fields(session_id = %payload.agent_id))]
    pub async fn heartbeat(&self, payload: HeartbeatPayload) -> DomainResult<()> {
        let mut session = self
            .sessions
            .get(payload.agent_id)
            .await?
            .ok_or(OrchestratorError::SessionNotFound(payload.agent_id))?;

        if session.status == SessionStatus::Spawning {
            session.status = SessionStatus::Running;
        }
        session.last_heartbeat_at = payload.ts;
        self.sessions.update(&session).await?;

        let heartbeat = Heartbeat {
            id: Uuid::new_v4(),
            session_id: session.id,
            ts: payload.ts,
            status: payload.status,
            progress_percent: payload.progress_percent,
            current_step: payload.current_step,
            memory_mb: payload.memory_mb,
            cpu_percent: payload.cpu_percent,
        };
        self.heartbeats.append(&heartbeat).await?;

        self.events
            .publish(Event::new(
                topics::AGENT_HEARTBEAT,
                format!("session:{}", session.id),
                serde_json::to_value(&heartbeat).unwrap_or(serde_json::Value::Null),
            ))
            .await?;

        Ok(())
    }

    /// Records a worker's terminal exit status per the contract in spec §4.6:
    /// exit 0 → completed, 1 → failed, anything else → terminated.
    #[instrument(skip(self))]
    pub async fn record_exit(&self, session_id: Uuid, exit_code: i32) -> DomainResult<()> {
        let mut session = self
            .sessions
            .get(session_id)
            .await?
            .ok_or(OrchestratorError::SessionNotFound(session_id))?;

        if session.status.is_terminal() {
            return Ok(());
        }

        session.status = session_status_for_exit_code(exit_code);
        session.exit_code = Some(exit_code);
        self.sessions.update(&session).await?;
        Ok(())
    }

    /// Sends SIGTERM, waits up to `grace_period`, then SIGKILLs (spec §4.7).
    #[instrument(skip(self))]
    pub async fn cancel(&self, session_id: Uuid, reason: &str) -> DomainResult<()> {
        let mut session = self
            .sessions
            .get(session_id)
            .await?
            .ok_or(OrchestratorError::SessionNotFound(session_id))?;

        if session.status.is_terminal() {
            return Ok(());
        }

        if let Some(pid) = session.process_id {
            let nix_pid = Pid::from_raw(pid as i32);
            if let Err(e) = signal::kill(nix_pid, Signal::SIGTERM) {
                warn!(error = %e, pid, "SIGTERM delivery failed, process may already be gone");
            } else {
                tokio::time::sleep(std::time::Duration::from_secs(
                    self.grace_period.num_seconds().max(0) as u64,
                ))
                .await;
                if process_is_alive(pid) {
                    let _ = signal::kill(nix_pid, Signal::SIGKILL);
                }
            }
        }

        session.status = SessionStatus::Terminated;
        self.sessions.update(&session).await?;

        self.events
            .publish(Event::new(
                topics::AGENT_TERMINATED,
                format!("session:{session_id}"),
                serde_json::json!({ "reason": reason }),
            ))
            .await?;
        Ok(())
    }

    /// Logs, heartbeats, and current status for a session (spec §4.7 `observe`).
    pub async fn observe(&self, session_id: Uuid) -> DomainResult<SessionObservation> {
        let session = self
            .sessions
            .get(session_id)
            .await?
            .ok_or(OrchestratorError::SessionNotFound(session_id))?;
        let heartbeats = self.heartbeats.list_for_session(session_id).await?;
        Ok(SessionObservation { session, heartbeats })
    }

    /// Active sessions that have gone quiet past `stuck_threshold`; publishes
    /// `alert.stuck_task` for each (spec §4.7, §8 "Heartbeat staleness ⇒ alert").
    pub async fn check_stuck(&self, now: DateTime<Utc>) -> DomainResult<Vec<AgentSession>> {
        let stuck = self.sessions.list_stuck(now, self.stuck_threshold).await?;
        for session in &stuck {
            self.events
                .publish(Event::new(
                    topics::ALERT_STUCK_TASK,
                    format!("session:{}", session.id),
                    serde_json::json!({ "task_id": session.task_id }),
                ))
                .await?;
        }
        Ok(stuck)
    }
}

fn process_is_alive(pid: u32) -> bool {
    signal::kill(Pid::from_raw(pid as i32), None).is_ok()
}

impl SessionManager {
    /// Finds active sessions whose process has exited without the harness
    /// reporting it (crash, SIGKILL from outside), marks them `terminated`,
    /// and returns the ones it reaped (spec §4.9 Routing step 1).
    pub async fn reap_zombies(&self) -> DomainResult<Vec<AgentSession>> {
        let mut reaped = Vec::new();
        for mut session in self.sessions.list_active().await? {
            let alive = session.process_id.map(process_is_alive).unwrap_or(true);
            if !alive {
                session.status = SessionStatus::Terminated;
                self.sessions.update(&session).await?;
                reaped.push(session);
            }
        }
        Ok(reaped)
    }
}

pub struct SessionObservation {
    pub session: AgentSession,
    pub heartbeats: Vec<Heartbeat>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_is_alive_returns_false_for_unused_pid() {
        // PID 1 exists but is not ours to signal in a sandbox; a very high,
        // almost certainly unassigned PID is a safer negative case.
        assert!(!process_is_alive(999_999));
    }
}
