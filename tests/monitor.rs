//! Exercises the monitor's tiered escalation policy against real
//! SQLite-backed session and task repositories (spec §4.10, §8 Scenario 4
//! "heartbeat staleness beyond interrupt_threshold").

mod common;

use chrono::{Duration, Utc};

use taskforge::domain::models::{AgentSession, AgentType, Config, SessionStatus, Task, TaskStatus};
use taskforge::domain::ports::{SessionRepository, TaskRepository};
use taskforge::domain::ErrorKind;
use taskforge::infrastructure::database::HeartbeatRepositoryImpl;
use taskforge::services::{Monitor, MonitorAction, NoOverrides, SessionManager};

fn monitor(db: &common::TestDb, session_manager: std::sync::Arc<SessionManager>) -> Monitor {
    let mut config = Config::default();
    config.session.interrupt_threshold_secs = 1800;
    Monitor::new(
        db.sessions(),
        db.tasks(),
        session_manager,
        std::sync::Arc::new(NoOverrides),
        common::event_bus(db),
        config,
    )
}

fn session_manager(db: &common::TestDb) -> std::sync::Arc<SessionManager> {
    std::sync::Arc::new(SessionManager::new(
        db.sessions(),
        std::sync::Arc::new(HeartbeatRepositoryImpl::new(db.connection.pool().clone())),
        common::agent_type_registry(),
        common::event_bus(db),
        Duration::seconds(5),
        Duration::seconds(600),
    ))
}

#[tokio::test]
async fn a_session_past_interrupt_threshold_is_cancelled_and_its_task_fails_with_deadline_exceeded() {
    let db = common::TestDb::new().await;
    let tasks = db.tasks();
    let sessions = db.sessions();
    let sm = session_manager(&db);
    let mon = monitor(&db, sm);

    let mut task = Task::new("stuck build", "TASK-stuck", AgentType::Build);
    task.status = TaskStatus::InProgress;
    tasks.create(&task).await.unwrap();

    let mut session = AgentSession::new(task.id, AgentType::Build);
    session.status = SessionStatus::Running;
    session.last_heartbeat_at = Utc::now() - Duration::seconds(3600);
    sessions.create(&session).await.unwrap();

    let actions = mon.tick(Utc::now()).await.unwrap();
    assert_eq!(actions.len(), 1);
    assert_eq!(actions[0].1, MonitorAction::Interrupt);

    let terminated = sessions.get(session.id).await.unwrap().unwrap();
    assert_eq!(terminated.status, SessionStatus::Terminated);

    let failed = tasks.get(task.id).await.unwrap().unwrap();
    assert_ne!(failed.status, TaskStatus::InProgress);
    let last_error = failed.last_error.expect("task should carry a last_error");
    assert_eq!(last_error.kind, ErrorKind::DeadlineExceeded);
}
