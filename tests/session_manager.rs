//! Exercises `SessionManager` heartbeat/cancel/stuck-detection flows
//! against real SQLite-backed session and heartbeat repositories, without
//! spawning a real worker process (spec §4.7, §8 "Heartbeat staleness ⇒ alert").

mod common;

use chrono::{Duration, Utc};

use taskforge::domain::models::{AgentSession, AgentType, HeartbeatPayload, HeartbeatStatus, SessionStatus, Task};
use taskforge::domain::ports::{SessionRepository, TaskRepository};
use taskforge::infrastructure::database::HeartbeatRepositoryImpl;
use taskforge::services::SessionManager;

fn manager(db: &common::TestDb) -> SessionManager {
    SessionManager::new(
        db.sessions(),
        std::sync::Arc::new(HeartbeatRepositoryImpl::new(db.connection.pool().clone())),
        common::agent_type_registry(),
        common::event_bus(db),
        Duration::seconds(5),
        Duration::seconds(600),
    )
}

#[tokio::test]
async fn first_heartbeat_promotes_spawning_to_running() {
    let db = common::TestDb::new().await;
    let tasks = db.tasks();
    let sessions = db.sessions();
    let manager = manager(&db);

    let task = Task::new("compile feature", "TASK-compile", AgentType::Build);
    tasks.create(&task).await.unwrap();
    let task_id = task.id;
    let session = AgentSession::new(task_id, AgentType::Build);
    sessions.create(&session).await.unwrap();
    assert_eq!(session.status, SessionStatus::Spawning);

    manager
        .heartbeat(HeartbeatPayload {
            agent_id: session.id,
            task_id,
            status: HeartbeatStatus::Running,
            progress_percent: Some(10),
            current_step: Some("compiling".to_string()),
            memory_mb: None,
            cpu_percent: None,
            ts: Utc::now(),
        })
        .await
        .unwrap();

    let updated = sessions.get(session.id).await.unwrap().unwrap();
    assert_eq!(updated.status, SessionStatus::Running);
}

#[tokio::test]
async fn cancel_is_idempotent_once_a_session_is_terminal() {
    let db = common::TestDb::new().await;
    let tasks = db.tasks();
    let sessions = db.sessions();
    let manager = manager(&db);

    let task = Task::new("review feature", "TASK-review", AgentType::Qa);
    tasks.create(&task).await.unwrap();
    let mut session = AgentSession::new(task.id, AgentType::Qa);
    session.status = SessionStatus::Completed;
    sessions.create(&session).await.unwrap();

    manager.cancel(session.id, "should be a no-op").await.unwrap();
    let after = sessions.get(session.id).await.unwrap().unwrap();
    assert_eq!(after.status, SessionStatus::Completed);
}

#[tokio::test]
async fn check_stuck_flags_sessions_whose_heartbeat_has_gone_quiet() {
    let db = common::TestDb::new().await;
    let tasks = db.tasks();
    let sessions = db.sessions();
    let manager = manager(&db);

    let stuck_task = Task::new("stuck build", "TASK-stuck-sm", AgentType::Build);
    tasks.create(&stuck_task).await.unwrap();
    let mut stuck = AgentSession::new(stuck_task.id, AgentType::Build);
    stuck.status = SessionStatus::Running;
    stuck.last_heartbeat_at = Utc::now() - Duration::seconds(9000);
    sessions.create(&stuck).await.unwrap();

    let fresh_task = Task::new("fresh build", "TASK-fresh-sm", AgentType::Build);
    tasks.create(&fresh_task).await.unwrap();
    let mut fresh = AgentSession::new(fresh_task.id, AgentType::Build);
    fresh.status = SessionStatus::Running;
    sessions.create(&fresh).await.unwrap();

    let flagged = manager.check_stuck(Utc::now()).await.unwrap();
    assert_eq!(flagged.len(), 1);
    assert_eq!(flagged[0].id, stuck.id);
}
