//! Exercises the dispatcher tick end to end (spec §4.9, §8 scenarios),
//! using the registry's default agent handlers, whose spawn commands name
//! binaries this test environment doesn't have — exactly the failure path
//! `dispatch` must recover from by reverting the task to `ready`.

mod common;

use chrono::{Duration, Utc};

use taskforge::domain::models::{AgentSession, AgentType, Config, SessionStatus, Task, TaskStatus};
use taskforge::domain::ports::{SessionRepository, TaskRepository};
use taskforge::services::{Orchestrator, SessionManager};

fn orchestrator(db: &common::TestDb, session_manager: std::sync::Arc<SessionManager>) -> Orchestrator {
    Orchestrator::new(
        db.tasks(),
        session_manager,
        common::resource_registry(db),
        common::agent_type_registry(),
        common::event_bus(db),
        Config::default(),
    )
}

fn session_manager(db: &common::TestDb) -> std::sync::Arc<SessionManager> {
    std::sync::Arc::new(SessionManager::new(
        db.sessions(),
        std::sync::Arc::new(taskforge::infrastructure::database::HeartbeatRepositoryImpl::new(
            db.connection.pool().clone(),
        )),
        common::agent_type_registry(),
        common::event_bus(db),
        Duration::seconds(5),
        Duration::seconds(600),
    ))
}

#[tokio::test]
async fn promote_due_retries_only_promotes_tasks_with_satisfied_dependencies() {
    let db = common::TestDb::new().await;
    let tasks = db.tasks();
    let sm = session_manager(&db);
    let orch = orchestrator(&db, sm);
    let now = Utc::now();

    let mut blocker = Task::new("blocker", "TASK-blocker", AgentType::Build);
    blocker.status = TaskStatus::InProgress;
    tasks.create(&blocker).await.unwrap();

    let mut waiting = Task::new("waits on blocker", "TASK-waiting", AgentType::Build);
    waiting.status = TaskStatus::Pending;
    waiting.next_retry_at = Some(now - Duration::seconds(1));
    waiting.dependencies = vec![blocker.id];
    tasks.create(&waiting).await.unwrap();

    let mut unblocked = Task::new("no dependencies", "TASK-free", AgentType::Build);
    unblocked.status = TaskStatus::Pending;
    unblocked.next_retry_at = Some(now - Duration::seconds(1));
    unblocked.spec_path = Some("specs/free.md".to_string());
    tasks.create(&unblocked).await.unwrap();

    let summary = orch.tick().await.unwrap();
    assert_eq!(summary.promoted_to_ready, 1);

    assert_eq!(tasks.get(waiting.id).await.unwrap().unwrap().status, TaskStatus::Pending);
    assert_eq!(tasks.get(unblocked.id).await.unwrap().unwrap().status, TaskStatus::Ready);
}

#[tokio::test]
async fn a_dispatch_failure_reverts_the_task_to_ready_instead_of_stranding_it() {
    let db = common::TestDb::new().await;
    let tasks = db.tasks();
    let sm = session_manager(&db);
    let orch = orchestrator(&db, sm);

    let mut task = Task::new("needs a worker binary that doesn't exist here", "TASK-0001", AgentType::Build);
    task.status = TaskStatus::Ready;
    task.spec_path = Some("specs/whatever.md".to_string());
    tasks.create(&task).await.unwrap();

    let result = orch.tick().await;
    assert!(result.is_err());

    let after = tasks.get(task.id).await.unwrap().unwrap();
    assert_eq!(after.status, TaskStatus::Ready);
}

#[tokio::test]
async fn exit_zero_without_a_completion_report_is_a_validation_failure() {
    let db = common::TestDb::new().await;
    let tasks = db.tasks();
    let sessions = db.sessions();
    let sm = session_manager(&db);
    let orch = orchestrator(&db, sm);

    let mut task = Task::new("writes nothing", "TASK-report", AgentType::Build);
    task.status = TaskStatus::InProgress;
    tasks.create(&task).await.unwrap();

    let session = AgentSession::new(task.id, AgentType::Build);
    sessions.create(&session).await.unwrap();

    orch.on_session_exit(session.id, 0, "").await.unwrap();

    let after = tasks.get(task.id).await.unwrap().unwrap();
    assert_eq!(after.status, TaskStatus::Pending);
    assert!(after.last_error.is_some());
    assert_eq!(after.retry_count, 1);

    let exited = sessions.get(session.id).await.unwrap().unwrap();
    assert_eq!(exited.status, SessionStatus::Completed);
}

#[tokio::test]
async fn exit_zero_with_a_completion_report_moves_to_pending_verification() {
    let db = common::TestDb::new().await;
    let tasks = db.tasks();
    let sessions = db.sessions();
    let sm = session_manager(&db);
    let orch = orchestrator(&db, sm);

    let mut task = Task::new("finishes cleanly", "TASK-done", AgentType::Build);
    task.status = TaskStatus::InProgress;
    task.completion_report = Some("all tests pass".to_string());
    tasks.create(&task).await.unwrap();

    let session = AgentSession::new(task.id, AgentType::Build);
    sessions.create(&session).await.unwrap();

    orch.on_session_exit(session.id, 0, "").await.unwrap();

    let after = tasks.get(task.id).await.unwrap().unwrap();
    assert_eq!(after.status, TaskStatus::PendingVerification);
}

#[tokio::test]
async fn a_verification_session_exiting_zero_completes_the_task() {
    let db = common::TestDb::new().await;
    let tasks = db.tasks();
    let sessions = db.sessions();
    let sm = session_manager(&db);
    let orch = orchestrator(&db, sm);

    let mut task = Task::new("awaiting verification", "TASK-verify", AgentType::Build);
    task.status = TaskStatus::Verifying;
    task.completion_report = Some("all tests pass".to_string());
    tasks.create(&task).await.unwrap();

    let session = AgentSession::new(task.id, AgentType::Qa);
    sessions.create(&session).await.unwrap();

    orch.on_session_exit(session.id, 0, "").await.unwrap();

    let after = tasks.get(task.id).await.unwrap().unwrap();
    assert_eq!(after.status, TaskStatus::Completed);
}

#[tokio::test]
async fn a_verification_session_exiting_nonzero_fails_the_task_through_the_retry_policy() {
    let db = common::TestDb::new().await;
    let tasks = db.tasks();
    let sessions = db.sessions();
    let sm = session_manager(&db);
    let orch = orchestrator(&db, sm);

    let mut task = Task::new("verification finds a bug", "TASK-reverify", AgentType::Build);
    task.status = TaskStatus::Verifying;
    task.completion_report = Some("attempted fix".to_string());
    tasks.create(&task).await.unwrap();

    let session = AgentSession::new(task.id, AgentType::Qa);
    sessions.create(&session).await.unwrap();

    orch.on_session_exit(session.id, 1, "assertion failed: expected 4, got 5").await.unwrap();

    let after = tasks.get(task.id).await.unwrap().unwrap();
    assert_ne!(after.status, TaskStatus::Verifying);
    assert_ne!(after.status, TaskStatus::Completed);
    assert!(after.last_error.is_some());
}

#[tokio::test]
async fn dispatch_picks_up_a_pending_verification_task_and_spawns_a_qa_session() {
    let db = common::TestDb::new().await;
    let tasks = db.tasks();
    let sm = session_manager(&db);
    let orch = orchestrator(&db, sm);

    let mut task = Task::new("needs a worker binary that doesn't exist here", "TASK-qa", AgentType::Build);
    task.status = TaskStatus::PendingVerification;
    task.completion_report = Some("done".to_string());
    tasks.create(&task).await.unwrap();

    let result = orch.tick().await;
    assert!(result.is_err());

    let after = tasks.get(task.id).await.unwrap().unwrap();
    assert_eq!(after.status, TaskStatus::PendingVerification);
}
