//! Exercises the task state machine against a real SQLite-backed
//! `TaskRepository`: creation, compare-and-set transitions, ready-candidate
//! ordering, and due-retry selection.

mod common;

use chrono::{Duration, Utc};
use taskforge::domain::models::{AgentType, Task, TaskFilter, TaskStatus};
use taskforge::domain::ports::TaskRepository;

#[tokio::test]
async fn create_get_and_list_round_trip() {
    let db = common::TestDb::new().await;
    let tasks = db.tasks();

    let mut task = Task::new("wire up auth", "TASK-0001", AgentType::Build);
    task.spec_path = Some("specs/auth.md".to_string());
    tasks.create(&task).await.unwrap();

    let fetched = tasks.get(task.id).await.unwrap().expect("task exists");
    assert_eq!(fetched.title, "wire up auth");
    assert_eq!(fetched.status, TaskStatus::Pending);

    let all = tasks.list(TaskFilter::default()).await.unwrap();
    assert_eq!(all.len(), 1);
}

#[tokio::test]
async fn update_cas_rejects_a_stale_expected_status() {
    let db = common::TestDb::new().await;
    let tasks = db.tasks();

    let mut task = Task::new("flaky retry", "TASK-0002", AgentType::Qa);
    task.status = TaskStatus::Ready;
    tasks.create(&task).await.unwrap();

    // Someone else's CAS wins first.
    let mut winner = task.clone();
    winner.status = TaskStatus::InProgress;
    assert!(tasks.update_cas(&winner, TaskStatus::Ready).await.unwrap());

    // Our stale CAS, still believing the task is `ready`, must lose.
    let mut loser = task.clone();
    loser.status = TaskStatus::InProgress;
    assert!(!tasks.update_cas(&loser, TaskStatus::Ready).await.unwrap());

    let stored = tasks.get(task.id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::InProgress);
}

#[tokio::test]
async fn ready_candidates_are_ordered_by_priority_then_age() {
    let db = common::TestDb::new().await;
    let tasks = db.tasks();

    for (title, priority) in [("low", 1), ("high", 10), ("mid", 5)] {
        let mut task = Task::new(title, format!("TASK-{title}"), AgentType::Build);
        task.status = TaskStatus::Ready;
        task.priority = priority;
        tasks.create(&task).await.unwrap();
    }

    let candidates = tasks.get_ready_candidates(10).await.unwrap();
    let titles: Vec<&str> = candidates.iter().map(|t| t.title.as_str()).collect();
    assert_eq!(titles, vec!["high", "mid", "low"]);
}

#[tokio::test]
async fn due_retries_only_include_pending_tasks_past_their_delay() {
    let db = common::TestDb::new().await;
    let tasks = db.tasks();
    let now = Utc::now();

    let mut due = Task::new("due now", "TASK-due", AgentType::Build);
    due.status = TaskStatus::Pending;
    due.next_retry_at = Some(now - Duration::seconds(5));
    tasks.create(&due).await.unwrap();

    let mut not_yet = Task::new("not yet", "TASK-future", AgentType::Build);
    not_yet.status = TaskStatus::Pending;
    not_yet.next_retry_at = Some(now + Duration::seconds(3600));
    tasks.create(&not_yet).await.unwrap();

    let mut no_retry = Task::new("no retry timer", "TASK-none", AgentType::Build);
    no_retry.status = TaskStatus::Pending;
    tasks.create(&no_retry).await.unwrap();

    let results = tasks.get_due_retries(now).await.unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].id, due.id);
}
