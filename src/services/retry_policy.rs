//! Retry policy: maps a task's error kind and retry count to either a
//! backoff delay or permanent failure (spec §4.9, §7).

use chrono::{DateTime, Duration, Utc};

use crate::domain::error::ErrorKind;
use crate::domain::models::{Config, LastError, Task, TaskStatus};

/// What the orchestrator should do with a task after a failed attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum RetryDecision {
    /// Retry at the given time; task goes to `pending` with `next_retry_at` set.
    Retry { next_retry_at: DateTime<Utc> },
    /// Retries exhausted; task goes to `blocked` pending human review.
    Exhausted,
}

pub struct RetryPolicy<'a> {
    config: &'a Config,
}

impl<'a> RetryPolicy<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Looks up the backoff table for `error.kind` and the attempt number
    /// to decide whether `task` gets another try.
    pub fn decide(&self, task: &Task, error: &LastError, now: DateTime<Utc>) -> RetryDecision {
        let policy = self.config.retry_policy_for(error.kind);
        let attempt = task.retry_count as usize;

        if attempt >= policy.max_retries as usize {
            return RetryDecision::Exhausted;
        }

        let delay_secs = policy
            .backoff_seconds
            .get(attempt)
            .or_else(|| policy.backoff_seconds.last())
            .copied()
            .unwrap_or(0);

        RetryDecision::Retry { next_retry_at: now + Duration::seconds(delay_secs as i64) }
    }

    /// Applies a [`RetryDecision`] to `task` in place, following spec §4.9's
    /// state table: retry re-arms `pending`, exhaustion moves to `blocked`.
    pub fn apply(&self, task: &mut Task, error: LastError, now: DateTime<Utc>) {
        let decision = self.decide(task, &error, now);
        task.last_error = Some(error);
        task.updated_at = now;

        match decision {
            RetryDecision::Retry { next_retry_at } => {
                task.retry_count += 1;
                task.next_retry_at = Some(next_retry_at);
                task.status = TaskStatus::Pending;
            }
            RetryDecision::Exhausted => {
                task.next_retry_at = None;
                task.status = TaskStatus::Blocked;
                task.needs_review = true;
                task.review_reason = Some(format!(
                    "exhausted {} retries for error kind {}",
                    task.retry_count,
                    error_kind_label(task)
                ));
            }
        }
    }
}

fn error_kind_label(task: &Task) -> &'static str {
    task.last_error.as_ref().map(|e| e.kind.as_str()).unwrap_or(ErrorKind::Unknown.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::AgentType;
    use chrono::Utc;

    fn task() -> Task {
        Task::new("title", "T-1", AgentType::Build)
    }

    fn error(kind: ErrorKind) -> LastError {
        LastError { kind, message: "boom".to_string(), location: None }
    }

    #[test]
    fn transient_errors_retry_with_backoff() {
        let config = Config::default();
        let policy = RetryPolicy::new(&config);
        let t = task();
        let now = Utc::now();

        let decision = policy.decide(&t, &error(ErrorKind::Transient), now);
        match decision {
            RetryDecision::Retry { next_retry_at } => assert!(next_retry_at > now),
            RetryDecision::Exhausted => panic!("expected a retry on first attempt"),
        }
    }

    #[test]
    fn exhausted_retries_block_the_task() {
        let config = Config::default();
        let policy = RetryPolicy::new(&config);
        let mut t = task();
        t.retry_count = 10;

        policy.apply(&mut t, error(ErrorKind::CodeError), Utc::now());
        assert_eq!(t.status, TaskStatus::Blocked);
        assert!(t.needs_review);
    }

    #[test]
    fn resource_conflict_retries_immediately() {
        let config = Config::default();
        let policy = RetryPolicy::new(&config);
        let t = task();
        let now = Utc::now();

        let decision = policy.decide(&t, &error(ErrorKind::ResourceConflict), now);
        assert_eq!(decision, RetryDecision::Retry { next_retry_at: now });
    }
}
