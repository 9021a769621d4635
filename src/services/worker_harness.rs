//! Worker harness: the reusable library backing a concrete agent binary's
//! side of the worker contract (spec §4.6 Expansion) — heartbeat timer,
//! structured JSON stdout logging, and a SIGTERM handler that releases
//! locks before exiting.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::signal::unix::{signal, SignalKind};
use tokio::time::{interval, Duration as TokioDuration};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crate::domain::models::{HeartbeatPayload, HeartbeatStatus};
use crate::domain::ports::LockRepository;
use crate::domain::DomainResult;

/// The loopback heartbeat ingestion point a worker posts to. Modeled as a
/// trait rather than a concrete HTTP client: the core process wires a real
/// implementation, tests wire an in-memory one (spec §4.7 "heartbeat
/// ingestion exposes a small loopback endpoint, modeled, not a public HTTP
/// surface in scope").
#[async_trait]
pub trait HeartbeatSink: Send + Sync {
    async fn send(&self, payload: HeartbeatPayload) -> DomainResult<()>;
}

/// Installs a JSON-formatted `tracing-subscriber` on stdout, one object per
/// line with `ts, level, step/target, message, fields` — the structured log
/// format the worker contract requires (spec §4.6).
pub fn init_structured_logging() {
    let _ = tracing_subscriber::fmt()
        .json()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .try_init();
}

pub struct WorkerHarness {
    agent_id: Uuid,
    task_id: Uuid,
    sink: Arc<dyn HeartbeatSink>,
    locks: Arc<dyn LockRepository>,
    held_paths: Mutex<Vec<String>>,
    grace_period: std::time::Duration,
}

impl WorkerHarness {
    pub fn new(
        agent_id: Uuid,
        task_id: Uuid,
        sink: Arc<dyn HeartbeatSink>,
        locks: Arc<dyn LockRepository>,
        grace_period: std::time::Duration,
    ) -> Self {
        Self { agent_id, task_id, sink, locks, held_paths: Mutex::new(Vec::new()), grace_period }
    }

    /// Records a path this worker currently holds so the SIGTERM handler
    /// can release it without the caller having to track ownership itself.
    pub fn track_lock(&self, path: impl Into<String>) {
        self.held_paths.lock().push(path.into());
    }

    pub fn untrack_lock(&self, path: &str) {
        self.held_paths.lock().retain(|p| p != path);
    }

    /// Spawns the periodic heartbeat sender; returns a handle the caller
    /// should abort when the worker exits normally.
    pub fn spawn_heartbeat_loop(
        self: &Arc<Self>,
        interval_secs: u64,
        status: impl Fn() -> HeartbeatStatus + Send + Sync + 'static,
    ) -> tokio::task::JoinHandle<()> {
        let harness = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = interval(TokioDuration::from_secs(interval_secs));
            loop {
                ticker.tick().await;
                let payload = HeartbeatPayload {
                    agent_id: harness.agent_id,
                    task_id: harness.task_id,
                    status: status(),
                    progress_percent: None,
                    current_step: None,
                    memory_mb: None,
                    cpu_percent: None,
                    ts: chrono::Utc::now(),
                };
                if let Err(e) = harness.sink.send(payload).await {
                    error!(error = %e, "heartbeat delivery failed");
                }
            }
        })
    }

    /// Awaits SIGTERM, releases every tracked lock, and returns once that's
    /// done or `grace_period` elapses, whichever comes first (spec §4.6).
    pub async fn wait_for_shutdown(&self) {
        let mut term = match signal(SignalKind::terminate()) {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                return;
            }
        };
        term.recv().await;
        info!("received SIGTERM, releasing locks and flushing logs");

        let release = self.release_all_locks();
        if tokio::time::timeout(self.grace_period, release).await.is_err() {
            error!("lock release did not complete within grace period");
        }
    }

    async fn release_all_locks(&self) {
        let paths: Vec<String> = self.held_paths.lock().drain(..).collect();
        for path in paths {
            if let Err(e) = self.locks.release(&path, &self.agent_id.to_string()).await {
                error!(path, error = %e, "failed to release lock during shutdown");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::FileLock;
    use async_trait::async_trait;
    use chrono::Duration;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink(AtomicUsize);

    #[async_trait]
    impl HeartbeatSink for CountingSink {
        async fn send(&self, _payload: HeartbeatPayload) -> DomainResult<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct NoopLockRepository;

    #[async_trait]
    impl LockRepository for NoopLockRepository {
        async fn register_owner(&self, _o: &crate::domain::models::ResourceOwnership) -> DomainResult<bool> {
            Ok(true)
        }
        async fn get_owner(&self, _path: &str) -> DomainResult<Option<crate::domain::models::ResourceOwnership>> {
            Ok(None)
        }
        async fn release_owner(&self, _path: &str, _owner: &str) -> DomainResult<()> {
            Ok(())
        }
        async fn try_acquire(&self, _lock: &FileLock) -> DomainResult<bool> {
            Ok(true)
        }
        async fn get_lock(&self, _path: &str) -> DomainResult<Option<FileLock>> {
            Ok(None)
        }
        async fn release(&self, _path: &str, _holder_id: &str) -> DomainResult<()> {
            Ok(())
        }
        async fn reap_expired(&self, _now: chrono::DateTime<chrono::Utc>) -> DomainResult<u64> {
            Ok(0)
        }
    }

    #[tokio::test]
    async fn tracked_locks_are_released_on_shutdown() {
        let harness = Arc::new(WorkerHarness::new(
            Uuid::new_v4(),
            Uuid::new_v4(),
            Arc::new(CountingSink(AtomicUsize::new(0))),
            Arc::new(NoopLockRepository),
            std::time::Duration::from_secs(1),
        ));
        harness.track_lock("src/a.rs");
        harness.release_all_locks().await;
        assert!(harness.held_paths.lock().is_empty());
        let _ = Duration::seconds(0);
    }
}
