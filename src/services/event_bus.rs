//! Event bus: durable append-then-broadcast pub/sub (spec §4.2).

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tracing::warn;

use crate::domain::models::{DeadLetterEntry, Event};
use crate::domain::ports::EventRepository;
use crate::domain::DomainResult;

const DEFAULT_CHANNEL_CAPACITY: usize = 1024;
const DEFAULT_DEAD_LETTER_THRESHOLD: u32 = 5;

/// Central pub/sub hub. Every publish durably appends to the event log
/// (assigning the next [`crate::domain::models::SequenceNumber`]) before
/// fanning out to subscribers, so a crash-recovered monitor can replay.
pub struct EventBus {
    repository: Arc<dyn EventRepository>,
    sender: broadcast::Sender<Event>,
    dead_letter_threshold: u32,
    failure_counts: Mutex<HashMap<(uuid::Uuid, String), u32>>,
    next_subscriber_id: AtomicU32,
}

impl EventBus {
    pub fn new(repository: Arc<dyn EventRepository>) -> Self {
        Self::with_capacity(repository, DEFAULT_CHANNEL_CAPACITY)
    }

    pub fn with_capacity(repository: Arc<dyn EventRepository>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            repository,
            sender,
            dead_letter_threshold: DEFAULT_DEAD_LETTER_THRESHOLD,
            failure_counts: Mutex::new(HashMap::new()),
            next_subscriber_id: AtomicU32::new(0),
        }
    }

    pub async fn publish(&self, mut event: Event) -> DomainResult<Event> {
        self.repository.append(&mut event).await?;
        let _ = self.sender.send(event.clone());
        Ok(event)
    }

    /// Registers a subscriber for events matching `topic_pattern` (e.g. `task.*`).
    /// Fan-out goes through a per-subscriber `mpsc` channel so one slow consumer
    /// cannot stall delivery to the others.
    pub fn subscribe(&self, topic_pattern: impl Into<String>) -> Subscription {
        let pattern = topic_pattern.into();
        let subscriber_id = format!("sub-{}", self.next_subscriber_id.fetch_add(1, Ordering::SeqCst));
        let mut broadcast_rx = self.sender.subscribe();
        let (tx, rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            loop {
                match broadcast_rx.recv().await {
                    Ok(event) if event.matches_topic(&pattern) => {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => continue,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "subscriber lagged behind event bus broadcast");
                        continue;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Subscription { id: subscriber_id, receiver: rx }
    }

    /// Records a failed delivery attempt; once a subscriber has failed
    /// `dead_letter_threshold` consecutive times on the same event, the
    /// event is dead-lettered.
    pub async fn record_delivery_failure(
        &self,
        event_id: uuid::Uuid,
        subscriber: &str,
        error: &str,
    ) -> DomainResult<()> {
        let attempts = {
            let mut counts = self.failure_counts.lock();
            let entry = counts.entry((event_id, subscriber.to_string())).or_insert(0);
            *entry += 1;
            *entry
        };

        if attempts >= self.dead_letter_threshold {
            self.repository
                .record_dead_letter(&DeadLetterEntry {
                    event_id,
                    subscriber: subscriber.to_string(),
                    attempts,
                    last_error: error.to_string(),
                })
                .await?;
        }
        Ok(())
    }

    pub fn record_delivery_success(&self, event_id: uuid::Uuid, subscriber: &str) {
        self.failure_counts.lock().remove(&(event_id, subscriber.to_string()));
    }
}

/// A live subscription; drop it (or let the sender side close) to unsubscribe.
pub struct Subscription {
    pub id: String,
    pub receiver: mpsc::Receiver<Event>,
}

impl Subscription {
    pub async fn recv(&mut self) -> Option<Event> {
        self.receiver.recv().await
    }
}
