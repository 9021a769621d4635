//! Event and activity repository ports (spec §4.1, §4.2).

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::error::DomainResult;
use crate::domain::models::{Activity, DeadLetterEntry, Event};

#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Persists the event, assigning and returning the next sequence number.
    async fn append(&self, event: &mut Event) -> DomainResult<()>;
    async fn list_since(&self, sequence: u64, limit: usize) -> DomainResult<Vec<Event>>;
    async fn list_by_source(&self, source: &str) -> DomainResult<Vec<Event>>;
    async fn record_dead_letter(&self, entry: &DeadLetterEntry) -> DomainResult<()>;
}

#[async_trait]
pub trait ActivityRepository: Send + Sync {
    async fn append(&self, activity: &Activity) -> DomainResult<()>;
    async fn list_for_session(&self, session_id: Uuid) -> DomainResult<Vec<Activity>>;
}
