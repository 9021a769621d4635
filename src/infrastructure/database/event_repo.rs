//! SQLite-backed [`EventRepository`] and [`ActivityRepository`] (spec §4.2).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::error::OrchestratorError;
use crate::domain::models::{Activity, ActivityKind, DeadLetterEntry, Event, SequenceNumber};
use crate::domain::ports::{ActivityRepository, EventRepository};
use crate::domain::DomainResult;

pub struct EventRepositoryImpl {
    pool: SqlitePool,
}

impl EventRepositoryImpl {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_event(row: &sqlx::sqlite::SqliteRow) -> DomainResult<Event> {
        let id: String = row.get("id");
        let payload: String = row.get("payload");
        Ok(Event {
            id: Uuid::parse_str(&id).map_err(|e| OrchestratorError::Database(e.to_string()))?,
            sequence: SequenceNumber(row.get::<i64, _>("sequence") as u64),
            event_type: row.get("event_type"),
            source: row.get("source"),
            payload: serde_json::from_str(&payload)?,
            timestamp: DateTime::parse_from_rfc3339(&row.get::<String, _>("ts"))
                .map(|d| d.with_timezone(&Utc))
                .map_err(|e| OrchestratorError::Database(e.to_string()))?,
        })
    }
}

#[async_trait]
impl EventRepository for EventRepositoryImpl {
    async fn append(&self, event: &mut Event) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT COALESCE(MAX(sequence), 0) + 1 AS next FROM events")
            .fetch_one(&mut *tx)
            .await?;
        let next_sequence: i64 = row.get("next");
        event.sequence = SequenceNumber(next_sequence as u64);

        sqlx::query(
            "INSERT INTO events (id, sequence, event_type, source, payload, ts) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(event.id.to_string())
        .bind(next_sequence)
        .bind(&event.event_type)
        .bind(&event.source)
        .bind(serde_json::to_string(&event.payload)?)
        .bind(event.timestamp.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }

    async fn list_since(&self, sequence: u64, limit: usize) -> DomainResult<Vec<Event>> {
        let rows = sqlx::query("SELECT * FROM events WHERE sequence > ? ORDER BY sequence ASC LIMIT ?")
            .bind(sequence as i64)
            .bind(limit as i64)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_event).collect()
    }

    async fn list_by_source(&self, source: &str) -> DomainResult<Vec<Event>> {
        let rows = sqlx::query("SELECT * FROM events WHERE source = ? ORDER BY sequence ASC")
            .bind(source)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_event).collect()
    }

    async fn record_dead_letter(&self, entry: &DeadLetterEntry) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO dead_letter_events (event_id, subscriber, attempts, last_error) VALUES (?, ?, ?, ?) \
             ON CONFLICT(event_id, subscriber) DO UPDATE SET attempts = excluded.attempts, \
             last_error = excluded.last_error",
        )
        .bind(entry.event_id.to_string())
        .bind(&entry.subscriber)
        .bind(entry.attempts as i64)
        .bind(&entry.last_error)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

pub struct ActivityRepositoryImpl {
    pool: SqlitePool,
}

impl ActivityRepositoryImpl {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivityRepository for ActivityRepositoryImpl {
    async fn append(&self, activity: &Activity) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO activities (id, session_id, kind, details, ts) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(activity.id.to_string())
        .bind(activity.session_id.map(|id| id.to_string()))
        .bind(activity.kind.as_str())
        .bind(serde_json::to_string(&activity.details)?)
        .bind(activity.timestamp.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_for_session(&self, session_id: Uuid) -> DomainResult<Vec<Activity>> {
        let rows = sqlx::query("SELECT * FROM activities WHERE session_id = ? ORDER BY ts ASC")
            .bind(session_id.to_string())
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| {
                let id: String = row.get("id");
                let session_id: Option<String> = row.get("session_id");
                let kind: String = row.get("kind");
                let details: String = row.get("details");
                Ok(Activity {
                    id: Uuid::parse_str(&id).map_err(|e| OrchestratorError::Database(e.to_string()))?,
                    session_id: session_id
                        .map(|s| Uuid::parse_str(&s))
                        .transpose()
                        .map_err(|e| OrchestratorError::Database(e.to_string()))?,
                    kind: ActivityKind::from_str(&kind)
                        .ok_or_else(|| OrchestratorError::Database(format!("unknown activity kind: {kind}")))?,
                    details: serde_json::from_str(&details)?,
                    timestamp: DateTime::parse_from_rfc3339(&row.get::<String, _>("ts"))
                        .map(|d| d.with_timezone(&Utc))
                        .map_err(|e| OrchestratorError::Database(e.to_string()))?,
                })
            })
            .collect()
    }
}
