//! SQLite-backed [`KnowledgeRepository`] (spec §4.5).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use crate::domain::error::OrchestratorError;
use crate::domain::models::{KnowledgeItem, KnowledgeKind, KnowledgeQuery};
use crate::domain::ports::KnowledgeRepository;
use crate::domain::DomainResult;

pub struct KnowledgeRepositoryImpl {
    pool: SqlitePool,
}

impl KnowledgeRepositoryImpl {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_item(row: &sqlx::sqlite::SqliteRow) -> DomainResult<KnowledgeItem> {
        let id: String = row.get("id");
        let kind: String = row.get("kind");
        let sessions: String = row.get("observed_sessions");
        let sessions: Vec<Uuid> = serde_json::from_str(&sessions)?;
        Ok(KnowledgeItem {
            id: Uuid::parse_str(&id).map_err(|e| OrchestratorError::Database(e.to_string()))?,
            kind: KnowledgeKind::from_str(&kind)
                .ok_or_else(|| OrchestratorError::Database(format!("unknown knowledge kind: {kind}")))?,
            content: row.get("content"),
            file_pattern: row.get("file_pattern"),
            action_type: row.get("action_type"),
            confidence: row.get("confidence"),
            source: row.get("source"),
            occurrence_count: row.get::<i64, _>("occurrence_count") as u32,
            observed_sessions: sessions,
            created_at: DateTime::parse_from_rfc3339(&row.get::<String, _>("created_at"))
                .map(|d| d.with_timezone(&Utc))
                .map_err(|e| OrchestratorError::Database(e.to_string()))?,
            updated_at: DateTime::parse_from_rfc3339(&row.get::<String, _>("updated_at"))
                .map(|d| d.with_timezone(&Utc))
                .map_err(|e| OrchestratorError::Database(e.to_string()))?,
        })
    }
}

#[async_trait]
impl KnowledgeRepository for KnowledgeRepositoryImpl {
    async fn get(&self, id: Uuid) -> DomainResult<Option<KnowledgeItem>> {
        let row = sqlx::query("SELECT * FROM knowledge_items WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_item).transpose()
    }

    async fn find_matching(&self, content: &str, file_pattern: &str) -> DomainResult<Option<KnowledgeItem>> {
        let row = sqlx::query("SELECT * FROM knowledge_items WHERE content = ? AND file_pattern = ?")
            .bind(content)
            .bind(file_pattern)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(Self::row_to_item).transpose()
    }

    async fn upsert(&self, item: &KnowledgeItem) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO knowledge_items (id, kind, content, file_pattern, action_type, confidence, \
             source, occurrence_count, observed_sessions, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET kind = excluded.kind, content = excluded.content, \
             file_pattern = excluded.file_pattern, action_type = excluded.action_type, \
             confidence = excluded.confidence, occurrence_count = excluded.occurrence_count, \
             observed_sessions = excluded.observed_sessions, updated_at = excluded.updated_at",
        )
        .bind(item.id.to_string())
        .bind(item.kind.as_str())
        .bind(&item.content)
        .bind(&item.file_pattern)
        .bind(&item.action_type)
        .bind(item.confidence)
        .bind(&item.source)
        .bind(item.occurrence_count as i64)
        .bind(serde_json::to_string(&item.observed_sessions)?)
        .bind(item.created_at.to_rfc3339())
        .bind(item.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn query(&self, query: KnowledgeQuery) -> DomainResult<Vec<KnowledgeItem>> {
        let rows = sqlx::query("SELECT * FROM knowledge_items ORDER BY confidence DESC, updated_at DESC")
            .fetch_all(&self.pool)
            .await?;
        let items: DomainResult<Vec<KnowledgeItem>> = rows.iter().map(Self::row_to_item).collect();
        let mut items = items?;

        if let Some(kind) = query.kind {
            items.retain(|i| i.kind == kind);
        }
        if let Some(action_type) = &query.action_type {
            items.retain(|i| i.action_type.as_deref() == Some(action_type.as_str()));
        }
        if let Some(pattern) = &query.file_pattern {
            items.retain(|i| i.matches_path(pattern));
        }
        if let Some(topic) = &query.topic {
            items.retain(|i| i.content.contains(topic.as_str()));
        }
        Ok(items)
    }
}
