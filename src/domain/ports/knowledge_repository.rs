//! Knowledge repository port (spec §4.1, §4.5).

use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::error::DomainResult;
use crate::domain::models::{KnowledgeItem, KnowledgeQuery};

#[async_trait]
pub trait KnowledgeRepository: Send + Sync {
    async fn get(&self, id: Uuid) -> DomainResult<Option<KnowledgeItem>>;

    /// Finds an existing item to merge a new observation into, by
    /// (content, file_pattern) identity — the corpus's upsert key for
    /// recurring gotchas/patterns discovered across sessions.
    async fn find_matching(&self, content: &str, file_pattern: &str) -> DomainResult<Option<KnowledgeItem>>;

    async fn upsert(&self, item: &KnowledgeItem) -> DomainResult<()>;

    /// Ranked by `(confidence desc, recency desc)` per spec §4.5.
    async fn query(&self, query: KnowledgeQuery) -> DomainResult<Vec<KnowledgeItem>>;
}
