//! Knowledge base: gotchas, patterns, and decisions queried before task
//! generation and written after task execution (spec §4.5).

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::models::{KnowledgeItem, KnowledgeKind, KnowledgeQuery, PromotionPolicy};
use crate::domain::ports::KnowledgeRepository;
use crate::domain::DomainResult;

pub struct KnowledgeBase {
    repository: Arc<dyn KnowledgeRepository>,
    promotion_policy: PromotionPolicy,
}

impl KnowledgeBase {
    pub fn new(repository: Arc<dyn KnowledgeRepository>, promotion_policy: PromotionPolicy) -> Self {
        Self { repository, promotion_policy }
    }

    pub async fn query(&self, query: KnowledgeQuery) -> DomainResult<Vec<KnowledgeItem>> {
        self.repository.query(query).await
    }

    /// Records an observation, merging confidence into an existing item with
    /// the same `(content, file_pattern)` identity or creating a new one.
    pub async fn record(
        &self,
        kind: KnowledgeKind,
        content: impl Into<String>,
        file_pattern: impl Into<String>,
        confidence: f64,
        source: impl Into<String>,
        observed_in_session: Uuid,
    ) -> DomainResult<KnowledgeItem> {
        let content = content.into();
        let file_pattern = file_pattern.into();

        let mut item = match self.repository.find_matching(&content, &file_pattern).await? {
            Some(mut existing) => {
                existing.record_observation(confidence, observed_in_session);
                existing
            }
            None => KnowledgeItem::new(kind, content, file_pattern, confidence, source, observed_in_session),
        };
        item.kind = kind;

        self.repository.upsert(&item).await?;
        Ok(item)
    }

    pub fn is_universal(&self, item: &KnowledgeItem) -> bool {
        item.is_universal(self.promotion_policy.promotion_threshold, self.promotion_policy.min_observations)
    }

    /// Gotchas/patterns applicable to `path`, ranked by confidence, for
    /// pre-task context injection (spec §8 scenario 6).
    pub async fn applicable_to(&self, path: &str) -> DomainResult<Vec<KnowledgeItem>> {
        let items = self.repository.query(KnowledgeQuery::default()).await?;
        Ok(items.into_iter().filter(|i| i.matches_path(path)).collect())
    }
}
