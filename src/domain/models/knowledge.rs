//! Knowledge-base domain model (spec §3, §4.5).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KnowledgeKind {
    Gotcha,
    Pattern,
    Decision,
}

impl KnowledgeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gotcha => "gotcha",
            Self::Pattern => "pattern",
            Self::Decision => "decision",
        }
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "gotcha" => Some(Self::Gotcha),
            "pattern" => Some(Self::Pattern),
            "decision" => Some(Self::Decision),
            _ => None,
        }
    }
}

/// A queryable unit of learned experience: an anti-pattern to avoid, a
/// reusable positive approach, or a recorded decision (spec §3, GLOSSARY).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeItem {
    pub id: Uuid,
    pub kind: KnowledgeKind,
    pub content: String,
    pub file_pattern: String,
    pub action_type: Option<String>,
    pub confidence: f64,
    pub source: String,
    pub occurrence_count: u32,
    pub observed_sessions: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl KnowledgeItem {
    pub fn new(
        kind: KnowledgeKind,
        content: impl Into<String>,
        file_pattern: impl Into<String>,
        confidence: f64,
        source: impl Into<String>,
        observed_in_session: Uuid,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            kind,
            content: content.into(),
            file_pattern: file_pattern.into(),
            action_type: None,
            confidence: confidence.clamp(0.0, 1.0),
            source: source.into(),
            occurrence_count: 1,
            observed_sessions: vec![observed_in_session],
            created_at: now,
            updated_at: now,
        }
    }

    /// True iff `candidate_path` matches this item's glob file pattern.
    pub fn matches_path(&self, candidate_path: &str) -> bool {
        glob::Pattern::new(&self.file_pattern)
            .map(|p| p.matches(candidate_path))
            .unwrap_or(false)
    }

    /// Promotion predicate for "universal pattern" status (spec §4.5, §9 Open Questions).
    /// Evaluated lazily rather than stored, since thresholds are configurable.
    pub fn is_universal(&self, promotion_threshold: f64, min_observations: u32) -> bool {
        self.confidence >= promotion_threshold
            && (self.distinct_session_count() as u32) >= min_observations
    }

    pub fn distinct_session_count(&self) -> usize {
        let mut sessions = self.observed_sessions.clone();
        sessions.sort();
        sessions.dedup();
        sessions.len()
    }

    /// Merge a newly reported observation into this item, combining
    /// confidence as a running average weighted by prior occurrence count
    /// (spec §4.5: "on collision, confidence is combined by a documented rule").
    pub fn record_observation(&mut self, new_confidence: f64, observed_in_session: Uuid) {
        let weight = self.occurrence_count as f64;
        self.confidence = ((self.confidence * weight) + new_confidence.clamp(0.0, 1.0)) / (weight + 1.0);
        if !self.observed_sessions.contains(&observed_in_session) {
            self.observed_sessions.push(observed_in_session);
        }
        self.occurrence_count += 1;
        self.updated_at = Utc::now();
    }
}

/// Query parameters for the knowledge base (spec §4.5 `query`).
#[derive(Debug, Clone, Default)]
pub struct KnowledgeQuery {
    pub file_pattern: Option<String>,
    pub action_type: Option<String>,
    pub kind: Option<KnowledgeKind>,
    pub topic: Option<String>,
}

/// Defaults documented in spec §9 Open Questions: the source material
/// disagreed on exact numbers, so these are configurable with the
/// most frequently cited values as defaults.
#[derive(Debug, Clone, Copy)]
pub struct PromotionPolicy {
    pub promotion_threshold: f64,
    pub min_observations: u32,
}

impl Default for PromotionPolicy {
    fn default() -> Self {
        Self {
            promotion_threshold: 0.9,
            min_observations: 3,
        }
    }
}
