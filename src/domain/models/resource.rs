//! Resource ownership and file-lock domain models (spec §3, §4.3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An advisory claim that a given path is written by a given worker/loop
/// (spec §3, §4.3 `register`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceOwnership {
    pub path: String,
    pub owner: String,
    pub resource_type: String,
}

/// A mandatory, TTL-bounded exclusive right to mutate a path (spec §3, §4.3).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileLock {
    pub path: String,
    pub holder_id: String,
    pub acquired_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl FileLock {
    pub fn new(path: impl Into<String>, holder_id: impl Into<String>, ttl: chrono::Duration) -> Self {
        let now = Utc::now();
        Self {
            path: path.into(),
            holder_id: holder_id.into(),
            acquired_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// Outcome of an `acquire` call (spec §4.3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AcquireOutcome {
    Ok,
    Conflict { held_by: String },
}
