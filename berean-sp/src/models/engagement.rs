//! Engagement records (notes, highlights, amens) tied to a sermon
//!
//! Identity is a content fingerprint, not a random id: deriving the same
//! record twice (re-sync, regeneration) upserts onto the same row.

use berean_common::fingerprint;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A user's engagement with one sermon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementRecord {
    /// Deterministic content fingerprint (primary key)
    pub fingerprint: String,

    pub user_id: Uuid,
    pub sermon_id: Uuid,

    /// Record kind discriminator ("note", "highlight", ...)
    pub kind: String,

    /// Engagement body text
    pub body: String,

    pub needs_sync: bool,
    pub deleted_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EngagementRecord {
    /// Create a record, deriving its fingerprint from the normalized
    /// content
    pub fn new(user_id: Uuid, sermon_id: Uuid, kind: &str, body: String) -> Self {
        let scope = format!("{}:{}", user_id, sermon_id);
        let fp = fingerprint::fingerprint(&scope, kind, &[&body]);
        let now = Utc::now();
        Self {
            fingerprint: fp,
            user_id,
            sermon_id,
            kind: kind.to_string(),
            body,
            needs_sync: true,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Soft-delete, keeping the tombstone for sync
    pub fn mark_deleted(&mut self) {
        self.deleted_at = Some(Utc::now());
        self.updated_at = Utc::now();
        self.needs_sync = true;
    }
}
