//! Engagement record persistence
//!
//! The primary key is the content fingerprint, so re-deriving the same
//! record upserts instead of duplicating.

use crate::models::engagement::EngagementRecord;
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Save engagement record (upsert by fingerprint)
pub async fn save_engagement(pool: &SqlitePool, record: &EngagementRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO engagements (
            fingerprint, user_id, sermon_id, kind, body, needs_sync, deleted_at,
            created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(fingerprint) DO UPDATE SET
            needs_sync = excluded.needs_sync,
            deleted_at = excluded.deleted_at,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&record.fingerprint)
    .bind(record.user_id.to_string())
    .bind(record.sermon_id.to_string())
    .bind(&record.kind)
    .bind(&record.body)
    .bind(record.needs_sync as i64)
    .bind(record.deleted_at.map(|t| t.to_rfc3339()))
    .bind(record.created_at.to_rfc3339())
    .bind(record.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

fn engagement_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<EngagementRecord> {
    let user_id_str: String = row.get("user_id");
    let sermon_id_str: String = row.get("sermon_id");
    let deleted_at_str: Option<String> = row.get("deleted_at");
    let created_at_str: String = row.get("created_at");
    let updated_at_str: String = row.get("updated_at");
    let needs_sync: i64 = row.get("needs_sync");

    Ok(EngagementRecord {
        fingerprint: row.get("fingerprint"),
        user_id: Uuid::parse_str(&user_id_str)?,
        sermon_id: Uuid::parse_str(&sermon_id_str)?,
        kind: row.get("kind"),
        body: row.get("body"),
        needs_sync: needs_sync != 0,
        deleted_at: deleted_at_str
            .map(|s| Ok::<_, anyhow::Error>(DateTime::parse_from_rfc3339(&s)?.with_timezone(&Utc)))
            .transpose()?,
        created_at: DateTime::parse_from_rfc3339(&created_at_str)?.with_timezone(&Utc),
        updated_at: DateTime::parse_from_rfc3339(&updated_at_str)?.with_timezone(&Utc),
    })
}

/// Load all live engagement records for a sermon
pub async fn load_engagements_for_sermon(
    pool: &SqlitePool,
    sermon_id: Uuid,
) -> Result<Vec<EngagementRecord>> {
    let rows = sqlx::query(
        "SELECT * FROM engagements WHERE sermon_id = ? AND deleted_at IS NULL ORDER BY created_at ASC",
    )
    .bind(sermon_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(engagement_from_row).collect()
}
