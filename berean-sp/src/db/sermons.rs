//! Sermon persistence and sync conflict resolution

use crate::models::sermon::{Sermon, TrackStatus};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Save sermon (upsert by id)
pub async fn save_sermon(pool: &SqlitePool, sermon: &Sermon) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO sermons (
            id, title, recorded_at, duration_seconds, audio_path, remote_audio_url,
            content_hash, transcription_status, transcription_error,
            study_guide_status, study_guide_error, needs_sync, deleted_at,
            created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            title = excluded.title,
            recorded_at = excluded.recorded_at,
            duration_seconds = excluded.duration_seconds,
            audio_path = excluded.audio_path,
            remote_audio_url = excluded.remote_audio_url,
            content_hash = excluded.content_hash,
            transcription_status = excluded.transcription_status,
            transcription_error = excluded.transcription_error,
            study_guide_status = excluded.study_guide_status,
            study_guide_error = excluded.study_guide_error,
            needs_sync = excluded.needs_sync,
            deleted_at = excluded.deleted_at,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(sermon.id.to_string())
    .bind(&sermon.title)
    .bind(sermon.recorded_at.to_rfc3339())
    .bind(sermon.duration_seconds)
    .bind(&sermon.audio_path)
    .bind(&sermon.remote_audio_url)
    .bind(&sermon.content_hash)
    .bind(sermon.transcription_status.as_str())
    .bind(&sermon.transcription_error)
    .bind(sermon.study_guide_status.as_str())
    .bind(&sermon.study_guide_error)
    .bind(sermon.needs_sync as i64)
    .bind(sermon.deleted_at.map(|t| t.to_rfc3339()))
    .bind(sermon.created_at.to_rfc3339())
    .bind(sermon.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

fn sermon_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Sermon> {
    let id_str: String = row.get("id");
    let recorded_at_str: String = row.get("recorded_at");
    let created_at_str: String = row.get("created_at");
    let updated_at_str: String = row.get("updated_at");
    let deleted_at_str: Option<String> = row.get("deleted_at");
    let transcription_status_str: String = row.get("transcription_status");
    let study_guide_status_str: String = row.get("study_guide_status");
    let needs_sync: i64 = row.get("needs_sync");

    Ok(Sermon {
        id: Uuid::parse_str(&id_str)?,
        title: row.get("title"),
        recorded_at: parse_timestamp(&recorded_at_str)?,
        duration_seconds: row.get("duration_seconds"),
        audio_path: row.get("audio_path"),
        remote_audio_url: row.get("remote_audio_url"),
        content_hash: row.get("content_hash"),
        transcription_status: TrackStatus::parse(&transcription_status_str)
            .ok_or_else(|| anyhow::anyhow!("bad transcription_status: {}", transcription_status_str))?,
        transcription_error: row.get("transcription_error"),
        study_guide_status: TrackStatus::parse(&study_guide_status_str)
            .ok_or_else(|| anyhow::anyhow!("bad study_guide_status: {}", study_guide_status_str))?,
        study_guide_error: row.get("study_guide_error"),
        needs_sync: needs_sync != 0,
        deleted_at: deleted_at_str.map(|s| parse_timestamp(&s)).transpose()?,
        created_at: parse_timestamp(&created_at_str)?,
        updated_at: parse_timestamp(&updated_at_str)?,
    })
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

/// Load sermon by id
pub async fn load_sermon(pool: &SqlitePool, id: Uuid) -> Result<Option<Sermon>> {
    let row = sqlx::query("SELECT * FROM sermons WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(Some(sermon_from_row(&row)?)),
        None => Ok(None),
    }
}

/// Load all sermons with a pending processing track, oldest first,
/// excluding tombstoned rows
pub async fn load_pending_sermons(pool: &SqlitePool) -> Result<Vec<Sermon>> {
    let rows = sqlx::query(
        r#"
        SELECT * FROM sermons
        WHERE deleted_at IS NULL
          AND (transcription_status = 'pending' OR study_guide_status = 'pending')
        ORDER BY recorded_at ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    rows.iter().map(sermon_from_row).collect()
}

/// Load all sermons the sync layer needs to push
pub async fn load_dirty_sermons(pool: &SqlitePool) -> Result<Vec<Sermon>> {
    let rows = sqlx::query("SELECT * FROM sermons WHERE needs_sync = 1 ORDER BY updated_at ASC")
        .fetch_all(pool)
        .await?;

    rows.iter().map(sermon_from_row).collect()
}

/// Clear the dirty flag after a successful push
pub async fn mark_synced(pool: &SqlitePool, id: Uuid) -> Result<()> {
    sqlx::query("UPDATE sermons SET needs_sync = 0 WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

/// Apply a remote copy of a sermon arriving from sync.
///
/// Most-recent-updated_at wins. On an exact timestamp tie the copies are
/// compared by their canonical JSON serialization and the
/// lexicographically greater one wins: an arbitrary but deterministic
/// secondary key, so two peers resolving the same pair converge without
/// coordination. Returns true when the remote copy was taken.
pub async fn apply_remote_sermon(pool: &SqlitePool, remote: &Sermon) -> Result<bool> {
    let local = load_sermon(pool, remote.id).await?;

    let take_remote = match &local {
        None => true,
        Some(local) => {
            if remote.updated_at != local.updated_at {
                remote.updated_at > local.updated_at
            } else {
                let remote_json = serde_json::to_string(remote)?;
                let local_json = serde_json::to_string(local)?;
                remote_json > local_json
            }
        }
    };

    if take_remote {
        let mut accepted = remote.clone();
        // A copy that just arrived from the server is not dirty
        accepted.needs_sync = false;
        save_sermon(pool, &accepted).await?;
        tracing::debug!(sermon_id = %remote.id, "Remote sermon copy accepted");
    } else {
        tracing::debug!(sermon_id = %remote.id, "Local sermon copy retained");
    }

    Ok(take_remote)
}
