//! Transcript persistence
//!
//! Word timings and correction overlays are stored as JSON columns; the
//! derived display segments are never persisted.

use crate::models::transcript::{CorrectionOverlay, Transcript, WordTiming};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Save transcript (upsert by sermon)
pub async fn save_transcript(pool: &SqlitePool, transcript: &Transcript) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO transcripts (
            id, sermon_id, full_text, words, corrections, content_hash,
            created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(sermon_id) DO UPDATE SET
            full_text = excluded.full_text,
            words = excluded.words,
            corrections = excluded.corrections,
            content_hash = excluded.content_hash,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(transcript.id.to_string())
    .bind(transcript.sermon_id.to_string())
    .bind(&transcript.full_text)
    .bind(serde_json::to_string(&transcript.words)?)
    .bind(serde_json::to_string(&transcript.corrections)?)
    .bind(&transcript.content_hash)
    .bind(transcript.created_at.to_rfc3339())
    .bind(transcript.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Load the transcript of a sermon
pub async fn load_transcript_for_sermon(
    pool: &SqlitePool,
    sermon_id: Uuid,
) -> Result<Option<Transcript>> {
    let row = sqlx::query("SELECT * FROM transcripts WHERE sermon_id = ?")
        .bind(sermon_id.to_string())
        .fetch_optional(pool)
        .await?;

    let row = match row {
        Some(row) => row,
        None => return Ok(None),
    };

    let id_str: String = row.get("id");
    let words_json: String = row.get("words");
    let corrections_json: String = row.get("corrections");
    let created_at_str: String = row.get("created_at");
    let updated_at_str: String = row.get("updated_at");

    let words: Vec<WordTiming> = serde_json::from_str(&words_json)?;
    let corrections: Vec<CorrectionOverlay> = serde_json::from_str(&corrections_json)?;

    Ok(Some(Transcript {
        id: Uuid::parse_str(&id_str)?,
        sermon_id,
        full_text: row.get("full_text"),
        words,
        corrections,
        content_hash: row.get("content_hash"),
        created_at: DateTime::parse_from_rfc3339(&created_at_str)?.with_timezone(&Utc),
        updated_at: DateTime::parse_from_rfc3339(&updated_at_str)?.with_timezone(&Utc),
    }))
}
