//! Audio chunk persistence

use crate::models::chunk::{AudioChunk, UploadStatus};
use crate::models::sermon::TrackStatus;
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Save chunk (upsert by id)
pub async fn save_chunk(pool: &SqlitePool, chunk: &AudioChunk) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO audio_chunks (
            id, sermon_id, chunk_index, start_seconds, duration_seconds, content_hash,
            upload_status, upload_progress, upload_error,
            transcription_status, transcript_fragment, transcription_error,
            created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            upload_status = excluded.upload_status,
            upload_progress = excluded.upload_progress,
            upload_error = excluded.upload_error,
            transcription_status = excluded.transcription_status,
            transcript_fragment = excluded.transcript_fragment,
            transcription_error = excluded.transcription_error,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(chunk.id.to_string())
    .bind(chunk.sermon_id.to_string())
    .bind(chunk.chunk_index)
    .bind(chunk.start_seconds)
    .bind(chunk.duration_seconds)
    .bind(&chunk.content_hash)
    .bind(chunk.upload_status.as_str())
    .bind(chunk.upload_progress)
    .bind(&chunk.upload_error)
    .bind(chunk.transcription_status.as_str())
    .bind(&chunk.transcript_fragment)
    .bind(&chunk.transcription_error)
    .bind(chunk.created_at.to_rfc3339())
    .bind(chunk.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

fn chunk_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<AudioChunk> {
    let id_str: String = row.get("id");
    let sermon_id_str: String = row.get("sermon_id");
    let upload_status_str: String = row.get("upload_status");
    let transcription_status_str: String = row.get("transcription_status");
    let created_at_str: String = row.get("created_at");
    let updated_at_str: String = row.get("updated_at");

    Ok(AudioChunk {
        id: Uuid::parse_str(&id_str)?,
        sermon_id: Uuid::parse_str(&sermon_id_str)?,
        chunk_index: row.get("chunk_index"),
        start_seconds: row.get("start_seconds"),
        duration_seconds: row.get("duration_seconds"),
        content_hash: row.get("content_hash"),
        upload_status: UploadStatus::parse(&upload_status_str)
            .ok_or_else(|| anyhow::anyhow!("bad upload_status: {}", upload_status_str))?,
        upload_progress: row.get("upload_progress"),
        upload_error: row.get("upload_error"),
        transcription_status: TrackStatus::parse(&transcription_status_str)
            .ok_or_else(|| anyhow::anyhow!("bad transcription_status: {}", transcription_status_str))?,
        transcript_fragment: row.get("transcript_fragment"),
        transcription_error: row.get("transcription_error"),
        created_at: DateTime::parse_from_rfc3339(&created_at_str)?.with_timezone(&Utc),
        updated_at: DateTime::parse_from_rfc3339(&updated_at_str)?.with_timezone(&Utc),
    })
}

/// Load chunk by id
pub async fn load_chunk(pool: &SqlitePool, id: Uuid) -> Result<Option<AudioChunk>> {
    let row = sqlx::query("SELECT * FROM audio_chunks WHERE id = ?")
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(Some(chunk_from_row(&row)?)),
        None => Ok(None),
    }
}

/// Load all chunks of a sermon in index order
pub async fn load_chunks_for_sermon(pool: &SqlitePool, sermon_id: Uuid) -> Result<Vec<AudioChunk>> {
    let rows = sqlx::query(
        "SELECT * FROM audio_chunks WHERE sermon_id = ? ORDER BY chunk_index ASC",
    )
    .bind(sermon_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(chunk_from_row).collect()
}

/// Load chunk by content hash (idempotent re-upload check)
pub async fn load_chunk_by_hash(
    pool: &SqlitePool,
    sermon_id: Uuid,
    content_hash: &str,
) -> Result<Option<AudioChunk>> {
    let row = sqlx::query(
        "SELECT * FROM audio_chunks WHERE sermon_id = ? AND content_hash = ?",
    )
    .bind(sermon_id.to_string())
    .bind(content_hash)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(chunk_from_row(&row)?)),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_load_ordered() {
        let pool = crate::db::init_memory_pool().await.unwrap();
        let sermon_id = Uuid::new_v4();

        // Insert out of order; load comes back in index order
        for index in [2_i64, 0, 1] {
            let chunk = AudioChunk::new(
                sermon_id,
                index,
                index as f64 * 30.0,
                30.0,
                format!("hash-{index}"),
            );
            save_chunk(&pool, &chunk).await.unwrap();
        }

        let chunks = load_chunks_for_sermon(&pool, sermon_id).await.unwrap();
        assert_eq!(chunks.len(), 3);
        assert_eq!(
            chunks.iter().map(|c| c.chunk_index).collect::<Vec<_>>(),
            vec![0, 1, 2]
        );
    }

    #[tokio::test]
    async fn test_lookup_by_hash() {
        let pool = crate::db::init_memory_pool().await.unwrap();
        let sermon_id = Uuid::new_v4();
        let chunk = AudioChunk::new(sermon_id, 0, 0.0, 30.0, "abc123".to_string());
        save_chunk(&pool, &chunk).await.unwrap();

        let found = load_chunk_by_hash(&pool, sermon_id, "abc123").await.unwrap();
        assert_eq!(found.unwrap().id, chunk.id);
        assert!(load_chunk_by_hash(&pool, sermon_id, "nope").await.unwrap().is_none());
    }
}
