//! Database access for berean-sp
//!
//! Local SQLite store for sermons, chunks, transcripts, study guides,
//! and engagement records. The sync layer consumes the `needs_sync`
//! column; this module never implements transport.

pub mod bible;
pub mod chunks;
pub mod engagements;
pub mod sermons;
pub mod study_guides;
pub mod transcripts;

use anyhow::Result;
use sqlx::SqlitePool;
use std::path::Path;

/// Initialize database connection pool
pub async fn init_database_pool(db_path: &Path) -> Result<SqlitePool> {
    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Use proper SQLite URI with mode=rwc (read, write, create)
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    tracing::debug!("Connecting to database: {}", db_url);

    let pool = SqlitePool::connect(&db_url).await?;
    init_tables(&pool).await?;

    Ok(pool)
}

/// In-memory pool for tests.
///
/// Pinned to a single connection: each SQLite `:memory:` connection is
/// its own database, so a wider pool would scatter tables across
/// connections.
pub async fn init_memory_pool() -> Result<SqlitePool> {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect("sqlite::memory:")
        .await?;
    init_tables(&pool).await?;
    Ok(pool)
}

/// Create berean-sp tables if they don't exist
pub async fn init_tables(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sermons (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            recorded_at TEXT NOT NULL,
            duration_seconds REAL,
            audio_path TEXT,
            remote_audio_url TEXT,
            content_hash TEXT,
            transcription_status TEXT NOT NULL DEFAULT 'pending',
            transcription_error TEXT,
            study_guide_status TEXT NOT NULL DEFAULT 'pending',
            study_guide_error TEXT,
            needs_sync INTEGER NOT NULL DEFAULT 1,
            deleted_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audio_chunks (
            id TEXT PRIMARY KEY,
            sermon_id TEXT NOT NULL,
            chunk_index INTEGER NOT NULL,
            start_seconds REAL NOT NULL,
            duration_seconds REAL NOT NULL,
            content_hash TEXT NOT NULL,
            upload_status TEXT NOT NULL DEFAULT 'pending',
            upload_progress REAL NOT NULL DEFAULT 0.0,
            upload_error TEXT,
            transcription_status TEXT NOT NULL DEFAULT 'pending',
            transcript_fragment TEXT,
            transcription_error TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE(sermon_id, chunk_index)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS transcripts (
            id TEXT PRIMARY KEY,
            sermon_id TEXT NOT NULL UNIQUE,
            full_text TEXT NOT NULL,
            words TEXT NOT NULL,
            corrections TEXT NOT NULL DEFAULT '[]',
            content_hash TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS study_guides (
            id TEXT PRIMARY KEY,
            sermon_id TEXT NOT NULL UNIQUE,
            summary TEXT NOT NULL,
            key_themes TEXT NOT NULL DEFAULT '[]',
            outline TEXT NOT NULL DEFAULT '[]',
            quotes TEXT NOT NULL DEFAULT '[]',
            mentioned_references TEXT NOT NULL DEFAULT '[]',
            suggested_references TEXT NOT NULL DEFAULT '[]',
            insights TEXT NOT NULL DEFAULT '[]',
            schema_version INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS engagements (
            fingerprint TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            sermon_id TEXT NOT NULL,
            kind TEXT NOT NULL,
            body TEXT NOT NULL,
            needs_sync INTEGER NOT NULL DEFAULT 1,
            deleted_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database tables initialized (sermons, audio_chunks, transcripts, study_guides, engagements)");

    Ok(())
}
