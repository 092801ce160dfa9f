//! Read-only verse and cross-reference database
//!
//! The verification database ships as a prebuilt SQLite file (KJV verse
//! table, curated cross-references, insight summaries). This module only
//! reads it; it is built by an offline data pipeline and safely shared
//! across concurrently-processed sermons.

use crate::types::{CrossRefEdge, CrossRefLookup, InsightSummary, LookupError};
use anyhow::Result;
use sqlx::{Row, SqlitePool};
use std::path::Path;

/// Handle over the bundled verification database
#[derive(Clone)]
pub struct BibleDatabase {
    pool: SqlitePool,
}

impl BibleDatabase {
    /// Open the database read-only
    pub async fn open(db_path: &Path) -> Result<Self> {
        let db_url = format!("sqlite://{}?mode=ro", db_path.display());
        tracing::debug!("Opening verse database: {}", db_url);
        let pool = SqlitePool::connect(&db_url).await?;
        Ok(Self { pool })
    }

    /// In-memory instance with empty tables, for tests and tooling.
    ///
    /// Single connection: each SQLite `:memory:` connection is its own
    /// database.
    pub async fn open_in_memory() -> Result<Self> {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS verses (
                translation_id TEXT NOT NULL,
                book_id INTEGER NOT NULL,
                chapter INTEGER NOT NULL,
                verse INTEGER NOT NULL,
                text TEXT NOT NULL,
                PRIMARY KEY (translation_id, book_id, chapter, verse)
            )
            "#,
        )
        .execute(&pool)
        .await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS cross_references (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_book_id INTEGER NOT NULL,
                source_chapter INTEGER NOT NULL,
                source_verse_start INTEGER NOT NULL,
                source_verse_end INTEGER NOT NULL,
                target_book_id INTEGER NOT NULL,
                target_chapter INTEGER NOT NULL,
                target_verse_start INTEGER NOT NULL,
                target_verse_end INTEGER NOT NULL,
                weight REAL NOT NULL DEFAULT 1.0,
                source TEXT
            )
            "#,
        )
        .execute(&pool)
        .await?;
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS insights (
                insight_id TEXT PRIMARY KEY,
                book_id INTEGER NOT NULL,
                chapter INTEGER NOT NULL,
                verse INTEGER NOT NULL,
                title TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }

    /// Verse text, when present (fetched on demand for display)
    pub async fn verse_text(&self, book_id: u8, chapter: u32, verse: u32) -> Result<Option<String>> {
        let row = sqlx::query(
            "SELECT text FROM verses WHERE book_id = ? AND chapter = ? AND verse = ? LIMIT 1",
        )
        .bind(book_id as i64)
        .bind(chapter as i64)
        .bind(verse as i64)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|r| r.get("text")))
    }

    /// Underlying pool, for seeding in tests
    #[doc(hidden)]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn lookup_err(e: sqlx::Error) -> LookupError {
    LookupError::Database(e.to_string())
}

#[async_trait::async_trait]
impl CrossRefLookup for BibleDatabase {
    async fn verse_exists(&self, book_id: u8, chapter: u32, verse: u32) -> Result<bool, LookupError> {
        let row = sqlx::query(
            "SELECT 1 FROM verses WHERE book_id = ? AND chapter = ? AND verse = ? LIMIT 1",
        )
        .bind(book_id as i64)
        .bind(chapter as i64)
        .bind(verse as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(lookup_err)?;

        Ok(row.is_some())
    }

    async fn outgoing_refs(
        &self,
        book_id: u8,
        chapter: u32,
        verse: u32,
    ) -> Result<Vec<CrossRefEdge>, LookupError> {
        // Ordered by weight with deterministic tie-breaking so repeated
        // verification runs see identical sequences
        let rows = sqlx::query(
            r#"
            SELECT target_book_id, target_chapter, target_verse_start, target_verse_end, weight
            FROM cross_references
            WHERE source_book_id = ? AND source_chapter = ?
              AND source_verse_start <= ? AND ? <= source_verse_end
            ORDER BY weight DESC, target_book_id ASC, target_chapter ASC,
                     target_verse_start ASC, target_verse_end ASC
            "#,
        )
        .bind(book_id as i64)
        .bind(chapter as i64)
        .bind(verse as i64)
        .bind(verse as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(lookup_err)?;

        Ok(rows
            .iter()
            .map(|row| CrossRefEdge {
                target_book_id: row.get::<i64, _>("target_book_id") as u8,
                target_chapter: row.get::<i64, _>("target_chapter") as u32,
                target_verse_start: row.get::<i64, _>("target_verse_start") as u32,
                target_verse_end: row.get::<i64, _>("target_verse_end") as u32,
                weight: row.get("weight"),
            })
            .collect())
    }

    async fn has_incoming_ref(
        &self,
        book_id: u8,
        chapter: u32,
        verse: u32,
    ) -> Result<bool, LookupError> {
        let row = sqlx::query(
            r#"
            SELECT 1 FROM cross_references
            WHERE target_book_id = ? AND target_chapter = ?
              AND target_verse_start <= ? AND ? <= target_verse_end
            LIMIT 1
            "#,
        )
        .bind(book_id as i64)
        .bind(chapter as i64)
        .bind(verse as i64)
        .bind(verse as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(lookup_err)?;

        Ok(row.is_some())
    }

    async fn insight_summaries(
        &self,
        book_id: u8,
        chapter: u32,
        verse: u32,
    ) -> Result<Vec<InsightSummary>, LookupError> {
        let rows = sqlx::query(
            r#"
            SELECT insight_id, title FROM insights
            WHERE book_id = ? AND chapter = ? AND verse = ?
            ORDER BY insight_id ASC
            "#,
        )
        .bind(book_id as i64)
        .bind(chapter as i64)
        .bind(verse as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(lookup_err)?;

        Ok(rows
            .iter()
            .map(|row| InsightSummary {
                insight_id: row.get("insight_id"),
                title: row.get("title"),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn seeded() -> BibleDatabase {
        let db = BibleDatabase::open_in_memory().await.unwrap();
        sqlx::query(
            "INSERT INTO verses (translation_id, book_id, chapter, verse, text)
             VALUES ('kjv', 43, 3, 16, 'For God so loved the world...')",
        )
        .execute(db.pool())
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO cross_references
             (source_book_id, source_chapter, source_verse_start, source_verse_end,
              target_book_id, target_chapter, target_verse_start, target_verse_end, weight)
             VALUES (43, 3, 16, 16, 45, 5, 8, 8, 42.0)",
        )
        .execute(db.pool())
        .await
        .unwrap();
        db
    }

    #[tokio::test]
    async fn test_verse_lookup() {
        let db = seeded().await;
        assert!(db.verse_exists(43, 3, 16).await.unwrap());
        assert!(!db.verse_exists(43, 3, 99).await.unwrap());
        assert!(db.verse_text(43, 3, 16).await.unwrap().unwrap().starts_with("For God"));
    }

    #[tokio::test]
    async fn test_crossref_edges() {
        let db = seeded().await;
        let edges = db.outgoing_refs(43, 3, 16).await.unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].target_book_id, 45);
        assert!(db.has_incoming_ref(45, 5, 8).await.unwrap());
        assert!(!db.has_incoming_ref(43, 3, 16).await.unwrap());
    }
}
