//! Study guide persistence
//!
//! Structured lists (outline, quotes, references, insights) are stored as
//! JSON columns in the current schema version; legacy payloads are
//! migrated before they ever reach this module.

use crate::models::study_guide::{
    AnchoredInsight, GuideQuote, OutlineSection, StudyGuide, VerseReference,
};
use anyhow::Result;
use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

/// Save study guide (upsert by sermon)
pub async fn save_study_guide(pool: &SqlitePool, guide: &StudyGuide) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO study_guides (
            id, sermon_id, summary, key_themes, outline, quotes,
            mentioned_references, suggested_references, insights,
            schema_version, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(sermon_id) DO UPDATE SET
            summary = excluded.summary,
            key_themes = excluded.key_themes,
            outline = excluded.outline,
            quotes = excluded.quotes,
            mentioned_references = excluded.mentioned_references,
            suggested_references = excluded.suggested_references,
            insights = excluded.insights,
            schema_version = excluded.schema_version,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(guide.id.to_string())
    .bind(guide.sermon_id.to_string())
    .bind(&guide.summary)
    .bind(serde_json::to_string(&guide.key_themes)?)
    .bind(serde_json::to_string(&guide.outline)?)
    .bind(serde_json::to_string(&guide.quotes)?)
    .bind(serde_json::to_string(&guide.mentioned_references)?)
    .bind(serde_json::to_string(&guide.suggested_references)?)
    .bind(serde_json::to_string(&guide.insights)?)
    .bind(guide.schema_version)
    .bind(guide.created_at.to_rfc3339())
    .bind(guide.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Load the study guide of a sermon
pub async fn load_study_guide_for_sermon(
    pool: &SqlitePool,
    sermon_id: Uuid,
) -> Result<Option<StudyGuide>> {
    let row = sqlx::query("SELECT * FROM study_guides WHERE sermon_id = ?")
        .bind(sermon_id.to_string())
        .fetch_optional(pool)
        .await?;

    let row = match row {
        Some(row) => row,
        None => return Ok(None),
    };

    let id_str: String = row.get("id");
    let key_themes_json: String = row.get("key_themes");
    let outline_json: String = row.get("outline");
    let quotes_json: String = row.get("quotes");
    let mentioned_json: String = row.get("mentioned_references");
    let suggested_json: String = row.get("suggested_references");
    let insights_json: String = row.get("insights");
    let created_at_str: String = row.get("created_at");
    let updated_at_str: String = row.get("updated_at");

    let key_themes: Vec<String> = serde_json::from_str(&key_themes_json)?;
    let outline: Vec<OutlineSection> = serde_json::from_str(&outline_json)?;
    let quotes: Vec<GuideQuote> = serde_json::from_str(&quotes_json)?;
    let mentioned_references: Vec<VerseReference> = serde_json::from_str(&mentioned_json)?;
    let suggested_references: Vec<VerseReference> = serde_json::from_str(&suggested_json)?;
    let insights: Vec<AnchoredInsight> = serde_json::from_str(&insights_json)?;

    Ok(Some(StudyGuide {
        id: Uuid::parse_str(&id_str)?,
        sermon_id,
        summary: row.get("summary"),
        key_themes,
        outline,
        quotes,
        mentioned_references,
        suggested_references,
        insights,
        schema_version: row.get("schema_version"),
        created_at: DateTime::parse_from_rfc3339(&created_at_str)?.with_timezone(&Utc),
        updated_at: DateTime::parse_from_rfc3339(&updated_at_str)?.with_timezone(&Utc),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::study_guide::StudyGuideWire;
    use serde_json::json;

    #[tokio::test]
    async fn test_round_trip() {
        let pool = crate::db::init_memory_pool().await.unwrap();
        let sermon_id = Uuid::new_v4();

        let guide = StudyGuideWire::from_json(&json!({
            "summary": "Grace",
            "key_themes": ["grace"],
            "outline": [{"title": "Opening", "body": "b", "anchor_text": "my grace is sufficient"}],
            "quotes": [{"text": "strength in weakness"}],
            "mentioned_references": ["2 Corinthians 12:9"],
            "suggested_references": ["Hebrews 4:16"],
            "insights": [{"title": "t", "insight": "i", "supporting_quote": "q"}]
        }))
        .unwrap()
        .migrate(sermon_id);

        save_study_guide(&pool, &guide).await.unwrap();
        let loaded = load_study_guide_for_sermon(&pool, sermon_id).await.unwrap().unwrap();

        assert_eq!(loaded.id, guide.id);
        assert_eq!(loaded.summary, "Grace");
        assert_eq!(loaded.outline.len(), 1);
        assert_eq!(loaded.outline[0].id, guide.outline[0].id);
        assert_eq!(loaded.suggested_references.len(), 1);
        assert_eq!(loaded.schema_version, guide.schema_version);
    }
}
