//! Study guide model and versioned wire decoding
//!
//! The generation service returns a structured payload whose field set is
//! a persisted, synced wire format. Decoding is versioned: legacy v1
//! payloads (no stable section/insight identifiers, plain-string
//! references) migrate to the current shape in one place, instead of
//! scattering "if missing, generate" branches through the decode path.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

/// Current wire schema version
pub const STUDY_GUIDE_SCHEMA_VERSION: i64 = 2;

/// Support level of a suggested reference against the cross-reference
/// database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    /// Outgoing cross-reference from a mentioned/anchor verse connects to
    /// this suggestion
    Verified,
    /// Structurally valid verse, but only an incoming connection or none
    Partial,
    /// The reference could not be resolved to a real verse
    Unverified,
    /// The lookup service failed; support level undetermined
    Unknown,
}

impl VerificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VerificationStatus::Verified => "verified",
            VerificationStatus::Partial => "partial",
            VerificationStatus::Unverified => "unverified",
            VerificationStatus::Unknown => "unknown",
        }
    }
}

/// Which enrichment inputs contributed to a reference's classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentSource {
    /// The reference appears verbatim in the transcript
    TranscriptMention,
    /// The cross-reference database connects it to an anchor verse
    CrossRefDatabase,
    /// The insight database has commentary for it
    InsightDatabase,
    /// Only the generation model proposed it
    AiOnly,
}

/// A Bible reference embedded in a study guide
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerseReference {
    /// Reference string as produced by the generation step or transcript
    pub raw_text: String,

    /// Resolved canonical book id (1-66), if parseable
    pub book_id: Option<u8>,
    pub chapter: Option<u32>,
    pub verse_start: Option<u32>,
    pub verse_end: Option<u32>,

    /// Reference appears in the sermon transcript itself
    pub is_mentioned: bool,

    /// Verification classification; populated for suggested references
    /// only
    pub verification: Option<VerificationStatus>,

    /// Enrichment inputs that contributed
    pub enrichment_sources: Vec<EnrichmentSource>,

    /// Canonical ids of the mentioned/anchor verses whose outgoing
    /// cross-references verified this suggestion
    pub verified_by: Vec<String>,
}

impl VerseReference {
    /// Unresolved reference wrapping just the raw string
    pub fn unresolved(raw_text: String, is_mentioned: bool) -> Self {
        Self {
            raw_text,
            book_id: None,
            chapter: None,
            verse_start: None,
            verse_end: None,
            is_mentioned,
            verification: None,
            enrichment_sources: Vec::new(),
            verified_by: Vec::new(),
        }
    }

    /// Canonical `book.chapter.verse` identifier, if resolved
    pub fn canonical_id(&self) -> Option<String> {
        match (self.book_id, self.chapter, self.verse_start) {
            (Some(b), Some(c), Some(v)) => Some(format!("{}.{}.{}", b, c, v)),
            _ => None,
        }
    }
}

/// One outline section of the generated guide
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlineSection {
    pub id: Uuid,
    pub title: String,
    pub body: String,
    /// Verbatim transcript excerpt locating this section, when provided
    pub anchor_text: Option<String>,
    /// Resolved transcript timestamp (seconds), when anchor matching
    /// succeeded
    pub timestamp_seconds: Option<f64>,
    /// Anchor match quality (threshold..1.0), unset when unresolved
    pub match_confidence: Option<f64>,
}

/// A notable quote pulled from the sermon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GuideQuote {
    pub id: Uuid,
    /// Verbatim excerpt
    pub text: String,
    pub timestamp_seconds: Option<f64>,
    pub match_confidence: Option<f64>,
}

/// A generated insight anchored to a supporting quote
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnchoredInsight {
    pub id: Uuid,
    pub title: String,
    pub insight: String,
    /// Verbatim excerpt supporting the insight
    pub supporting_quote: String,
    pub timestamp_seconds: Option<f64>,
    pub match_confidence: Option<f64>,
}

/// AI-derived study guide for one sermon
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyGuide {
    pub id: Uuid,
    pub sermon_id: Uuid,

    pub summary: String,
    pub key_themes: Vec<String>,
    pub outline: Vec<OutlineSection>,
    pub quotes: Vec<GuideQuote>,

    /// References spoken in the sermon
    pub mentioned_references: Vec<VerseReference>,
    /// References the generation step proposed for further study,
    /// deduplicated by canonical identifier
    pub suggested_references: Vec<VerseReference>,

    pub insights: Vec<AnchoredInsight>,

    pub schema_version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StudyGuide {
    /// Deduplicate suggested references by canonical id (unresolved
    /// references dedup on normalized raw text). First occurrence wins so
    /// the generation step's ranking is preserved.
    pub fn dedup_suggested(&mut self) {
        let mut seen = HashSet::new();
        self.suggested_references.retain(|r| {
            let key = r
                .canonical_id()
                .unwrap_or_else(|| r.raw_text.trim().to_lowercase());
            seen.insert(key)
        });
    }
}

// ============================================================================
// Wire format (versioned)
// ============================================================================

/// Study guide payload as returned by the generation service and as
/// persisted/synced. Optional fields absorb the differences between
/// schema versions; `migrate` resolves them all.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudyGuideWire {
    /// Missing on legacy v1 payloads
    #[serde(default)]
    pub schema_version: Option<i64>,

    pub summary: String,

    #[serde(default)]
    pub key_themes: Vec<String>,

    #[serde(default)]
    pub outline: Vec<WireOutlineSection>,

    #[serde(default)]
    pub quotes: Vec<WireQuote>,

    /// v1: plain reference strings; v2: same (resolution happens in the
    /// verification engine, not on the wire)
    #[serde(default)]
    pub mentioned_references: Vec<String>,

    #[serde(default)]
    pub suggested_references: Vec<String>,

    #[serde(default)]
    pub insights: Vec<WireInsight>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireOutlineSection {
    /// Absent on v1 payloads; filled during migration
    #[serde(default)]
    pub id: Option<Uuid>,
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub anchor_text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireQuote {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireInsight {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub title: String,
    pub insight: String,
    pub supporting_quote: String,
}

impl StudyGuideWire {
    /// Decode a wire payload, tolerating legacy v1 field sets
    pub fn from_json(json: &serde_json::Value) -> Result<Self, serde_json::Error> {
        serde_json::from_value(json.clone())
    }

    /// Migrate the wire payload into the domain model, filling
    /// legacy-missing identifiers with fresh UUIDs. All default-filling
    /// happens here and nowhere else.
    pub fn migrate(self, sermon_id: Uuid) -> StudyGuide {
        let now = Utc::now();
        let mut guide = StudyGuide {
            id: Uuid::new_v4(),
            sermon_id,
            summary: self.summary,
            key_themes: self.key_themes,
            outline: self
                .outline
                .into_iter()
                .map(|s| OutlineSection {
                    id: s.id.unwrap_or_else(Uuid::new_v4),
                    title: s.title,
                    body: s.body,
                    anchor_text: s.anchor_text,
                    timestamp_seconds: None,
                    match_confidence: None,
                })
                .collect(),
            quotes: self
                .quotes
                .into_iter()
                .map(|q| GuideQuote {
                    id: q.id.unwrap_or_else(Uuid::new_v4),
                    text: q.text,
                    timestamp_seconds: None,
                    match_confidence: None,
                })
                .collect(),
            mentioned_references: self
                .mentioned_references
                .into_iter()
                .map(|r| VerseReference::unresolved(r, true))
                .collect(),
            suggested_references: self
                .suggested_references
                .into_iter()
                .map(|r| VerseReference::unresolved(r, false))
                .collect(),
            insights: self
                .insights
                .into_iter()
                .map(|i| AnchoredInsight {
                    id: i.id.unwrap_or_else(Uuid::new_v4),
                    title: i.title,
                    insight: i.insight,
                    supporting_quote: i.supporting_quote,
                    timestamp_seconds: None,
                    match_confidence: None,
                })
                .collect(),
            schema_version: STUDY_GUIDE_SCHEMA_VERSION,
            created_at: now,
            updated_at: now,
        };
        guide.dedup_suggested();
        guide
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_v1_payload_migrates_with_fresh_ids() {
        // Legacy payload: no schema_version, no section/insight ids
        let payload = json!({
            "summary": "Grace as unearned favor",
            "key_themes": ["grace", "weakness"],
            "outline": [
                {"title": "Opening", "body": "Paul's thorn", "anchor_text": "my grace is sufficient for you"}
            ],
            "quotes": [{"text": "strength is made perfect in weakness"}],
            "mentioned_references": ["2 Corinthians 12:9"],
            "suggested_references": ["Hebrews 4:16", "hebrews 4:16", "Romans 5:2"],
            "insights": [
                {"title": "Sufficiency", "insight": "Grace meets the need", "supporting_quote": "my grace is sufficient for you"}
            ]
        });

        let wire = StudyGuideWire::from_json(&payload).unwrap();
        assert_eq!(wire.schema_version, None);

        let guide = wire.migrate(Uuid::new_v4());
        assert_eq!(guide.schema_version, STUDY_GUIDE_SCHEMA_VERSION);
        assert_eq!(guide.outline.len(), 1);
        assert_eq!(guide.insights.len(), 1);
        // Identifiers were filled during migration
        assert_ne!(guide.outline[0].id, Uuid::nil());
        assert_ne!(guide.insights[0].id, Uuid::nil());
        // Unresolved duplicates dedup on normalized raw text
        assert_eq!(guide.suggested_references.len(), 2);
    }

    #[test]
    fn test_v2_payload_preserves_ids() {
        let section_id = Uuid::new_v4();
        let payload = json!({
            "schema_version": 2,
            "summary": "s",
            "outline": [{"id": section_id, "title": "t", "body": "b"}]
        });
        let guide = StudyGuideWire::from_json(&payload).unwrap().migrate(Uuid::new_v4());
        assert_eq!(guide.outline[0].id, section_id);
    }

    #[test]
    fn test_dedup_by_canonical_id() {
        let mut guide = StudyGuideWire::from_json(&json!({"summary": "s"}))
            .unwrap()
            .migrate(Uuid::new_v4());

        let mut a = VerseReference::unresolved("John 3:16".to_string(), false);
        a.book_id = Some(43);
        a.chapter = Some(3);
        a.verse_start = Some(16);
        // Different raw spelling, same canonical id
        let mut b = VerseReference::unresolved("Jn 3:16".to_string(), false);
        b.book_id = Some(43);
        b.chapter = Some(3);
        b.verse_start = Some(16);

        guide.suggested_references = vec![a, b];
        guide.dedup_suggested();
        assert_eq!(guide.suggested_references.len(), 1);
        assert_eq!(guide.suggested_references[0].raw_text, "John 3:16");
    }
}
