//! Suggested reference verification and enrichment
//!
//! Classifies each suggested reference against the curated
//! cross-reference database:
//! - unresolvable reference text → `Unverified`
//! - outgoing cross-reference from a mentioned/anchor verse → `Verified`
//! - incoming-only connection, or a valid but unconnected verse → `Partial`
//! - lookup failure or timeout → `Unknown` (never downgraded to
//!   `Unverified`, which would wrongly imply the reference itself is bad)
//!
//! The classification is a pure function of (reference, lookup content):
//! re-running against an unchanged lookup snapshot yields identical
//! statuses and enrichment source lists.

use crate::models::study_guide::{EnrichmentSource, StudyGuide, VerificationStatus, VerseReference};
use crate::services::reference_parser;
use crate::types::{CrossRefLookup, LookupError};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Verification engine over a read-only lookup collaborator
pub struct VerificationEngine {
    lookup: Arc<dyn CrossRefLookup>,
}

impl VerificationEngine {
    pub fn new(lookup: Arc<dyn CrossRefLookup>) -> Self {
        Self { lookup }
    }

    /// Resolve and enrich all references of a guide in place.
    ///
    /// Mentioned references are resolved first; their canonical verses
    /// form the anchor set that suggested references are verified
    /// against.
    pub async fn verify_guide(&self, guide: &mut StudyGuide) {
        for reference in &mut guide.mentioned_references {
            resolve_reference(reference);
            if reference.book_id.is_some() {
                reference.enrichment_sources = vec![EnrichmentSource::TranscriptMention];
            }
        }

        let anchors: Vec<(u8, u32, u32, String)> = guide
            .mentioned_references
            .iter()
            .filter_map(|r| {
                let id = r.canonical_id()?;
                Some((r.book_id?, r.chapter?, r.verse_start?, id))
            })
            .collect();

        let mentioned_ids: BTreeSet<String> =
            anchors.iter().map(|(_, _, _, id)| id.clone()).collect();

        for reference in &mut guide.suggested_references {
            self.classify_suggestion(reference, &anchors, &mentioned_ids).await;
        }
    }

    /// Classify one suggested reference against the anchor verses
    async fn classify_suggestion(
        &self,
        reference: &mut VerseReference,
        anchors: &[(u8, u32, u32, String)],
        mentioned_ids: &BTreeSet<String>,
    ) {
        resolve_reference(reference);

        let (book_id, chapter, verse_start, verse_end) = match (
            reference.book_id,
            reference.chapter,
            reference.verse_start,
            reference.verse_end,
        ) {
            (Some(b), Some(c), Some(vs), Some(ve)) => (b, c, vs, ve),
            // The reference text itself is invalid
            _ => {
                reference.verification = Some(VerificationStatus::Unverified);
                reference.enrichment_sources = vec![EnrichmentSource::AiOnly];
                return;
            }
        };

        match self
            .classify_resolved(reference, book_id, chapter, verse_start, verse_end, anchors)
            .await
        {
            Ok(()) => {}
            Err(e) => {
                // Support level undetermined: the reference may be fine,
                // the lookup was not
                tracing::warn!(
                    reference = %reference.raw_text,
                    error = %e,
                    "Cross-reference lookup failed, marking unknown"
                );
                reference.verification = Some(VerificationStatus::Unknown);
                reference.enrichment_sources = vec![EnrichmentSource::AiOnly];
                reference.verified_by.clear();
                return;
            }
        }

        // Fixed-order source list keeps the output deterministic
        let had_crossref = !reference.verified_by.is_empty()
            || reference.enrichment_sources.contains(&EnrichmentSource::CrossRefDatabase);
        let had_insight = reference.enrichment_sources.contains(&EnrichmentSource::InsightDatabase);

        let mut sources = Vec::new();
        if mentioned_ids.contains(&format!("{}.{}.{}", book_id, chapter, verse_start)) {
            sources.push(EnrichmentSource::TranscriptMention);
        }
        if had_crossref {
            sources.push(EnrichmentSource::CrossRefDatabase);
        }
        if had_insight {
            sources.push(EnrichmentSource::InsightDatabase);
        }
        if sources.is_empty() {
            sources.push(EnrichmentSource::AiOnly);
        }
        reference.enrichment_sources = sources;
    }

    /// Inner classification; any lookup error aborts to `Unknown`
    async fn classify_resolved(
        &self,
        reference: &mut VerseReference,
        book_id: u8,
        chapter: u32,
        verse_start: u32,
        verse_end: u32,
        anchors: &[(u8, u32, u32, String)],
    ) -> Result<(), LookupError> {
        reference.verified_by.clear();
        reference.enrichment_sources.clear();

        if !self.lookup.verse_exists(book_id, chapter, verse_start).await? {
            reference.verification = Some(VerificationStatus::Unverified);
            return Ok(());
        }

        // Outgoing edge from any anchor verse covering the suggestion
        let mut verified_by = BTreeSet::new();
        for (anchor_book, anchor_chapter, anchor_verse, anchor_id) in anchors {
            let edges = self
                .lookup
                .outgoing_refs(*anchor_book, *anchor_chapter, *anchor_verse)
                .await?;
            let connected = edges.iter().any(|e| {
                e.target_book_id == book_id
                    && e.target_chapter == chapter
                    && e.target_verse_start <= verse_end
                    && verse_start <= e.target_verse_end
            });
            if connected {
                verified_by.insert(anchor_id.clone());
            }
        }

        if !verified_by.is_empty() {
            reference.verification = Some(VerificationStatus::Verified);
            reference.verified_by = verified_by.into_iter().collect();
        } else {
            // Incoming-only and unconnected both classify as partial; the
            // incoming probe only contributes an enrichment source
            reference.verification = Some(VerificationStatus::Partial);
            match self.lookup.has_incoming_ref(book_id, chapter, verse_start).await {
                Ok(true) => reference
                    .enrichment_sources
                    .push(EnrichmentSource::CrossRefDatabase),
                Ok(false) => {}
                // Classification is already settled; a failed incoming
                // probe only loses a source annotation
                Err(e) => tracing::debug!(error = %e, "Incoming-reference probe failed"),
            }
        }

        // Insight availability is an annotation, not a classification
        // input
        match self.lookup.insight_summaries(book_id, chapter, verse_start).await {
            Ok(summaries) if !summaries.is_empty() => {
                reference.enrichment_sources.push(EnrichmentSource::InsightDatabase);
            }
            Ok(_) => {}
            Err(e) => tracing::debug!(error = %e, "Insight summary lookup failed"),
        }

        Ok(())
    }
}

/// Fill the structured fields of a reference from its raw text, leaving
/// them unset when the text does not parse
fn resolve_reference(reference: &mut VerseReference) {
    if reference.book_id.is_some() {
        return;
    }
    if let Ok(parsed) = reference_parser::parse(&reference.raw_text) {
        reference.book_id = Some(parsed.book_id);
        reference.chapter = Some(parsed.chapter);
        reference.verse_start = Some(parsed.verse_start);
        reference.verse_end = Some(parsed.verse_end);
    }
}
