//! Permissive geography-relevance gate.
//!
//! Keeps anything that plausibly belongs to human or physical geography, and
//! falls back to a looser content check when the keyword gate would prune
//! almost everything.

use tracing::{debug, warn};

use super::keywords::{ResearchKeywords, any_match};
use crate::types::PaperRecord;

/// Thresholds for the fallback that guards against over-pruning.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RelevancePolicy {
    /// Fallback runs when fewer than this share of the input survives...
    pub fallback_ratio: f64,
    /// ...and the input had more than this many records.
    pub fallback_min_input: usize,
}

impl Default for RelevancePolicy {
    fn default() -> Self {
        Self {
            fallback_ratio: 0.2,
            fallback_min_input: 5,
        }
    }
}

fn has_substantive_content(paper: &PaperRecord) -> bool {
    !paper.title.trim().is_empty() && paper.abstract_text.chars().count() > 20
}

/// Keyword, academic-marker, and citation heuristics for a single record.
pub fn is_geography_relevant(paper: &PaperRecord, keywords: &ResearchKeywords) -> bool {
    if !has_substantive_content(paper) {
        return false;
    }

    let searchable = format!(
        "{} {} {}",
        paper.title,
        paper.abstract_text,
        paper.subfields.join(" ")
    )
    .to_lowercase();

    if any_match(&searchable, &keywords.geography) {
        return true;
    }
    if any_match(&searchable, &keywords.academic_markers) {
        return true;
    }
    paper.abstract_text.chars().count() > 100 && paper.citation_count > 5
}

fn passes_fallback(paper: &PaperRecord) -> bool {
    !paper.title.trim().is_empty() && paper.abstract_text.chars().count() > 30
}

/// Whether a keyword pass that kept `kept` of `input` records should be
/// replaced by the fallback.
pub fn fallback_triggered(kept: usize, input: usize, policy: &RelevancePolicy) -> bool {
    (kept as f64) < policy.fallback_ratio * input as f64 && input > policy.fallback_min_input
}

/// Filter to geography-relevant records, never growing the list.
pub fn filter_geography_relevant(
    papers: &[PaperRecord],
    keywords: &ResearchKeywords,
    policy: &RelevancePolicy,
) -> Vec<PaperRecord> {
    let relevant: Vec<PaperRecord> = papers
        .iter()
        .filter(|p| is_geography_relevant(p, keywords))
        .cloned()
        .collect();

    if fallback_triggered(relevant.len(), papers.len(), policy) {
        let fallback: Vec<PaperRecord> =
            papers.iter().filter(|p| passes_fallback(p)).cloned().collect();
        warn!(
            input = papers.len(),
            relevant = relevant.len(),
            fallback = fallback.len(),
            "Geography filter kept too few papers, using content fallback"
        );
        return fallback;
    }

    debug!(
        input = papers.len(),
        kept = relevant.len(),
        "Applied geography relevance filter"
    );
    relevant
}
