//! Research-paper result pipeline.
//!
//! Raw upstream records flow through
//! `dedup -> enhance -> geography filter -> user filters -> sort`.
//! Every stage is synchronous, performs no I/O, and returns a new list.

pub mod dedup;
pub mod enhance;
pub mod filters;
pub mod keywords;
pub mod query;
pub mod relevance;

use chrono::{DateTime, Utc};
use tracing::debug;

pub use dedup::{
    DEFAULT_TITLE_SIMILARITY_THRESHOLD, deduplicate_papers, title_similarity, titles_match,
};
pub use enhance::{
    detect_academic_level, detect_methodology, enhance_paper, enhance_papers,
    estimate_reading_time, freshness_score,
};
pub use filters::{apply_filters, matches_filters, sort_papers};
pub use keywords::{DEFAULT_METHODOLOGY, MethodologyRule, ResearchKeywords};
pub use query::optimize_search_query;
pub use relevance::{
    RelevancePolicy, fallback_triggered, filter_geography_relevant, is_geography_relevant,
};

use crate::types::{PaperRecord, SearchFilters};

/// Tunables for one pipeline run.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub keywords: ResearchKeywords,
    pub title_similarity_threshold: f64,
    pub relevance: RelevancePolicy,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            keywords: ResearchKeywords::default(),
            title_similarity_threshold: DEFAULT_TITLE_SIMILARITY_THRESHOLD,
            relevance: RelevancePolicy::default(),
        }
    }
}

/// Run every stage over a freshly fetched batch.
pub fn run_pipeline(
    papers: &[PaperRecord],
    filters: &SearchFilters,
    settings: &PipelineSettings,
    now: DateTime<Utc>,
) -> Vec<PaperRecord> {
    let unique = deduplicate_papers(papers, settings.title_similarity_threshold);
    let enhanced = enhance_papers(&unique, &settings.keywords, now);
    let relevant = if filters.geography_focus {
        filter_geography_relevant(&enhanced, &settings.keywords, &settings.relevance)
    } else {
        enhanced
    };
    let filtered = apply_filters(&relevant, filters, &settings.keywords);
    let sorted = sort_papers(&filtered, filters.sort_by);
    debug!(
        raw = papers.len(),
        unique = unique.len(),
        relevant = relevant.len(),
        returned = sorted.len(),
        "Research pipeline finished"
    );
    sorted
}
