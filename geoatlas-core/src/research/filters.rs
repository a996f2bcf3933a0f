//! User-selected filters and result ordering.

use std::cmp::Ordering;

use tracing::debug;

use super::keywords::ResearchKeywords;
use crate::types::{PaperRecord, SearchFilters, SortBy};

fn matches_subfields(paper: &PaperRecord, filters: &SearchFilters) -> bool {
    if filters.subfields.is_empty() {
        return true;
    }
    let wanted: Vec<String> = filters.subfields.iter().map(|s| s.to_lowercase()).collect();
    paper.subfields.iter().any(|tag| {
        let tag = tag.to_lowercase();
        wanted.iter().any(|w| tag.contains(w.as_str()))
    })
}

fn matches_methodology(
    paper: &PaperRecord,
    filters: &SearchFilters,
    keywords: &ResearchKeywords,
) -> bool {
    if filters.methodologies.is_empty() {
        return true;
    }
    let methodology = paper
        .methodology
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();
    filters.methodologies.iter().any(|category| {
        keywords
            .methodology_categories
            .for_category(*category)
            .iter()
            .any(|k| methodology.contains(k.as_str()))
    })
}

/// Whether one record satisfies every active constraint.
pub fn matches_filters(
    paper: &PaperRecord,
    filters: &SearchFilters,
    keywords: &ResearchKeywords,
) -> bool {
    if !filters.academic_levels.is_empty() {
        match paper.academic_level {
            Some(level) if filters.academic_levels.contains(&level) => {}
            _ => return false,
        }
    }
    if filters.open_access_only && !paper.open_access.is_open() {
        return false;
    }
    if !filters.citation_range.contains(paper.citation_count) {
        return false;
    }
    if !matches_subfields(paper, filters) {
        return false;
    }
    if !matches_methodology(paper, filters, keywords) {
        return false;
    }
    if let Some(range) = filters.year_range
        && !range.contains(paper.publication_year())
    {
        return false;
    }
    true
}

/// Keep only records that satisfy every active constraint.
pub fn apply_filters(
    papers: &[PaperRecord],
    filters: &SearchFilters,
    keywords: &ResearchKeywords,
) -> Vec<PaperRecord> {
    let out: Vec<PaperRecord> = papers
        .iter()
        .filter(|p| matches_filters(p, filters, keywords))
        .cloned()
        .collect();
    debug!(input = papers.len(), kept = out.len(), "Applied user filters");
    out
}

/// Stable sort by the requested order, best first.
pub fn sort_papers(papers: &[PaperRecord], sort_by: SortBy) -> Vec<PaperRecord> {
    let mut out = papers.to_vec();
    match sort_by {
        SortBy::Relevance => {
            out.sort_by(|a, b| b.relevance_score.total_cmp(&a.relevance_score));
        }
        SortBy::Citations => out.sort_by(|a, b| b.citation_count.cmp(&a.citation_count)),
        SortBy::Newest => out.sort_by(|a, b| match (a.published_on(), b.published_on()) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        }),
        SortBy::Freshness => out.sort_by(|a, b| {
            b.freshness_score
                .unwrap_or(0.0)
                .total_cmp(&a.freshness_score.unwrap_or(0.0))
        }),
    }
    out
}
