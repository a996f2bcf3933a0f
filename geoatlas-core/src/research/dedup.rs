//! Duplicate detection for paper results.
//!
//! Two records are the same publication when their DOIs match exactly or
//! when their titles overlap above a similarity threshold.

use std::collections::HashSet;

use tracing::debug;
use unicode_normalization::UnicodeNormalization;

use crate::types::PaperRecord;

/// Titles scoring strictly above this are treated as the same paper.
pub const DEFAULT_TITLE_SIMILARITY_THRESHOLD: f64 = 0.85;

/// Lowercase, strip punctuation, and split into whitespace tokens.
fn title_tokens(title: &str) -> Vec<String> {
    let cleaned: String = title
        .nfc()
        .flat_map(char::to_lowercase)
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();
    cleaned.split_whitespace().map(str::to_string).collect()
}

/// Token-overlap similarity of two titles in `[0, 1]`.
///
/// Counts the tokens of `a` longer than three characters that also occur in
/// `b`, repeats included, divided by the larger token count. The score is not
/// symmetric. Titles that normalize to the same token list (including two
/// blank titles) score 1.0.
pub fn title_similarity(a: &str, b: &str) -> f64 {
    let tokens_a = title_tokens(a);
    let tokens_b = title_tokens(b);
    if tokens_a == tokens_b {
        return 1.0;
    }

    let larger = tokens_a.len().max(tokens_b.len());
    if larger == 0 {
        return 0.0;
    }

    let in_b: HashSet<&str> = tokens_b.iter().map(String::as_str).collect();
    let common = tokens_a
        .iter()
        .filter(|t| t.chars().count() > 3 && in_b.contains(t.as_str()))
        .count();

    common as f64 / larger as f64
}

/// True when either title scores above `threshold` against the other.
pub fn titles_match(a: &str, b: &str, threshold: f64) -> bool {
    title_similarity(a, b) > threshold || title_similarity(b, a) > threshold
}

/// Remove duplicate publications, keeping the first occurrence of each.
///
/// Input order is preserved among kept records; nothing is sorted here.
pub fn deduplicate_papers(papers: &[PaperRecord], threshold: f64) -> Vec<PaperRecord> {
    let mut seen_dois: HashSet<&str> = HashSet::new();
    let mut kept: Vec<&PaperRecord> = Vec::with_capacity(papers.len());

    for candidate in papers {
        if let Some(doi) = candidate.doi.as_deref()
            && seen_dois.contains(doi)
        {
            continue;
        }

        let similar = kept
            .iter()
            .any(|existing| titles_match(&existing.title, &candidate.title, threshold));
        if similar {
            continue;
        }

        if let Some(doi) = candidate.doi.as_deref() {
            seen_dois.insert(doi);
        }
        kept.push(candidate);
    }

    debug!(
        input = papers.len(),
        kept = kept.len(),
        "Deduplicated papers"
    );
    kept.into_iter().cloned().collect()
}
