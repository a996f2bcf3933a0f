//! Heuristic enrichment of paper records.
//!
//! Adds reading time and freshness to every record, and fills in academic
//! level and methodology only where the upstream source left them empty.

use chrono::{DateTime, Utc};

use super::keywords::{DEFAULT_METHODOLOGY, ResearchKeywords, count_matches};
use crate::types::{AcademicLevel, PaperRecord};

const WORDS_PER_MINUTE: usize = 200;
/// Papers younger than this are considered fully fresh.
const FRESH_WINDOW_DAYS: i64 = 730;
/// Age at which the freshness score reaches zero.
const FRESHNESS_CEILING_DAYS: i64 = 3650;

/// Abstract word count at 200 wpm, rounded up, at least one minute.
pub fn estimate_reading_time(abstract_text: &str) -> u32 {
    let words = abstract_text.split_whitespace().count();
    words.div_ceil(WORDS_PER_MINUTE).max(1) as u32
}

/// Classify by counting advanced and graduate keyword hits in the abstract.
pub fn detect_academic_level(abstract_text: &str, keywords: &ResearchKeywords) -> AcademicLevel {
    let text = abstract_text.to_lowercase();
    if count_matches(&text, &keywords.advanced_level) >= 2 {
        AcademicLevel::Advanced
    } else if count_matches(&text, &keywords.graduate_level) >= 2 {
        AcademicLevel::Graduate
    } else {
        AcademicLevel::Undergraduate
    }
}

/// Label of the first methodology rule with any keyword in the abstract.
pub fn detect_methodology(abstract_text: &str, keywords: &ResearchKeywords) -> String {
    let text = abstract_text.to_lowercase();
    keywords
        .methodology_rules
        .iter()
        .find(|rule| rule.keywords.iter().any(|k| text.contains(k.as_str())))
        .map(|rule| rule.label.clone())
        .unwrap_or_else(|| DEFAULT_METHODOLOGY.to_string())
}

/// Recency score in `[0, 1]`, rounded to two decimals.
///
/// 1.0 within two years of `now`, then a linear decay to 0.0 at ten years.
/// Records without a parseable date score 0.0.
pub fn freshness_score(paper: &PaperRecord, now: DateTime<Utc>) -> f64 {
    let Some(published) = paper.published_on() else {
        return 0.0;
    };
    let age_days = (now.date_naive() - published).num_days();
    if age_days <= FRESH_WINDOW_DAYS {
        return 1.0;
    }
    let span = (FRESHNESS_CEILING_DAYS - FRESH_WINDOW_DAYS) as f64;
    let decayed = 1.0 - (age_days - FRESH_WINDOW_DAYS) as f64 / span;
    (decayed.max(0.0) * 100.0).round() / 100.0
}

/// Return an enhanced copy of `paper`.
pub fn enhance_paper(
    paper: &PaperRecord,
    keywords: &ResearchKeywords,
    now: DateTime<Utc>,
) -> PaperRecord {
    let mut out = paper.clone();
    out.estimated_reading_time = Some(estimate_reading_time(&paper.abstract_text));
    if out.academic_level.is_none() {
        out.academic_level = Some(detect_academic_level(&paper.abstract_text, keywords));
    }
    let has_methodology = out
        .methodology
        .as_deref()
        .is_some_and(|m| !m.trim().is_empty());
    if !has_methodology {
        out.methodology = Some(detect_methodology(&paper.abstract_text, keywords));
    }
    out.freshness_score = Some(freshness_score(paper, now));
    out
}

pub fn enhance_papers(
    papers: &[PaperRecord],
    keywords: &ResearchKeywords,
    now: DateTime<Utc>,
) -> Vec<PaperRecord> {
    papers
        .iter()
        .map(|p| enhance_paper(p, keywords, now))
        .collect()
}
