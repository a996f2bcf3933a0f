//! Fundamental types shared across GeoAtlas: papers, filters and search outcomes.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// One author of a paper.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Author {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub affiliation: Option<String>,
}

impl Author {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            affiliation: None,
        }
    }
}

/// How freely a paper can be read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpenAccessStatus {
    Gold,
    Green,
    Bronze,
    #[default]
    Closed,
}

impl OpenAccessStatus {
    pub fn is_open(&self) -> bool {
        !matches!(self, OpenAccessStatus::Closed)
    }
}

impl std::fmt::Display for OpenAccessStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpenAccessStatus::Gold => write!(f, "gold"),
            OpenAccessStatus::Green => write!(f, "green"),
            OpenAccessStatus::Bronze => write!(f, "bronze"),
            OpenAccessStatus::Closed => write!(f, "closed"),
        }
    }
}

/// Reading level a paper is pitched at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AcademicLevel {
    Undergraduate,
    Graduate,
    Advanced,
}

impl std::fmt::Display for AcademicLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AcademicLevel::Undergraduate => write!(f, "undergraduate"),
            AcademicLevel::Graduate => write!(f, "graduate"),
            AcademicLevel::Advanced => write!(f, "advanced"),
        }
    }
}

impl std::str::FromStr for AcademicLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "undergraduate" | "undergrad" => Ok(AcademicLevel::Undergraduate),
            "graduate" | "grad" => Ok(AcademicLevel::Graduate),
            "advanced" => Ok(AcademicLevel::Advanced),
            other => Err(format!("unknown academic level: {other}")),
        }
    }
}

/// Broad methodology families a user can filter on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodologyCategory {
    Quantitative,
    Qualitative,
    Mixed,
    Theoretical,
}

impl std::str::FromStr for MethodologyCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "quantitative" => Ok(MethodologyCategory::Quantitative),
            "qualitative" => Ok(MethodologyCategory::Qualitative),
            "mixed" => Ok(MethodologyCategory::Mixed),
            "theoretical" => Ok(MethodologyCategory::Theoretical),
            other => Err(format!("unknown methodology category: {other}")),
        }
    }
}

/// A normalized academic paper result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    /// Upstream identifier, namespaced by source (e.g. `openalex:W2741809807`).
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub authors: Vec<Author>,
    #[serde(default, rename = "abstract")]
    pub abstract_text: String,
    /// ISO date, `YYYY-MM-DD` or bare `YYYY`.
    #[serde(default)]
    pub publication_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub venue: Option<String>,
    #[serde(default)]
    pub citation_count: u64,
    #[serde(default)]
    pub open_access: OpenAccessStatus,
    #[serde(default)]
    pub subfields: Vec<String>,
    #[serde(default)]
    pub academic_level: Option<AcademicLevel>,
    #[serde(default)]
    pub methodology: Option<String>,
    #[serde(default)]
    pub relevance_score: f64,
    /// Minutes, populated by enhancement.
    #[serde(default)]
    pub estimated_reading_time: Option<u32>,
    /// 0.0-1.0, populated by enhancement.
    #[serde(default)]
    pub freshness_score: Option<f64>,
}

impl PaperRecord {
    /// A bare record with only an id and title; everything else empty.
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            authors: Vec::new(),
            abstract_text: String::new(),
            publication_date: String::new(),
            doi: None,
            url: None,
            venue: None,
            citation_count: 0,
            open_access: OpenAccessStatus::Closed,
            subfields: Vec::new(),
            academic_level: None,
            methodology: None,
            relevance_score: 0.0,
            estimated_reading_time: None,
            freshness_score: None,
        }
    }

    /// Parse the publication date. A bare year maps to January 1st.
    pub fn published_on(&self) -> Option<NaiveDate> {
        let raw = self.publication_date.trim();
        if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            return Some(date);
        }
        // Timestamps such as 2021-03-04T00:00:00Z
        if let Some(prefix) = raw.get(..10)
            && let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d")
        {
            return Some(date);
        }
        raw.parse::<i32>()
            .ok()
            .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1))
    }

    /// Publication year, or 0 when the date is missing or malformed.
    pub fn publication_year(&self) -> i32 {
        self.published_on().map(|d| d.year()).unwrap_or(0)
    }
}

/// Inclusive publication-year range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YearRange {
    pub start: i32,
    pub end: i32,
}

impl YearRange {
    pub fn contains(&self, year: i32) -> bool {
        year >= self.start && year <= self.end
    }
}

/// Inclusive citation-count range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CitationRange {
    pub min: u64,
    pub max: u64,
}

impl Default for CitationRange {
    fn default() -> Self {
        Self {
            min: 0,
            max: u64::MAX,
        }
    }
}

impl CitationRange {
    pub fn contains(&self, count: u64) -> bool {
        count >= self.min && count <= self.max
    }
}

/// Ordering applied to the final result list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortBy {
    #[default]
    Relevance,
    Citations,
    Newest,
    Freshness,
}

impl std::str::FromStr for SortBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "relevance" => Ok(SortBy::Relevance),
            "citations" => Ok(SortBy::Citations),
            "newest" | "date" => Ok(SortBy::Newest),
            "freshness" => Ok(SortBy::Freshness),
            other => Err(format!("unknown sort order: {other}")),
        }
    }
}

/// User-selected constraints for a paper search.
///
/// Sets are ordered so that the serialized form is a stable cache key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchFilters {
    pub topics: Vec<String>,
    pub year_range: Option<YearRange>,
    pub academic_levels: BTreeSet<AcademicLevel>,
    pub open_access_only: bool,
    pub citation_range: CitationRange,
    pub methodologies: BTreeSet<MethodologyCategory>,
    pub subfields: BTreeSet<String>,
    /// Bias the query toward geography and apply the geography-relevance filter.
    pub geography_focus: bool,
    pub sort_by: SortBy,
}

impl Default for SearchFilters {
    fn default() -> Self {
        Self {
            topics: Vec::new(),
            year_range: None,
            academic_levels: BTreeSet::new(),
            open_access_only: false,
            citation_range: CitationRange::default(),
            methodologies: BTreeSet::new(),
            subfields: BTreeSet::new(),
            geography_focus: true,
            sort_by: SortBy::Relevance,
        }
    }
}

/// Query handed to an upstream paper source.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamQuery {
    pub query: String,
    pub open_access_only: bool,
    pub year_range: Option<YearRange>,
    pub limit: usize,
}

/// Non-fatal condition reported alongside (possibly empty) results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SearchIssue {
    /// The upstream provider failed or timed out.
    Upstream { message: String, retryable: bool },
    /// The search succeeded but nothing survived filtering.
    NoResults { message: String },
}

impl SearchIssue {
    pub fn message(&self) -> &str {
        match self {
            SearchIssue::Upstream { message, .. } | SearchIssue::NoResults { message } => message,
        }
    }
}

/// Result of one search: what the UI renders.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchOutcome {
    pub results: Vec<PaperRecord>,
    pub error: Option<SearchIssue>,
    #[serde(default)]
    pub from_cache: bool,
}
