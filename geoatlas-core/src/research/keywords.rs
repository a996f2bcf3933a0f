//! Keyword tables driving the research heuristics.
//!
//! These are data, not control flow: every list can be replaced from the
//! `[research.keywords]` section of the config file without touching the
//! pipeline stages that consume them.

use serde::{Deserialize, Serialize};

use crate::types::MethodologyCategory;

/// Label used when no methodology rule matches.
pub const DEFAULT_METHODOLOGY: &str = "Research analysis";

/// One entry of the ordered methodology detection table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodologyRule {
    pub label: String,
    pub keywords: Vec<String>,
}

/// Keyword lists backing each user-facing methodology category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodologyCategoryKeywords {
    pub quantitative: Vec<String>,
    pub qualitative: Vec<String>,
    pub mixed: Vec<String>,
    pub theoretical: Vec<String>,
}

impl MethodologyCategoryKeywords {
    pub fn for_category(&self, category: MethodologyCategory) -> &[String] {
        match category {
            MethodologyCategory::Quantitative => &self.quantitative,
            MethodologyCategory::Qualitative => &self.qualitative,
            MethodologyCategory::Mixed => &self.mixed,
            MethodologyCategory::Theoretical => &self.theoretical,
        }
    }
}

/// All keyword tables used by enhancement, relevance filtering and query
/// optimization. Entries are matched as lowercase substrings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResearchKeywords {
    pub advanced_level: Vec<String>,
    pub graduate_level: Vec<String>,
    pub geography: Vec<String>,
    pub academic_markers: Vec<String>,
    pub stop_words: Vec<String>,
    /// Terms that mark a query as already geography-focused.
    pub geography_query_terms: Vec<String>,
    /// Token appended to queries that need a geography bias.
    pub geography_suffix: String,
    /// Checked in order; the first rule with any hit wins.
    pub methodology_rules: Vec<MethodologyRule>,
    pub methodology_categories: MethodologyCategoryKeywords,
}

fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn rule(label: &str, keywords: &[&str]) -> MethodologyRule {
    MethodologyRule {
        label: label.to_string(),
        keywords: words(keywords),
    }
}

impl Default for ResearchKeywords {
    fn default() -> Self {
        Self {
            advanced_level: words(&[
                "theoretical framework",
                "meta-analysis",
                "systematic review",
                "longitudinal study",
                "multivariate analysis",
                "epistemological",
                "ontological",
            ]),
            graduate_level: words(&[
                "methodology",
                "empirical",
                "hypothesis",
                "statistical significance",
                "correlation",
                "regression",
                "sample size",
            ]),
            methodology_rules: vec![
                rule(
                    "Mixed methods",
                    &[
                        "mixed method",
                        "mixed-method",
                        "qualitative and quantitative",
                        "quantitative and qualitative",
                    ],
                ),
                rule("Survey research", &["survey", "questionnaire"]),
                rule(
                    "Qualitative interviews",
                    &["interview", "ethnograph", "focus group", "participant observation"],
                ),
                rule(
                    "GIS and spatial analysis",
                    &[
                        "gis",
                        "spatial analysis",
                        "remote sensing",
                        "geographic information system",
                        "geospatial",
                    ],
                ),
                rule(
                    "Statistical analysis",
                    &["regression", "statistical", "correlation", "quantitative"],
                ),
                rule("Case study", &["case study", "case studies"]),
                rule(
                    "Literature review",
                    &["literature review", "systematic review", "meta-analysis", "review"],
                ),
                rule("Experimental", &["experiment", "randomized", "trial"]),
            ],
            methodology_categories: MethodologyCategoryKeywords {
                quantitative: words(&[
                    "statistical",
                    "regression",
                    "survey",
                    "gis",
                    "spatial analysis",
                    "quantitative",
                ]),
                qualitative: words(&[
                    "interview",
                    "ethnograph",
                    "case study",
                    "qualitative",
                ]),
                mixed: words(&["mixed methods"]),
                theoretical: words(&["theoretical", "review", "meta-analysis"]),
            },
            geography: words(&[
                // discipline
                "geography",
                "geographic",
                "geographical",
                "spatial",
                "territory",
                "territorial",
                "region",
                "place",
                "landscape",
                "map",
                "cartograph",
                // settlement
                "urban",
                "rural",
                "city",
                "cities",
                "settlement",
                "suburb",
                "metropolitan",
                "housing",
                "neighborhood",
                "neighbourhood",
                "gentrification",
                "infrastructure",
                // demographic
                "population",
                "demograph",
                "migration",
                "migrant",
                "immigra",
                "refugee",
                "diaspora",
                "fertility",
                "mortality",
                "census",
                "ethnic",
                "indigenous",
                // environmental
                "climate",
                "environment",
                "ecolog",
                "sustainab",
                "land use",
                "deforestation",
                "biodiversity",
                "water",
                "agricultur",
                "food security",
                "natural hazard",
                "disaster",
                // economic
                "economic",
                "development",
                "globalization",
                "globalisation",
                "trade",
                "industr",
                "tourism",
                "labor",
                "labour",
                "inequality",
                "poverty",
                // political
                "political",
                "border",
                "boundar",
                "geopolitic",
                "sovereign",
                "nation",
                "state",
                "governance",
                "conflict",
                "colonial",
                // physical features
                "river",
                "mountain",
                "coast",
                "ocean",
                "island",
                "desert",
                "forest",
                "watershed",
                "terrain",
                "topograph",
                // methods
                "gis",
                "remote sensing",
                "satellite",
                "cartography",
                "fieldwork",
                "survey",
                // scale
                "local",
                "regional",
                "national",
                "global",
                "international",
                "transnational",
                "community",
                "country",
                "countries",
                "continent",
            ]),
            academic_markers: words(&[
                "university",
                "journal",
                "conference",
                "proceedings",
                "thesis",
                "dissertation",
                "institute",
                "department",
                "faculty",
                "academic",
            ]),
            stop_words: words(&[
                "the", "a", "an", "and", "or", "but", "in", "on", "at", "to", "for", "of", "with",
                "by",
            ]),
            geography_query_terms: words(&[
                "geography",
                "geographic",
                "spatial",
                "urban",
                "rural",
                "climate",
                "population",
            ]),
            geography_suffix: "geography".to_string(),
        }
    }
}

/// Count how many keywords occur in `haystack` (already lowercased).
pub(crate) fn count_matches(haystack: &str, keywords: &[String]) -> usize {
    keywords
        .iter()
        .filter(|k| haystack.contains(k.as_str()))
        .count()
}

/// Whether any keyword occurs in `haystack` (already lowercased).
pub(crate) fn any_match(haystack: &str, keywords: &[String]) -> bool {
    keywords.iter().any(|k| haystack.contains(k.as_str()))
}
