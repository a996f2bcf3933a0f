//! Free-text query cleanup before it is sent upstream.

use super::keywords::ResearchKeywords;

/// Lowercase, drop stop-words and short tokens, and optionally add a
/// geography bias term when the query has none.
pub fn optimize_search_query(
    query: &str,
    enhance_with_geography: bool,
    keywords: &ResearchKeywords,
) -> String {
    let lowered = query.to_lowercase();
    let mut tokens: Vec<&str> = lowered
        .split_whitespace()
        .filter(|t| t.chars().count() > 2)
        .filter(|t| !keywords.stop_words.iter().any(|s| s == t))
        .collect();

    if enhance_with_geography && !tokens.is_empty() {
        let already_geographic = tokens.iter().any(|t| {
            keywords
                .geography_query_terms
                .iter()
                .any(|g| t.contains(g.as_str()))
        });
        if !already_geographic {
            tokens.push(keywords.geography_suffix.as_str());
        }
    }

    tokens.join(" ")
}
