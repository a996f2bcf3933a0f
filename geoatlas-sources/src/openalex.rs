//! OpenAlex works search, mapped into [`PaperRecord`]s.
//!
//! Responses are read through `serde_json::Value` rather than typed structs:
//! OpenAlex omits or nulls fields freely, and a malformed record should fall
//! back to defaults instead of failing the whole page.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use geoatlas_core::{
    Author, FetchError, HttpFetcher, OpenAccessStatus, PaperRecord, PaperSource, UpstreamQuery,
};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// OpenAlex caps `per-page` at 200.
const MAX_PER_PAGE: usize = 200;

/// Paper source backed by the OpenAlex `/works` endpoint.
pub struct OpenAlexClient {
    http: Arc<HttpFetcher>,
    base_url: String,
    mailto: Option<String>,
}

impl OpenAlexClient {
    pub fn new(http: Arc<HttpFetcher>, base_url: &str, mailto: Option<String>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            mailto,
        }
    }

    fn works_params(&self, query: &UpstreamQuery) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("search", query.query.clone()),
            ("per-page", query.limit.clamp(1, MAX_PER_PAGE).to_string()),
        ];

        let mut filters = Vec::new();
        if query.open_access_only {
            filters.push("open_access.is_oa:true".to_string());
        }
        if let Some(range) = query.year_range {
            filters.push(format!("publication_year:{}-{}", range.start, range.end));
        }
        if !filters.is_empty() {
            params.push(("filter", filters.join(",")));
        }

        if let Some(ref mailto) = self.mailto {
            params.push(("mailto", mailto.clone()));
        }
        params
    }
}

#[async_trait]
impl PaperSource for OpenAlexClient {
    fn name(&self) -> &str {
        "openalex"
    }

    async fn search_papers(
        &self,
        query: &UpstreamQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<PaperRecord>, FetchError> {
        let url = format!("{}/works", self.base_url);
        let body: Value = self
            .http
            .get_json(&url, &self.works_params(query), cancel)
            .await?;
        let papers = parse_works(&body);
        debug!(query = %query.query, count = papers.len(), "Parsed OpenAlex works");
        Ok(papers)
    }
}

/// Map a `/works` response page into paper records.
pub fn parse_works(body: &Value) -> Vec<PaperRecord> {
    body.get("results")
        .and_then(|v| v.as_array())
        .map(|works| works.iter().enumerate().map(|(i, w)| parse_work(w, i)).collect())
        .unwrap_or_default()
}

fn str_at<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(|v| v.as_str())
}

fn parse_work(work: &Value, index: usize) -> PaperRecord {
    let id = str_at(work, "id")
        .map(|raw| raw.rsplit('/').next().unwrap_or(raw).to_string())
        .unwrap_or_else(|| format!("unknown-{index}"));

    let title = str_at(work, "display_name")
        .or_else(|| str_at(work, "title"))
        .unwrap_or_default();

    let mut paper = PaperRecord::new(format!("openalex:{id}"), title.trim());
    paper.authors = parse_authors(work);
    paper.abstract_text = work
        .get("abstract_inverted_index")
        .map(reconstruct_abstract)
        .unwrap_or_default();
    paper.publication_date = str_at(work, "publication_date")
        .map(str::to_string)
        .or_else(|| {
            work.get("publication_year")
                .and_then(|v| v.as_i64())
                .map(|y| y.to_string())
        })
        .unwrap_or_default();
    paper.doi = str_at(work, "doi").map(normalize_doi).filter(|d| !d.is_empty());

    let location = work.get("primary_location");
    paper.url = location
        .and_then(|l| str_at(l, "landing_page_url"))
        .map(str::to_string)
        .or_else(|| paper.doi.as_ref().map(|d| format!("https://doi.org/{d}")));
    paper.venue = location
        .and_then(|l| l.get("source"))
        .and_then(|s| str_at(s, "display_name"))
        .map(str::to_string);

    paper.citation_count = work
        .get("cited_by_count")
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    paper.open_access = work
        .get("open_access")
        .and_then(|oa| str_at(oa, "oa_status"))
        .map(oa_status)
        .unwrap_or_default();
    paper.subfields = parse_subfields(work);
    paper.relevance_score = work
        .get("relevance_score")
        .and_then(|v| v.as_f64())
        .unwrap_or(0.0);
    paper
}

fn parse_authors(work: &Value) -> Vec<Author> {
    work.get("authorships")
        .and_then(|v| v.as_array())
        .map(|list| {
            list.iter()
                .filter_map(|a| {
                    let name = a.get("author").and_then(|au| str_at(au, "display_name"))?;
                    let affiliation = a
                        .get("institutions")
                        .and_then(|v| v.as_array())
                        .and_then(|inst| inst.first())
                        .and_then(|i| str_at(i, "display_name"))
                        .map(str::to_string);
                    Some(Author {
                        name: name.to_string(),
                        affiliation,
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Subfield and topic names, then legacy concepts, without duplicates.
fn parse_subfields(work: &Value) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    let mut push = |name: Option<&str>| {
        if let Some(name) = name
            && !name.is_empty()
            && !out.iter().any(|existing| existing == name)
        {
            out.push(name.to_string());
        }
    };

    if let Some(topics) = work.get("topics").and_then(|v| v.as_array()) {
        for topic in topics {
            push(topic.get("subfield").and_then(|s| str_at(s, "display_name")));
            push(str_at(topic, "display_name"));
        }
    }
    if let Some(concepts) = work.get("concepts").and_then(|v| v.as_array()) {
        for concept in concepts {
            push(str_at(concept, "display_name"));
        }
    }
    out
}

/// Rebuild abstract text from OpenAlex's `{word: [positions]}` index.
pub fn reconstruct_abstract(index: &Value) -> String {
    let Some(map) = index.as_object() else {
        return String::new();
    };
    let mut positioned: BTreeMap<u64, &str> = BTreeMap::new();
    for (word, positions) in map {
        if let Some(positions) = positions.as_array() {
            for pos in positions.iter().filter_map(|p| p.as_u64()) {
                positioned.insert(pos, word.as_str());
            }
        }
    }
    positioned.into_values().collect::<Vec<_>>().join(" ")
}

/// Strip resolver prefixes and lowercase, so DOIs compare exactly.
pub fn normalize_doi(raw: &str) -> String {
    let trimmed = raw.trim();
    let lower = trimmed.to_lowercase();
    ["https://doi.org/", "http://doi.org/", "https://dx.doi.org/", "doi:"]
        .iter()
        .find_map(|prefix| lower.strip_prefix(prefix))
        .unwrap_or(lower.as_str())
        .to_string()
}

fn oa_status(raw: &str) -> OpenAccessStatus {
    match raw.to_lowercase().as_str() {
        "gold" | "diamond" | "hybrid" => OpenAccessStatus::Gold,
        "green" => OpenAccessStatus::Green,
        "bronze" => OpenAccessStatus::Bronze,
        _ => OpenAccessStatus::Closed,
    }
}
