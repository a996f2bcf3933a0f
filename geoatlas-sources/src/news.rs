//! Geography news from the GNews search API.

use std::collections::HashSet;
use std::sync::Arc;

use geoatlas_core::research::{DEFAULT_TITLE_SIMILARITY_THRESHOLD, titles_match};
use geoatlas_core::{ConfigError, GeoAtlasError, HttpFetcher, SourcesConfig};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Query used when the caller does not supply one.
pub const DEFAULT_NEWS_QUERY: &str = "human geography";

/// A news article as shown in the map's news panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub description: Option<String>,
    pub url: String,
    pub image: Option<String>,
    pub published_at: Option<String>,
    pub source_name: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawResponse {
    articles: Vec<RawArticle>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct RawArticle {
    title: String,
    description: Option<String>,
    url: String,
    image: Option<String>,
    published_at: Option<String>,
    source: Option<RawSource>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawSource {
    name: Option<String>,
}

impl From<RawArticle> for NewsArticle {
    fn from(raw: RawArticle) -> Self {
        Self {
            title: raw.title.trim().to_string(),
            description: raw.description.filter(|d| !d.trim().is_empty()),
            url: raw.url,
            image: raw.image,
            published_at: raw.published_at,
            source_name: raw.source.and_then(|s| s.name),
        }
    }
}

/// Drop repeated URLs and near-identical headlines, keeping the first.
pub fn dedupe_articles(articles: Vec<NewsArticle>) -> Vec<NewsArticle> {
    let mut seen_urls: HashSet<String> = HashSet::new();
    let mut kept: Vec<NewsArticle> = Vec::with_capacity(articles.len());
    for article in articles {
        if article.url.is_empty() || !seen_urls.insert(article.url.clone()) {
            continue;
        }
        let similar = kept.iter().any(|existing| {
            titles_match(&existing.title, &article.title, DEFAULT_TITLE_SIMILARITY_THRESHOLD)
        });
        if !similar {
            kept.push(article);
        }
    }
    kept
}

/// Client for the GNews `/search` endpoint.
pub struct NewsClient {
    http: Arc<HttpFetcher>,
    base_url: String,
    api_key: Option<String>,
    language: String,
    max_articles: usize,
}

impl NewsClient {
    pub fn new(http: Arc<HttpFetcher>, config: &SourcesConfig) -> Self {
        Self {
            http,
            base_url: config.news_base_url.trim_end_matches('/').to_string(),
            api_key: config
                .news_api_key
                .clone()
                .filter(|k| !k.trim().is_empty()),
            language: config.news_language.clone(),
            max_articles: config.news_max_articles,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.api_key.is_some()
    }

    /// Search recent articles. A blank query falls back to [`DEFAULT_NEWS_QUERY`].
    pub async fn search(
        &self,
        query: Option<&str>,
        cancel: &CancellationToken,
    ) -> Result<Vec<NewsArticle>, GeoAtlasError> {
        let api_key = self.api_key.as_ref().ok_or_else(|| ConfigError::MissingField {
            field: "sources.news_api_key".to_string(),
        })?;
        let q = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .unwrap_or(DEFAULT_NEWS_QUERY);

        let url = format!("{}/search", self.base_url);
        let params = [
            ("q", q.to_string()),
            ("lang", self.language.clone()),
            ("max", self.max_articles.to_string()),
            ("apikey", api_key.clone()),
        ];
        let raw: RawResponse = self.http.get_json(&url, &params, cancel).await?;
        let fetched = raw.articles.len();
        let articles = dedupe_articles(raw.articles.into_iter().map(NewsArticle::from).collect());
        debug!(query = q, fetched, kept = articles.len(), "Fetched news articles");
        Ok(articles)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fetcher, serve};
    use axum::{Json, Router, extract::Query, routing::get};
    use std::collections::HashMap;

    fn article(title: &str, url: &str) -> NewsArticle {
        NewsArticle {
            title: title.into(),
            description: None,
            url: url.into(),
            image: None,
            published_at: None,
            source_name: None,
        }
    }

    fn config(base_url: &str, key: Option<&str>) -> SourcesConfig {
        SourcesConfig {
            news_base_url: base_url.into(),
            news_api_key: key.map(str::to_string),
            ..SourcesConfig::default()
        }
    }

    #[test]
    fn test_dedupe_by_url_and_title() {
        let out = dedupe_articles(vec![
            article("Floods displace thousands in Pakistan", "https://a/1"),
            article("Floods displace thousands in Pakistan", "https://b/2"),
            article("Something else entirely", "https://a/1"),
            article("Drought hits the Horn of Africa", "https://c/3"),
            article("No link", ""),
        ]);
        let urls: Vec<&str> = out.iter().map(|a| a.url.as_str()).collect();
        assert_eq!(urls, vec!["https://a/1", "https://c/3"]);
    }

    #[tokio::test]
    async fn test_missing_api_key_is_config_error() {
        let client = NewsClient::new(fetcher(), &config("http://127.0.0.1:9", Some("  ")));
        assert!(!client.is_configured());
        let err = client
            .search(None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            GeoAtlasError::Config(ConfigError::MissingField { ref field }) if field == "sources.news_api_key"
        ));
    }

    #[tokio::test]
    async fn test_search_sends_params_and_maps_articles() {
        let app = Router::new().route(
            "/search",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                assert_eq!(params.get("apikey").map(String::as_str), Some("secret"));
                assert_eq!(params.get("lang").map(String::as_str), Some("en"));
                Json(serde_json::json!({
                    "totalArticles": 2,
                    "articles": [
                        {"title": params.get("q").cloned().unwrap_or_default(),
                         "description": "", "url": "https://news/1",
                         "publishedAt": "2024-05-01T10:00:00Z",
                         "source": {"name": "Wire", "url": "https://news"}},
                        {"title": "Second", "url": "https://news/2"}
                    ]
                }))
            }),
        );
        let base = serve(app).await;
        let client = NewsClient::new(fetcher(), &config(&base, Some("secret")));
        let articles = client
            .search(Some("  "), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, DEFAULT_NEWS_QUERY);
        assert_eq!(articles[0].description, None);
        assert_eq!(articles[0].source_name.as_deref(), Some("Wire"));
        assert_eq!(articles[1].published_at, None);
    }
}
