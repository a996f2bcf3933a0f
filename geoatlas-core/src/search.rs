//! Paper search service: query optimization, caching, upstream fetch and the
//! research pipeline behind a single `search(query, filters)` call.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::{Clock, TtlCache, cache_key};
use crate::config::ResearchConfig;
use crate::error::{ConfigError, FetchError, SearchError};
use crate::research::{PipelineSettings, optimize_search_query, run_pipeline};
use crate::types::{PaperRecord, SearchFilters, SearchIssue, SearchOutcome, UpstreamQuery};

const UPSTREAM_FAILURE_MESSAGE: &str =
    "Unable to reach the research database right now. Please try again.";
const NO_RESULTS_MESSAGE: &str =
    "No papers matched this search. Try different terms or loosen the filters.";
const EMPTY_QUERY_MESSAGE: &str = "Enter a search term to find papers.";

/// An upstream literature-search provider.
#[async_trait]
pub trait PaperSource: Send + Sync {
    /// Short name used in logs and record ids.
    fn name(&self) -> &str;

    /// Run one search. Implementations should stop early when `cancel` fires.
    async fn search_papers(
        &self,
        query: &UpstreamQuery,
        cancel: &CancellationToken,
    ) -> Result<Vec<PaperRecord>, FetchError>;
}

/// Search service shared by every consumer.
pub struct PaperSearchService {
    source: Arc<dyn PaperSource>,
    clock: Arc<dyn Clock>,
    cache: Mutex<TtlCache<Vec<PaperRecord>>>,
    settings: PipelineSettings,
    result_limit: usize,
}

impl PaperSearchService {
    pub fn new(
        source: Arc<dyn PaperSource>,
        clock: Arc<dyn Clock>,
        config: &ResearchConfig,
    ) -> Result<Self, ConfigError> {
        Ok(Self {
            source,
            clock,
            cache: Mutex::new(TtlCache::new(
                config.cache_ttl()?,
                Some(config.cache_max_entries),
            )),
            settings: config.pipeline_settings(),
            result_limit: config.result_limit,
        })
    }

    pub fn source_name(&self) -> &str {
        self.source.name()
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Number of cached searches, expired or not.
    pub fn cached_searches(&self) -> usize {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn clear_cache(&self) {
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Search for papers.
    ///
    /// Upstream failures and empty results are reported inside the outcome;
    /// only cancellation is returned as an error.
    pub async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
        cancel: &CancellationToken,
    ) -> Result<SearchOutcome, SearchError> {
        let full_query = if filters.topics.is_empty() {
            query.to_string()
        } else {
            format!("{} {}", query, filters.topics.join(" "))
        };
        let optimized = optimize_search_query(
            &full_query,
            filters.geography_focus,
            &self.settings.keywords,
        );
        if optimized.is_empty() {
            return Ok(SearchOutcome {
                results: Vec::new(),
                error: Some(SearchIssue::NoResults {
                    message: EMPTY_QUERY_MESSAGE.to_string(),
                }),
                from_cache: false,
            });
        }

        let key = cache_key(&optimized, filters);
        let cached = self
            .cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&key, self.clock.now());
        if let Some(results) = cached {
            debug!(query = %optimized, count = results.len(), "Serving search from cache");
            return Ok(outcome(results, true));
        }

        let upstream = UpstreamQuery {
            query: optimized.clone(),
            open_access_only: filters.open_access_only,
            year_range: filters.year_range,
            limit: self.result_limit,
        };

        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = self.source.search_papers(&upstream, cancel) => result,
        };

        let raw = match fetched {
            Ok(raw) => raw,
            Err(FetchError::Cancelled) => {
                debug!(query = %optimized, "Search superseded before completion");
                return Err(SearchError::Cancelled);
            }
            Err(e) => {
                warn!(
                    source = self.source.name(),
                    query = %optimized,
                    error = %e,
                    "Paper search failed upstream"
                );
                return Ok(SearchOutcome {
                    results: Vec::new(),
                    error: Some(SearchIssue::Upstream {
                        message: UPSTREAM_FAILURE_MESSAGE.to_string(),
                        retryable: e.is_retryable(),
                    }),
                    from_cache: false,
                });
            }
        };

        // A response that lands after cancellation is discarded.
        if cancel.is_cancelled() {
            return Err(SearchError::Cancelled);
        }

        let now = self.clock.now();
        let results = run_pipeline(&raw, filters, &self.settings, now);
        info!(
            source = self.source.name(),
            query = %optimized,
            fetched = raw.len(),
            returned = results.len(),
            "Paper search completed"
        );

        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .set(key, results.clone(), now);

        Ok(outcome(results, false))
    }
}

fn outcome(results: Vec<PaperRecord>, from_cache: bool) -> SearchOutcome {
    let error = results.is_empty().then(|| SearchIssue::NoResults {
        message: NO_RESULTS_MESSAGE.to_string(),
    });
    SearchOutcome {
        results,
        error,
        from_cache,
    }
}

/// One consuming view of the search service.
///
/// Keeps at most one upstream request in flight: starting a new search
/// cancels the previous one, which then resolves to
/// [`SearchError::Cancelled`].
pub struct SearchView {
    service: Arc<PaperSearchService>,
    in_flight: Mutex<InFlight>,
}

#[derive(Default)]
struct InFlight {
    generation: u64,
    token: Option<CancellationToken>,
}

impl SearchView {
    pub fn new(service: Arc<PaperSearchService>) -> Self {
        Self {
            service,
            in_flight: Mutex::new(InFlight::default()),
        }
    }

    pub async fn search(
        &self,
        query: &str,
        filters: &SearchFilters,
    ) -> Result<SearchOutcome, SearchError> {
        let token = CancellationToken::new();
        let generation = {
            let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(previous) = in_flight.token.replace(token.clone()) {
                previous.cancel();
            }
            in_flight.generation += 1;
            in_flight.generation
        };

        let result = self.service.search(query, filters, &token).await;

        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if in_flight.generation == generation {
            in_flight.token = None;
        }
        result
    }

    /// Whether a search started by this view is still running.
    pub fn is_searching(&self) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .token
            .is_some()
    }

    /// Cancel whatever search is currently running, e.g. when the view closes.
    pub fn cancel(&self) {
        if let Some(token) = self
            .in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .token
            .take()
        {
            token.cancel();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::ManualClock;
    use crate::types::OpenAccessStatus;
    use chrono::{Duration, TimeZone, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};

    enum Behavior {
        Papers(Vec<PaperRecord>),
        Fail(FetchError),
        /// Block until the caller cancels.
        Hang,
    }

    struct StubSource {
        behavior: Behavior,
        calls: AtomicUsize,
    }

    impl StubSource {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl PaperSource for StubSource {
        fn name(&self) -> &str {
            "stub"
        }

        async fn search_papers(
            &self,
            _query: &UpstreamQuery,
            cancel: &CancellationToken,
        ) -> Result<Vec<PaperRecord>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                Behavior::Papers(papers) => Ok(papers.clone()),
                Behavior::Fail(err) => Err(err.clone()),
                Behavior::Hang => {
                    cancel.cancelled().await;
                    Err(FetchError::Cancelled)
                }
            }
        }
    }

    fn geography_paper(id: &str, title: &str) -> PaperRecord {
        let mut p = PaperRecord::new(id, title);
        p.abstract_text = format!("{title}: migration patterns across urban regions.");
        p.publication_date = "2023-05-01".into();
        p.open_access = OpenAccessStatus::Green;
        p.relevance_score = 1.0;
        p
    }

    fn service(source: Arc<StubSource>) -> (Arc<PaperSearchService>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap(),
        ));
        let svc = PaperSearchService::new(source, clock.clone(), &ResearchConfig::default()).unwrap();
        (Arc::new(svc), clock)
    }

    #[test]
    fn test_new_rejects_unrepresentable_cache_ttl() {
        let config = ResearchConfig {
            cache_ttl_secs: 100_000_000_000_000_000,
            ..ResearchConfig::default()
        };
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let result = PaperSearchService::new(StubSource::new(Behavior::Papers(vec![])), clock, &config);
        assert!(matches!(result, Err(ConfigError::Invalid { .. })));
    }

    #[tokio::test]
    async fn test_search_returns_pipeline_output() {
        let source = StubSource::new(Behavior::Papers(vec![
            geography_paper("a", "Housing and migration in Lagos"),
            geography_paper("b", "Coastal towns after tourism"),
        ]));
        let (svc, _) = service(source.clone());

        let out = svc
            .search("urban migration", &SearchFilters::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(out.results.len(), 2);
        assert!(out.error.is_none());
        assert!(!out.from_cache);
        assert!(out.results.iter().all(|p| p.freshness_score.is_some()));
        assert_eq!(source.calls(), 1);
    }

    #[tokio::test]
    async fn test_search_cache_hit_within_ttl() {
        let source = StubSource::new(Behavior::Papers(vec![geography_paper(
            "a",
            "Housing and migration in Lagos",
        )]));
        let (svc, clock) = service(source.clone());
        let filters = SearchFilters::default();
        let cancel = CancellationToken::new();

        svc.search("urban migration", &filters, &cancel).await.unwrap();
        clock.advance(Duration::minutes(4));
        let second = svc.search("urban migration", &filters, &cancel).await.unwrap();

        assert!(second.from_cache);
        assert_eq!(second.results.len(), 1);
        assert_eq!(source.calls(), 1);
        assert_eq!(svc.cached_searches(), 1);
    }

    #[tokio::test]
    async fn test_search_refetches_after_ttl() {
        let source = StubSource::new(Behavior::Papers(vec![geography_paper(
            "a",
            "Housing and migration in Lagos",
        )]));
        let (svc, clock) = service(source.clone());
        let filters = SearchFilters::default();
        let cancel = CancellationToken::new();

        svc.search("urban migration", &filters, &cancel).await.unwrap();
        clock.advance(Duration::minutes(5) + Duration::seconds(1));
        let again = svc.search("urban migration", &filters, &cancel).await.unwrap();

        assert!(!again.from_cache);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_search_cache_keyed_by_filters() {
        let source = StubSource::new(Behavior::Papers(vec![geography_paper(
            "a",
            "Housing and migration in Lagos",
        )]));
        let (svc, _) = service(source.clone());
        let cancel = CancellationToken::new();

        let mut open_only = SearchFilters::default();
        open_only.open_access_only = true;
        svc.search("urban migration", &SearchFilters::default(), &cancel)
            .await
            .unwrap();
        svc.search("urban migration", &open_only, &cancel).await.unwrap();
        assert_eq!(source.calls(), 2);

        // Same optimized query from differently cased input hits the cache.
        let hit = svc
            .search("Urban Migration", &SearchFilters::default(), &cancel)
            .await
            .unwrap();
        assert!(hit.from_cache);
        assert_eq!(source.calls(), 2);
    }

    #[tokio::test]
    async fn test_upstream_failure_yields_retryable_issue() {
        let source = StubSource::new(Behavior::Fail(FetchError::Status {
            url: "http://upstream/works".into(),
            status: 503,
        }));
        let (svc, _) = service(source);

        let out = svc
            .search("urban migration", &SearchFilters::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(out.results.is_empty());
        match out.error {
            Some(SearchIssue::Upstream { retryable, .. }) => assert!(retryable),
            other => panic!("expected upstream issue, got {other:?}"),
        }
        // Failures are not cached.
        assert_eq!(svc.cached_searches(), 0);
    }

    #[tokio::test]
    async fn test_non_retryable_upstream_failure() {
        let source = StubSource::new(Behavior::Fail(FetchError::Decode {
            url: "http://upstream/works".into(),
            message: "bad json".into(),
        }));
        let (svc, _) = service(source);
        let out = svc
            .search("urban migration", &SearchFilters::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(
            out.error,
            Some(SearchIssue::Upstream { retryable: false, .. })
        ));
    }

    #[tokio::test]
    async fn test_empty_results_are_distinct_from_failure() {
        let source = StubSource::new(Behavior::Papers(Vec::new()));
        let (svc, _) = service(source);
        let out = svc
            .search("urban migration", &SearchFilters::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(out.results.is_empty());
        assert!(matches!(out.error, Some(SearchIssue::NoResults { .. })));
    }

    #[tokio::test]
    async fn test_blank_query_skips_upstream() {
        let source = StubSource::new(Behavior::Papers(vec![geography_paper("a", "Anything")]));
        let (svc, _) = service(source.clone());
        let out = svc
            .search("  the of a ", &SearchFilters::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert!(matches!(out.error, Some(SearchIssue::NoResults { .. })));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_search_returns_error() {
        let source = StubSource::new(Behavior::Hang);
        let (svc, _) = service(source);
        let cancel = CancellationToken::new();
        let handle = {
            let svc = svc.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                svc.search("urban migration", &SearchFilters::default(), &cancel)
                    .await
            })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        cancel.cancel();
        let result = handle.await.unwrap();
        assert_eq!(result.unwrap_err(), SearchError::Cancelled);
    }

    #[tokio::test]
    async fn test_search_view_supersedes_previous_search() {
        let hanging = StubSource::new(Behavior::Hang);
        let (svc, _) = service(hanging);
        let view = Arc::new(SearchView::new(svc));

        let first = {
            let view = view.clone();
            tokio::spawn(async move { view.search("urban migration", &SearchFilters::default()).await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        assert!(view.is_searching());

        let second = {
            let view = view.clone();
            tokio::spawn(async move { view.search("rural housing", &SearchFilters::default()).await })
        };

        let first = tokio::time::timeout(std::time::Duration::from_secs(2), first)
            .await
            .expect("superseded search must resolve")
            .unwrap();
        assert_eq!(first.unwrap_err(), SearchError::Cancelled);

        // The newer search is still the one in flight.
        assert!(view.is_searching());
        view.cancel();
        let second = second.await.unwrap();
        assert_eq!(second.unwrap_err(), SearchError::Cancelled);
        assert!(!view.is_searching());
    }

    #[tokio::test]
    async fn test_search_view_completes_and_clears() {
        let source = StubSource::new(Behavior::Papers(vec![geography_paper(
            "a",
            "Housing and migration in Lagos",
        )]));
        let (svc, _) = service(source);
        let view = SearchView::new(svc);
        let out = view
            .search("urban migration", &SearchFilters::default())
            .await
            .unwrap();
        assert_eq!(out.results.len(), 1);
        assert!(!view.is_searching());
    }
}
