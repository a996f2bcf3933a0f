//! HTTP gateway for the map UI, built on axum.
//!
//! Each request gets its own cancellation token; axum drops the handler
//! future when the client disconnects, which abandons the upstream call.
//! Search requests that carry a `session` id share a [`SearchView`], so a
//! newer search from the same session cancels the older one.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use geoatlas_core::cache::SystemClock;
use geoatlas_core::{
    ConfigError, FetchError, GeoAtlasConfig, GeoAtlasError, PaperSearchService, SearchError,
    SearchFilters, SearchView,
};
use geoatlas_sources::{MapLayer, Sources};
use serde::Deserialize;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Upper bound on remembered search sessions.
const MAX_SEARCH_SESSIONS: usize = 1024;

/// Shared state behind every handler.
pub struct AppState {
    pub search: Arc<PaperSearchService>,
    pub sources: Arc<Sources>,
    views: Mutex<HashMap<String, Arc<SearchView>>>,
    max_sessions: usize,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn new(search: Arc<PaperSearchService>, sources: Arc<Sources>) -> Self {
        Self {
            search,
            sources,
            views: Mutex::new(HashMap::new()),
            max_sessions: MAX_SEARCH_SESSIONS,
        }
    }

    /// Wire the OpenAlex-backed search service and every upstream client.
    pub fn from_config(config: &GeoAtlasConfig) -> anyhow::Result<Self> {
        let sources = Sources::from_config(config)?;
        let search = PaperSearchService::new(
            sources.papers.clone(),
            Arc::new(SystemClock),
            &config.research,
        )?;
        Ok(Self::new(Arc::new(search), Arc::new(sources)))
    }

    fn view_for(&self, session: &str) -> Arc<SearchView> {
        let mut views = self.views.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(view) = views.get(session) {
            return view.clone();
        }
        if views.len() >= self.max_sessions {
            views.retain(|_, view| view.is_searching());
        }
        // Every remembered session is busy. Forget one; its running search
        // still completes, it just can no longer be superseded.
        while views.len() >= self.max_sessions.max(1) {
            let Some(evicted) = views.keys().next().cloned() else {
                break;
            };
            debug!(session = %evicted, "Evicting busy search session");
            views.remove(&evicted);
        }
        let view = Arc::new(SearchView::new(self.search.clone()));
        views.insert(session.to_string(), view.clone());
        view
    }
}

/// Error body returned by every endpoint: `{"error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(serde_json::json!({ "error": self.message })),
        )
            .into_response()
    }
}

impl From<FetchError> for ApiError {
    fn from(err: FetchError) -> Self {
        warn!(error = %err, "Upstream request failed");
        ApiError::new(StatusCode::BAD_GATEWAY, err.to_string())
    }
}

impl From<GeoAtlasError> for ApiError {
    fn from(err: GeoAtlasError) -> Self {
        match err {
            GeoAtlasError::Fetch(e) => e.into(),
            GeoAtlasError::Config(ConfigError::MissingField { field }) => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                format!("Not configured: set {field}"),
            ),
            other => ApiError::new(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
        }
    }
}

/// Build the gateway router.
pub fn router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/research/search", post(search_handler))
        .route("/api/countries", get(countries_handler))
        .route("/api/countries/{code}", get(country_handler))
        .route("/api/countries/{code}/education", get(education_handler))
        .route("/api/layers/{layer}", get(layer_handler))
        .route("/api/news", get(news_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health_handler(State(state): State<SharedState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "paper_source": state.search.source_name(),
        "cached_searches": state.search.cached_searches(),
        "news_configured": state.sources.news.is_configured(),
    }))
}

#[derive(Debug, Deserialize)]
struct SearchRequest {
    query: String,
    #[serde(default)]
    filters: SearchFilters,
    /// Requests with the same session supersede each other.
    #[serde(default)]
    session: Option<String>,
}

async fn search_handler(
    State(state): State<SharedState>,
    Json(request): Json<SearchRequest>,
) -> Result<Response, ApiError> {
    let result = match request.session.as_deref().filter(|s| !s.is_empty()) {
        Some(session) => {
            state
                .view_for(session)
                .search(&request.query, &request.filters)
                .await
        }
        None => {
            state
                .search
                .search(&request.query, &request.filters, &CancellationToken::new())
                .await
        }
    };

    match result {
        Ok(outcome) => Ok(Json(outcome).into_response()),
        Err(SearchError::Cancelled) => Err(ApiError::new(
            StatusCode::CONFLICT,
            SearchError::Cancelled.to_string(),
        )),
    }
}

#[derive(Debug, Default, Deserialize)]
struct CountriesQuery {
    region: Option<String>,
    name: Option<String>,
}

async fn countries_handler(
    State(state): State<SharedState>,
    Query(query): Query<CountriesQuery>,
) -> Result<Response, ApiError> {
    let cancel = CancellationToken::new();
    let countries = &state.sources.countries;
    let list = match (query.region.as_deref(), query.name.as_deref()) {
        (_, Some(name)) if !name.trim().is_empty() => countries.by_name(name, &cancel).await?,
        (Some(region), _) if !region.trim().is_empty() => {
            countries.by_region(region, &cancel).await?
        }
        _ => countries.all(&cancel).await?,
    };
    Ok(Json(list).into_response())
}

async fn country_handler(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Response, ApiError> {
    match state
        .sources
        .countries
        .by_code(&code, &CancellationToken::new())
        .await?
    {
        Some(country) => Ok(Json(country).into_response()),
        None => Err(ApiError::new(
            StatusCode::NOT_FOUND,
            format!("Unknown country code: {code}"),
        )),
    }
}

async fn education_handler(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Response, ApiError> {
    let snapshot = state
        .sources
        .world_bank
        .education_snapshot(&code, &CancellationToken::new())
        .await?;
    if snapshot.is_unavailable() {
        return Err(ApiError::new(
            StatusCode::BAD_GATEWAY,
            "Education indicators are unavailable right now",
        ));
    }
    Ok(Json(snapshot).into_response())
}

async fn layer_handler(
    State(state): State<SharedState>,
    Path(layer): Path<String>,
) -> Result<Response, ApiError> {
    let layer: MapLayer = layer
        .parse()
        .map_err(|e: String| ApiError::new(StatusCode::NOT_FOUND, e))?;
    let collection = state
        .sources
        .layers
        .fetch_layer(layer, &CancellationToken::new())
        .await?;
    Ok(Json(collection.as_ref()).into_response())
}

#[derive(Debug, Default, Deserialize)]
struct NewsQuery {
    q: Option<String>,
}

async fn news_handler(
    State(state): State<SharedState>,
    Query(query): Query<NewsQuery>,
) -> Result<Response, ApiError> {
    let articles = state
        .sources
        .news
        .search(query.q.as_deref(), &CancellationToken::new())
        .await?;
    Ok(Json(articles).into_response())
}

/// Serve the gateway until Ctrl-C.
pub async fn run(state: SharedState, host: &str, port: u16) -> Result<(), std::io::Error> {
    let app = router(state);
    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(address = %listener.local_addr()?, "GeoAtlas gateway listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down gateway");
        })
        .await?;
    Ok(())
}
