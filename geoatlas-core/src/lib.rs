//! # GeoAtlas Core
//!
//! Core library for the GeoAtlas Human Geography Map backend.
//! Provides the paper data model, the research pipeline (dedup, enhancement,
//! relevance and user filtering), the cached search service, the shared HTTP
//! fetch helper, and configuration.

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod research;
pub mod search;
pub mod types;

// Re-export commonly used types at the crate root.
pub use cache::{Clock, ManualClock, SystemClock, TtlCache};
pub use config::{GeoAtlasConfig, HttpConfig, ResearchConfig, ServerConfig, SourcesConfig};
pub use error::{ConfigError, FetchError, GeoAtlasError, Result, SearchError};
pub use http::HttpFetcher;
pub use research::{PipelineSettings, ResearchKeywords, run_pipeline};
pub use search::{PaperSearchService, PaperSource, SearchView};
pub use types::{
    AcademicLevel, Author, CitationRange, MethodologyCategory, OpenAccessStatus, PaperRecord,
    SearchFilters, SearchIssue, SearchOutcome, SortBy, UpstreamQuery, YearRange,
};
