//! # GeoAtlas Sources
//!
//! Clients for the public APIs behind the Human Geography Map. Every client
//! goes through the shared [`HttpFetcher`], so timeouts, cancellation and
//! error mapping behave the same for all upstreams.

pub mod countries;
pub mod layers;
pub mod news;
pub mod openalex;
pub mod worldbank;

use std::sync::Arc;

use geoatlas_core::cache::{Clock, SystemClock};
use geoatlas_core::{FetchError, GeoAtlasConfig, HttpFetcher};

pub use countries::{Country, RestCountriesClient};
pub use layers::{Feature, FeatureCollection, MapLayer, NaturalEarthClient};
pub use news::{NewsArticle, NewsClient};
pub use openalex::OpenAlexClient;
pub use worldbank::{IndicatorPoint, IndicatorSeries, IndicatorSnapshot, WorldBankClient};

/// Every upstream client, sharing one HTTP connection pool.
pub struct Sources {
    pub papers: Arc<OpenAlexClient>,
    pub countries: RestCountriesClient,
    pub world_bank: WorldBankClient,
    pub news: NewsClient,
    pub layers: NaturalEarthClient,
}

impl Sources {
    pub fn from_config(config: &GeoAtlasConfig) -> Result<Self, FetchError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Build the clients with an explicit clock for the layer cache.
    pub fn with_clock(config: &GeoAtlasConfig, clock: Arc<dyn Clock>) -> Result<Self, FetchError> {
        let http = Arc::new(HttpFetcher::new(&config.http)?);
        let sources = &config.sources;
        Ok(Self {
            papers: Arc::new(OpenAlexClient::new(
                http.clone(),
                &sources.openalex_base_url,
                sources.openalex_mailto.clone(),
            )),
            countries: RestCountriesClient::new(http.clone(), &sources.rest_countries_base_url),
            world_bank: WorldBankClient::new(http.clone(), &sources.world_bank_base_url),
            news: NewsClient::new(http.clone(), sources),
            layers: NaturalEarthClient::new(http, &sources.natural_earth_base_url, clock),
        })
    }
}
