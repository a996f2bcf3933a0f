//! Natural Earth GeoJSON layers for the base map.

use std::str::FromStr;
use std::sync::{Arc, Mutex};

use chrono::Duration;
use geoatlas_core::cache::{Clock, TtlCache};
use geoatlas_core::{FetchError, HttpFetcher};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Natural Earth files change a few times a year.
const LAYER_TTL_HOURS: i64 = 24;

/// Map layers the UI can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MapLayer {
    Countries,
    Rivers,
    Lakes,
    Coastline,
    PopulatedPlaces,
}

impl MapLayer {
    pub const ALL: [MapLayer; 5] = [
        MapLayer::Countries,
        MapLayer::Rivers,
        MapLayer::Lakes,
        MapLayer::Coastline,
        MapLayer::PopulatedPlaces,
    ];

    /// File name of the 1:110m GeoJSON for this layer.
    pub fn file_name(&self) -> &'static str {
        match self {
            MapLayer::Countries => "ne_110m_admin_0_countries.geojson",
            MapLayer::Rivers => "ne_110m_rivers_lake_centerlines.geojson",
            MapLayer::Lakes => "ne_110m_lakes.geojson",
            MapLayer::Coastline => "ne_110m_coastline.geojson",
            MapLayer::PopulatedPlaces => "ne_110m_populated_places.geojson",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MapLayer::Countries => "countries",
            MapLayer::Rivers => "rivers",
            MapLayer::Lakes => "lakes",
            MapLayer::Coastline => "coastline",
            MapLayer::PopulatedPlaces => "populated-places",
        }
    }
}

impl std::fmt::Display for MapLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MapLayer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "countries" => Ok(MapLayer::Countries),
            "rivers" => Ok(MapLayer::Rivers),
            "lakes" => Ok(MapLayer::Lakes),
            "coastline" | "coastlines" => Ok(MapLayer::Coastline),
            "populated-places" | "places" | "cities" => Ok(MapLayer::PopulatedPlaces),
            other => Err(format!("unknown map layer: {other}")),
        }
    }
}

/// One GeoJSON feature. Geometry is passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    #[serde(rename = "type", default = "feature_type")]
    pub kind: String,
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub geometry: Option<Value>,
}

fn feature_type() -> String {
    "Feature".to_string()
}

impl Feature {
    /// Display name, trying the common Natural Earth property spellings.
    pub fn name(&self) -> Option<&str> {
        ["NAME", "name", "ADMIN", "NAME_EN", "name_en"]
            .iter()
            .find_map(|key| self.properties.get(*key).and_then(|v| v.as_str()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureCollection {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn feature_names(&self) -> Vec<&str> {
        self.features.iter().filter_map(Feature::name).collect()
    }
}

/// Fetches layers from a Natural Earth GeoJSON mirror, caching each file.
pub struct NaturalEarthClient {
    http: Arc<HttpFetcher>,
    base_url: String,
    clock: Arc<dyn Clock>,
    cache: Mutex<TtlCache<Arc<FeatureCollection>>>,
}

impl NaturalEarthClient {
    pub fn new(http: Arc<HttpFetcher>, base_url: &str, clock: Arc<dyn Clock>) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            clock,
            cache: Mutex::new(TtlCache::new(
                Duration::hours(LAYER_TTL_HOURS),
                Some(MapLayer::ALL.len()),
            )),
        }
    }

    pub fn layer_url(&self, layer: MapLayer) -> String {
        format!("{}/{}", self.base_url, layer.file_name())
    }

    pub async fn fetch_layer(
        &self,
        layer: MapLayer,
        cancel: &CancellationToken,
    ) -> Result<Arc<FeatureCollection>, FetchError> {
        let cached = self
            .cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(layer.as_str(), self.clock.now());
        if let Some(collection) = cached {
            debug!(%layer, "Serving map layer from cache");
            return Ok(collection);
        }

        let url = self.layer_url(layer);
        let collection: FeatureCollection = self.http.get_json(&url, &[], cancel).await?;
        if collection.kind != "FeatureCollection" {
            return Err(FetchError::Decode {
                url,
                message: format!("expected a FeatureCollection, got {}", collection.kind),
            });
        }
        debug!(%layer, features = collection.features.len(), "Fetched map layer");

        let collection = Arc::new(collection);
        self.cache.lock().unwrap_or_else(|e| e.into_inner()).set(
            layer.as_str().to_string(),
            collection.clone(),
            self.clock.now(),
        );
        Ok(collection)
    }
}
