//! REST Countries client.

use std::collections::BTreeMap;
use std::sync::Arc;

use geoatlas_core::{FetchError, HttpFetcher};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

/// The `/all` endpoint rejects requests for more than ten fields.
const LIST_FIELDS: &str = "name,cca2,cca3,capital,region,subregion,population,area,latlng,flag";

/// Country facts shown on the map's country panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Country {
    pub name: String,
    pub official_name: String,
    pub cca2: String,
    pub cca3: String,
    pub capital: Option<String>,
    pub region: String,
    pub subregion: Option<String>,
    pub population: u64,
    pub area_km2: Option<f64>,
    /// `[latitude, longitude]` of the country centroid.
    pub latlng: Option<[f64; 2]>,
    pub languages: Vec<String>,
    pub currencies: Vec<String>,
    pub flag: Option<String>,
}

impl Country {
    /// People per square kilometre, when the area is known and non-zero.
    pub fn population_density(&self) -> Option<f64> {
        self.area_km2
            .filter(|area| *area > 0.0)
            .map(|area| self.population as f64 / area)
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawName {
    common: String,
    official: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCurrency {
    name: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawCountry {
    name: RawName,
    cca2: String,
    cca3: String,
    capital: Vec<String>,
    region: String,
    subregion: Option<String>,
    population: u64,
    area: Option<f64>,
    latlng: Vec<f64>,
    languages: BTreeMap<String, String>,
    currencies: BTreeMap<String, RawCurrency>,
    flag: Option<String>,
}

impl From<RawCountry> for Country {
    fn from(raw: RawCountry) -> Self {
        let latlng = match raw.latlng.as_slice() {
            [lat, lng] => Some([*lat, *lng]),
            _ => None,
        };
        Self {
            name: raw.name.common,
            official_name: raw.name.official,
            cca2: raw.cca2,
            cca3: raw.cca3,
            capital: raw.capital.into_iter().next(),
            region: raw.region,
            subregion: raw.subregion.filter(|s| !s.is_empty()),
            population: raw.population,
            area_km2: raw.area,
            latlng,
            languages: raw.languages.into_values().collect(),
            currencies: raw
                .currencies
                .into_iter()
                .map(|(code, c)| {
                    if c.name.is_empty() {
                        code
                    } else {
                        format!("{} ({})", c.name, code)
                    }
                })
                .collect(),
            flag: raw.flag,
        }
    }
}

/// Client for `restcountries.com/v3.1`.
pub struct RestCountriesClient {
    http: Arc<HttpFetcher>,
    base_url: String,
}

impl RestCountriesClient {
    pub fn new(http: Arc<HttpFetcher>, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    async fn fetch_list(
        &self,
        path: &str,
        query: &[(&str, String)],
        cancel: &CancellationToken,
    ) -> Result<Vec<Country>, FetchError> {
        let url = format!("{}/{}", self.base_url, path);
        let raw: Vec<RawCountry> = self.http.get_json(&url, query, cancel).await?;
        let mut countries: Vec<Country> = raw.into_iter().map(Country::from).collect();
        countries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(countries)
    }

    /// Every country, sorted by common name. Languages and currencies are
    /// not included in the list view.
    pub async fn all(&self, cancel: &CancellationToken) -> Result<Vec<Country>, FetchError> {
        self.fetch_list("all", &[("fields", LIST_FIELDS.to_string())], cancel)
            .await
    }

    /// Look up one country by ISO 3166-1 alpha-2 or alpha-3 code.
    ///
    /// Unknown codes resolve to `Ok(None)`.
    pub async fn by_code(
        &self,
        code: &str,
        cancel: &CancellationToken,
    ) -> Result<Option<Country>, FetchError> {
        let path = format!("alpha/{}", urlencode(code.trim()));
        match self.fetch_list(&path, &[], cancel).await {
            Ok(mut countries) => Ok((!countries.is_empty()).then(|| countries.swap_remove(0))),
            Err(FetchError::Status { status: 400 | 404, .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Countries in a region such as `europe` or `africa`.
    pub async fn by_region(
        &self,
        region: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Country>, FetchError> {
        let path = format!("region/{}", urlencode(region.trim()));
        not_found_is_empty(self.fetch_list(&path, &[], cancel).await)
    }

    /// Countries whose common or official name contains `name`.
    pub async fn by_name(
        &self,
        name: &str,
        cancel: &CancellationToken,
    ) -> Result<Vec<Country>, FetchError> {
        let path = format!("name/{}", urlencode(name.trim()));
        not_found_is_empty(self.fetch_list(&path, &[], cancel).await)
    }
}

fn urlencode(segment: &str) -> String {
    urlencoding::encode(segment).into_owned()
}

fn not_found_is_empty(
    result: Result<Vec<Country>, FetchError>,
) -> Result<Vec<Country>, FetchError> {
    match result {
        Err(FetchError::Status { status: 404, .. }) => Ok(Vec::new()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fetcher, serve};
    use axum::{Json, Router, extract::Path, http::StatusCode, routing::get};
    use pretty_assertions::assert_eq;

    fn kenya() -> serde_json::Value {
        serde_json::json!({
            "name": {"common": "Kenya", "official": "Republic of Kenya"},
            "cca2": "KE",
            "cca3": "KEN",
            "capital": ["Nairobi"],
            "region": "Africa",
            "subregion": "Eastern Africa",
            "population": 53771300u64,
            "area": 580367.0,
            "latlng": [1.0, 38.0],
            "languages": {"eng": "English", "swa": "Swahili"},
            "currencies": {"KES": {"name": "Kenyan shilling", "symbol": "Sh"}},
            "flag": "🇰🇪"
        })
    }

    #[test]
    fn test_country_from_raw() {
        let raw: RawCountry = serde_json::from_value(kenya()).unwrap();
        let country = Country::from(raw);
        assert_eq!(country.name, "Kenya");
        assert_eq!(country.official_name, "Republic of Kenya");
        assert_eq!(country.capital.as_deref(), Some("Nairobi"));
        assert_eq!(country.latlng, Some([1.0, 38.0]));
        assert_eq!(country.languages, vec!["English", "Swahili"]);
        assert_eq!(country.currencies, vec!["Kenyan shilling (KES)"]);
        let density = country.population_density().unwrap();
        assert!((density - 92.65).abs() < 0.01);
    }

    #[test]
    fn test_country_from_sparse_raw() {
        let raw: RawCountry =
            serde_json::from_value(serde_json::json!({"name": {"common": "Bouvet Island"}}))
                .unwrap();
        let country = Country::from(raw);
        assert_eq!(country.name, "Bouvet Island");
        assert_eq!(country.capital, None);
        assert_eq!(country.latlng, None);
        assert_eq!(country.population_density(), None);
    }

    #[test]
    fn test_urlencode_segment() {
        assert_eq!(urlencode("united states"), "united%20states");
        assert_eq!(urlencode("KE"), "KE");
    }

    fn app() -> Router {
        Router::new()
            .route(
                "/all",
                get(|| async {
                    let mut chad = kenya();
                    chad["name"]["common"] = "Chad".into();
                    Json(serde_json::json!([kenya(), chad]))
                }),
            )
            .route(
                "/alpha/{code}",
                get(|Path(code): Path<String>| async move {
                    if code.eq_ignore_ascii_case("ke") {
                        Ok(Json(serde_json::json!([kenya()])))
                    } else {
                        Err(StatusCode::NOT_FOUND)
                    }
                }),
            )
            .route(
                "/region/{region}",
                get(|| async { StatusCode::NOT_FOUND }),
            )
    }

    #[tokio::test]
    async fn test_all_sorted_by_name() {
        let base = serve(app()).await;
        let client = RestCountriesClient::new(fetcher(), &base);
        let countries = client.all(&CancellationToken::new()).await.unwrap();
        let names: Vec<&str> = countries.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Chad", "Kenya"]);
    }

    #[tokio::test]
    async fn test_by_code_found_and_missing() {
        let base = serve(app()).await;
        let client = RestCountriesClient::new(fetcher(), &base);
        let cancel = CancellationToken::new();
        let found = client.by_code("ke", &cancel).await.unwrap();
        assert_eq!(found.map(|c| c.cca3), Some("KEN".to_string()));
        assert_eq!(client.by_code("zz", &cancel).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_unknown_region_is_empty() {
        let base = serve(app()).await;
        let client = RestCountriesClient::new(fetcher(), &base);
        let countries = client
            .by_region("atlantis", &CancellationToken::new())
            .await
            .unwrap();
        assert!(countries.is_empty());
    }
}
