//! World Bank indicators API client.
//!
//! The API answers with a two-element array `[meta, rows]`, or a one-element
//! `[{"message": [...]}]` when the request is rejected.

use std::sync::Arc;

use futures::future::join_all;
use geoatlas_core::{FetchError, HttpFetcher};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Education indicators shown on the country panel, as `(code, label)`.
pub const EDUCATION_INDICATORS: &[(&str, &str)] = &[
    ("SE.ADT.LITR.ZS", "Adult literacy rate (%)"),
    ("SE.PRM.ENRR", "Primary school enrollment (% gross)"),
    ("SE.SEC.ENRR", "Secondary school enrollment (% gross)"),
    ("SE.TER.ENRR", "Tertiary school enrollment (% gross)"),
    ("SE.XPD.TOTL.GD.ZS", "Government expenditure on education (% of GDP)"),
    ("SE.PRM.CMPT.ZS", "Primary completion rate (%)"),
];

/// One yearly observation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorPoint {
    pub year: i32,
    pub value: Option<f64>,
}

/// Yearly values of one indicator for one country, newest first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSeries {
    pub indicator: String,
    pub indicator_name: String,
    pub country: String,
    pub points: Vec<IndicatorPoint>,
}

impl IndicatorSeries {
    /// The most recent year that has a value.
    pub fn latest(&self) -> Option<IndicatorPoint> {
        self.points
            .iter()
            .filter(|p| p.value.is_some())
            .max_by_key(|p| p.year)
            .copied()
    }
}

/// Latest reading of one indicator inside a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorReading {
    pub code: String,
    pub label: String,
    pub year: Option<i32>,
    pub value: Option<f64>,
}

/// An indicator that could not be fetched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorFailure {
    pub code: String,
    pub message: String,
}

/// Latest values for a set of indicators; failures do not sink the rest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub country: String,
    pub readings: Vec<IndicatorReading>,
    pub failures: Vec<IndicatorFailure>,
}

impl IndicatorSnapshot {
    /// Whether every indicator failed.
    pub fn is_unavailable(&self) -> bool {
        self.readings.is_empty() && !self.failures.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct RawRow {
    #[serde(default)]
    indicator: Option<RawLabel>,
    #[serde(default)]
    country: Option<RawLabel>,
    #[serde(default)]
    date: String,
    #[serde(default)]
    value: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawLabel {
    #[serde(default)]
    id: String,
    #[serde(default)]
    value: String,
}

/// Parse a `[meta, rows]` body into a series.
pub fn parse_indicator_response(
    url: &str,
    indicator: &str,
    country: &str,
    body: &Value,
) -> Result<IndicatorSeries, FetchError> {
    let parts = body.as_array().ok_or_else(|| FetchError::Decode {
        url: url.to_string(),
        message: "expected a JSON array".to_string(),
    })?;

    if let Some(message) = parts
        .first()
        .and_then(|meta| meta.get("message"))
        .and_then(|m| m.as_array())
        .and_then(|m| m.first())
        .and_then(|m| m.get("value"))
        .and_then(|v| v.as_str())
    {
        return Err(FetchError::Decode {
            url: url.to_string(),
            message: message.to_string(),
        });
    }

    // A null second element means the indicator has no data for the country.
    let rows: Vec<RawRow> = match parts.get(1) {
        Some(Value::Null) | None => Vec::new(),
        Some(rows) => serde_json::from_value(rows.clone()).map_err(|e| FetchError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        })?,
    };

    let indicator_name = rows
        .iter()
        .find_map(|r| r.indicator.as_ref().map(|l| l.value.clone()))
        .unwrap_or_default();
    let country_name = rows
        .iter()
        .find_map(|r| r.country.as_ref().filter(|l| !l.id.is_empty()).map(|l| l.value.clone()))
        .unwrap_or_else(|| country.to_string());

    let mut points: Vec<IndicatorPoint> = rows
        .iter()
        .filter_map(|r| {
            r.date.trim().parse::<i32>().ok().map(|year| IndicatorPoint {
                year,
                value: r.value,
            })
        })
        .collect();
    points.sort_by(|a, b| b.year.cmp(&a.year));

    Ok(IndicatorSeries {
        indicator: indicator.to_string(),
        indicator_name,
        country: country_name,
        points,
    })
}

/// Client for `api.worldbank.org/v2`.
pub struct WorldBankClient {
    http: Arc<HttpFetcher>,
    base_url: String,
}

impl WorldBankClient {
    pub fn new(http: Arc<HttpFetcher>, base_url: &str) -> Self {
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Fetch one indicator series, optionally limited to `(from, to)` years.
    pub async fn indicator(
        &self,
        country: &str,
        indicator: &str,
        years: Option<(i32, i32)>,
        cancel: &CancellationToken,
    ) -> Result<IndicatorSeries, FetchError> {
        let url = format!(
            "{}/country/{}/indicator/{}",
            self.base_url,
            urlencoding::encode(country.trim()),
            urlencoding::encode(indicator)
        );
        let mut query = vec![("format", "json".to_string()), ("per_page", "100".to_string())];
        if let Some((from, to)) = years {
            query.push(("date", format!("{from}:{to}")));
        }

        let body: Value = self.http.get_json(&url, &query, cancel).await?;
        parse_indicator_response(&url, indicator, country, &body)
    }

    /// Latest values for `indicators`, fetched concurrently.
    pub async fn snapshot(
        &self,
        country: &str,
        indicators: &[(&str, &str)],
        cancel: &CancellationToken,
    ) -> Result<IndicatorSnapshot, FetchError> {
        let fetches = indicators
            .iter()
            .map(|(code, _)| self.indicator(country, code, None, cancel));
        let results = join_all(fetches).await;

        let mut snapshot = IndicatorSnapshot {
            country: country.to_uppercase(),
            readings: Vec::new(),
            failures: Vec::new(),
        };
        for ((code, label), result) in indicators.iter().zip(results) {
            match result {
                Ok(series) => {
                    let latest = series.latest();
                    snapshot.readings.push(IndicatorReading {
                        code: code.to_string(),
                        label: label.to_string(),
                        year: latest.map(|p| p.year),
                        value: latest.and_then(|p| p.value),
                    });
                }
                Err(FetchError::Cancelled) => return Err(FetchError::Cancelled),
                Err(e) => {
                    warn!(country, indicator = code, error = %e, "Indicator fetch failed");
                    snapshot.failures.push(IndicatorFailure {
                        code: code.to_string(),
                        message: e.to_string(),
                    });
                }
            }
        }
        debug!(
            country,
            readings = snapshot.readings.len(),
            failures = snapshot.failures.len(),
            "Built indicator snapshot"
        );
        Ok(snapshot)
    }

    pub async fn education_snapshot(
        &self,
        country: &str,
        cancel: &CancellationToken,
    ) -> Result<IndicatorSnapshot, FetchError> {
        self.snapshot(country, EDUCATION_INDICATORS, cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{fetcher, serve};
    use axum::{Json, Router, extract::Path, http::StatusCode, routing::get};
    use pretty_assertions::assert_eq;

    fn literacy_body() -> Value {
        serde_json::json!([
            {"page": 1, "pages": 1, "per_page": 100, "total": 3},
            [
                {"indicator": {"id": "SE.ADT.LITR.ZS", "value": "Literacy rate"},
                 "country": {"id": "KE", "value": "Kenya"},
                 "date": "2022", "value": null},
                {"indicator": {"id": "SE.ADT.LITR.ZS", "value": "Literacy rate"},
                 "country": {"id": "KE", "value": "Kenya"},
                 "date": "2021", "value": 82.6},
                {"indicator": {"id": "SE.ADT.LITR.ZS", "value": "Literacy rate"},
                 "country": {"id": "KE", "value": "Kenya"},
                 "date": "2018", "value": 81.5}
            ]
        ])
    }

    #[test]
    fn test_parse_indicator_response() {
        let series = parse_indicator_response("u", "SE.ADT.LITR.ZS", "ke", &literacy_body())
            .unwrap();
        assert_eq!(series.country, "Kenya");
        assert_eq!(series.indicator_name, "Literacy rate");
        assert_eq!(series.points.len(), 3);
        assert_eq!(
            series.latest(),
            Some(IndicatorPoint {
                year: 2021,
                value: Some(82.6)
            })
        );
    }

    #[test]
    fn test_parse_indicator_error_message() {
        let body = serde_json::json!([
            {"message": [{"id": "120", "key": "Invalid value",
                          "value": "The provided parameter value is not valid"}]}
        ]);
        let err = parse_indicator_response("u", "X", "zz", &body).unwrap_err();
        assert!(matches!(err, FetchError::Decode { ref message, .. } if message.contains("not valid")));
    }

    #[test]
    fn test_parse_indicator_without_rows() {
        let body = serde_json::json!([{"page": 0, "total": 0}, null]);
        let series = parse_indicator_response("u", "X", "ke", &body).unwrap();
        assert!(series.points.is_empty());
        assert_eq!(series.country, "ke");
        assert_eq!(series.latest(), None);
    }

    #[test]
    fn test_parse_indicator_not_an_array() {
        let err = parse_indicator_response("u", "X", "ke", &serde_json::json!({})).unwrap_err();
        assert!(matches!(err, FetchError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_snapshot_records_partial_failures() {
        let app = Router::new().route(
            "/country/{country}/indicator/{indicator}",
            get(|Path((_country, indicator)): Path<(String, String)>| async move {
                if indicator == "SE.ADT.LITR.ZS" {
                    Ok(Json(literacy_body()))
                } else {
                    Err(StatusCode::INTERNAL_SERVER_ERROR)
                }
            }),
        );
        let base = serve(app).await;
        let client = WorldBankClient::new(fetcher(), &base);
        let snapshot = client
            .snapshot(
                "ke",
                &[("SE.ADT.LITR.ZS", "Literacy"), ("SE.TER.ENRR", "Tertiary")],
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(snapshot.country, "KE");
        assert_eq!(
            snapshot.readings,
            vec![IndicatorReading {
                code: "SE.ADT.LITR.ZS".into(),
                label: "Literacy".into(),
                year: Some(2021),
                value: Some(82.6),
            }]
        );
        assert_eq!(snapshot.failures.len(), 1);
        assert_eq!(snapshot.failures[0].code, "SE.TER.ENRR");
        assert!(!snapshot.is_unavailable());
    }

    #[tokio::test]
    async fn test_education_snapshot_all_failing() {
        let app = Router::new().route(
            "/country/{country}/indicator/{indicator}",
            get(|| async { StatusCode::BAD_GATEWAY }),
        );
        let base = serve(app).await;
        let client = WorldBankClient::new(fetcher(), &base);
        let snapshot = client
            .education_snapshot("ke", &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(snapshot.failures.len(), EDUCATION_INDICATORS.len());
        assert!(snapshot.is_unavailable());
    }
}
