use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::{
    error::ApiError,
    model::{ForecastInterval, ForecastSummary, Geohash},
};

use super::{NearbyQuery, NearbyResult, WeatherBackend, get_json, http_client, join_url};

/// Forecasts are published every six hours.
pub const INTERVAL_STEP_HOURS: u32 = 6;

/// Client for the `nearby` and `hfi` endpoints.
#[derive(Debug, Clone)]
pub struct WxApiClient {
    base_url: String,
    http: Client,
}

impl WxApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        Ok(Self { base_url: base_url.into(), http: http_client(timeout)? })
    }

    async fn fetch_hfi(&self, geohash: &Geohash, interval: Option<&str>) -> Result<HfiPayload, ApiError> {
        let url = join_url(&self.base_url, "hfi");
        let mut query = vec![("geohash", geohash.to_string())];
        if let Some(interval) = interval {
            query.push(("interval", interval.to_string()));
        }
        get_json(&self.http, &url, &query).await
    }
}

#[derive(Debug, Deserialize)]
struct NearbyResponse {
    #[serde(default)]
    results: Vec<NearbyResult>,
}

#[derive(Debug, Deserialize)]
struct RawInterval {
    #[serde(default)]
    interval: Option<String>,
    temperature_f: Option<f64>,
    dewpoint_f: Option<f64>,
    wind_mph: Option<f64>,
    hfi: f64,
    temperature_c: Option<f64>,
    dewpoint_c: Option<f64>,
    wind_kph: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawSummary {
    #[serde(alias = "averageHfi")]
    average_hfi: f64,
    #[serde(alias = "averageWindMph")]
    average_wind_mph: f64,
    #[serde(alias = "highTemperatureF")]
    high_temperature_f: f64,
    #[serde(alias = "intervalsAnalyzed")]
    intervals_analyzed: u32,
}

/// The `hfi` endpoint answers with a series, an aggregate, or a single snapshot.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum HfiPayload {
    Series { forecasts: Vec<RawInterval> },
    Summary(RawSummary),
    Single(RawInterval),
}

impl HfiPayload {
    fn into_intervals(self, url: &str) -> Result<Vec<ForecastInterval>, ApiError> {
        let raw = match self {
            HfiPayload::Series { forecasts } => forecasts,
            HfiPayload::Single(interval) => vec![interval],
            HfiPayload::Summary(_) => {
                return Err(ApiError::shape(url, "expected forecast intervals, got a summary"));
            }
        };

        raw.into_iter()
            .enumerate()
            .map(|(index, r)| normalize_interval(url, index, r))
            .collect()
    }

    fn into_summary(self, url: &str) -> Result<ForecastSummary, ApiError> {
        let raw = match self {
            HfiPayload::Summary(s) => {
                return Ok(ForecastSummary {
                    average_hfi: s.average_hfi,
                    average_wind_mph: s.average_wind_mph,
                    high_temperature_f: s.high_temperature_f,
                    intervals_analyzed: s.intervals_analyzed,
                });
            }
            other => other,
        };

        debug!(url, "deriving summary from interval payload");
        let intervals = raw.into_intervals(url)?;
        ForecastSummary::from_intervals(&intervals)
            .ok_or_else(|| ApiError::shape(url, "forecast contained no intervals"))
    }
}

fn normalize_interval(url: &str, index: usize, raw: RawInterval) -> Result<ForecastInterval, ApiError> {
    let fallback = index as u32 * INTERVAL_STEP_HOURS;
    let offset_hours = match raw.interval.as_deref() {
        Some(label) => parse_interval_label(label)
            .ok_or_else(|| ApiError::shape(url, format!("bad interval label '{label}'")))?,
        None => fallback,
    };

    let missing = |field: &str| ApiError::shape(url, format!("interval {offset_hours}h is missing `{field}`"));

    Ok(ForecastInterval {
        offset_hours,
        temperature_f: raw.temperature_f.ok_or_else(|| missing("temperature_f"))?,
        dewpoint_f: raw.dewpoint_f.ok_or_else(|| missing("dewpoint_f"))?,
        wind_mph: raw.wind_mph.ok_or_else(|| missing("wind_mph"))?,
        hfi: raw.hfi,
        temperature_c: raw.temperature_c,
        dewpoint_c: raw.dewpoint_c,
        wind_kph: raw.wind_kph,
    })
}

/// Parses labels such as `"12h"` into hours.
fn parse_interval_label(label: &str) -> Option<u32> {
    label.trim().strip_suffix('h')?.parse().ok()
}

#[async_trait]
impl WeatherBackend for WxApiClient {
    async fn nearby(&self, query: &NearbyQuery) -> Result<Vec<NearbyResult>, ApiError> {
        let url = join_url(&self.base_url, "nearby");
        let params = match query {
            NearbyQuery::Coordinates(c) => {
                vec![("lat", c.latitude.to_string()), ("lon", c.longitude.to_string())]
            }
            NearbyQuery::Place(place) => vec![("location", place.clone())],
        };

        let parsed: NearbyResponse = get_json(&self.http, &url, &params).await?;
        Ok(parsed.results)
    }

    async fn forecast_summary(&self, geohash: &Geohash) -> Result<ForecastSummary, ApiError> {
        let url = join_url(&self.base_url, "hfi");
        self.fetch_hfi(geohash, Some("0h")).await?.into_summary(&url)
    }

    async fn forecast_detail(&self, geohash: &Geohash) -> Result<Vec<ForecastInterval>, ApiError> {
        let url = join_url(&self.base_url, "hfi");
        self.fetch_hfi(geohash, None).await?.into_intervals(&url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "http://test/wxapi/hfi";

    fn payload(json: &str) -> HfiPayload {
        serde_json::from_str(json).expect("payload should parse")
    }

    #[test]
    fn series_is_keyed_by_six_hour_steps() {
        let p = payload(
            r#"{"forecasts": [
                {"temperature_f": 70, "dewpoint_f": 50, "wind_mph": 5, "hfi": 8},
                {"temperature_f": 72, "dewpoint_f": 52, "wind_mph": 6, "hfi": 7}
            ]}"#,
        );
        let intervals = p.into_intervals(URL).expect("intervals");
        assert_eq!(intervals.iter().map(|i| i.offset_hours).collect::<Vec<_>>(), vec![0, 6]);
    }

    #[test]
    fn explicit_interval_labels_win() {
        let p = payload(
            r#"{"forecasts": [
                {"interval": "12h", "temperature_f": 70, "dewpoint_f": 50, "wind_mph": 5, "hfi": 8},
                {"interval": "0h", "temperature_f": 72, "dewpoint_f": 52, "wind_mph": 6, "hfi": 7}
            ]}"#,
        );
        let intervals = p.into_intervals(URL).expect("intervals");
        assert_eq!(intervals[0].offset_hours, 12);
        assert_eq!(intervals[1].offset_hours, 0);
    }

    #[test]
    fn single_object_is_interval_zero() {
        let p = payload(r#"{"temperature_f": 61.5, "temperature_c": 16.4, "dewpoint_f": 40, "wind_mph": 3, "hfi": 9.1}"#);
        let intervals = p.into_intervals(URL).expect("intervals");
        assert_eq!(intervals.len(), 1);
        assert_eq!(intervals[0].offset_hours, 0);
        assert_eq!(intervals[0].temperature_c, Some(16.4));
        assert_eq!(intervals[0].wind_kph, None);
    }

    #[test]
    fn summary_accepts_camel_case() {
        let p = payload(r#"{"averageHfi": 9, "averageWindMph": 4.5, "highTemperatureF": 78, "intervalsAnalyzed": 8}"#);
        let summary = p.into_summary(URL).expect("summary");
        assert_eq!(summary.average_hfi, 9.0);
        assert_eq!(summary.intervals_analyzed, 8);
    }

    #[test]
    fn summary_derived_from_single_snapshot() {
        let p = payload(r#"{"temperature_f": 65, "dewpoint_f": 40, "wind_mph": 3, "hfi": 6}"#);
        let summary = p.into_summary(URL).expect("summary");
        assert_eq!(summary.average_hfi, 6.0);
        assert_eq!(summary.high_temperature_f, 65.0);
        assert_eq!(summary.intervals_analyzed, 1);
    }

    #[test]
    fn summary_payload_is_not_detail() {
        let p = payload(r#"{"average_hfi": 9, "average_wind_mph": 4, "high_temperature_f": 70, "intervals_analyzed": 8}"#);
        assert!(matches!(p.into_intervals(URL), Err(ApiError::Shape { .. })));
    }

    #[test]
    fn missing_reading_is_a_shape_error() {
        let p = payload(r#"{"forecasts": [{"temperature_f": 70, "wind_mph": 5, "hfi": 8}]}"#);
        let err = p.into_intervals(URL).unwrap_err();
        assert!(err.to_string().contains("dewpoint_f"));
    }

    #[test]
    fn empty_series_has_no_summary() {
        let p = payload(r#"{"forecasts": []}"#);
        assert!(p.into_summary(URL).is_err());
    }

    #[test]
    fn interval_labels() {
        assert_eq!(parse_interval_label("42h"), Some(42));
        assert_eq!(parse_interval_label("6"), None);
        assert_eq!(parse_interval_label("xh"), None);
    }
}
