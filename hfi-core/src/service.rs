//! Thin wrappers over the backend HTTP services.
//!
//! Every response is normalized here, so nothing downstream has to cope with
//! the servers' alternative payload shapes.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::{fmt::Debug, time::Duration};
use tracing::debug;

use crate::{
    error::ApiError,
    model::{Coordinate, ForecastInterval, ForecastSummary, Geohash, Suggestion},
};

pub mod geoapi;
pub mod geocode;
pub mod wxapi;

pub use geoapi::GeoApiClient;
pub use geocode::NominatimGeocoder;
pub use wxapi::WxApiClient;

/// What to look up nearby forecast cells for.
#[derive(Debug, Clone, PartialEq)]
pub enum NearbyQuery {
    Coordinates(Coordinate),
    Place(String),
}

/// One entry of a nearby-lookup response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyResult {
    #[serde(default)]
    pub geohash: String,
    #[serde(default)]
    pub name: Option<String>,
}

impl NearbyResult {
    pub fn geohash(&self) -> Option<Geohash> {
        Geohash::new(self.geohash.as_str())
    }
}

#[async_trait]
pub trait WeatherBackend: Send + Sync + Debug {
    async fn nearby(&self, query: &NearbyQuery) -> Result<Vec<NearbyResult>, ApiError>;

    async fn forecast_summary(&self, geohash: &Geohash) -> Result<ForecastSummary, ApiError>;

    /// All intervals the server has for `geohash`, in the order it returned them.
    async fn forecast_detail(&self, geohash: &Geohash) -> Result<Vec<ForecastInterval>, ApiError>;
}

#[async_trait]
pub trait GeoDirectory: Send + Sync + Debug {
    async fn countries(&self, query: &str) -> Result<Vec<Suggestion>, ApiError>;

    async fn cities(&self, country_id: &str, query: &str) -> Result<Vec<Suggestion>, ApiError>;
}

#[async_trait]
pub trait Geocoder: Send + Sync + Debug {
    /// Forward-geocodes free text. `Ok(None)` when nothing matched.
    async fn geocode(&self, place: &str) -> Result<Option<Coordinate>, ApiError>;
}

pub(crate) fn http_client(timeout: Duration) -> Result<Client, ApiError> {
    Client::builder()
        .timeout(timeout)
        .user_agent(concat!("hfi/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(ApiError::Client)
}

pub(crate) fn join_url(base: &str, path: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// GETs `url` and decodes a JSON body, mapping every failure to [`ApiError`].
pub(crate) async fn get_json<T: DeserializeOwned>(
    http: &Client,
    url: &str,
    query: &[(&str, String)],
) -> Result<T, ApiError> {
    debug!(url, ?query, "GET");

    let res = http
        .get(url)
        .query(query)
        .send()
        .await
        .map_err(|source| ApiError::Transport { url: url.to_string(), source })?;

    let status = res.status();
    let body = res
        .text()
        .await
        .map_err(|source| ApiError::Transport { url: url.to_string(), source })?;

    if !status.is_success() {
        return Err(ApiError::Status {
            url: url.to_string(),
            status,
            body: truncate_body(&body),
        });
    }

    serde_json::from_str(&body).map_err(|source| ApiError::Decode { url: url.to_string(), source })
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.chars().count() > MAX {
        format!("{}...", body.chars().take(MAX).collect::<String>())
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_url_handles_slashes() {
        assert_eq!(join_url("http://h/wxapi/", "/nearby"), "http://h/wxapi/nearby");
        assert_eq!(join_url("http://h/wxapi", "hfi"), "http://h/wxapi/hfi");
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let long = "é".repeat(250);
        let out = truncate_body(&long);
        assert!(out.ends_with("..."));
        assert_eq!(out.chars().count(), 203);
        assert_eq!(truncate_body("short"), "short");
    }

    #[test]
    fn nearby_result_blank_geohash() {
        let r: NearbyResult = serde_json::from_str(r#"{"geohash": ""}"#).expect("parse");
        assert!(r.geohash().is_none());
    }
}
