//! Forward geocoding of manually entered places via Nominatim (OpenStreetMap).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::{error::ApiError, model::Coordinate};

use super::{Geocoder, get_json, http_client};

#[derive(Debug, Clone)]
pub struct NominatimGeocoder {
    url: String,
    http: Client,
}

impl NominatimGeocoder {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        Ok(Self { url: url.into(), http: http_client(timeout)? })
    }
}

/// Nominatim reports coordinates as strings.
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
    #[serde(default)]
    display_name: Option<String>,
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn geocode(&self, place: &str) -> Result<Option<Coordinate>, ApiError> {
        let params = [
            ("q", place.to_string()),
            ("format", "json".to_string()),
            ("limit", "1".to_string()),
        ];

        let places: Vec<NominatimPlace> = get_json(&self.http, &self.url, &params).await?;
        let Some(top) = places.into_iter().next() else {
            debug!(place, "geocoder returned no matches");
            return Ok(None);
        };

        let lat = top.lat.parse::<f64>();
        let lon = top.lon.parse::<f64>();
        match (lat, lon) {
            (Ok(lat), Ok(lon)) => {
                debug!(place, lat, lon, name = ?top.display_name, "geocoded");
                Ok(Some(Coordinate::new(lat, lon)))
            }
            _ => Err(ApiError::shape(
                &self.url,
                format!("unparseable coordinates '{}', '{}'", top.lat, top.lon),
            )),
        }
    }
}
