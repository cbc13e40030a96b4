use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

use crate::{
    error::ApiError,
    model::{Coordinate, Suggestion},
};

use super::{GeoDirectory, get_json, http_client, join_url};

/// Client for the `countries` and `cities` directory endpoints.
#[derive(Debug, Clone)]
pub struct GeoApiClient {
    base_url: String,
    http: Client,
}

impl GeoApiClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        Ok(Self { base_url: base_url.into(), http: http_client(timeout)? })
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Number(i64),
    Text(String),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Number(n) => n.to_string(),
            RawId::Text(s) => s,
        }
    }
}

/// Directory entries come back either as bare names or as objects.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSuggestion {
    Name(String),
    Entry {
        #[serde(default)]
        id: Option<RawId>,
        name: String,
        #[serde(default)]
        state_code: Option<String>,
        #[serde(default, alias = "lat")]
        latitude: Option<f64>,
        #[serde(default, alias = "lon", alias = "lng")]
        longitude: Option<f64>,
    },
}

impl From<RawSuggestion> for Suggestion {
    fn from(raw: RawSuggestion) -> Self {
        match raw {
            RawSuggestion::Name(name) => Suggestion::new(name.clone(), name),
            RawSuggestion::Entry { id, name, state_code, latitude, longitude } => Suggestion {
                id: id.map(RawId::into_string).unwrap_or_else(|| name.clone()),
                coordinate: latitude.zip(longitude).map(|(lat, lon)| Coordinate::new(lat, lon)),
                state_code: state_code.filter(|s| !s.is_empty()),
                name,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
struct CountriesResponse {
    #[serde(default)]
    countries: Vec<RawSuggestion>,
}

#[derive(Debug, Deserialize)]
struct CitiesResponse {
    #[serde(default)]
    cities: Vec<RawSuggestion>,
}

fn search_param(query: &str) -> Option<(&'static str, String)> {
    let query = query.trim();
    (!query.is_empty()).then(|| ("q", query.to_string()))
}

#[async_trait]
impl GeoDirectory for GeoApiClient {
    async fn countries(&self, query: &str) -> Result<Vec<Suggestion>, ApiError> {
        let url = join_url(&self.base_url, "countries");
        let params: Vec<_> = search_param(query).into_iter().collect();

        let parsed: CountriesResponse = get_json(&self.http, &url, &params).await?;
        Ok(parsed.countries.into_iter().map(Suggestion::from).collect())
    }

    async fn cities(&self, country_id: &str, query: &str) -> Result<Vec<Suggestion>, ApiError> {
        let url = join_url(&self.base_url, "cities");
        let mut params = vec![("country_id", country_id.to_string())];
        params.extend(search_param(query));

        let parsed: CitiesResponse = get_json(&self.http, &url, &params).await?;
        Ok(parsed.cities.into_iter().map(Suggestion::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(json: &str) -> Vec<Suggestion> {
        let parsed: CitiesResponse = serde_json::from_str(json).expect("parse");
        parsed.cities.into_iter().map(Suggestion::from).collect()
    }

    #[test]
    fn mixed_shapes_normalize_to_one() {
        let out = parse(
            r#"{"cities": [
                "Springfield",
                {"id": 12, "name": "Portland", "state_code": "OR"},
                {"id": "abc", "name": "Salem", "state_code": ""}
            ]}"#,
        );

        assert_eq!(out[0], Suggestion::new("Springfield", "Springfield"));
        assert_eq!(out[1].id, "12");
        assert_eq!(out[1].state_code.as_deref(), Some("OR"));
        assert_eq!(out[2].id, "abc");
        assert_eq!(out[2].state_code, None);
    }

    #[test]
    fn coordinates_need_both_halves() {
        let out = parse(
            r#"{"cities": [
                {"id": 1, "name": "A", "lat": 45.5, "lon": -122.6},
                {"id": 2, "name": "B", "latitude": 10.0}
            ]}"#,
        );
        assert_eq!(out[0].coordinate, Some(Coordinate::new(45.5, -122.6)));
        assert_eq!(out[1].coordinate, None);
    }

    #[test]
    fn blank_query_is_omitted() {
        assert_eq!(search_param("  "), None);
        assert_eq!(search_param(" ca "), Some(("q", "ca".to_string())));
    }
}
