use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::Failure;

/// A point on the globe in decimal degrees (WGS84).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    /// Link for viewing the coordinate on a map.
    pub fn map_link(&self) -> String {
        format!("https://www.google.com/maps?q={},{}", self.latitude, self.longitude)
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.4}, {:.4}", self.latitude, self.longitude)
    }
}

/// Opaque identifier of a forecast grid cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Geohash(String);

impl Geohash {
    /// Returns `None` for blank input; a blank geohash cannot address a cell.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() { None } else { Some(Self(value)) }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Geohash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One entry of a country or city suggestion list, already normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Suggestion {
    pub id: String,
    pub name: String,
    pub state_code: Option<String>,
    /// Some directories attach coordinates to cities; manual entry can skip geocoding then.
    pub coordinate: Option<Coordinate>,
}

impl Suggestion {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: id.into(), name: name.into(), state_code: None, coordinate: None }
    }
}

impl fmt::Display for Suggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.state_code {
            Some(state) if !state.is_empty() => write!(f, "{}, {}", self.name, state),
            _ => f.write_str(&self.name),
        }
    }
}

/// State of the manual-entry form.
///
/// The country id is only trusted while the country text still equals the
/// name of the selected suggestion; editing the text invalidates it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManualLocationInput {
    country: String,
    country_id: Option<String>,
    city: String,
    selected_country: Option<Suggestion>,
    selected_city: Option<Suggestion>,
}

impl ManualLocationInput {
    pub fn country(&self) -> &str {
        &self.country
    }

    pub fn country_id(&self) -> Option<&str> {
        self.country_id.as_deref()
    }

    pub fn city(&self) -> &str {
        &self.city
    }

    pub fn selected_city(&self) -> Option<&Suggestion> {
        self.selected_city.as_ref()
    }

    /// Updates the country text. Returns `true` if this invalidated a selected country.
    pub fn set_country_text(&mut self, text: &str) -> bool {
        self.country = text.to_string();

        let still_selected = self.selected_country.as_ref().is_some_and(|s| s.name == text);
        if still_selected || self.country_id.is_none() {
            return false;
        }

        self.country_id = None;
        self.selected_country = None;
        self.clear_city();
        true
    }

    /// Records a chosen country. City state is scoped to a country, so it is reset.
    pub fn select_country(&mut self, suggestion: &Suggestion) {
        self.country = suggestion.name.clone();
        self.country_id = Some(suggestion.id.clone());
        self.selected_country = Some(suggestion.clone());
        self.clear_city();
    }

    pub fn set_city_text(&mut self, text: &str) {
        self.city = text.to_string();
        if self.selected_city.as_ref().is_some_and(|s| s.name != text) {
            self.selected_city = None;
        }
    }

    pub fn select_city(&mut self, suggestion: &Suggestion) {
        self.city = suggestion.name.clone();
        self.selected_city = Some(suggestion.clone());
    }

    /// Free-text place description suitable for a forward geocoder.
    pub fn place_query(&self) -> String {
        let state = self.selected_city.as_ref().and_then(|c| c.state_code.as_deref());
        [Some(self.city.trim()), state, Some(self.country.trim())]
            .into_iter()
            .flatten()
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(", ")
    }

    /// Human label used in "Weather for: ..." headings.
    pub fn label(&self) -> String {
        match (self.city.trim(), self.country.trim()) {
            ("", country) => country.to_string(),
            (city, "") => city.to_string(),
            (city, country) => format!("{city}, {country}"),
        }
    }

    fn clear_city(&mut self) {
        self.city.clear();
        self.selected_city = None;
    }
}

/// A forecast snapshot at `offset_hours` from now.
///
/// Metric fields are only present when the server supplied them natively.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastInterval {
    pub offset_hours: u32,
    pub temperature_f: f64,
    pub dewpoint_f: f64,
    pub wind_mph: f64,
    pub hfi: f64,
    pub temperature_c: Option<f64>,
    pub dewpoint_c: Option<f64>,
    pub wind_kph: Option<f64>,
}

/// Aggregate over the analyzed intervals, used for the compact view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSummary {
    pub average_hfi: f64,
    pub average_wind_mph: f64,
    pub high_temperature_f: f64,
    pub intervals_analyzed: u32,
}

impl ForecastSummary {
    /// Derives a summary from raw intervals. `None` for an empty slice.
    pub fn from_intervals(intervals: &[ForecastInterval]) -> Option<Self> {
        if intervals.is_empty() {
            return None;
        }

        let n = intervals.len() as f64;
        let average_hfi = intervals.iter().map(|i| i.hfi).sum::<f64>() / n;
        let average_wind_mph = intervals.iter().map(|i| i.wind_mph).sum::<f64>() / n;
        let high_temperature_f =
            intervals.iter().map(|i| i.temperature_f).fold(f64::NEG_INFINITY, f64::max);

        Some(Self {
            average_hfi,
            average_wind_mph,
            high_temperature_f,
            intervals_analyzed: intervals.len() as u32,
        })
    }
}

/// Detailed forecast for one geohash.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastSet {
    pub geohash: Geohash,
    pub fetched_at: DateTime<Utc>,
    pub intervals: Vec<ForecastInterval>,
}

/// Lifecycle of one asynchronous operation.
///
/// Always replaced wholesale; entering `Pending` drops any earlier payload.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(tag = "state", content = "value", rename_all = "snake_case")]
pub enum RequestState<T> {
    #[default]
    Idle,
    Pending,
    Done(T),
    Failed(Failure),
}

impl<T> RequestState<T> {
    pub fn is_pending(&self) -> bool {
        matches!(self, RequestState::Pending)
    }

    pub fn is_settled(&self) -> bool {
        matches!(self, RequestState::Done(_) | RequestState::Failed(_))
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            RequestState::Done(v) => Some(v),
            _ => None,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        match self {
            RequestState::Failed(f) => Some(f),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn country(id: &str, name: &str) -> Suggestion {
        Suggestion::new(id, name)
    }

    #[test]
    fn blank_geohash_is_rejected() {
        assert!(Geohash::new("").is_none());
        assert!(Geohash::new("   ").is_none());
        assert_eq!(Geohash::new("dr5r").map(|g| g.to_string()), Some("dr5r".to_string()));
    }

    #[test]
    fn editing_country_text_clears_id_and_city() {
        let mut input = ManualLocationInput::default();
        input.select_country(&country("39", "Canada"));
        input.set_city_text("Tor");

        assert!(!input.set_country_text("Canada"));
        assert_eq!(input.country_id(), Some("39"));
        assert_eq!(input.city(), "Tor");

        assert!(input.set_country_text("Canad"));
        assert_eq!(input.country_id(), None);
        assert_eq!(input.city(), "");
    }

    #[test]
    fn selecting_country_resets_city() {
        let mut input = ManualLocationInput::default();
        input.select_country(&country("39", "Canada"));
        input.select_city(&Suggestion::new("1", "Toronto"));
        input.select_country(&country("233", "United States"));

        assert_eq!(input.city(), "");
        assert!(input.selected_city().is_none());
        assert_eq!(input.country(), "United States");
    }

    #[test]
    fn place_query_includes_state_code() {
        let mut input = ManualLocationInput::default();
        input.select_country(&country("233", "United States"));
        let mut city = Suggestion::new("7", "Portland");
        city.state_code = Some("OR".into());
        input.select_city(&city);

        assert_eq!(input.place_query(), "Portland, OR, United States");
        assert_eq!(input.label(), "Portland, United States");
    }

    #[test]
    fn summary_from_intervals() {
        let mk = |offset, t, w, hfi| ForecastInterval {
            offset_hours: offset,
            temperature_f: t,
            dewpoint_f: 40.0,
            wind_mph: w,
            hfi,
            temperature_c: None,
            dewpoint_c: None,
            wind_kph: None,
        };
        let summary =
            ForecastSummary::from_intervals(&[mk(0, 60.0, 4.0, 6.0), mk(6, 70.0, 8.0, 9.0)])
                .expect("non-empty");

        assert_eq!(summary.average_hfi, 7.5);
        assert_eq!(summary.average_wind_mph, 6.0);
        assert_eq!(summary.high_temperature_f, 70.0);
        assert_eq!(summary.intervals_analyzed, 2);
        assert!(ForecastSummary::from_intervals(&[]).is_none());
    }

    #[test]
    fn request_state_accessors() {
        let state: RequestState<u8> = RequestState::Done(3);
        assert_eq!(state.value(), Some(&3));
        assert!(state.is_settled());
        assert!(RequestState::<u8>::Pending.is_pending());
        assert!(!RequestState::<u8>::Idle.is_settled());
    }
}
