//! Manual location entry: country and city autocomplete feeding a geocoder.

use std::sync::Arc;
use tracing::{debug, info};

use crate::{
    autocomplete::{AutocompleteController, AutocompleteSettings},
    error::{ErrorKind, Failure},
    model::{Coordinate, ManualLocationInput, Suggestion},
    service::{GeoDirectory, Geocoder},
};

/// The manual-entry form: typed text plus the two suggestion lists.
#[derive(Debug)]
pub struct ManualEntry {
    input: ManualLocationInput,
    country: AutocompleteController,
    city: AutocompleteController,
}

impl ManualEntry {
    pub fn new(directory: Arc<dyn GeoDirectory>, settings: AutocompleteSettings) -> Self {
        Self {
            input: ManualLocationInput::default(),
            country: AutocompleteController::countries(Arc::clone(&directory), settings),
            city: AutocompleteController::cities(directory, settings),
        }
    }

    pub fn input(&self) -> &ManualLocationInput {
        &self.input
    }

    pub fn country_field(&self) -> &AutocompleteController {
        &self.country
    }

    pub fn city_field(&self) -> &AutocompleteController {
        &self.city
    }

    pub fn type_country(&mut self, text: &str) {
        if self.input.set_country_text(text) {
            self.city.set_scope(None);
        }
        self.country.on_input_change(text);
    }

    pub fn select_country(&mut self, suggestion: &Suggestion) {
        self.input.select_country(suggestion);
        self.country.select(suggestion);
        self.city.set_scope(Some(suggestion.id.clone()));
    }

    pub fn type_city(&mut self, text: &str) {
        self.input.set_city_text(text);
        self.city.on_input_change(text);
    }

    pub fn select_city(&mut self, suggestion: &Suggestion) {
        self.input.select_city(suggestion);
        self.city.select(suggestion);
    }

    pub async fn country_suggestions(&self) -> Vec<Suggestion> {
        self.country.settled().await
    }

    pub async fn city_suggestions(&self) -> Vec<Suggestion> {
        self.city.settled().await
    }
}

/// Turns a manual submission into a coordinate.
///
/// Coordinates attached to the chosen city are used as-is; otherwise the
/// place text is forward-geocoded. Nothing is ever substituted for a place
/// that cannot be found.
pub async fn locate(input: &ManualLocationInput, geocoder: &dyn Geocoder) -> Result<Coordinate, Failure> {
    if input.city().trim().is_empty() {
        return Err(Failure::new(ErrorKind::LookupEmpty, "Enter a city to look up."));
    }

    if let Some(coord) = input.selected_city().and_then(|c| c.coordinate) {
        debug!(%coord, "using coordinates from city suggestion");
        return Ok(coord);
    }

    let place = input.place_query();
    match geocoder.geocode(&place).await {
        Ok(Some(coord)) => {
            info!(%place, %coord, "manual location geocoded");
            Ok(coord)
        }
        Ok(None) => Err(Failure::new(
            ErrorKind::LookupEmpty,
            format!("Could not find '{place}'. Check the spelling or pick a suggestion."),
        )),
        Err(err) => Err(Failure::lookup_failed(&err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use async_trait::async_trait;
    use parking_lot::Mutex;

    #[derive(Debug, Default)]
    struct FakeGeocoder {
        asked: Mutex<Vec<String>>,
        answer: Option<Coordinate>,
        fail: bool,
    }

    #[async_trait]
    impl Geocoder for FakeGeocoder {
        async fn geocode(&self, place: &str) -> Result<Option<Coordinate>, ApiError> {
            self.asked.lock().push(place.to_string());
            if self.fail {
                return Err(ApiError::shape("http://geo/search", "down"));
            }
            Ok(self.answer)
        }
    }

    #[derive(Debug)]
    struct Directory;

    #[async_trait]
    impl GeoDirectory for Directory {
        async fn countries(&self, query: &str) -> Result<Vec<Suggestion>, ApiError> {
            Ok(vec![Suggestion::new("39", format!("{query}ada"))])
        }

        async fn cities(&self, country_id: &str, _query: &str) -> Result<Vec<Suggestion>, ApiError> {
            let mut city = Suggestion::new(format!("{country_id}-1"), "Toronto");
            city.state_code = Some("ON".into());
            Ok(vec![city])
        }
    }

    fn input_with_city(city: Suggestion) -> ManualLocationInput {
        let mut input = ManualLocationInput::default();
        input.select_country(&Suggestion::new("39", "Canada"));
        input.select_city(&city);
        input
    }

    #[tokio::test]
    async fn suggestion_coordinates_skip_geocoding() {
        let mut city = Suggestion::new("1", "Toronto");
        city.coordinate = Some(Coordinate::new(43.65, -79.38));
        let geocoder = FakeGeocoder::default();

        let got = locate(&input_with_city(city), &geocoder).await.expect("located");
        assert_eq!(got, Coordinate::new(43.65, -79.38));
        assert!(geocoder.asked.lock().is_empty());
    }

    #[tokio::test]
    async fn falls_back_to_geocoder() {
        let geocoder = FakeGeocoder { answer: Some(Coordinate::new(1.0, 2.0)), ..Default::default() };

        let got = locate(&input_with_city(Suggestion::new("1", "Toronto")), &geocoder).await;
        assert_eq!(got, Ok(Coordinate::new(1.0, 2.0)));
        assert_eq!(geocoder.asked.lock().as_slice(), ["Toronto, Canada"]);
    }

    #[tokio::test]
    async fn unknown_place_is_lookup_empty() {
        let geocoder = FakeGeocoder::default();
        let err = locate(&input_with_city(Suggestion::new("1", "Nowhere")), &geocoder).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::LookupEmpty);
    }

    #[tokio::test]
    async fn geocoder_outage_is_lookup_failed() {
        let geocoder = FakeGeocoder { fail: true, ..Default::default() };
        let err = locate(&input_with_city(Suggestion::new("1", "Toronto")), &geocoder).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::LookupFailed);
    }

    #[tokio::test]
    async fn empty_city_is_rejected_without_geocoding() {
        let geocoder = FakeGeocoder::default();
        let err = locate(&ManualLocationInput::default(), &geocoder).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::LookupEmpty);
        assert!(geocoder.asked.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn form_scopes_cities_to_selected_country() {
        let mut entry = ManualEntry::new(Arc::new(Directory), AutocompleteSettings::default());

        entry.type_city("Tor");
        assert!(entry.city_suggestions().await.is_empty());

        entry.type_country("Can");
        let countries = entry.country_suggestions().await;
        entry.select_country(&countries[0]);
        assert_eq!(entry.input().country_id(), Some("39"));
        assert_eq!(entry.country_field().text(), "Canada");

        entry.type_city("Tor");
        let cities = entry.city_suggestions().await;
        entry.select_city(&cities[0]);
        assert_eq!(entry.input().place_query(), "Toronto, ON, Canada");

        entry.type_country("Can");
        assert_eq!(entry.input().country_id(), None);
        assert_eq!(entry.input().city(), "");
        assert_eq!(entry.city_field().text(), "");
    }

    #[tokio::test(start_paused = true)]
    async fn reselecting_country_discards_typed_city() {
        let mut entry = ManualEntry::new(Arc::new(Directory), AutocompleteSettings::default());
        let canada = Suggestion::new("39", "Canada");

        entry.select_country(&canada);
        entry.type_city("Tor");
        entry.select_country(&canada);

        assert!(entry.city_suggestions().await.is_empty());
        tokio::time::sleep(std::time::Duration::from_secs(1)).await;

        assert_eq!(entry.input().city(), "");
        assert_eq!(entry.city_field().text(), "");
        assert!(!entry.city_field().is_open());
        assert_eq!(entry.input().country_id(), Some("39"));
    }
}
