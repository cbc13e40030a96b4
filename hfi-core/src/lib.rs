//! Core library for the `hfi` CLI.
//!
//! This crate defines:
//! - Configuration handling
//! - HTTP wrappers over the nearby-lookup, forecast and directory services
//! - Position acquisition and manual-entry geocoding
//! - Debounced country/city autocomplete
//! - The coordinate → geohash → forecast resolution pipeline
//! - Unit conversion, HFI tiers and text rendering
//!
//! It is used by `hfi-cli`, but can also back other front ends.

pub mod autocomplete;
pub mod config;
pub mod error;
pub mod geolocation;
pub mod manual;
pub mod model;
pub mod present;
pub mod resolve;
pub mod service;

pub use autocomplete::{AutocompleteController, AutocompleteSettings, Field};
pub use config::Config;
pub use error::{ApiError, ErrorKind, Failure};
pub use geolocation::{GeolocationError, Geolocator, PositionSource};
pub use manual::ManualEntry;
pub use model::{
    Coordinate, ForecastInterval, ForecastSet, ForecastSummary, Geohash, ManualLocationInput,
    RequestState, Suggestion,
};
pub use present::{HfiTier, SortKey, TableOptions, Units};
pub use resolve::{Resolution, Resolver, Stage, View};
pub use service::{GeoDirectory, Geocoder, NearbyQuery, WeatherBackend};
