//! Acquiring the user's current position.
//!
//! A terminal has no device location API, so the production source is IP
//! geolocation. Any other source can be plugged in through [`PositionSource`].

use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::{
    fmt::Debug,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tracing::{debug, info, warn};

use crate::{
    error::{ApiError, ErrorKind, Failure},
    model::{Coordinate, RequestState},
    service::http_client,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GeolocationError {
    #[error("geolocation is not supported")]
    Unsupported,
    #[error("location permission denied")]
    PermissionDenied,
    #[error("position unavailable: {0}")]
    PositionUnavailable(String),
    #[error("location request timed out")]
    Timeout,
}

impl GeolocationError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            GeolocationError::Unsupported => ErrorKind::GeolocationUnsupported,
            GeolocationError::PermissionDenied => ErrorKind::GeolocationDenied,
            GeolocationError::PositionUnavailable(_) => ErrorKind::GeolocationUnavailable,
            GeolocationError::Timeout => ErrorKind::GeolocationTimeout,
        }
    }

    /// Message for display. `secure` only matters for a denied permission.
    pub fn user_message(&self, secure: bool) -> String {
        match self {
            GeolocationError::Unsupported => {
                "Geolocation is not supported here. Enter your location with `hfi manual` instead."
                    .to_string()
            }
            GeolocationError::PermissionDenied => {
                let mut msg =
                    "Location access was denied. Allow location access and try again.".to_string();
                if !secure {
                    msg.push_str(
                        " Location services usually require a secure (https) connection; \
                         check `endpoints.geolocation_url` in your config.",
                    );
                }
                msg
            }
            GeolocationError::PositionUnavailable(_) => {
                "Your location could not be determined. Try again, or enter it manually.".to_string()
            }
            GeolocationError::Timeout => {
                "Timed out while determining your location. Try again, or enter it manually."
                    .to_string()
            }
        }
    }

    pub fn to_failure(&self, secure: bool) -> Failure {
        Failure::new(self.kind(), self.user_message(secure))
    }
}

#[async_trait]
pub trait PositionSource: Send + Sync + Debug {
    async fn current_position(&self) -> Result<Coordinate, GeolocationError>;

    /// Whether positions are obtained over a secure transport.
    fn is_secure(&self) -> bool {
        true
    }
}

/// Approximate position from the caller's public IP address.
#[derive(Debug, Clone)]
pub struct IpPositionSource {
    url: String,
    http: Client,
}

impl IpPositionSource {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        Ok(Self { url: url.into(), http: http_client(timeout)? })
    }
}

#[derive(Debug, Deserialize)]
struct IpLookup {
    latitude: Option<f64>,
    longitude: Option<f64>,
    #[serde(default)]
    city: Option<String>,
}

#[async_trait]
impl PositionSource for IpPositionSource {
    async fn current_position(&self) -> Result<Coordinate, GeolocationError> {
        debug!(url = %self.url, "requesting IP geolocation");

        let res = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| GeolocationError::PositionUnavailable(e.to_string()))?;

        let status = res.status();
        if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Err(GeolocationError::PermissionDenied);
        }
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(GeolocationError::PositionUnavailable("rate limited by geolocation service".into()));
        }
        if !status.is_success() {
            return Err(GeolocationError::PositionUnavailable(format!("status {status}")));
        }

        let body: IpLookup = res
            .json()
            .await
            .map_err(|e| GeolocationError::PositionUnavailable(e.to_string()))?;

        match (body.latitude, body.longitude) {
            (Some(lat), Some(lon)) => {
                debug!(lat, lon, city = ?body.city, "IP geolocation resolved");
                Ok(Coordinate::new(lat, lon))
            }
            _ => Err(GeolocationError::PositionUnavailable(
                "response did not include coordinates".to_string(),
            )),
        }
    }

    fn is_secure(&self) -> bool {
        self.url.starts_with("https://")
    }
}

/// A position known up front, e.g. from command-line arguments.
#[derive(Debug, Clone, Copy)]
pub struct FixedPosition(pub Coordinate);

#[async_trait]
impl PositionSource for FixedPosition {
    async fn current_position(&self) -> Result<Coordinate, GeolocationError> {
        Ok(self.0)
    }
}

/// Stand-in when no position source is available at all.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPositionSource;

#[async_trait]
impl PositionSource for NoPositionSource {
    async fn current_position(&self) -> Result<Coordinate, GeolocationError> {
        Err(GeolocationError::Unsupported)
    }
}

/// Single-flight wrapper around a [`PositionSource`] with a hard timeout.
#[derive(Debug)]
pub struct Geolocator {
    source: Arc<dyn PositionSource>,
    timeout: Duration,
    in_flight: AtomicBool,
    state: Mutex<RequestState<Coordinate>>,
}

/// Clears the in-flight flag even if the acquiring future is dropped.
struct FlightGuard<'a>(&'a AtomicBool);

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl Geolocator {
    pub fn new(source: Arc<dyn PositionSource>, timeout: Duration) -> Self {
        Self {
            source,
            timeout,
            in_flight: AtomicBool::new(false),
            state: Mutex::new(RequestState::Idle),
        }
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub fn state(&self) -> RequestState<Coordinate> {
        self.state.lock().clone()
    }

    /// Queries the source once. Returns `None` without doing anything if an
    /// acquisition is already in flight.
    pub async fn acquire(&self) -> Option<Result<Coordinate, GeolocationError>> {
        if self.in_flight.swap(true, Ordering::AcqRel) {
            debug!("geolocation already in flight; ignoring request");
            return None;
        }
        let _guard = FlightGuard(&self.in_flight);

        *self.state.lock() = RequestState::Pending;

        let result = match tokio::time::timeout(self.timeout, self.source.current_position()).await {
            Ok(result) => result,
            Err(_) => Err(GeolocationError::Timeout),
        };

        *self.state.lock() = match &result {
            Ok(coord) => {
                info!(lat = coord.latitude, lon = coord.longitude, "location acquired");
                RequestState::Done(*coord)
            }
            Err(err) => {
                warn!(error = %err, "location acquisition failed");
                RequestState::Failed(err.to_failure(self.source.is_secure()))
            }
        };

        Some(result)
    }

    pub fn is_secure(&self) -> bool {
        self.source.is_secure()
    }
}
