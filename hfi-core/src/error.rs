use reqwest::StatusCode;
use serde::Serialize;
use std::fmt;

/// Every way a location or forecast request can end without a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    GeolocationUnsupported,
    GeolocationDenied,
    GeolocationUnavailable,
    GeolocationTimeout,
    LookupFailed,
    LookupEmpty,
    ForecastFailed,
    AutocompleteFailed,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::GeolocationUnsupported => "geolocation_unsupported",
            ErrorKind::GeolocationDenied => "geolocation_denied",
            ErrorKind::GeolocationUnavailable => "geolocation_unavailable",
            ErrorKind::GeolocationTimeout => "geolocation_timeout",
            ErrorKind::LookupFailed => "lookup_failed",
            ErrorKind::LookupEmpty => "lookup_empty",
            ErrorKind::ForecastFailed => "forecast_failed",
            ErrorKind::AutocompleteFailed => "autocomplete_failed",
        }
    }

    pub const fn all() -> &'static [ErrorKind] {
        &[
            ErrorKind::GeolocationUnsupported,
            ErrorKind::GeolocationDenied,
            ErrorKind::GeolocationUnavailable,
            ErrorKind::GeolocationTimeout,
            ErrorKind::LookupFailed,
            ErrorKind::LookupEmpty,
            ErrorKind::ForecastFailed,
            ErrorKind::AutocompleteFailed,
        ]
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A classified, user-facing failure. This is what request states carry.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct Failure {
    pub kind: ErrorKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into() }
    }

    pub fn lookup_failed(err: &ApiError) -> Self {
        Self::new(ErrorKind::LookupFailed, format!("Failed to fetch weather data: {err}"))
    }

    pub fn lookup_empty() -> Self {
        Self::new(
            ErrorKind::LookupEmpty,
            "No forecast location was found near this position. Try entering a nearby city manually.",
        )
    }

    pub fn forecast_failed(err: &ApiError) -> Self {
        Self::new(ErrorKind::ForecastFailed, format!("Failed to fetch forecast: {err}"))
    }
}

/// Errors produced by the HTTP service wrappers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned status {status}: {body}")]
    Status { url: String, status: StatusCode, body: String },

    #[error("failed to parse response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("unexpected response from {url}: {detail}")]
    Shape { url: String, detail: String },
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub(crate) fn shape(url: &str, detail: impl Into<String>) -> Self {
        ApiError::Shape { url: url.to_string(), detail: detail.into() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_codes_are_unique_snake_case() {
        let mut codes: Vec<_> = ErrorKind::all().iter().map(|k| k.as_str()).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), ErrorKind::all().len());
        assert!(codes.iter().all(|c| c.chars().all(|ch| ch.is_ascii_lowercase() || ch == '_')));
    }

    #[test]
    fn kind_serializes_as_code() {
        let json = serde_json::to_string(&ErrorKind::LookupEmpty).expect("serialize");
        assert_eq!(json, "\"lookup_empty\"");
    }

    #[test]
    fn failure_messages_name_the_stage() {
        let err = ApiError::shape("http://x/nearby", "boom");
        assert!(Failure::lookup_failed(&err).message.starts_with("Failed to fetch weather data"));
        assert!(Failure::forecast_failed(&err).message.starts_with("Failed to fetch forecast"));
        assert_eq!(Failure::lookup_empty().kind, ErrorKind::LookupEmpty);
    }
}
