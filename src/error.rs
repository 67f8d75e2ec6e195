//! Error taxonomy for the tracking engine
//!
//! Computation errors are converted into explicit status markers at each
//! component boundary (see [`crate::snapshot`]); nothing here is allowed to
//! terminate the tick loop.

use thiserror::Error;

/// Failures raised by an ephemeris provider or its loader.
#[derive(Debug, Error)]
pub enum EphemerisError {
    #[error("ephemeris provider is not loaded")]
    NotLoaded,
    #[error("failed to load ephemeris kernel '{path}': {reason}")]
    Load { path: String, reason: String },
    #[error("failed to download ephemeris kernel from {url}: {reason}")]
    Download { url: String, reason: String },
    #[error("ephemeris computation failed for {body}: {reason}")]
    Compute { body: &'static str, reason: String },
    #[error("ephemeris returned a non-physical state for {body}")]
    NonPhysical { body: &'static str },
}

/// Reasons a quantity could not be produced for the current tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum StatusError {
    /// Ephemeris provider not loaded or failed its validation probe.
    #[error("ephemeris provider unavailable")]
    ProviderUnavailable,
    /// The discrete-event search window produced zero transitions.
    #[error("no events found in search window")]
    NoEventsFound,
    /// The search could not run with its parameters.
    #[error("event search failed")]
    SearchFailed,
}

/// Failures of a bounded-window event search.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("search window is empty or reversed")]
    InvalidWindow,
    #[error("search step and resolution must be positive")]
    InvalidStep,
    #[error("search would evaluate about {expected} samples (max: {max}); use a larger step")]
    TooManySamples { expected: i64, max: i64 },
    #[error(transparent)]
    Ephemeris(#[from] EphemerisError),
}

impl SearchError {
    /// Collapse to the status shown to the user.
    pub fn status(&self) -> StatusError {
        match self {
            Self::Ephemeris(_) => StatusError::ProviderUnavailable,
            Self::InvalidWindow | Self::InvalidStep | Self::TooManySamples { .. } => {
                StatusError::SearchFailed
            }
        }
    }
}

/// Geolocation and observer-location failures.
#[derive(Debug, Error)]
pub enum LocationError {
    #[error("latitude {0} is outside [-90, 90]")]
    InvalidLatitude(f64),
    #[error("longitude {0} is outside [-180, 180]")]
    InvalidLongitude(f64),
    #[error("geolocation service '{service}' failed: {reason}")]
    Service { service: String, reason: String },
    #[error("network is offline")]
    Offline,
    #[error("no location source produced a result")]
    LocationUnavailable,
    #[error("location lookup timed out after {0:?}")]
    TimedOut(std::time::Duration),
    #[error("location store error: {0}")]
    Store(String),
}

impl LocationError {
    /// Transient I/O failures are retried on the next refresh cadence.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Service { .. } | Self::Offline | Self::TimedOut(_) | Self::Store(_)
        )
    }
}

/// Configuration loading and validation failures.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid value for {key}: '{value}'")]
    InvalidOverride { key: String, value: String },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(LocationError::Offline.is_transient());
        assert!(LocationError::TimedOut(std::time::Duration::from_secs(3)).is_transient());
        assert!(!LocationError::InvalidLatitude(91.0).is_transient());
        assert!(!LocationError::LocationUnavailable.is_transient());
    }

    #[test]
    fn search_errors_keep_their_meaning() {
        assert_eq!(
            SearchError::TooManySamples {
                expected: 1_200_001,
                max: 200_000
            }
            .status(),
            StatusError::SearchFailed
        );
        assert_eq!(SearchError::InvalidWindow.status(), StatusError::SearchFailed);
        assert_eq!(
            SearchError::Ephemeris(EphemerisError::NotLoaded).status(),
            StatusError::ProviderUnavailable
        );
    }
}
