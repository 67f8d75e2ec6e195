//! Ephemeris providers
//!
//! A provider answers one question: where is a body, as seen from Earth's
//! centre, at a UTC instant. Topocentric observation is derived from that in
//! [`EphemerisProvider::observe`], so every source shares the same parallax
//! and frame handling.

pub mod ephemeris_common;
pub mod provider_handle;
pub mod series_ephemeris;
pub mod spk_ephemeris;

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::EphemerisError;
use crate::location::ObserverLocation;
use crate::utils::config::{EngineConfig, EphemerisSource};
use crate::utils::coordinates::{local_sidereal_deg, observer_geocentric_position};
use crate::utils::time_utils::to_astronomical_time;
use crate::utils::vector_math::{subtract, unit_vector_to_radec};

pub use provider_handle::{ProviderHandle, ProviderState};
pub use series_ephemeris::SeriesEphemeris;
pub use spk_ephemeris::SpkEphemeris;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Body {
    Sun,
    Moon,
    Earth,
}

impl Body {
    pub fn name(&self) -> &'static str {
        match self {
            Body::Sun => "Sun",
            Body::Moon => "Moon",
            Body::Earth => "Earth",
        }
    }
}

/// Apparent place of a body for one observer, equator and equinox of date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Observation {
    /// [0, 24)
    pub right_ascension_hours: f64,
    pub declination_deg: f64,
    pub distance_km: f64,
}

pub trait EphemerisProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Geocentric position in km, mean equator and equinox of date.
    fn geocentric(&self, body: Body, utc: &DateTime<Utc>) -> Result<[f64; 3], EphemerisError>;

    /// Topocentric RA/Dec/distance for a sea-level observer.
    fn observe(
        &self,
        body: Body,
        utc: &DateTime<Utc>,
        observer: &ObserverLocation,
    ) -> Result<Observation, EphemerisError> {
        let geocentric = self.geocentric(body, utc)?;
        let lst = local_sidereal_deg(&to_astronomical_time(utc), observer.longitude());
        let site = observer_geocentric_position(observer.latitude(), lst);
        let (ra_deg, dec_deg, distance_km) = unit_vector_to_radec(&subtract(&geocentric, &site));

        if !(distance_km.is_finite() && distance_km > 0.0 && dec_deg.is_finite()) {
            return Err(EphemerisError::NonPhysical { body: body.name() });
        }
        let ra_hours = ra_deg / 15.0;
        Ok(Observation {
            right_ascension_hours: if ra_hours >= 24.0 { 0.0 } else { ra_hours },
            declination_deg: dec_deg,
            distance_km,
        })
    }
}

/// Builds a provider. Called only by the initializer task.
pub trait EphemerisLoader: Send + Sync {
    fn load(&self, path_hint: Option<&Path>) -> Result<Arc<dyn EphemerisProvider>, EphemerisError>;
}

/// Loader driven by [`EngineConfig`]: SPK kernel or the analytic series.
pub struct ConfiguredLoader {
    source: EphemerisSource,
    default_path: std::path::PathBuf,
    download_if_missing: bool,
    kernel_url: String,
}

impl ConfiguredLoader {
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            source: config.ephemeris.source,
            default_path: config.kernel_path(),
            download_if_missing: config.ephemeris.download_if_missing,
            kernel_url: config.ephemeris.kernel_url.clone(),
        }
    }
}

impl EphemerisLoader for ConfiguredLoader {
    fn load(&self, path_hint: Option<&Path>) -> Result<Arc<dyn EphemerisProvider>, EphemerisError> {
        match self.source {
            EphemerisSource::Series => Ok(Arc::new(SeriesEphemeris::new())),
            EphemerisSource::Spk => {
                let path = path_hint.unwrap_or(&self.default_path);
                if !path.exists() {
                    if !self.download_if_missing {
                        return Err(EphemerisError::Load {
                            path: path.display().to_string(),
                            reason: "kernel file not found and download disabled".into(),
                        });
                    }
                    spk_ephemeris::download_kernel(&self.kernel_url, path)?;
                }
                Ok(Arc::new(SpkEphemeris::load(path)?))
            }
        }
    }
}
