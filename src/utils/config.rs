//! Physical constants, default data paths and engine configuration
//!
//! Configuration is read from an optional JSON file, then `.env` and
//! `MOONWATCH_*` environment variables override individual fields.

use std::path::{Path, PathBuf};

use chrono::Duration;
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::events::SearchParams;
use crate::location::ObserverLocation;

/// WGS84 equatorial radius (km)
pub const EARTH_RADIUS_KM: f64 = 6378.137;
/// WGS84 flattening
pub const EARTH_FLATTENING: f64 = 1.0 / 298.257_223_563;
/// IAU 2015 nominal solar radius (km)
pub const SUN_RADIUS_KM: f64 = 696_000.0;
/// Mean lunar radius (km)
pub const MOON_RADIUS_KM: f64 = 1737.4;
pub const AU_TO_KM: f64 = 149_597_870.7;
pub const TT_TAI_SECONDS: f64 = 32.184;
pub const SECONDS_PER_DAY: f64 = 86_400.0;
pub const JD_J2000: f64 = 2_451_545.0;
pub const DAYS_PER_JULIAN_CENTURY: f64 = 36_525.0;

/// Mean synodic month (days)
pub const SYNODIC_MONTH_DAYS: f64 = 29.530_588_770_576;
/// Julian Day of the new moon used as phase origin (2000-01-06 14:24 UTC)
pub const REFERENCE_NEW_MOON_JD: f64 = 2_451_550.1;

/// Atmospheric enlargement of Earth's shadow (Danjon)
pub const DANJON_ENLARGEMENT: f64 = 1.02;

/// Upper bound on samples a single discrete-event search may evaluate
pub const MAX_SEARCH_SAMPLES: i64 = 200_000;

pub const DE440S_URL: &str =
    "https://naif.jpl.nasa.gov/pub/naif/generic_kernels/spk/planets/de440s.bsp";

pub static CACHE_DIR: Lazy<PathBuf> = Lazy::new(|| {
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("moonwatch")
});

pub static DEFAULT_DE440S_PATH: Lazy<PathBuf> = Lazy::new(|| CACHE_DIR.join("de440s.bsp"));

pub static DEFAULT_LOCATION_STORE_PATH: Lazy<PathBuf> =
    Lazy::new(|| CACHE_DIR.join("last_location.json"));

/// Which ephemeris implementation the initializer loads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EphemerisSource {
    /// JPL SPK kernel (DE440s) read through ANISE
    Spk,
    /// Built-in analytic lunar/solar series
    Series,
}

impl std::str::FromStr for EphemerisSource {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spk" => Ok(Self::Spk),
            "series" => Ok(Self::Series),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EphemerisConfig {
    pub source: EphemerisSource,
    /// Kernel location; defaults to `DEFAULT_DE440S_PATH`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kernel_path: Option<PathBuf>,
    pub download_if_missing: bool,
    pub kernel_url: String,
    /// Minimum pause between load attempts after a failure
    pub retry_secs: u64,
}

impl Default for EphemerisConfig {
    fn default() -> Self {
        Self {
            source: EphemerisSource::Spk,
            kernel_path: None,
            download_if_missing: true,
            kernel_url: DE440S_URL.to_string(),
            retry_secs: 30,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeolocationConfig {
    /// Disable to pin the observer to `default_location`
    pub enabled: bool,
    /// Public-IP echo services, tried in order
    pub ip_services: Vec<String>,
    /// IP lookup endpoint; `{ip}` is substituted
    pub lookup_url: String,
    /// Second lookup endpoint tried when the first fails
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secondary_lookup_url: Option<String>,
    /// host:port probed to decide online/offline
    pub probe_addr: String,
    /// Connect timeout of the reachability probe; below `location_timeout_secs`
    /// so an unreachable network still leaves time for the last-known fallback
    pub probe_timeout_secs: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub store_path: Option<PathBuf>,
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ip_services: vec![
                "https://api.ipify.org".to_string(),
                "https://ident.me".to_string(),
                "https://checkip.amazonaws.com".to_string(),
            ],
            lookup_url: "https://ipapi.co/{ip}/json/".to_string(),
            secondary_lookup_url: Some("http://ip-api.com/json/{ip}".to_string()),
            probe_addr: "1.1.1.1:53".to_string(),
            probe_timeout_secs: 2,
            store_path: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub tick_secs: u64,
    pub location_refresh_secs: i64,
    pub event_refresh_secs: i64,
    pub eclipse_refresh_secs: i64,
    pub rise_set_window_hours: i64,
    pub rise_set_step_secs: i64,
    pub eclipse_window_days: i64,
    pub eclipse_step_secs: i64,
    /// Bisection target for every event boundary
    pub search_resolution_secs: i64,
    /// Altitude threshold (deg) separating "up" from "down"
    pub horizon_deg: f64,
    pub location_timeout_secs: u64,
    /// Observer used when every location source fails
    pub default_location: ObserverLocation,
    pub ephemeris: EphemerisConfig,
    pub geolocation: GeolocationConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_secs: 1,
            location_refresh_secs: 10,
            event_refresh_secs: 60,
            eclipse_refresh_secs: 6 * 3600,
            rise_set_window_hours: 72,
            rise_set_step_secs: 300,
            eclipse_window_days: 7,
            eclipse_step_secs: 600,
            search_resolution_secs: 30,
            horizon_deg: 0.0,
            location_timeout_secs: 5,
            default_location: ObserverLocation::fallback(),
            ephemeris: EphemerisConfig::default(),
            geolocation: GeolocationConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Read configuration from a JSON file; missing fields take defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Full load: optional file, then `.env`, then process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Ok(env_file) = dotenvy::dotenv() {
            debug!("loaded environment overrides from {}", env_file.display());
        }

        let mut config = match path {
            Some(p) => {
                info!("reading configuration from {}", p.display());
                Self::from_file(p)?
            }
            None => Self::default(),
        };
        config.apply_overrides(
            std::env::vars().filter(|(key, _)| key.starts_with("MOONWATCH_")),
        )?;
        config.validate()?;
        Ok(config)
    }

    /// Apply `MOONWATCH_*` key/value overrides. Unknown keys are ignored.
    pub fn apply_overrides<I>(&mut self, vars: I) -> Result<(), ConfigError>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        fn parse<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
            value.trim().parse().map_err(|_| ConfigError::InvalidOverride {
                key: key.to_string(),
                value: value.to_string(),
            })
        }

        for (key, value) in vars {
            match key.as_str() {
                "MOONWATCH_TICK_SECS" => self.tick_secs = parse(&key, &value)?,
                "MOONWATCH_LOCATION_REFRESH_SECS" => {
                    self.location_refresh_secs = parse(&key, &value)?
                }
                "MOONWATCH_EVENT_REFRESH_SECS" => self.event_refresh_secs = parse(&key, &value)?,
                "MOONWATCH_ECLIPSE_REFRESH_SECS" => {
                    self.eclipse_refresh_secs = parse(&key, &value)?
                }
                "MOONWATCH_HORIZON_DEG" => self.horizon_deg = parse(&key, &value)?,
                "MOONWATCH_EPHEMERIS_SOURCE" => self.ephemeris.source = parse(&key, &value)?,
                "MOONWATCH_KERNEL_PATH" => {
                    self.ephemeris.kernel_path = Some(PathBuf::from(value.trim()))
                }
                "MOONWATCH_DOWNLOAD_KERNEL" => {
                    self.ephemeris.download_if_missing = parse(&key, &value)?
                }
                "MOONWATCH_GEOLOCATION" => self.geolocation.enabled = parse(&key, &value)?,
                _ => debug!("ignoring unknown override {key}"),
            }
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_secs == 0 {
            return Err(ConfigError::Invalid("tick_secs must be positive".into()));
        }
        for (name, value) in [
            ("location_refresh_secs", self.location_refresh_secs),
            ("event_refresh_secs", self.event_refresh_secs),
            ("eclipse_refresh_secs", self.eclipse_refresh_secs),
            ("rise_set_window_hours", self.rise_set_window_hours),
            ("rise_set_step_secs", self.rise_set_step_secs),
            ("eclipse_window_days", self.eclipse_window_days),
            ("eclipse_step_secs", self.eclipse_step_secs),
            ("search_resolution_secs", self.search_resolution_secs),
        ] {
            if value <= 0 {
                return Err(ConfigError::Invalid(format!("{name} must be positive")));
            }
        }
        if self.geolocation.probe_timeout_secs == 0
            || self.geolocation.probe_timeout_secs >= self.location_timeout_secs
        {
            return Err(ConfigError::Invalid(format!(
                "probe_timeout_secs ({}) must be positive and below location_timeout_secs ({})",
                self.geolocation.probe_timeout_secs, self.location_timeout_secs
            )));
        }
        if Duration::try_hours(self.rise_set_window_hours).is_none()
            || Duration::try_days(self.eclipse_window_days).is_none()
        {
            return Err(ConfigError::Invalid("search window out of range".into()));
        }
        if self.search_resolution_secs > 60 {
            return Err(ConfigError::Invalid(
                "search_resolution_secs must not exceed 60".into(),
            ));
        }
        if self.rise_set_step_secs < self.search_resolution_secs
            || self.eclipse_step_secs < self.search_resolution_secs
        {
            return Err(ConfigError::Invalid(
                "search steps must be at least the search resolution".into(),
            ));
        }
        for (name, window_secs, step_secs) in [
            (
                "rise/set",
                self.rise_set_window_hours.saturating_mul(3600),
                self.rise_set_step_secs,
            ),
            (
                "eclipse",
                self.eclipse_window_days.saturating_mul(86_400),
                self.eclipse_step_secs,
            ),
        ] {
            let samples = window_secs / step_secs + 2;
            if samples > MAX_SEARCH_SAMPLES {
                return Err(ConfigError::Invalid(format!(
                    "{name} search needs about {samples} samples (max: {MAX_SEARCH_SAMPLES})"
                )));
            }
        }
        if !self.horizon_deg.is_finite() || self.horizon_deg.abs() > 10.0 {
            return Err(ConfigError::Invalid(format!(
                "horizon_deg {} outside [-10, 10]",
                self.horizon_deg
            )));
        }
        Ok(())
    }

    pub fn tick_period(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.tick_secs)
    }

    pub fn ephemeris_retry_delay(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.ephemeris.retry_secs)
    }

    pub fn location_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.location_timeout_secs)
    }

    pub fn probe_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.geolocation.probe_timeout_secs)
    }

    pub fn rise_set_window(&self) -> Duration {
        Duration::hours(self.rise_set_window_hours)
    }

    pub fn eclipse_window(&self) -> Duration {
        Duration::days(self.eclipse_window_days)
    }

    pub fn search_resolution(&self) -> Duration {
        Duration::seconds(self.search_resolution_secs)
    }

    pub fn rise_set_search(&self) -> SearchParams {
        SearchParams {
            window: self.rise_set_window(),
            step: Duration::seconds(self.rise_set_step_secs),
            resolution: self.search_resolution(),
        }
    }

    pub fn eclipse_search(&self) -> SearchParams {
        SearchParams {
            window: self.eclipse_window(),
            step: Duration::seconds(self.eclipse_step_secs),
            resolution: self.search_resolution(),
        }
    }

    pub fn kernel_path(&self) -> PathBuf {
        self.ephemeris
            .kernel_path
            .clone()
            .unwrap_or_else(|| DEFAULT_DE440S_PATH.clone())
    }

    pub fn location_store_path(&self) -> PathBuf {
        self.geolocation
            .store_path
            .clone()
            .unwrap_or_else(|| DEFAULT_LOCATION_STORE_PATH.clone())
    }
}
