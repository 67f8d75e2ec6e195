//! Observer location and the collaborators that produce it
//!
//! The engine only ever sees an [`ObserverLocation`]. Where it comes from is
//! the business of [`LocationService`], which walks a fixed fallback chain:
//! primary geolocator, secondary geolocator, last persisted location, then
//! the configured default. Every step is logged with its outcome.

pub mod ip_lookup;
pub mod reachability;
pub mod store;

use chrono::{DateTime, FixedOffset, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::LocationError;

pub use ip_lookup::IpGeolocator;
pub use reachability::TcpReachability;
pub use store::JsonLocationStore;

/// Coordinate change (degrees) beyond which two locations differ materially
pub const MATERIAL_CHANGE_DEG: f64 = 0.01;
/// Float slack so a decimal difference of exactly 0.01° is not material
const THRESHOLD_SLACK_DEG: f64 = 1e-9;

/// Geographic observer position with its IANA timezone.
///
/// Fields are validated on construction and on deserialisation; a value is
/// never mutated, only replaced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawLocation")]
pub struct ObserverLocation {
    name: String,
    latitude: f64,
    longitude: f64,
    timezone: String,
}

#[derive(Deserialize)]
struct RawLocation {
    name: String,
    latitude: f64,
    longitude: f64,
    timezone: String,
}

impl TryFrom<RawLocation> for ObserverLocation {
    type Error = LocationError;

    fn try_from(raw: RawLocation) -> Result<Self, Self::Error> {
        Self::new(raw.name, raw.latitude, raw.longitude, raw.timezone)
    }
}

impl ObserverLocation {
    pub fn new(
        name: impl Into<String>,
        latitude: f64,
        longitude: f64,
        timezone: impl Into<String>,
    ) -> Result<Self, LocationError> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(LocationError::InvalidLatitude(latitude));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(LocationError::InvalidLongitude(longitude));
        }
        Ok(Self {
            name: name.into(),
            latitude,
            longitude,
            timezone: timezone.into(),
        })
    }

    /// Documented default used when no source yields a location: Shanghai.
    pub fn fallback() -> Self {
        Self {
            name: "Shanghai".to_string(),
            latitude: 31.2304,
            longitude: 121.4737,
            timezone: "Asia/Shanghai".to_string(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    pub fn timezone(&self) -> &str {
        &self.timezone
    }

    /// Parsed IANA zone, `None` if the identifier is unknown
    pub fn tz(&self) -> Option<Tz> {
        self.timezone.parse().ok()
    }

    /// True when latitude or longitude moved by more than
    /// [`MATERIAL_CHANGE_DEG`], or the timezone identifier changed.
    pub fn is_materially_different(&self, other: &ObserverLocation) -> bool {
        let limit = MATERIAL_CHANGE_DEG + THRESHOLD_SLACK_DEG;
        (self.latitude - other.latitude).abs() > limit
            || (self.longitude - other.longitude).abs() > limit
            || self.timezone != other.timezone
    }

    /// Wall-clock time at this location. Unknown zones fall back to UTC.
    pub fn local_time(&self, utc: &DateTime<Utc>) -> DateTime<FixedOffset> {
        match self.tz() {
            Some(tz) => utc.with_timezone(&tz).fixed_offset(),
            None => {
                warn!(
                    "unknown timezone '{}', showing local time in UTC",
                    self.timezone
                );
                utc.fixed_offset()
            }
        }
    }
}

impl std::fmt::Display for ObserverLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({:.4}°, {:.4}°, {})",
            self.name, self.latitude, self.longitude, self.timezone
        )
    }
}

/// A source that resolves the observer's current position.
pub trait Geolocator: Send + Sync {
    fn name(&self) -> &str;
    fn resolve(&self) -> Result<ObserverLocation, LocationError>;
}

/// Persistence for the last successfully resolved location.
pub trait LocationStore: Send + Sync {
    fn last_known(&self) -> Option<ObserverLocation>;
    fn persist(&self, location: &ObserverLocation) -> Result<(), LocationError>;
}

/// Network reachability check.
pub trait Reachability: Send + Sync {
    fn is_online(&self) -> bool;
}

/// Which link of the fallback chain produced a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationSource {
    Primary,
    Secondary,
    LastKnown,
    Default,
}

/// Result of one pass over the fallback chain.
#[derive(Debug, Clone, PartialEq)]
pub struct LocationReport {
    pub location: ObserverLocation,
    pub source: LocationSource,
    pub online: bool,
}

/// Fallback chain over the location collaborators.
pub struct LocationService {
    primary: Option<Box<dyn Geolocator>>,
    secondary: Option<Box<dyn Geolocator>>,
    store: Option<Box<dyn LocationStore>>,
    reachability: Box<dyn Reachability>,
    default_location: ObserverLocation,
}

impl LocationService {
    pub fn new(reachability: Box<dyn Reachability>, default_location: ObserverLocation) -> Self {
        Self {
            primary: None,
            secondary: None,
            store: None,
            reachability,
            default_location,
        }
    }

    pub fn with_primary(mut self, geolocator: Box<dyn Geolocator>) -> Self {
        self.primary = Some(geolocator);
        self
    }

    pub fn with_secondary(mut self, geolocator: Box<dyn Geolocator>) -> Self {
        self.secondary = Some(geolocator);
        self
    }

    pub fn with_store(mut self, store: Box<dyn LocationStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Walk the chain once. Never fails: the default location terminates it.
    ///
    /// Geolocators are skipped when the reachability probe reports offline.
    pub fn refresh(&self) -> LocationReport {
        let online = self.reachability.is_online();
        if !online {
            info!("network offline, skipping geolocation services");
        }

        let services = [
            (self.primary.as_deref(), LocationSource::Primary),
            (self.secondary.as_deref(), LocationSource::Secondary),
        ];
        if online {
            for (service, source) in services {
                let Some(service) = service else { continue };
                match service.resolve() {
                    Ok(location) => {
                        info!("location from {}: {}", service.name(), location);
                        if let Some(store) = &self.store {
                            if let Err(e) = store.persist(&location) {
                                warn!("failed to persist location: {e}");
                            }
                        }
                        return LocationReport {
                            location,
                            source,
                            online,
                        };
                    }
                    Err(e) => warn!("geolocation via {} failed: {e}", service.name()),
                }
            }
        }

        if let Some(location) = self.store.as_ref().and_then(|s| s.last_known()) {
            info!("using last known location: {location}");
            return LocationReport {
                location,
                source: LocationSource::LastKnown,
                online,
            };
        }

        debug!("{}", LocationError::LocationUnavailable);
        info!("using default location: {}", self.default_location);
        LocationReport {
            location: self.default_location.clone(),
            source: LocationSource::Default,
            online,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn loc(lat: f64, lon: f64, tz: &str) -> ObserverLocation {
        ObserverLocation::new("test", lat, lon, tz).unwrap()
    }

    #[test]
    fn material_threshold_is_strict() {
        let base = loc(10.0, 20.0, "UTC");
        assert!(!base.is_materially_different(&loc(10.01, 20.0, "UTC")));
        assert!(base.is_materially_different(&loc(10.011, 20.0, "UTC")));
        assert!(!base.is_materially_different(&loc(10.0, 19.99, "UTC")));
        assert!(base.is_materially_different(&loc(10.0, 20.0, "Europe/Paris")));
    }

    #[test]
    fn construction_validates_ranges() {
        assert!(matches!(
            ObserverLocation::new("x", 90.5, 0.0, "UTC"),
            Err(LocationError::InvalidLatitude(_))
        ));
        assert!(matches!(
            ObserverLocation::new("x", 0.0, -181.0, "UTC"),
            Err(LocationError::InvalidLongitude(_))
        ));
        let err = serde_json::from_str::<ObserverLocation>(
            r#"{"name":"x","latitude":100.0,"longitude":0.0,"timezone":"UTC"}"#,
        );
        assert!(err.is_err());
    }

    #[test]
    fn local_time_uses_zone_and_falls_back_to_utc() {
        use chrono::TimeZone;
        let utc = Utc.with_ymd_and_hms(2024, 7, 1, 12, 0, 0).unwrap();
        let shanghai = ObserverLocation::fallback().local_time(&utc);
        assert_eq!(shanghai.offset().local_minus_utc(), 8 * 3600);
        let bogus = loc(0.0, 0.0, "Mars/Olympus_Mons").local_time(&utc);
        assert_eq!(bogus.offset().local_minus_utc(), 0);
    }

    struct Fixed(Option<ObserverLocation>, Arc<AtomicUsize>);

    impl Geolocator for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn resolve(&self) -> Result<ObserverLocation, LocationError> {
            self.1.fetch_add(1, Ordering::SeqCst);
            self.0.clone().ok_or(LocationError::Service {
                service: "fixed".into(),
                reason: "down".into(),
            })
        }
    }

    struct Online(bool);

    impl Reachability for Online {
        fn is_online(&self) -> bool {
            self.0
        }
    }

    struct Memory(parking_lot::Mutex<Option<ObserverLocation>>);

    impl LocationStore for Memory {
        fn last_known(&self) -> Option<ObserverLocation> {
            self.0.lock().clone()
        }

        fn persist(&self, location: &ObserverLocation) -> Result<(), LocationError> {
            *self.0.lock() = Some(location.clone());
            Ok(())
        }
    }

    #[test]
    fn chain_prefers_primary_then_secondary() {
        let calls = Arc::new(AtomicUsize::new(0));
        let service = LocationService::new(Box::new(Online(true)), ObserverLocation::fallback())
            .with_primary(Box::new(Fixed(None, calls.clone())))
            .with_secondary(Box::new(Fixed(Some(loc(48.85, 2.35, "Europe/Paris")), calls.clone())));
        let report = service.refresh();
        assert_eq!(report.source, LocationSource::Secondary);
        assert_eq!(report.location.timezone(), "Europe/Paris");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn offline_skips_services_and_uses_last_known() {
        let calls = Arc::new(AtomicUsize::new(0));
        let stored = loc(51.5, -0.12, "Europe/London");
        let service = LocationService::new(Box::new(Online(false)), ObserverLocation::fallback())
            .with_primary(Box::new(Fixed(Some(loc(1.0, 1.0, "UTC")), calls.clone())))
            .with_store(Box::new(Memory(parking_lot::Mutex::new(Some(stored.clone())))));
        let report = service.refresh();
        assert_eq!(report.source, LocationSource::LastKnown);
        assert_eq!(report.location, stored);
        assert!(!report.online);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn exhausted_chain_yields_default() {
        let service = LocationService::new(Box::new(Online(true)), ObserverLocation::fallback());
        let report = service.refresh();
        assert_eq!(report.source, LocationSource::Default);
        assert_eq!(report.location, ObserverLocation::fallback());
    }

    #[test]
    fn success_is_persisted() {
        let calls = Arc::new(AtomicUsize::new(0));
        let found = loc(35.68, 139.69, "Asia/Tokyo");
        let store = Arc::new(Memory(parking_lot::Mutex::new(None)));

        struct Shared(Arc<Memory>);
        impl LocationStore for Shared {
            fn last_known(&self) -> Option<ObserverLocation> {
                self.0.last_known()
            }
            fn persist(&self, location: &ObserverLocation) -> Result<(), LocationError> {
                self.0.persist(location)
            }
        }

        let service = LocationService::new(Box::new(Online(true)), ObserverLocation::fallback())
            .with_primary(Box::new(Fixed(Some(found.clone()), calls)))
            .with_store(Box::new(Shared(store.clone())));
        assert_eq!(service.refresh().source, LocationSource::Primary);
        assert_eq!(store.last_known(), Some(found));
    }
}
