//! Moon position for the current tick
//!
//! The observation made here doubles as the provider's validation probe: if
//! the provider cannot place the Moon right now it is treated as down for
//! the whole tick and a reload is requested. No analytic stand-in is ever
//! substituted for a failed provider.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::warn;

use crate::ephemeris::{Body, EphemerisProvider, ProviderHandle, ProviderState};
use crate::location::ObserverLocation;
use crate::utils::coordinates::equatorial_to_horizontal;
use crate::utils::time_utils::to_astronomical_time;

/// A value that may be missing because the ephemeris provider is down.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum Availability<T> {
    Available(T),
    Unavailable,
}

impl<T> Availability<T> {
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Availability<U> {
        match self {
            Self::Available(v) => Availability::Available(f(v)),
            Self::Unavailable => Availability::Unavailable,
        }
    }

    pub fn as_option(&self) -> Option<&T> {
        match self {
            Self::Available(v) => Some(v),
            Self::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MoonPosition {
    pub right_ascension_hours: f64,
    pub declination_deg: f64,
    pub distance_km: f64,
    pub altitude_deg: f64,
    pub azimuth_deg: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Visible,
    NotVisible,
    Unknown,
}

impl Visibility {
    pub fn from_position(position: &Availability<MoonPosition>, horizon_deg: f64) -> Self {
        match position {
            Availability::Available(p) if p.altitude_deg > horizon_deg => Self::Visible,
            Availability::Available(_) => Self::NotVisible,
            Availability::Unavailable => Self::Unknown,
        }
    }
}

/// Position plus the provider that produced it, if it passed the probe.
pub struct PositionOutcome {
    pub position: Availability<MoonPosition>,
    pub provider: Option<Arc<dyn EphemerisProvider>>,
}

/// Moon position from a specific provider.
pub fn observe_moon(
    provider: &dyn EphemerisProvider,
    now: &DateTime<Utc>,
    location: &ObserverLocation,
) -> Result<MoonPosition, crate::error::EphemerisError> {
    let obs = provider.observe(Body::Moon, now, location)?;
    let (altitude_deg, azimuth_deg) = equatorial_to_horizontal(
        obs.right_ascension_hours,
        obs.declination_deg,
        location.latitude(),
        location.longitude(),
        &to_astronomical_time(now),
    );
    Ok(MoonPosition {
        right_ascension_hours: obs.right_ascension_hours,
        declination_deg: obs.declination_deg,
        distance_km: obs.distance_km,
        altitude_deg,
        azimuth_deg,
    })
}

/// Probe the shared provider and compute the Moon's position.
pub fn compute_position(
    now: &DateTime<Utc>,
    location: &ObserverLocation,
    handle: &ProviderHandle,
) -> PositionOutcome {
    let unavailable = PositionOutcome {
        position: Availability::Unavailable,
        provider: None,
    };

    let provider = match &*handle.snapshot() {
        ProviderState::Ready(provider) => Arc::clone(provider),
        ProviderState::Failed(_) => {
            handle.request_reload();
            return unavailable;
        }
        ProviderState::Uninitialized => return unavailable,
    };

    match observe_moon(provider.as_ref(), now, location) {
        Ok(position) => PositionOutcome {
            position: Availability::Available(position),
            provider: Some(provider),
        },
        Err(e) => {
            warn!("ephemeris probe failed: {e}");
            handle.request_reload();
            unavailable
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ephemeris::SeriesEphemeris;
    use crate::error::EphemerisError;
    use chrono::TimeZone;

    struct Failing;

    impl EphemerisProvider for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn geocentric(&self, body: Body, _utc: &DateTime<Utc>) -> Result<[f64; 3], EphemerisError> {
            Err(EphemerisError::Compute {
                body: body.name(),
                reason: "corrupt segment".into(),
            })
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 17, 12, 0, 0).unwrap()
    }

    #[test]
    fn uninitialized_provider_is_unavailable() {
        let handle = ProviderHandle::new();
        let outcome = compute_position(&now(), &ObserverLocation::fallback(), &handle);
        assert_eq!(outcome.position, Availability::Unavailable);
        assert!(outcome.provider.is_none());
        assert!(!handle.reload_pending());
    }

    #[test]
    fn failing_probe_requests_reload() {
        let handle = ProviderHandle::ready(Arc::new(Failing));
        let outcome = compute_position(&now(), &ObserverLocation::fallback(), &handle);
        assert_eq!(outcome.position, Availability::Unavailable);
        assert!(outcome.provider.is_none());
        assert!(handle.reload_pending());
    }

    #[test]
    fn failed_provider_asks_for_retry() {
        let handle = ProviderHandle::new();
        handle.publish(ProviderState::Failed("missing kernel".into()));
        let outcome = compute_position(&now(), &ObserverLocation::fallback(), &handle);
        assert_eq!(outcome.position, Availability::Unavailable);
        assert!(handle.reload_pending());
    }

    #[test]
    fn ready_provider_yields_physical_position() {
        let handle = ProviderHandle::ready(Arc::new(SeriesEphemeris::new()));
        let outcome = compute_position(&now(), &ObserverLocation::fallback(), &handle);
        let position = outcome.position.as_option().copied().unwrap();
        assert!((0.0..24.0).contains(&position.right_ascension_hours));
        assert!(position.declination_deg.abs() < 30.0);
        assert!((350_000.0..410_000.0).contains(&position.distance_km));
        assert!((-90.0..=90.0).contains(&position.altitude_deg));
        assert!((0.0..360.0).contains(&position.azimuth_deg));
        assert!(outcome.provider.is_some());
    }

    #[test]
    fn visibility_follows_altitude() {
        let mut p = MoonPosition {
            right_ascension_hours: 1.0,
            declination_deg: 0.0,
            distance_km: 384_400.0,
            altitude_deg: 12.0,
            azimuth_deg: 90.0,
        };
        assert_eq!(Visibility::from_position(&Availability::Available(p), 0.0), Visibility::Visible);
        p.altitude_deg = -0.1;
        assert_eq!(
            Visibility::from_position(&Availability::Available(p), 0.0),
            Visibility::NotVisible
        );
        assert_eq!(Visibility::from_position(&Availability::Unavailable, 0.0), Visibility::Unknown);
    }
}
