//! Moonrise and moonset
//!
//! A rise is the instant the Moon's topocentric altitude climbs through the
//! horizon threshold, a set the instant it drops through it.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{find_discrete, SearchParams};
use crate::ephemeris::{Body, EphemerisProvider};
use crate::error::{SearchError, StatusError};
use crate::location::ObserverLocation;
use crate::utils::coordinates::equatorial_to_horizontal;
use crate::utils::time_utils::to_astronomical_time;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiseSetKind {
    Rise,
    Set,
}

impl RiseSetKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Rise => "Moonrise",
            Self::Set => "Moonset",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RiseSetEvent {
    pub kind: RiseSetKind,
    pub instant_utc: DateTime<Utc>,
}

/// Moon altitude in degrees for an observer.
pub fn moon_altitude(
    provider: &dyn EphemerisProvider,
    utc: &DateTime<Utc>,
    location: &ObserverLocation,
) -> Result<f64, crate::error::EphemerisError> {
    let obs = provider.observe(Body::Moon, utc, location)?;
    let (altitude, _) = equatorial_to_horizontal(
        obs.right_ascension_hours,
        obs.declination_deg,
        location.latitude(),
        location.longitude(),
        &to_astronomical_time(utc),
    );
    Ok(altitude)
}

/// All rises and sets in `[now, now + window]`, in time order.
pub fn find_rise_set(
    provider: &dyn EphemerisProvider,
    location: &ObserverLocation,
    now: DateTime<Utc>,
    horizon_deg: f64,
    params: &SearchParams,
) -> Result<Vec<RiseSetEvent>, SearchError> {
    let transitions = find_discrete(
        now,
        now + params.window,
        params.step,
        params.resolution,
        |t| Ok(moon_altitude(provider, t, location)? > horizon_deg),
    )?;

    Ok(transitions
        .into_iter()
        .map(|tr| RiseSetEvent {
            kind: if tr.after {
                RiseSetKind::Rise
            } else {
                RiseSetKind::Set
            },
            instant_utc: tr.instant,
        })
        .collect())
}

/// First event of `kind` strictly after `now`, else the last one in the list.
fn select_next(
    events: &[RiseSetEvent],
    kind: RiseSetKind,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    let mut of_kind = events.iter().filter(|e| e.kind == kind);
    of_kind
        .clone()
        .find(|e| e.instant_utc > now)
        .or_else(|| of_kind.next_back())
        .map(|e| e.instant_utc)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiseSetSummary {
    pub events: Vec<RiseSetEvent>,
    pub next_rise: Option<DateTime<Utc>>,
    pub next_set: Option<DateTime<Utc>>,
    /// Observer the search ran for
    pub location: ObserverLocation,
    pub computed_at: DateTime<Utc>,
}

impl RiseSetSummary {
    pub fn new(events: Vec<RiseSetEvent>, location: ObserverLocation, now: DateTime<Utc>) -> Self {
        let next_rise = select_next(&events, RiseSetKind::Rise, now);
        let next_set = select_next(&events, RiseSetKind::Set, now);
        Self {
            events,
            next_rise,
            next_set,
            location,
            computed_at: now,
        }
    }

    /// Next rise and next set arranged for display: the earlier first. When
    /// only one is known it takes the first slot and the second is `None`.
    pub fn display_order(&self) -> (Option<RiseSetEvent>, Option<RiseSetEvent>) {
        let rise = self.next_rise.map(|instant_utc| RiseSetEvent {
            kind: RiseSetKind::Rise,
            instant_utc,
        });
        let set = self.next_set.map(|instant_utc| RiseSetEvent {
            kind: RiseSetKind::Set,
            instant_utc,
        });
        match (rise, set) {
            (Some(r), Some(s)) if s.instant_utc < r.instant_utc => (Some(s), Some(r)),
            (Some(r), Some(s)) => (Some(r), Some(s)),
            (Some(only), None) | (None, Some(only)) => (Some(only), None),
            (None, None) => (None, None),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "summary", rename_all = "snake_case")]
pub enum RiseSetStatus {
    NotComputed,
    ProviderUnavailable,
    NoEventsFound,
    /// The search itself could not run; not an astronomical outcome
    SearchFailed,
    Found(RiseSetSummary),
}

impl RiseSetStatus {
    pub fn from_error(err: StatusError) -> Self {
        match err {
            StatusError::ProviderUnavailable => Self::ProviderUnavailable,
            StatusError::NoEventsFound => Self::NoEventsFound,
            StatusError::SearchFailed => Self::SearchFailed,
        }
    }

    pub fn summary(&self) -> Option<&RiseSetSummary> {
        match self {
            Self::Found(summary) => Some(summary),
            _ => None,
        }
    }
}

/// Run the rise/set search and collapse the outcome into a status.
pub fn compute_rise_set(
    provider: Option<&dyn EphemerisProvider>,
    location: &ObserverLocation,
    now: DateTime<Utc>,
    horizon_deg: f64,
    params: &SearchParams,
) -> RiseSetStatus {
    let Some(provider) = provider else {
        debug!("rise/set skipped: no ephemeris provider");
        return RiseSetStatus::ProviderUnavailable;
    };
    match find_rise_set(provider, location, now, horizon_deg, params) {
        Ok(events) if events.is_empty() => {
            info!("no moonrise or moonset within {} h at {location}", params.window.num_hours());
            RiseSetStatus::NoEventsFound
        }
        Ok(events) => {
            let summary = RiseSetSummary::new(events, location.clone(), now);
            info!(
                "rise/set refreshed for {}: next rise {:?}, next set {:?}",
                location.name(),
                summary.next_rise,
                summary.next_set
            );
            RiseSetStatus::Found(summary)
        }
        Err(e) => {
            warn!("rise/set search failed: {e}");
            RiseSetStatus::from_error(e.status())
        }
    }
}
