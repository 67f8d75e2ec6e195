//! Staleness timers for each class of derived data
//!
//! Every class (location, rise/set, eclipses) has an independent latch: a
//! refresh interval and the instant it last completed. A latch that has
//! never fired is always due. Rise/set is additionally due whenever the
//! observer has moved materially since the last search.

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use tracing::debug;

use crate::location::ObserverLocation;
use crate::utils::config::EngineConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DataClass {
    Location,
    RiseSet,
    Eclipse,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Latch {
    interval: Duration,
    last: Option<DateTime<Utc>>,
}

impl Latch {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    /// Due when never run, when the interval has elapsed, or when the
    /// clock stepped backwards past the last run.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        match self.last {
            None => true,
            Some(last) => {
                let elapsed = now - last;
                elapsed >= self.interval || elapsed < Duration::zero()
            }
        }
    }

    pub fn stamp(&mut self, now: DateTime<Utc>) {
        self.last = Some(now);
    }

    pub fn reset(&mut self) {
        self.last = None;
    }

    pub fn last(&self) -> Option<DateTime<Utc>> {
        self.last
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }
}

/// Refresh bookkeeping, owned by the tick loop.
#[derive(Debug, Clone, PartialEq)]
pub struct RefreshState {
    location: Latch,
    rise_set: Latch,
    eclipse: Latch,
    last_observed_location: Option<ObserverLocation>,
}

impl RefreshState {
    pub fn new(location: Duration, rise_set: Duration, eclipse: Duration) -> Self {
        Self {
            location: Latch::new(location),
            rise_set: Latch::new(rise_set),
            eclipse: Latch::new(eclipse),
            last_observed_location: None,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(
            Duration::seconds(config.location_refresh_secs),
            Duration::seconds(config.event_refresh_secs),
            Duration::seconds(config.eclipse_refresh_secs),
        )
    }

    pub fn latch(&self, class: DataClass) -> &Latch {
        match class {
            DataClass::Location => &self.location,
            DataClass::RiseSet => &self.rise_set,
            DataClass::Eclipse => &self.eclipse,
        }
    }

    fn latch_mut(&mut self, class: DataClass) -> &mut Latch {
        match class {
            DataClass::Location => &mut self.location,
            DataClass::RiseSet => &mut self.rise_set,
            DataClass::Eclipse => &mut self.eclipse,
        }
    }

    pub fn is_due(&self, class: DataClass, now: DateTime<Utc>) -> bool {
        self.latch(class).is_due(now)
    }

    pub fn stamp(&mut self, class: DataClass, now: DateTime<Utc>) {
        self.latch_mut(class).stamp(now);
    }

    /// Rise/set needs recomputing: timer elapsed, or `location` differs
    /// materially from the one the last search ran for.
    pub fn rise_set_due(&self, now: DateTime<Utc>, location: &ObserverLocation) -> bool {
        let moved = self
            .last_observed_location
            .as_ref()
            .map_or(true, |last| last.is_materially_different(location));
        self.rise_set.is_due(now) || moved
    }

    /// Record a completed rise/set search.
    pub fn record_rise_set(&mut self, now: DateTime<Utc>, location: &ObserverLocation) {
        self.rise_set.stamp(now);
        self.last_observed_location = Some(location.clone());
    }

    /// A materially different location was adopted: force the next
    /// rise/set search.
    pub fn location_changed(&mut self, location: &ObserverLocation) {
        debug!("location changed to {location}, invalidating rise/set");
        self.rise_set.reset();
        self.last_observed_location = Some(location.clone());
    }

    pub fn last_observed_location(&self) -> Option<&ObserverLocation> {
        self.last_observed_location.as_ref()
    }
}
