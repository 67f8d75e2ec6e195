//! One tick of the tracker
//!
//! The engine owns the observer location, the refresh latches and the
//! cached event searches. It is synchronous; the async runtime feeds it
//! location reports and calls [`Engine::tick`] once per period.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::ephemeris::ProviderHandle;
use crate::events::eclipse::compute_eclipses;
use crate::events::rise_set::compute_rise_set;
use crate::events::{EclipseStatus, RiseSetStatus};
use crate::location::{LocationReport, ObserverLocation};
use crate::phase::MoonPhase;
use crate::position::compute_position;
use crate::scheduler::{DataClass, RefreshState};
use crate::snapshot::Snapshot;
use crate::utils::config::EngineConfig;
use crate::utils::time_utils::to_astronomical_time;

pub struct Engine {
    config: EngineConfig,
    handle: Arc<ProviderHandle>,
    location: ObserverLocation,
    refresh: RefreshState,
    rise_set: RiseSetStatus,
    eclipses: EclipseStatus,
    online: Option<bool>,
}

impl Engine {
    /// Engine starting at the configured default location.
    pub fn new(config: EngineConfig, handle: Arc<ProviderHandle>) -> Self {
        let location = config.default_location.clone();
        let refresh = RefreshState::from_config(&config);
        Self {
            config,
            handle,
            location,
            refresh,
            rise_set: RiseSetStatus::NotComputed,
            eclipses: EclipseStatus::NotComputed,
            online: None,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn handle(&self) -> &Arc<ProviderHandle> {
        &self.handle
    }

    pub fn location(&self) -> &ObserverLocation {
        &self.location
    }

    pub fn refresh_state(&self) -> &RefreshState {
        &self.refresh
    }

    pub fn rise_set(&self) -> &RiseSetStatus {
        &self.rise_set
    }

    pub fn eclipses(&self) -> &EclipseStatus {
        &self.eclipses
    }

    /// Whether a location refresh should be started now.
    pub fn location_due(&self, now: DateTime<Utc>) -> bool {
        self.refresh.is_due(DataClass::Location, now)
    }

    /// Record that a location refresh was started.
    pub fn location_requested(&mut self, now: DateTime<Utc>) {
        self.refresh.stamp(DataClass::Location, now);
    }

    /// Adopt a location report. Returns `true` when the observer moved
    /// materially and the rise/set cache was invalidated.
    pub fn apply_location_report(&mut self, report: LocationReport) -> bool {
        self.online = Some(report.online);
        if !report.location.is_materially_different(&self.location) {
            debug!("location unchanged ({:?})", report.source);
            return false;
        }
        info!(
            "observer moved from {} to {} ({:?})",
            self.location, report.location, report.source
        );
        self.location = report.location;
        self.refresh.location_changed(&self.location);
        true
    }

    /// Compute the snapshot for `now`.
    ///
    /// The position observation is the provider probe; when it fails the
    /// event searches are skipped for this tick and every ephemeris-derived
    /// field is reported unavailable.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Snapshot {
        let outcome = compute_position(&now, &self.location, &self.handle);
        let provider = outcome.provider.as_deref();

        if provider.is_some() && self.refresh.rise_set_due(now, &self.location) {
            let status = compute_rise_set(
                provider,
                &self.location,
                now,
                self.config.horizon_deg,
                &self.config.rise_set_search(),
            );
            if status != RiseSetStatus::ProviderUnavailable {
                self.refresh.record_rise_set(now, &self.location);
            }
            self.rise_set = status;
        }

        if provider.is_some() && self.refresh.is_due(DataClass::Eclipse, now) {
            let status = compute_eclipses(provider, now, &self.config.eclipse_search());
            if status != EclipseStatus::ProviderUnavailable {
                self.refresh.stamp(DataClass::Eclipse, now);
            }
            self.eclipses = status;
        }

        let degraded = (
            RiseSetStatus::ProviderUnavailable,
            EclipseStatus::ProviderUnavailable,
        );
        let (rise_set, eclipses) = if provider.is_some() {
            (&self.rise_set, &self.eclipses)
        } else {
            (&degraded.0, &degraded.1)
        };

        Snapshot::assemble(
            now,
            &self.location,
            self.online,
            outcome.position,
            MoonPhase::at(&to_astronomical_time(&now)),
            self.config.horizon_deg,
            rise_set,
            eclipses,
        )
    }
}
