//! Per-tick snapshot handed to the presentation layer
//!
//! Every field derived from the ephemeris carries its availability, so a
//! missing provider shows up as a tag and never as a plausible-looking zero.

use std::io::Write;

use chrono::{DateTime, FixedOffset, Utc};
use serde::Serialize;

use crate::events::{EclipseStatus, RiseSetKind, RiseSetStatus};
use crate::location::ObserverLocation;
use crate::phase::MoonPhase;
use crate::position::{Availability, MoonPosition, Visibility};
use crate::utils::coordinates::compass_direction;

/// One display slot for a rise/set time.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum EventSlot {
    Event {
        kind: RiseSetKind,
        label: &'static str,
        utc: DateTime<Utc>,
        local: DateTime<FixedOffset>,
    },
    Placeholder {
        reason: &'static str,
    },
}

impl EventSlot {
    fn placeholder_for(status: &RiseSetStatus) -> Self {
        let reason = match status {
            RiseSetStatus::NotComputed => "not_computed",
            RiseSetStatus::ProviderUnavailable => "provider_unavailable",
            RiseSetStatus::NoEventsFound => "no_events_found",
            RiseSetStatus::SearchFailed => "search_failed",
            RiseSetStatus::Found(_) => "not_in_window",
        };
        Self::Placeholder { reason }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub utc_time: DateTime<Utc>,
    pub local_time: DateTime<FixedOffset>,
    pub location: ObserverLocation,
    /// `None` until the first reachability probe has run
    pub online: Option<bool>,
    pub right_ascension_hours: Availability<f64>,
    pub declination_deg: Availability<f64>,
    pub distance_km: Availability<f64>,
    pub altitude_deg: Availability<f64>,
    pub azimuth_deg: Availability<f64>,
    pub compass: Availability<&'static str>,
    pub visibility: Visibility,
    pub phase: MoonPhase,
    pub first_event: EventSlot,
    pub second_event: EventSlot,
    pub rise_set: RiseSetStatus,
    pub eclipses: EclipseStatus,
}

impl Snapshot {
    #[allow(clippy::too_many_arguments)]
    pub fn assemble(
        now: DateTime<Utc>,
        location: &ObserverLocation,
        online: Option<bool>,
        position: Availability<MoonPosition>,
        phase: MoonPhase,
        horizon_deg: f64,
        rise_set: &RiseSetStatus,
        eclipses: &EclipseStatus,
    ) -> Self {
        let (first, second) = rise_set
            .summary()
            .map(|summary| summary.display_order())
            .unwrap_or((None, None));
        let slot = |event: Option<crate::events::RiseSetEvent>| match event {
            Some(e) => EventSlot::Event {
                kind: e.kind,
                label: e.kind.label(),
                utc: e.instant_utc,
                local: location.local_time(&e.instant_utc),
            },
            None => EventSlot::placeholder_for(rise_set),
        };

        Self {
            utc_time: now,
            local_time: location.local_time(&now),
            location: location.clone(),
            online,
            right_ascension_hours: position.map(|p| p.right_ascension_hours),
            declination_deg: position.map(|p| p.declination_deg),
            distance_km: position.map(|p| p.distance_km),
            altitude_deg: position.map(|p| p.altitude_deg),
            azimuth_deg: position.map(|p| p.azimuth_deg),
            compass: position.map(|p| compass_direction(p.azimuth_deg)),
            visibility: Visibility::from_position(&position, horizon_deg),
            phase,
            first_event: slot(first),
            second_event: slot(second),
            rise_set: rise_set.clone(),
            eclipses: eclipses.clone(),
        }
    }
}

/// Receives every snapshot the engine produces.
pub trait SnapshotSink: Send {
    fn publish(&mut self, snapshot: &Snapshot) -> std::io::Result<()>;
}

/// Writes one JSON document per line.
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write + Send> SnapshotSink for JsonLinesSink<W> {
    fn publish(&mut self, snapshot: &Snapshot) -> std::io::Result<()> {
        serde_json::to_writer(&mut self.writer, snapshot)?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{RiseSetEvent, RiseSetSummary};
    use crate::utils::time_utils::to_astronomical_time;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 4, 0, 0).unwrap()
    }

    #[test]
    fn degraded_snapshot_tags_every_ephemeris_field() {
        let snapshot = Snapshot::assemble(
            now(),
            &ObserverLocation::fallback(),
            Some(false),
            Availability::Unavailable,
            MoonPhase::at(&to_astronomical_time(&now())),
            0.0,
            &RiseSetStatus::ProviderUnavailable,
            &EclipseStatus::ProviderUnavailable,
        );
        assert_eq!(snapshot.altitude_deg, Availability::Unavailable);
        assert_eq!(snapshot.compass, Availability::Unavailable);
        assert_eq!(snapshot.visibility, Visibility::Unknown);
        assert_eq!(
            snapshot.first_event,
            EventSlot::Placeholder {
                reason: "provider_unavailable"
            }
        );

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["distance_km"]["status"], "unavailable");
        assert_eq!(json["rise_set"]["status"], "provider_unavailable");
        assert_eq!(json["local_time"].as_str().unwrap(), "2024-06-01T12:00:00+08:00");
    }

    #[test]
    fn single_event_takes_first_slot() {
        let summary = RiseSetSummary::new(
            vec![RiseSetEvent {
                kind: RiseSetKind::Rise,
                instant_utc: now() + Duration::hours(3),
            }],
            ObserverLocation::fallback(),
            now(),
        );
        let snapshot = Snapshot::assemble(
            now(),
            &ObserverLocation::fallback(),
            Some(true),
            Availability::Unavailable,
            MoonPhase::at(&to_astronomical_time(&now())),
            0.0,
            &RiseSetStatus::Found(summary),
            &EclipseStatus::NotComputed,
        );
        assert!(matches!(
            snapshot.first_event,
            EventSlot::Event {
                kind: RiseSetKind::Rise,
                ..
            }
        ));
        assert_eq!(
            snapshot.second_event,
            EventSlot::Placeholder {
                reason: "not_in_window"
            }
        );
    }

    #[test]
    fn json_lines_sink_writes_one_line_per_snapshot() {
        let snapshot = Snapshot::assemble(
            now(),
            &ObserverLocation::fallback(),
            None,
            Availability::Unavailable,
            MoonPhase::at(&to_astronomical_time(&now())),
            0.0,
            &RiseSetStatus::NotComputed,
            &EclipseStatus::NotComputed,
        );
        let mut sink = JsonLinesSink::new(Vec::new());
        sink.publish(&snapshot).unwrap();
        sink.publish(&snapshot).unwrap();
        let out = String::from_utf8(sink.into_inner()).unwrap();
        assert_eq!(out.lines().count(), 2);
    }

    #[test]
    fn failed_search_gets_its_own_placeholder() {
        let snapshot = Snapshot::assemble(
            now(),
            &ObserverLocation::fallback(),
            Some(true),
            Availability::Unavailable,
            MoonPhase::at(&to_astronomical_time(&now())),
            0.0,
            &RiseSetStatus::SearchFailed,
            &EclipseStatus::SearchFailed,
        );
        assert_eq!(
            snapshot.first_event,
            EventSlot::Placeholder {
                reason: "search_failed"
            }
        );
    }
}
