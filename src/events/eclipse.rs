//! Solar and lunar eclipses from Sun-Earth-Moon shadow geometry
//!
//! Shadows are modelled as straight cones tangent to the Sun and the
//! occulting body. Lunar eclipses test the Moon's disk against Earth's
//! umbra at the Moon's distance, enlarged for the atmosphere (Danjon);
//! penumbral-only passages are not reported. Solar eclipses are
//! geocentric: they test whether the Moon's shadow touches Earth anywhere.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{find_discrete, SearchParams, Transition};
use crate::ephemeris::{Body, EphemerisProvider};
use crate::error::{EphemerisError, SearchError, StatusError};
use crate::utils::config::{DANJON_ENLARGEMENT, EARTH_RADIUS_KM, MOON_RADIUS_KM, SUN_RADIUS_KM};
use crate::utils::vector_math::{axis_offsets, scale, subtract, vector_magnitude};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EclipseKind {
    PartialSolar,
    AnnularSolar,
    TotalSolar,
    PartialLunar,
    TotalLunar,
}

impl EclipseKind {
    /// Ordering of stages within one eclipse; higher is deeper.
    fn depth(&self) -> u8 {
        match self {
            Self::PartialSolar | Self::PartialLunar => 0,
            Self::AnnularSolar => 1,
            Self::TotalSolar | Self::TotalLunar => 2,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::PartialSolar => "Partial solar eclipse",
            Self::AnnularSolar => "Annular solar eclipse",
            Self::TotalSolar => "Total solar eclipse",
            Self::PartialLunar => "Partial lunar eclipse",
            Self::TotalLunar => "Total lunar eclipse",
        }
    }
}

/// Cross-section of an occulter's shadow at a point behind it.
#[derive(Debug, Clone, Copy)]
struct ShadowGeometry {
    /// Distance along the shadow axis from the occulter's centre
    along: f64,
    dist_to_axis: f64,
    /// Negative beyond the umbral vertex, where it is the antumbra radius
    umbra_radius: f64,
    penumbra_radius: f64,
}

/// Shadow of a spherical occulter (at the origin) lit by the Sun.
///
/// # Arguments
/// * `point` - Position of the point of interest relative to the occulter (km)
/// * `sun` - Position of the Sun relative to the occulter (km)
/// * `radius` - Occulter radius (km)
///
/// # Returns
/// `None` when the point is on the sunward side.
fn shadow_geometry(point: &[f64; 3], sun: &[f64; 3], radius: f64) -> Option<ShadowGeometry> {
    let sun_dist = vector_magnitude(sun);
    if sun_dist <= 0.0 {
        return None;
    }
    let (along, dist_to_axis) = axis_offsets(point, &scale(sun, -1.0));
    if along <= 0.0 {
        return None;
    }
    Some(ShadowGeometry {
        along,
        dist_to_axis,
        umbra_radius: radius - along * (SUN_RADIUS_KM - radius) / sun_dist,
        penumbra_radius: radius + along * (SUN_RADIUS_KM + radius) / sun_dist,
    })
}

/// Lunar eclipse stage from geocentric Sun and Moon positions (km).
pub fn classify_lunar(sun: &[f64; 3], moon: &[f64; 3]) -> Option<EclipseKind> {
    let shadow = shadow_geometry(moon, sun, EARTH_RADIUS_KM)?;
    let umbra = shadow.umbra_radius * DANJON_ENLARGEMENT;
    let near_edge = shadow.dist_to_axis - MOON_RADIUS_KM;
    let far_edge = shadow.dist_to_axis + MOON_RADIUS_KM;

    if umbra <= 0.0 {
        None
    } else if far_edge <= umbra {
        Some(EclipseKind::TotalLunar)
    } else if near_edge < umbra {
        Some(EclipseKind::PartialLunar)
    } else {
        None
    }
}

/// Geocentric solar eclipse stage from geocentric Sun and Moon positions (km).
pub fn classify_solar(sun: &[f64; 3], moon: &[f64; 3]) -> Option<EclipseKind> {
    let earth_from_moon = scale(moon, -1.0);
    let sun_from_moon = subtract(sun, moon);
    let shadow = shadow_geometry(&earth_from_moon, &sun_from_moon, MOON_RADIUS_KM)?;

    if shadow.dist_to_axis >= shadow.penumbra_radius + EARTH_RADIUS_KM {
        return None;
    }

    // Umbral cone radius where the axis meets the surface, or at the
    // closest approach when the axis misses Earth
    let sun_dist = vector_magnitude(&sun_from_moon);
    let surface = if shadow.dist_to_axis < EARTH_RADIUS_KM {
        shadow.along - (EARTH_RADIUS_KM.powi(2) - shadow.dist_to_axis.powi(2)).sqrt()
    } else {
        shadow.along
    };
    let umbra = MOON_RADIUS_KM - surface * (SUN_RADIUS_KM - MOON_RADIUS_KM) / sun_dist;

    if shadow.dist_to_axis < EARTH_RADIUS_KM + umbra.abs() {
        if umbra > 0.0 {
            Some(EclipseKind::TotalSolar)
        } else {
            Some(EclipseKind::AnnularSolar)
        }
    } else {
        Some(EclipseKind::PartialSolar)
    }
}

/// Eclipse stage at one instant, `None` when no eclipse is underway.
pub fn eclipse_state(
    provider: &dyn EphemerisProvider,
    utc: &DateTime<Utc>,
) -> Result<Option<EclipseKind>, EphemerisError> {
    let sun = provider.geocentric(Body::Sun, utc)?;
    let moon = provider.geocentric(Body::Moon, utc)?;
    Ok(classify_lunar(&sun, &moon).or_else(|| classify_solar(&sun, &moon)))
}

/// One contiguous eclipse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EclipseEvent {
    /// Onset, or the window start when `in_progress`
    pub instant_utc: DateTime<Utc>,
    /// Deepest stage reached inside the window
    pub kind: EclipseKind,
    /// End, when it falls inside the window
    pub ends_utc: Option<DateTime<Utc>>,
    /// Already underway at the start of the window
    pub in_progress: bool,
}

/// Fold stage transitions into eclipse episodes.
fn episodes(
    window_start: DateTime<Utc>,
    initial: Option<EclipseKind>,
    transitions: Vec<Transition<Option<EclipseKind>>>,
) -> Vec<EclipseEvent> {
    let mut events = Vec::new();
    let mut current = initial.map(|kind| EclipseEvent {
        instant_utc: window_start,
        kind,
        ends_utc: None,
        in_progress: true,
    });

    for tr in transitions {
        match tr.after {
            Some(kind) => {
                if let Some(open) = current.as_mut() {
                    if kind.depth() > open.kind.depth() {
                        open.kind = kind;
                    }
                } else {
                    current = Some(EclipseEvent {
                        instant_utc: tr.instant,
                        kind,
                        ends_utc: None,
                        in_progress: false,
                    });
                }
            }
            None => {
                if let Some(mut open) = current.take() {
                    open.ends_utc = Some(tr.instant);
                    events.push(open);
                }
            }
        }
    }
    events.extend(current);
    events
}

/// Every eclipse touching `[now, now + window]`, in time order.
pub fn find_eclipses(
    provider: &dyn EphemerisProvider,
    now: DateTime<Utc>,
    params: &SearchParams,
) -> Result<Vec<EclipseEvent>, SearchError> {
    let initial = eclipse_state(provider, &now)?;
    let transitions = find_discrete(
        now,
        now + params.window,
        params.step,
        params.resolution,
        |t| eclipse_state(provider, t),
    )?;
    Ok(episodes(now, initial, transitions))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EclipseSummary {
    pub events: Vec<EclipseEvent>,
    pub computed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "summary", rename_all = "snake_case")]
pub enum EclipseStatus {
    NotComputed,
    ProviderUnavailable,
    NoEventsFound,
    SearchFailed,
    Found(EclipseSummary),
}

impl EclipseStatus {
    pub fn events(&self) -> &[EclipseEvent] {
        match self {
            Self::Found(summary) => &summary.events,
            _ => &[],
        }
    }
}

pub fn compute_eclipses(
    provider: Option<&dyn EphemerisProvider>,
    now: DateTime<Utc>,
    params: &SearchParams,
) -> EclipseStatus {
    let Some(provider) = provider else {
        debug!("eclipse search skipped: no ephemeris provider");
        return EclipseStatus::ProviderUnavailable;
    };
    match find_eclipses(provider, now, params) {
        Ok(events) if events.is_empty() => {
            info!("no eclipses within {} days", params.window.num_days());
            EclipseStatus::NoEventsFound
        }
        Ok(events) => {
            for event in &events {
                info!("upcoming {} at {}", event.kind.label(), event.instant_utc);
            }
            EclipseStatus::Found(EclipseSummary {
                events,
                computed_at: now,
            })
        }
        Err(e) => {
            warn!("eclipse search failed: {e}");
            match e.status() {
                StatusError::ProviderUnavailable => EclipseStatus::ProviderUnavailable,
                StatusError::NoEventsFound => EclipseStatus::NoEventsFound,
                StatusError::SearchFailed => EclipseStatus::SearchFailed,
            }
        }
    }
}
