//! Discrete event search
//!
//! Events are the instants where a piecewise-constant function of time
//! changes value: the Moon's "above horizon" flag for rise/set, the
//! eclipse classification for eclipses. [`find_discrete`] samples such a
//! function on a uniform grid and bisects every change down to the
//! requested resolution.

pub mod eclipse;
pub mod rise_set;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::ephemeris::ephemeris_common::generate_timestamps;
use crate::error::{EphemerisError, SearchError};

pub use eclipse::{EclipseEvent, EclipseKind, EclipseStatus};
pub use rise_set::{RiseSetEvent, RiseSetKind, RiseSetStatus, RiseSetSummary};

/// Window, grid spacing and bisection target of one kind of search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchParams {
    pub window: Duration,
    pub step: Duration,
    pub resolution: Duration,
}

/// A change of state between two adjacent samples.
///
/// `instant` is the first probed instant already in the `after` state; the
/// true boundary lies within one resolution before it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transition<T> {
    pub instant: DateTime<Utc>,
    pub before: T,
    pub after: T,
}

/// Find every state change of `f` on `[start, end]`.
///
/// Changes shorter than `step` can be missed; two changes inside one step
/// are reported as a single transition. Output is ordered by instant and
/// deterministic for a deterministic `f`.
pub fn find_discrete<T, F>(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    step: Duration,
    resolution: Duration,
    mut f: F,
) -> Result<Vec<Transition<T>>, SearchError>
where
    T: PartialEq + Clone,
    F: FnMut(&DateTime<Utc>) -> Result<T, EphemerisError>,
{
    if resolution <= Duration::zero() {
        return Err(SearchError::InvalidStep);
    }
    let grid = generate_timestamps(start, end, step)?;

    let mut transitions = Vec::new();
    let mut prev_time = grid[0];
    let mut prev_value = f(&prev_time)?;

    for &time in &grid[1..] {
        let value = f(&time)?;
        if value != prev_value {
            transitions.push(refine(prev_time, &prev_value, time, value.clone(), resolution, &mut f)?);
        }
        prev_time = time;
        prev_value = value;
    }

    Ok(transitions)
}

/// Bisect a differing pair `(lo, hi)` until the bracket is within `resolution`.
fn refine<T, F>(
    mut lo: DateTime<Utc>,
    lo_value: &T,
    mut hi: DateTime<Utc>,
    mut hi_value: T,
    resolution: Duration,
    f: &mut F,
) -> Result<Transition<T>, SearchError>
where
    T: PartialEq + Clone,
    F: FnMut(&DateTime<Utc>) -> Result<T, EphemerisError>,
{
    while hi - lo > resolution {
        let mid = lo + (hi - lo) / 2;
        let mid_value = f(&mid)?;
        if mid_value == *lo_value {
            lo = mid;
        } else {
            hi = mid;
            hi_value = mid_value;
        }
    }
    Ok(Transition {
        instant: hi,
        before: lo_value.clone(),
        after: hi_value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn bisection_lands_within_resolution() {
        let boundary = t0() + Duration::seconds(4321);
        let transitions = find_discrete(
            t0(),
            t0() + Duration::hours(3),
            Duration::minutes(5),
            Duration::seconds(10),
            |t| Ok(*t >= boundary),
        )
        .unwrap();
        assert_eq!(transitions.len(), 1);
        let found = transitions[0].instant;
        assert!(found >= boundary);
        assert!(found - boundary <= Duration::seconds(10));
        assert!(!transitions[0].before && transitions[0].after);
    }

    #[test]
    fn multiple_transitions_in_order() {
        let a = t0() + Duration::minutes(17);
        let b = t0() + Duration::minutes(64);
        let transitions = find_discrete(
            t0(),
            t0() + Duration::hours(2),
            Duration::minutes(5),
            Duration::seconds(30),
            |t| Ok(if *t < a { 0 } else if *t < b { 1 } else { 2 }),
        )
        .unwrap();
        let values: Vec<_> = transitions.iter().map(|tr| (tr.before, tr.after)).collect();
        assert_eq!(values, vec![(0, 1), (1, 2)]);
        assert!(transitions[0].instant < transitions[1].instant);
    }

    #[test]
    fn constant_function_has_no_transitions() {
        let transitions = find_discrete(
            t0(),
            t0() + Duration::days(3),
            Duration::minutes(5),
            Duration::seconds(30),
            |_| Ok(true),
        )
        .unwrap();
        assert!(transitions.is_empty());
    }

    #[test]
    fn provider_error_aborts_search() {
        let result = find_discrete(
            t0(),
            t0() + Duration::hours(1),
            Duration::minutes(5),
            Duration::seconds(30),
            |_| Err::<bool, _>(EphemerisError::NotLoaded),
        );
        assert!(matches!(result, Err(SearchError::Ephemeris(_))));
    }
}
