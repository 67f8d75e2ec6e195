use chrono::{DateTime, Duration, Utc};

use crate::error::SearchError;
use crate::utils::config::MAX_SEARCH_SAMPLES;

/// Generate a vector of timestamps from begin to end (inclusive) with a fixed step.
/// This is the sampling grid every discrete-event search walks.
///
/// # Arguments
/// * `begin` - Start of the time range
/// * `end` - End of the time range
/// * `step` - Spacing between timestamps
///
/// # Returns
/// `Vec<DateTime<Utc>>` of generated timestamps. When the range is not a
/// multiple of `step`, `end` is appended so the window edge is always sampled.
///
/// # Errors
/// Returns error if:
/// - begin >= end
/// - step <= 0
/// - Expected timestamp count exceeds MAX_SEARCH_SAMPLES
pub fn generate_timestamps(
    begin: DateTime<Utc>,
    end: DateTime<Utc>,
    step: Duration,
) -> Result<Vec<DateTime<Utc>>, SearchError> {
    if begin >= end {
        return Err(SearchError::InvalidWindow);
    }
    if step <= Duration::zero() {
        return Err(SearchError::InvalidStep);
    }

    // Calculate expected number of timestamps to prevent excessive memory allocation
    let range_ms = (end - begin).num_milliseconds();
    let step_ms = step.num_milliseconds().max(1);
    let expected_count = range_ms / step_ms + 2;

    if expected_count > MAX_SEARCH_SAMPLES {
        return Err(SearchError::TooManySamples {
            expected: expected_count,
            max: MAX_SEARCH_SAMPLES,
        });
    }

    let mut times = Vec::with_capacity(expected_count as usize);
    let mut current = begin;
    while current < end {
        times.push(current);
        current += step;
    }
    times.push(end);

    Ok(times)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn grid_includes_both_edges() {
        let times = generate_timestamps(t0(), t0() + Duration::hours(1), Duration::minutes(5)).unwrap();
        assert_eq!(times.len(), 13);
        assert_eq!(times[0], t0());
        assert_eq!(*times.last().unwrap(), t0() + Duration::hours(1));
    }

    #[test]
    fn ragged_end_is_appended() {
        let times =
            generate_timestamps(t0(), t0() + Duration::minutes(12), Duration::minutes(5)).unwrap();
        assert_eq!(times.len(), 4);
        assert_eq!(times[3] - times[2], Duration::minutes(2));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(matches!(
            generate_timestamps(t0(), t0(), Duration::minutes(5)),
            Err(SearchError::InvalidWindow)
        ));
        assert!(matches!(
            generate_timestamps(t0(), t0() + Duration::hours(1), Duration::zero()),
            Err(SearchError::InvalidStep)
        ));
        assert!(matches!(
            generate_timestamps(t0(), t0() + Duration::days(365), Duration::seconds(1)),
            Err(SearchError::TooManySamples { .. })
        ));
    }
}
