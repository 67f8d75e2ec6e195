//! Minimal hifitime utilities for chrono interop
//!
//! Provides the conversions needed between chrono `DateTime<Utc>` and
//! hifitime `Epoch`, plus leap-second derived TT-UTC offsets.

use chrono::{DateTime, Utc};
use hifitime::{Duration, Epoch};

use crate::utils::config::{SECONDS_PER_DAY, TT_TAI_SECONDS};

/// TT-UTC used when hifitime has no leap-second entry for the instant
const FALLBACK_TT_UTC_SECONDS: f64 = 69.184;

/// Convert chrono `DateTime<Utc>` to hifitime `Epoch`
#[inline]
pub fn chrono_to_epoch(dt: &DateTime<Utc>) -> Epoch {
    let nanos = (dt.timestamp() as i128) * 1_000_000_000 + (dt.timestamp_subsec_nanos() as i128);
    Epoch::from_unix_duration(Duration::from_total_nanoseconds(nanos))
}

/// Get TAI-UTC offset in seconds (leap seconds) for a DateTime
///
/// Returns None before 1972, when integer leap seconds start.
#[inline]
pub fn get_tai_utc_offset(dt: &DateTime<Utc>) -> Option<f64> {
    chrono_to_epoch(dt).leap_seconds(true)
}

/// Get TT-UTC offset in seconds (TT-TAI + TAI-UTC = 32.184 + leap_seconds)
#[inline]
pub fn get_tt_utc_offset_seconds(dt: &DateTime<Utc>) -> f64 {
    get_tai_utc_offset(dt).map_or(FALLBACK_TT_UTC_SECONDS, |tai_utc| TT_TAI_SECONDS + tai_utc)
}

/// TT-UTC offset in days
#[inline]
pub fn get_tt_utc_offset_days(dt: &DateTime<Utc>) -> f64 {
    get_tt_utc_offset_seconds(dt) / SECONDS_PER_DAY
}
