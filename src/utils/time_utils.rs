//! Time utilities for astronomical calculations
//!
//! All period and search math runs on [`AstronomicalTime`], a continuous
//! Julian Day scale derived from UTC, so calendar irregularities (DST,
//! month lengths) never reach the astronomy.

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::Serialize;

use crate::utils::config::{DAYS_PER_JULIAN_CENTURY, JD_J2000, SECONDS_PER_DAY};
use crate::utils::hifi_time;

/// Two-part Julian Date on the UTC scale.
///
/// `day` is the integer Julian Day (days start at noon), `fraction` lies in
/// [0, 1). Keeping the parts separate preserves nanosecond ordering that a
/// single `f64` near 2.4e6 cannot represent. Field order makes the derived
/// `PartialOrd` lexicographic, i.e. chronological.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
pub struct AstronomicalTime {
    day: i64,
    fraction: f64,
}

impl AstronomicalTime {
    pub fn from_parts(day: i64, fraction: f64) -> Self {
        let carry = fraction.floor();
        Self {
            day: day + carry as i64,
            fraction: fraction - carry,
        }
    }

    pub fn from_jd(jd: f64) -> Self {
        Self::from_parts(0, jd)
    }

    /// Julian Day as a single value
    #[inline]
    pub fn jd(&self) -> f64 {
        self.day as f64 + self.fraction
    }

    /// Days elapsed since J2000.0 (JD 2451545.0), computed without losing the
    /// fractional precision
    #[inline]
    pub fn days_since_j2000(&self) -> f64 {
        (self.day - JD_J2000 as i64) as f64 + self.fraction
    }

    /// Julian centuries since J2000.0
    #[inline]
    pub fn centuries_since_j2000(&self) -> f64 {
        self.days_since_j2000() / DAYS_PER_JULIAN_CENTURY
    }

    pub fn day(&self) -> i64 {
        self.day
    }

    pub fn fraction(&self) -> f64 {
        self.fraction
    }
}

/// Julian Day Number of a proleptic Gregorian calendar date
pub fn julian_day_number(year: i32, month: u32, day: u32) -> i64 {
    let a = (14 - month as i64) / 12;
    let y = year as i64 + 4800 - a;
    let m = month as i64 + 12 * a - 3;
    day as i64 + (153 * m + 2) / 5 + 365 * y + y.div_euclid(4) - y.div_euclid(100)
        + y.div_euclid(400)
        - 32045
}

/// Convert a UTC instant to the continuous astronomical time scale.
///
/// Total and side-effect free. A leap second (`23:59:60`) is folded onto the
/// last nanosecond of the day so ordering is never reversed.
pub fn to_astronomical_time(dt: &DateTime<Utc>) -> AstronomicalTime {
    let jdn = julian_day_number(dt.year(), dt.month(), dt.day());
    let nanos = dt.nanosecond().min(999_999_999) as f64;
    let seconds = dt.num_seconds_from_midnight() as f64 + nanos * 1e-9;
    let half_day = SECONDS_PER_DAY / 2.0;

    if seconds >= half_day {
        AstronomicalTime {
            day: jdn,
            fraction: (seconds - half_day) / SECONDS_PER_DAY,
        }
    } else {
        AstronomicalTime {
            day: jdn - 1,
            fraction: (seconds + half_day) / SECONDS_PER_DAY,
        }
    }
}

/// Julian Day on the Terrestrial Time scale (for the analytic series)
pub fn terrestrial_jd(dt: &DateTime<Utc>) -> f64 {
    to_astronomical_time(dt).jd() + hifi_time::get_tt_utc_offset_days(dt)
}

/// Julian centuries of TT since J2000.0
pub fn terrestrial_centuries(dt: &DateTime<Utc>) -> f64 {
    let t = to_astronomical_time(dt);
    (t.days_since_j2000() + hifi_time::get_tt_utc_offset_days(dt)) / DAYS_PER_JULIAN_CENTURY
}
