//! Analytic lunar and solar series
//!
//! Moon: Montenbruck & Pfleger's truncated Brown theory for longitude and
//! latitude, with the leading distance terms from Meeus chapter 47. Sun:
//! the low-precision almanac formulas. Accuracy is a few arcminutes, enough
//! for rise/set timing and eclipse classification but not for sub-arcsecond
//! work. Selected explicitly by configuration; never substituted silently
//! for an SPK kernel.

use std::f64::consts::TAU;

use chrono::{DateTime, Utc};

use super::{Body, EphemerisProvider};
use crate::error::EphemerisError;
use crate::utils::config::AU_TO_KM;
use crate::utils::coordinates::{ecliptic_to_equatorial, mean_obliquity_deg};
use crate::utils::time_utils::terrestrial_centuries;
use crate::utils::vector_math::{radec_to_unit_vector, scale};

const ARCSEC_PER_RADIAN: f64 = 206_264.806_247_096_36;

/// Fractional part, always in [0, 1)
fn frac(x: f64) -> f64 {
    x - x.floor()
}

/// Moon ecliptic longitude, latitude (radians, mean equinox of date) and
/// distance (km).
fn moon_ecliptic(t: f64) -> (f64, f64, f64) {
    let l0 = frac(0.606_433 + 1336.855_225 * t);
    let l = TAU * frac(0.374_897 + 1325.552_410 * t);
    let ls = TAU * frac(0.993_133 + 99.997_361 * t);
    let d = TAU * frac(0.827_361 + 1236.853_086 * t);
    let f = TAU * frac(0.259_086 + 1342.227_825 * t);

    let dl = 22640.0 * l.sin() - 4586.0 * (l - 2.0 * d).sin() + 2370.0 * (2.0 * d).sin()
        + 769.0 * (2.0 * l).sin()
        - 668.0 * ls.sin()
        - 412.0 * (2.0 * f).sin()
        - 212.0 * (2.0 * l - 2.0 * d).sin()
        - 206.0 * (l + ls - 2.0 * d).sin()
        + 192.0 * (l + 2.0 * d).sin()
        - 165.0 * (ls - 2.0 * d).sin()
        - 125.0 * d.sin()
        - 110.0 * (l + ls).sin()
        + 148.0 * (l - ls).sin()
        - 55.0 * (2.0 * f - 2.0 * d).sin();

    let s = f + (dl + 412.0 * (2.0 * f).sin() + 541.0 * ls.sin()) / ARCSEC_PER_RADIAN;
    let h = f - 2.0 * d;
    let n = -526.0 * h.sin() + 44.0 * (l + h).sin() - 31.0 * (h - l).sin()
        - 23.0 * (ls + h).sin()
        + 11.0 * (h - ls).sin()
        - 25.0 * (f - 2.0 * l).sin()
        + 21.0 * (f - l).sin();

    let longitude = TAU * frac(l0 + dl / 1_296_000.0);
    let latitude = (18520.0 * s.sin() + n) / ARCSEC_PER_RADIAN;

    // Meeus table 47.A, terms above 10 km
    let distance = 385_000.56 - 20_905.355 * l.cos() - 3_699.111 * (2.0 * d - l).cos()
        - 2_955.968 * (2.0 * d).cos()
        - 569.925 * (2.0 * l).cos()
        + 48.888 * ls.cos()
        + 246.158 * (2.0 * d - 2.0 * l).cos()
        - 152.138 * (2.0 * d - ls - l).cos()
        - 170.733 * (2.0 * d + l).cos()
        - 204.586 * (2.0 * d - ls).cos()
        - 129.620 * (ls - l).cos()
        + 108.743 * d.cos()
        + 104.755 * (ls + l).cos()
        + 10.321 * (2.0 * d - 2.0 * f).cos()
        + 79.661 * (l - 2.0 * f).cos()
        - 34.782 * (4.0 * d - l).cos()
        - 23.210 * (3.0 * l).cos()
        - 21.636 * (4.0 * d - 2.0 * l).cos()
        + 24.208 * (2.0 * d + ls - l).cos()
        + 30.824 * (2.0 * d + ls).cos()
        - 16.675 * (d + ls).cos()
        - 12.831 * (2.0 * d - ls + l).cos()
        - 10.445 * (2.0 * d + 2.0 * l).cos()
        - 11.650 * (4.0 * d).cos()
        + 14.403 * (2.0 * d - 3.0 * l).cos()
        + 10.056 * (2.0 * d - ls - 2.0 * l).cos();

    (longitude, latitude, distance)
}

/// Sun ecliptic longitude (radians) and distance (km); latitude is zero.
fn sun_ecliptic(t: f64) -> (f64, f64) {
    let n = t * 36_525.0;
    let mean_longitude = (280.460 + 0.985_647_4 * n).to_radians();
    let g = (357.528 + 0.985_600_3 * n).to_radians();
    let longitude = mean_longitude + (1.915 * g.sin() + 0.020 * (2.0 * g).sin()).to_radians();
    let distance_au = 1.000_14 - 0.016_71 * g.cos() - 0.000_14 * (2.0 * g).cos();
    (longitude.rem_euclid(TAU), distance_au * AU_TO_KM)
}

/// Ecliptic position vector (km) from angles in radians.
fn ecliptic_vector(longitude: f64, latitude: f64, distance: f64) -> [f64; 3] {
    scale(&radec_to_unit_vector(longitude.to_degrees(), latitude.to_degrees()), distance)
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SeriesEphemeris;

impl SeriesEphemeris {
    pub fn new() -> Self {
        Self
    }
}

impl EphemerisProvider for SeriesEphemeris {
    fn name(&self) -> &str {
        "series"
    }

    fn geocentric(&self, body: Body, utc: &DateTime<Utc>) -> Result<[f64; 3], EphemerisError> {
        let t = terrestrial_centuries(utc);
        let ecliptic = match body {
            Body::Earth => return Ok([0.0; 3]),
            Body::Moon => {
                let (lon, lat, dist) = moon_ecliptic(t);
                ecliptic_vector(lon, lat, dist)
            }
            Body::Sun => {
                let (lon, dist) = sun_ecliptic(t);
                ecliptic_vector(lon, 0.0, dist)
            }
        };
        let equatorial = ecliptic_to_equatorial(&ecliptic, mean_obliquity_deg(t));
        if equatorial.iter().any(|c| !c.is_finite()) {
            return Err(EphemerisError::NonPhysical { body: body.name() });
        }
        Ok(equatorial)
    }
}
