//! Coordinate kernel: sidereal time, precession and the equatorial to
//! horizontal transform.
//!
//! Angles are degrees unless a name says otherwise; right ascension is
//! carried in hours at the public boundary, matching how the Moon's position
//! is reported.

use crate::utils::config::{EARTH_FLATTENING, EARTH_RADIUS_KM, JD_J2000};
use crate::utils::time_utils::AstronomicalTime;
use crate::utils::vector_math::rotate;

const ARCSEC_TO_DEG: f64 = 1.0 / 3600.0;

/// Compass points clockwise from north
const COMPASS_POINTS: [&str; 8] = ["N", "NE", "E", "SE", "S", "SW", "W", "NW"];

/// Wrap an angle into [0, 360).
#[inline]
pub fn normalize_degrees(angle: f64) -> f64 {
    let wrapped = angle.rem_euclid(360.0);
    // rem_euclid of a tiny negative value rounds up to exactly 360
    if wrapped >= 360.0 {
        0.0
    } else {
        wrapped
    }
}

/// Greenwich Mean Sidereal Time in degrees [0, 360).
///
/// Meeus, Astronomical Algorithms, eq. 12.4. UT1 is approximated by UTC.
/// The whole-day part of the elapsed time contributes whole turns of the
/// 360° term, so only the day fraction enters it.
pub fn gmst_deg(time: &AstronomicalTime) -> f64 {
    let d = time.days_since_j2000();
    let t = time.centuries_since_j2000();
    let gmst = 280.460_618_37
        + 360.0 * time.fraction()
        + 0.985_647_366_29 * d
        + 0.000_387_933 * t * t
        - t * t * t / 38_710_000.0;
    normalize_degrees(gmst)
}

/// Local sidereal time in degrees for an east-positive longitude
pub fn local_sidereal_deg(time: &AstronomicalTime, longitude_deg: f64) -> f64 {
    normalize_degrees(gmst_deg(time) + longitude_deg)
}

/// Convert equatorial coordinates of date to horizontal coordinates.
///
/// # Arguments
/// * `ra_hours` - Right ascension in hours
/// * `dec_deg` - Declination in degrees
/// * `lat_deg` - Observer geodetic latitude in degrees
/// * `lon_deg` - Observer longitude in degrees, east positive
/// * `time` - Instant on the astronomical time scale
///
/// # Returns
/// `(altitude_deg, azimuth_deg)` with azimuth measured from north through
/// east in [0, 360). At the zenith or nadir the azimuth is arbitrary but
/// finite.
pub fn equatorial_to_horizontal(
    ra_hours: f64,
    dec_deg: f64,
    lat_deg: f64,
    lon_deg: f64,
    time: &AstronomicalTime,
) -> (f64, f64) {
    let hour_angle = (local_sidereal_deg(time, lon_deg) - ra_hours * 15.0).to_radians();
    let (sin_dec, cos_dec) = dec_deg.to_radians().sin_cos();
    let (sin_lat, cos_lat) = lat_deg.to_radians().sin_cos();
    let (sin_h, cos_h) = hour_angle.sin_cos();

    let sin_alt = (sin_lat * sin_dec + cos_lat * cos_dec * cos_h).clamp(-1.0, 1.0);
    let altitude = sin_alt.asin().to_degrees();

    let y = -cos_dec * sin_h;
    let x = sin_dec * cos_lat - cos_dec * sin_lat * cos_h;
    let azimuth = normalize_degrees(y.atan2(x).to_degrees());

    (altitude, azimuth)
}

/// 8-point compass name for an azimuth in degrees
pub fn compass_direction(azimuth_deg: f64) -> &'static str {
    let index = (normalize_degrees(azimuth_deg) / 45.0).round() as usize % COMPASS_POINTS.len();
    COMPASS_POINTS[index]
}

/// IAU 1976 precession matrix from the J2000 mean equator to the mean
/// equator of date (Lieske 1977).
///
/// # Arguments
/// * `t` - Julian centuries (TT) since J2000.0
pub fn precession_matrix(t: f64) -> [[f64; 3]; 3] {
    let t2 = t * t;
    let t3 = t2 * t;
    let zeta = ((2306.2181 * t + 0.30188 * t2 + 0.017998 * t3) * ARCSEC_TO_DEG).to_radians();
    let z = ((2306.2181 * t + 1.09468 * t2 + 0.018203 * t3) * ARCSEC_TO_DEG).to_radians();
    let theta = ((2004.3109 * t - 0.42665 * t2 - 0.041833 * t3) * ARCSEC_TO_DEG).to_radians();

    let (sz, cz) = zeta.sin_cos();
    let (sth, cth) = theta.sin_cos();
    let (szz, czz) = z.sin_cos();

    [
        [
            cz * cth * czz - sz * szz,
            -sz * cth * czz - cz * szz,
            -sth * czz,
        ],
        [
            cz * cth * szz + sz * czz,
            -sz * cth * szz + cz * czz,
            -sth * szz,
        ],
        [cz * sth, -sz * sth, cth],
    ]
}

/// Rotate a J2000 equatorial vector onto the mean equator of date
pub fn precess_j2000_to_date(v: &[f64; 3], jd_tt: f64) -> [f64; 3] {
    let t = (jd_tt - JD_J2000) / 36_525.0;
    rotate(&precession_matrix(t), v)
}

/// Mean obliquity of the ecliptic in degrees (Lieske 1977)
pub fn mean_obliquity_deg(t: f64) -> f64 {
    23.439_291_111 - (46.8150 * t + 0.00059 * t * t - 0.001813 * t * t * t) * ARCSEC_TO_DEG
}

/// Rotate an ecliptic vector into the equatorial frame of the same equinox
pub fn ecliptic_to_equatorial(v: &[f64; 3], obliquity_deg: f64) -> [f64; 3] {
    let (s, c) = obliquity_deg.to_radians().sin_cos();
    [v[0], c * v[1] - s * v[2], s * v[1] + c * v[2]]
}

/// Geocentric position (km) of a sea-level observer on the WGS84
/// ellipsoid, in the equatorial frame of date.
///
/// # Arguments
/// * `lat_deg` - Geodetic latitude
/// * `local_sidereal_deg` - Local sidereal time, which orients the
///   observer's meridian in the equatorial frame
pub fn observer_geocentric_position(lat_deg: f64, local_sidereal_deg: f64) -> [f64; 3] {
    let (sin_lat, cos_lat) = lat_deg.to_radians().sin_cos();
    let (sin_lst, cos_lst) = local_sidereal_deg.to_radians().sin_cos();
    let b_over_a = 1.0 - EARTH_FLATTENING;
    let c = 1.0 / (cos_lat * cos_lat + b_over_a * b_over_a * sin_lat * sin_lat).sqrt();
    let s = b_over_a * b_over_a * c;

    let rho_cos = EARTH_RADIUS_KM * c * cos_lat;
    [
        rho_cos * cos_lst,
        rho_cos * sin_lst,
        EARTH_RADIUS_KM * s * sin_lat,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::time_utils::to_astronomical_time;
    use chrono::{TimeZone, Utc};

    #[test]
    fn gmst_meeus_example_12a() {
        // 1987 April 10, 0h UT: GMST = 13h10m46.3668s = 197.693195°
        let dt = Utc.with_ymd_and_hms(1987, 4, 10, 0, 0, 0).unwrap();
        let gmst = gmst_deg(&to_astronomical_time(&dt));
        assert!((gmst - 197.693_195).abs() < 1e-5, "gmst = {gmst}");
    }

    #[test]
    fn gmst_meeus_example_12b() {
        // 1987 April 10, 19:21:00 UT: GMST = 8h34m57.0896s = 128.737873°
        let dt = Utc.with_ymd_and_hms(1987, 4, 10, 19, 21, 0).unwrap();
        let gmst = gmst_deg(&to_astronomical_time(&dt));
        assert!((gmst - 128.737_873).abs() < 1e-5, "gmst = {gmst}");
    }

    #[test]
    fn object_on_meridian_is_due_south() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 1, 20, 0, 0).unwrap();
        let time = to_astronomical_time(&dt);
        let lst_hours = local_sidereal_deg(&time, 10.0) / 15.0;
        let (alt, az) = equatorial_to_horizontal(lst_hours, 0.0, 50.0, 10.0, &time);
        assert!((alt - 40.0).abs() < 1e-9);
        assert!((az - 180.0).abs() < 1e-9);
    }

    #[test]
    fn zenith_is_finite() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 1, 20, 0, 0).unwrap();
        let time = to_astronomical_time(&dt);
        let lst_hours = local_sidereal_deg(&time, 0.0) / 15.0;
        let (alt, az) = equatorial_to_horizontal(lst_hours, 45.0, 45.0, 0.0, &time);
        assert!((alt - 90.0).abs() < 1e-6);
        assert!(az.is_finite() && (0.0..360.0).contains(&az));
    }

    #[test]
    fn rising_object_is_in_the_east() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 1, 20, 0, 0).unwrap();
        let time = to_astronomical_time(&dt);
        // Hour angle -6h on the celestial equator: on the horizon, due east
        let ra = (local_sidereal_deg(&time, 0.0) + 90.0) / 15.0;
        let (alt, az) = equatorial_to_horizontal(ra, 0.0, 30.0, 0.0, &time);
        assert!(alt.abs() < 1e-9);
        assert!((az - 90.0).abs() < 1e-9);
    }

    #[test]
    fn compass_points_round_to_nearest() {
        assert_eq!(compass_direction(0.0), "N");
        assert_eq!(compass_direction(22.4), "N");
        assert_eq!(compass_direction(22.6), "NE");
        assert_eq!(compass_direction(350.0), "N");
        assert_eq!(compass_direction(200.0), "S");
        assert_eq!(compass_direction(-90.0), "W");
    }

    #[test]
    fn precession_is_identity_at_j2000_and_orthonormal() {
        let m = precession_matrix(0.0);
        for (i, row) in m.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                let expected = if i == j { 1.0 } else { 0.0 };
                assert!((value - expected).abs() < 1e-15);
            }
        }
        let m = precession_matrix(0.25);
        for row in &m {
            let norm: f64 = row.iter().map(|x| x * x).sum();
            assert!((norm - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn observer_radius_on_ellipsoid() {
        let equator = observer_geocentric_position(0.0, 0.0);
        assert!((equator[0] - EARTH_RADIUS_KM).abs() < 1e-9);
        let pole = observer_geocentric_position(90.0, 0.0);
        let polar_radius = EARTH_RADIUS_KM * (1.0 - EARTH_FLATTENING);
        assert!((pole[2] - polar_radius).abs() < 1e-6);
    }
}
