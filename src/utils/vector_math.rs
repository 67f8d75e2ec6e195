//! Vector math utilities for position and shadow-geometry calculations
//!
//! Plain `[f64; 3]` helpers used by the coordinate kernel, the ephemeris
//! sources and the eclipse classifier.

/// Convert RA/Dec coordinates to a unit vector
///
/// # Arguments
/// * `ra_deg` - Right ascension in degrees
/// * `dec_deg` - Declination in degrees
///
/// # Returns
/// Unit vector [x, y, z] in the equatorial frame the angles are referred to
pub fn radec_to_unit_vector(ra_deg: f64, dec_deg: f64) -> [f64; 3] {
    let ra_rad = ra_deg.to_radians();
    let dec_rad = dec_deg.to_radians();
    let cos_dec = dec_rad.cos();
    [
        cos_dec * ra_rad.cos(),
        cos_dec * ra_rad.sin(),
        dec_rad.sin(),
    ]
}

/// Split a cartesian vector into right ascension (deg, [0, 360)), declination
/// (deg) and length.
///
/// A zero vector yields `(0, 0, 0)`.
pub fn unit_vector_to_radec(v: &[f64; 3]) -> (f64, f64, f64) {
    let r = vector_magnitude(v);
    if r == 0.0 {
        return (0.0, 0.0, 0.0);
    }
    let ra = v[1].atan2(v[0]).to_degrees().rem_euclid(360.0);
    let dec = (v[2] / r).clamp(-1.0, 1.0).asin().to_degrees();
    (ra, dec, r)
}

/// Normalize a 3D vector to unit length
///
/// # Returns
/// Normalized unit vector, or [0, 0, 0] if input magnitude is zero
pub fn normalize_vector(v: &[f64; 3]) -> [f64; 3] {
    let mag = vector_magnitude(v);
    if mag > 0.0 {
        [v[0] / mag, v[1] / mag, v[2] / mag]
    } else {
        [0.0, 0.0, 0.0]
    }
}

/// Calculate the dot product of two 3D vectors
pub fn dot_product(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

/// Calculate the magnitude (length) of a 3D vector
pub fn vector_magnitude(v: &[f64; 3]) -> f64 {
    dot_product(v, v).sqrt()
}

pub fn subtract(a: &[f64; 3], b: &[f64; 3]) -> [f64; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

pub fn scale(v: &[f64; 3], k: f64) -> [f64; 3] {
    [v[0] * k, v[1] * k, v[2] * k]
}

/// Apply a 3x3 row-major rotation matrix to a vector
pub fn rotate(m: &[[f64; 3]; 3], v: &[f64; 3]) -> [f64; 3] {
    [dot_product(&m[0], v), dot_product(&m[1], v), dot_product(&m[2], v)]
}

/// Perpendicular distance from `point` to the line through the origin with
/// direction `axis`, together with the signed distance along the axis.
///
/// # Returns
/// `(along, across)`; `along` is negative when `point` lies behind the
/// origin with respect to `axis`.
pub fn axis_offsets(point: &[f64; 3], axis: &[f64; 3]) -> (f64, f64) {
    let unit = normalize_vector(axis);
    let along = dot_product(point, &unit);
    let across_sq = (dot_product(point, point) - along * along).max(0.0);
    (along, across_sq.sqrt())
}
