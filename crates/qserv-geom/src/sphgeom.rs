//! Free functions for converting between spherical and Cartesian
//! coordinates, angular measurements, and longitude/latitude clamping.

use crate::vec3::Vec3;
use crate::{GeomError, Result};

/// 180/π
pub const DEG_PER_RAD: f64 = 57.2957795130823208767981548141;
/// π/180
pub const RAD_PER_DEG: f64 = 0.0174532925199432957692369076849;
/// 1 milliarcsecond, in degrees.
pub const EPSILON_DEG: f64 = 0.001 / 3600.0;
/// Maximum HTM subdivision level such that an id requires less than 32 bits.
pub const HTM_MAX_LEVEL: i32 = 13;

/// Clamp `lon` to at most 360 degrees. Inputs within [`EPSILON_DEG`] of 360
/// are mapped to exactly 360.0, which keeps chunk-width multiplication from
/// landing just past the boundary for the last (sub-)chunk in a (sub-)stripe.
pub fn clamp_lon(lon: f64) -> f64 {
    if lon > 360.0 - EPSILON_DEG {
        360.0
    } else {
        lon
    }
}

/// Clamp `lat` to lie in `[-90, 90]` degrees.
pub fn clamp_lat(lat: f64) -> f64 {
    if lat < -90.0 {
        -90.0
    } else if lat > 90.0 {
        90.0
    } else {
        lat
    }
}

/// Minimum angular delta between two longitude angles, in degrees.
pub fn min_delta_lon(lon1: f64, lon2: f64) -> f64 {
    let delta = (lon1 - lon2).abs();
    delta.min(360.0 - delta)
}

/// Range reduce `lon` to lie in `[0, 360)` degrees.
pub fn reduce_lon(lon: f64) -> f64 {
    let mut lon = lon % 360.0;
    if lon < 0.0 {
        lon += 360.0;
        if lon == 360.0 {
            lon = 0.0;
        }
    }
    lon
}

/// Longitude half-extent `[-α, α]` of the circle of radius `r` centered at
/// `(0, centerLat)` on the unit sphere. `r` and `centerLat` are in degrees;
/// `centerLat` is clamped to `[-90, 90]` and `r` must lie in `[0, 90]`.
pub fn max_alpha(r: f64, center_lat: f64) -> Result<f64> {
    if !(0.0..=90.0).contains(&r) {
        return Err(GeomError::InvalidRadius(r));
    }
    if r == 0.0 {
        return Ok(0.0);
    }
    let lat = clamp_lat(center_lat);
    if lat.abs() + r > 90.0 - 1.0 / 3600.0 {
        return Ok(180.0);
    }
    let r = r * RAD_PER_DEG;
    let lat = lat * RAD_PER_DEG;
    let y = r.sin();
    let x = ((lat - r).cos() * (lat + r).cos()).abs().sqrt();
    Ok(DEG_PER_RAD * (y / x).atan().abs())
}

/// Cartesian unit vector for the given `(lon, lat)` in degrees.
pub fn cartesian(lon: f64, lat: f64) -> Vec3 {
    let lon = lon * RAD_PER_DEG;
    let lat = lat * RAD_PER_DEG;
    let (sin_lon, cos_lon) = lon.sin_cos();
    let (sin_lat, cos_lat) = lat.sin_cos();
    Vec3::new(cos_lon * cos_lat, sin_lon * cos_lat, sin_lat)
}

/// Longitude/latitude (in degrees) for the given 3-vector.
pub fn spherical(v: &Vec3) -> (f64, f64) {
    let mut lon = 0.0;
    let mut lat = 0.0;
    let d2 = v.x * v.x + v.y * v.y;
    if d2 != 0.0 {
        let mut l = v.y.atan2(v.x) * DEG_PER_RAD;
        if l < 0.0 {
            l += 360.0;
            if l == 360.0 {
                l = 0.0;
            }
        }
        lon = l;
    }
    if v.z != 0.0 {
        lat = clamp_lat(v.z.atan2(d2.sqrt()) * DEG_PER_RAD);
    }
    (lon, lat)
}

/// Angular separation between two unit vectors, in radians.
pub fn ang_sep(v0: &Vec3, v1: &Vec3) -> f64 {
    let cs = v0.dot(v1);
    let ss = v0.cross(v1).norm();
    if cs == 0.0 && ss == 0.0 {
        0.0
    } else {
        ss.atan2(cs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reduce_lon_wraps_negative_and_multiples() {
        assert_eq!(reduce_lon(-10.0), 350.0);
        assert_eq!(reduce_lon(370.0), 10.0);
        assert_eq!(reduce_lon(0.0), 0.0);
    }

    #[test]
    fn max_alpha_zero_radius_is_zero() {
        assert_eq!(max_alpha(0.0, 45.0).unwrap(), 0.0);
    }

    #[test]
    fn max_alpha_rejects_out_of_range_radius() {
        assert!(max_alpha(91.0, 0.0).is_err());
        assert!(max_alpha(-1.0, 0.0).is_err());
    }

    #[test]
    fn max_alpha_near_pole_is_full_circle() {
        let alpha = max_alpha(1.0, 89.999).unwrap();
        assert_eq!(alpha, 180.0);
    }

    #[test]
    fn cartesian_spherical_round_trip() {
        let v = cartesian(123.4, -45.6);
        let (lon, lat) = spherical(&v);
        assert!((lon - 123.4).abs() < 1e-9);
        assert!((lat - -45.6).abs() < 1e-9);
    }

    #[test]
    fn ang_sep_orthogonal_vectors() {
        let a = Vec3::new(1.0, 0.0, 0.0);
        let b = Vec3::new(0.0, 1.0, 0.0);
        assert!((ang_sep(&a, &b) - std::f64::consts::FRAC_PI_2).abs() < 1e-12);
    }

    #[test]
    fn ang_sep_identical_vectors_is_zero() {
        let a = Vec3::new(1.0, 0.0, 0.0);
        assert!(ang_sep(&a, &a).abs() < 1e-15);
    }
}
