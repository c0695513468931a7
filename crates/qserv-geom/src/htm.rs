//! Hierarchical Triangular Mesh ids: the 32-bit encoding of a recursive
//! quadrisection of the unit sphere into 8 root triangles, each subdivided
//! to at most [`crate::sphgeom::HTM_MAX_LEVEL`].
//!
//! Root triangle numbering and vertex layout: see
//! <http://research.microsoft.com/apps/pubs/default.aspx?id=64531>.

use crate::sphgeom::HTM_MAX_LEVEL;
use crate::vec3::Vec3;
use crate::{GeomError, Result};

const X: Vec3 = Vec3::new(1.0, 0.0, 0.0);
const Y: Vec3 = Vec3::new(0.0, 1.0, 0.0);
const Z: Vec3 = Vec3::new(0.0, 0.0, 1.0);
const NX: Vec3 = Vec3::new(-1.0, 0.0, 0.0);
const NY: Vec3 = Vec3::new(0.0, -1.0, 0.0);
const NZ: Vec3 = Vec3::new(0.0, 0.0, -1.0);

/// Vertex triplet for each of the 8 root (level 0) triangles, in the order
/// S0, S1, S2, S3, N0, N1, N2, N3.
pub const ROOT_VERT: [[Vec3; 3]; 8] = [
    [X, NZ, Y],   // S0
    [Y, NZ, NX],  // S1
    [NX, NZ, NY], // S2
    [NY, NZ, X],  // S3
    [X, Z, NY],   // N0
    [NY, Z, NX],  // N1
    [NX, Z, Y],   // N2
    [Y, Z, X],    // N3
];

/// Root triangle number (0..8) containing `v`. 'S' triangles cover the
/// southern hemisphere, 'N' the northern.
fn root_num_for(v: &Vec3) -> u32 {
    const S0: u32 = 0;
    const S1: u32 = 1;
    const S2: u32 = 2;
    const S3: u32 = 3;
    const N0: u32 = 4;
    const N1: u32 = 5;
    const N2: u32 = 6;
    const N3: u32 = 7;
    if v.z < 0.0 {
        if v.y > 0.0 {
            if v.x > 0.0 { S0 } else { S1 }
        } else if v.y == 0.0 {
            if v.x >= 0.0 { S0 } else { S2 }
        } else if v.x < 0.0 {
            S2
        } else {
            S3
        }
    } else if v.y > 0.0 {
        if v.x > 0.0 { N3 } else { N2 }
    } else if v.y == 0.0 {
        if v.x >= 0.0 { N3 } else { N1 }
    } else if v.x < 0.0 {
        N1
    } else {
        N0
    }
}

/// HTM id of `v` at the given subdivision level.
pub fn htm_id(v: &Vec3, level: i32) -> Result<u32> {
    if !(0..=HTM_MAX_LEVEL).contains(&level) {
        return Err(GeomError::InvalidLevel(level));
    }
    let root = root_num_for(v);
    if level == 0 {
        return Ok(root + 8);
    }
    let [mut v0, mut v1, mut v2] = ROOT_VERT[root as usize];
    let mut id = root + 8;
    for _ in 0..level {
        let sv1 = (v2 + v0).normalize();
        let sv2 = (v0 + v1).normalize();
        if v.dot(&(sv1 + sv2).cross(&(sv1 - sv2))) >= 0.0 {
            v1 = sv2;
            v2 = sv1;
            id <<= 2;
            continue;
        }
        let sv0 = (v1 + v2).normalize();
        if v.dot(&(sv2 + sv0).cross(&(sv2 - sv0))) >= 0.0 {
            v0 = v1;
            v1 = sv0;
            v2 = sv2;
            id = (id << 2) + 1;
            continue;
        }
        if v.dot(&(sv0 + sv1).cross(&(sv0 - sv1))) >= 0.0 {
            v0 = v2;
            v1 = sv1;
            v2 = sv0;
            id = (id << 2) + 2;
        } else {
            v0 = sv0;
            v1 = sv1;
            v2 = sv2;
            id = (id << 2) + 3;
        }
    }
    Ok(id)
}

/// Subdivision level of `id`, or -1 if `id` is not a valid HTM id.
pub fn htm_level(id: u32) -> i32 {
    if id < 8 {
        return -1;
    }
    // Set x to 2^(i+1) - 1, where i is the index of the MSB of id.
    let mut x = id;
    x |= x >> 1;
    x |= x >> 2;
    x |= x >> 4;
    x |= x >> 8;
    x |= x >> 16;
    // Hamming weight of x, via the standard SWAR popcount.
    const M1: u32 = 0x5555_5555;
    const M2: u32 = 0x3333_3333;
    const M4: u32 = 0x0f0f_0f0f;
    const H01: u32 = 0x0101_0101;
    x -= (x >> 1) & M1;
    x = (x & M2) + ((x >> 2) & M2);
    x = (x + (x >> 4)) & M4;
    let level = ((x.wrapping_mul(H01)) >> 24).wrapping_sub(4);
    if level & 1 != 0 || (id >> level) & 0x8 == 0 || level > (HTM_MAX_LEVEL as u32) * 2 {
        return -1;
    }
    (level >> 1) as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sphgeom::cartesian;

    #[test]
    fn level_0_ids_are_8_through_15() {
        for r in 0..8u32 {
            let v = ROOT_VERT[r as usize][0];
            assert_eq!(htm_id(&v, 0).unwrap(), r + 8);
            assert_eq!(htm_level(r + 8), 0);
        }
    }

    #[test]
    fn level_is_recovered_from_id() {
        let v = cartesian(37.5, 12.25);
        for level in 0..=HTM_MAX_LEVEL {
            let id = htm_id(&v, level).unwrap();
            assert_eq!(htm_level(id), level);
        }
    }

    #[test]
    fn invalid_ids_report_level_negative_one() {
        assert_eq!(htm_level(0), -1);
        assert_eq!(htm_level(7), -1);
    }

    #[test]
    fn out_of_range_level_is_rejected() {
        let v = cartesian(0.0, 0.0);
        assert!(htm_id(&v, -1).is_err());
        assert!(htm_id(&v, HTM_MAX_LEVEL + 1).is_err());
    }

    #[test]
    fn poles_and_axes_land_in_expected_roots() {
        // North pole is shared by all N triangles; south pole by all S.
        assert_eq!(htm_level(htm_id(&Vec3::new(0.0, 0.0, 1.0), 0).unwrap()), 0);
        assert_eq!(htm_level(htm_id(&Vec3::new(0.0, 0.0, -1.0), 0).unwrap()), 0);
    }
}
