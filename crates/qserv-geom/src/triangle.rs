//! A spherical triangle with great-circle edges, and the machinery for
//! converting between Cartesian points and spherical barycentric
//! coordinates.
//!
//! Given linearly independent triangle vertices `v1, v2, v3` the spherical
//! barycentric coordinates `b1, b2, b3` of a point `v` solve
//! `b1*v1 + b2*v2 + b3*v3 = v`. Writing `M` for the matrix with columns
//! `v1, v2, v3` this is `M*b = v`, i.e. `b = M^-1 * v`.
//!
//! The data duplicator uses this to copy points from a non-empty triangle
//! `src` into an empty triangle `dst`: for a point `v` in `src`, the copy's
//! position is `Mdst * (Msrc^-1 * v)`. Since HTM triangles don't vary much
//! in area or proportions, that composed matrix behaves close to a
//! rotation, so the copy avoids the distortion that shifting points around
//! in spherical coordinates directly would introduce near the poles.

use crate::htm::{htm_level, ROOT_VERT};
use crate::mat3::Mat3;
use crate::sbox::SphericalBox;
use crate::sphgeom::{ang_sep, EPSILON_DEG, RAD_PER_DEG};
use crate::vec3::Vec3;
use crate::{GeomError, Result};

#[derive(Debug, Clone, Copy)]
pub struct SphericalTriangle {
    m: Mat3,
    mi: Mat3,
}

impl SphericalTriangle {
    /// Build the triangle with the given vertices (counter-clockwise, as
    /// seen from outside the sphere).
    pub fn new(v0: Vec3, v1: Vec3, v2: Vec3) -> Self {
        let m = Mat3::from_cols(v0, v1, v2);
        let mi = m.inverse().expect("triangle vertices must be independent");
        SphericalTriangle { m, mi }
    }

    /// Reconstruct the triangle with the given HTM id by walking the
    /// subdivision steps encoded in its bits, starting from the root
    /// triangle identified by the 3 MSBs.
    pub fn from_htm_id(id: u32) -> Result<Self> {
        let level = htm_level(id);
        if level < 0 {
            return Err(GeomError::InvalidHtmId(id));
        }
        let root = (id >> (level * 2)) - 8;
        let [mut v0, mut v1, mut v2] = ROOT_VERT[root as usize];
        for shift in (0..level).rev() {
            let child = (id >> (shift * 2)) & 0x3;
            let sv0 = (v1 + v2).normalize();
            let sv1 = (v2 + v0).normalize();
            let sv2 = (v0 + v1).normalize();
            match child {
                0 => {
                    v1 = sv2;
                    v2 = sv1;
                }
                1 => {
                    v0 = v1;
                    v1 = sv0;
                    v2 = sv2;
                }
                2 => {
                    v0 = v2;
                    v1 = sv1;
                    v2 = sv0;
                }
                _ => {
                    v0 = sv0;
                    v1 = sv1;
                    v2 = sv2;
                }
            }
        }
        Ok(Self::new(v0, v1, v2))
    }

    pub fn vertex(&self, i: usize) -> Vec3 {
        self.m.col[i]
    }

    /// Matrix mapping spherical barycentric coordinates to Cartesian space.
    pub fn cartesian_transform(&self) -> &Mat3 {
        &self.m
    }

    /// Matrix mapping Cartesian points to spherical barycentric coordinates.
    pub fn barycentric_transform(&self) -> &Mat3 {
        &self.mi
    }

    /// Area in steradians, via Girard's theorem (the spherical excess: the
    /// sum of interior angles minus π). Accurate for the HTM triangle sizes
    /// this is used with in practice (tenths of a degree); very small
    /// triangles would need a more numerically stable formula.
    pub fn area(&self) -> f64 {
        let p01 = (self.vertex(1) + self.vertex(0)).cross(&(self.vertex(1) - self.vertex(0)));
        let p12 = (self.vertex(2) + self.vertex(1)).cross(&(self.vertex(2) - self.vertex(1)));
        let p20 = (self.vertex(0) + self.vertex(2)).cross(&(self.vertex(0) - self.vertex(2)));
        2.0 * std::f64::consts::PI - ang_sep(&p20, &p01) - ang_sep(&p01, &p12) - ang_sep(&p12, &p20)
    }

    /// Area of this triangle intersected with `box_`, in steradians.
    ///
    /// The triangle is clipped against the box's two longitude half-spaces
    /// (great circles) and its two latitude half-spaces (small circles);
    /// the resulting spherical polygon has Euler characteristic 1, so by
    /// Gauss-Bonnet its area is `2π` minus the turning angles along its
    /// boundary. Boxes with longitude extent over 180 degrees are rejected:
    /// their intersection with the triangle need not be convex.
    pub fn intersection_area(&self, box_: &SphericalBox) -> Result<f64> {
        if box_.get_lon_min() == box_.get_lon_max()
            || box_.get_lat_min() >= 90.0 - EPSILON_DEG
            || box_.get_lat_max() <= -90.0 + EPSILON_DEG
        {
            return Ok(0.0);
        }
        if box_.is_full() {
            return Ok(self.area());
        }
        let zmin = (box_.get_lat_min() * RAD_PER_DEG).sin();
        let zmax = (box_.get_lat_max() * RAD_PER_DEG).sin();
        if zmin >= zmax {
            return Ok(0.0);
        }
        let mut ve: Vec<(Vec3, Vec3)> = vec![
            (
                self.vertex(0),
                (self.vertex(1) + self.vertex(0)).cross(&(self.vertex(1) - self.vertex(0))),
            ),
            (
                self.vertex(1),
                (self.vertex(2) + self.vertex(1)).cross(&(self.vertex(2) - self.vertex(1))),
            ),
            (
                self.vertex(2),
                (self.vertex(0) + self.vertex(2)).cross(&(self.vertex(0) - self.vertex(2))),
            ),
        ];
        if box_.get_lon_min() != 0.0 || box_.get_lon_max() != 360.0 {
            let lon_extent = box_.get_lon_extent();
            if lon_extent > 180.0 + EPSILON_DEG {
                return Err(GeomError::NotImplemented);
            }
            let lon = RAD_PER_DEG * box_.get_lon_min();
            ve = clip(&ve, &Vec3::new(-lon.sin(), lon.cos(), 0.0));
            if ve.is_empty() {
                return Ok(0.0);
            }
            if lon_extent < 180.0 - EPSILON_DEG {
                let lon = RAD_PER_DEG * box_.get_lon_max();
                ve = clip(&ve, &Vec3::new(lon.sin(), -lon.cos(), 0.0));
                if ve.is_empty() {
                    return Ok(0.0);
                }
            }
        }
        Ok(z_area(&ve, zmin, zmax))
    }
}

/// Intersect the convex spherical polygon given by `(vertex, edge normal)`
/// pairs with the half-space `plane.dot(v) >= 0`.
fn clip(ve: &[(Vec3, Vec3)], plane: &Vec3) -> Vec<(Vec3, Vec3)> {
    let n = ve.len();
    let mut out = Vec::with_capacity(n + 1);
    let mut inside = plane.dot(&ve[n - 1].0) >= 0.0;
    let mut j = n - 1;
    for i in 0..n {
        if plane.dot(&ve[i].0) >= 0.0 {
            if !inside {
                let edge = ve[j].1.normalize();
                out.push(((edge + *plane).cross(&(edge - *plane)).normalize(), ve[j].1));
                inside = true;
            }
            out.push(ve[i]);
        } else if inside {
            let edge = ve[j].1.normalize();
            out.push(((*plane + edge).cross(&(*plane - edge)).normalize(), *plane));
            inside = false;
        }
        j = i;
    }
    out
}

/// A list of disjoint longitude angle ranges (radians), used to track the
/// portion of a small circle (z = zmin or z = zmax) still on the boundary
/// of the clipped polygon.
struct LonRangeList {
    ranges: Vec<(f64, f64)>,
}

impl LonRangeList {
    fn new() -> Self {
        LonRangeList {
            ranges: vec![(-std::f64::consts::PI, std::f64::consts::PI)],
        }
    }

    fn empty(&self) -> bool {
        self.ranges.is_empty()
    }

    fn full(&self) -> bool {
        self.ranges.len() == 1
            && self.ranges[0].0 == -std::f64::consts::PI
            && self.ranges[0].1 == std::f64::consts::PI
    }

    fn clear(&mut self) {
        self.ranges.clear();
    }

    fn clip(&mut self, lon0: f64, lon1: f64) {
        let mut out = Vec::with_capacity(self.ranges.len() + 1);
        for &(clon0, clon1) in &self.ranges {
            if lon0 < lon1 {
                if lon0 < clon1 && lon1 > clon0 {
                    let (a, b) = (lon0.max(clon0), lon1.min(clon1));
                    if a != b {
                        out.push((a, b));
                    }
                }
            } else if clon0 < lon1 {
                out.push((clon0, clon1.min(lon1)));
                if clon1 > lon0 {
                    out.push((lon0, clon1));
                }
            } else if clon1 > lon0 {
                out.push((clon0.max(lon0), clon1));
            }
        }
        self.ranges = out;
    }

    fn extent(&self) -> f64 {
        self.ranges.iter().map(|(a, b)| b - a).sum()
    }
}

/// Area of the convex polygon `ve` intersected with `zmin <= z <= zmax`.
fn z_area(ve: &[(Vec3, Vec3)], zmin: f64, zmax: f64) -> f64 {
    let num_verts = ve.len();
    let mut angle = 0.0;
    let mut bot = LonRangeList::new();
    let mut top = LonRangeList::new();
    let mut j = num_verts - 1;
    for i in 0..num_verts {
        let z = ve[i].0.z;
        let n = ve[j].1;
        if z >= zmin && z <= zmax {
            angle += ang_sep(&n, &ve[i].1);
        }
        let u = n.x * n.x + n.y * n.y;
        let n2 = u + n.z * n.z;
        if u == 0.0 {
            if n.z * zmin <= 0.0 {
                bot.clear();
            }
            if n.z * zmax <= 0.0 {
                top.clear();
            }
            j = i;
            continue;
        }
        let p = Vec3::new(-n.x * n.z, -n.y * n.z, u);
        let nc = Vec3::new(n.y, -n.x, 0.0);

        let z2 = zmin * zmin;
        let v = u - n2 * z2;
        if v > 0.0 && !bot.empty() {
            let lambda = v.sqrt();
            let v0 = p.scale(zmin) + nc.scale(lambda);
            let v1 = p.scale(zmin) - nc.scale(lambda);
            if ang_sep(&v0, &v1) <= RAD_PER_DEG / 36000.0 {
                if n.z * zmin < 0.0 {
                    bot.clear();
                }
            } else {
                let ncv0 = n.cross(&v0);
                let ncv1 = n.cross(&v1);
                if ncv0.dot(&ve[j].0) < 0.0 && ncv0.dot(&ve[i].0) > 0.0 {
                    angle += ang_sep(&ncv0, &Vec3::new(-v0.y, v0.x, 0.0));
                }
                if ncv1.dot(&ve[j].0) < 0.0 && ncv1.dot(&ve[i].0) > 0.0 {
                    angle += ang_sep(&ncv1, &Vec3::new(-v1.y, v1.x, 0.0));
                }
                bot.clip(v0.y.atan2(v0.x), v1.y.atan2(v1.x));
            }
        } else if n.z * zmin < 0.0 {
            bot.clear();
        }

        let z2 = zmax * zmax;
        let v = u - n2 * z2;
        if v > 0.0 && !top.empty() {
            let lambda = v.sqrt();
            let v0 = p.scale(zmax) - nc.scale(lambda);
            let v1 = p.scale(zmax) + nc.scale(lambda);
            if ang_sep(&v0, &v1) <= RAD_PER_DEG / 36000.0 {
                if n.z * zmax < 0.0 {
                    top.clear();
                }
            } else {
                let ncv0 = n.cross(&v0);
                let ncv1 = n.cross(&v1);
                if ncv0.dot(&ve[j].0) < 0.0 && ncv0.dot(&ve[i].0) > 0.0 {
                    angle += ang_sep(&ncv0, &Vec3::new(v0.y, -v0.x, 0.0));
                }
                if ncv1.dot(&ve[j].0) < 0.0 && ncv1.dot(&ve[i].0) > 0.0 {
                    angle += ang_sep(&ncv1, &Vec3::new(v1.y, -v1.x, 0.0));
                }
                top.clip(v1.y.atan2(v1.x), v0.y.atan2(v0.x));
            }
        } else if n.z * zmax < 0.0 {
            top.clear();
        }
        j = i;
    }
    let mut chi = 1.0;
    if angle == 0.0 && bot.empty() && top.empty() {
        return 0.0;
    } else if bot.full() && top.full() {
        chi = 0.0;
    } else if angle != 0.0 && (bot.full() || top.full()) {
        chi = 0.0;
    }
    let area = 2.0 * std::f64::consts::PI * chi - angle + top.extent() * zmax - bot.extent() * zmin;
    area.max(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::htm::htm_id;
    use crate::sphgeom::cartesian;

    #[test]
    fn root_triangle_area_is_one_eighth_sphere() {
        let t = SphericalTriangle::from_htm_id(8).unwrap();
        let full_sphere = 4.0 * std::f64::consts::PI;
        assert!((t.area() - full_sphere / 8.0).abs() < 1e-9);
    }

    #[test]
    fn subdividing_quarters_the_area() {
        let parent = SphericalTriangle::from_htm_id(9).unwrap();
        let mut child_area = 0.0;
        for child in 0..4 {
            let id = 9 * 4 + child;
            child_area += SphericalTriangle::from_htm_id(id).unwrap().area();
        }
        assert!((parent.area() - child_area).abs() < 1e-9);
    }

    #[test]
    fn full_box_intersection_equals_triangle_area() {
        let t = SphericalTriangle::from_htm_id(8).unwrap();
        let full = SphericalBox::new(0.0, 360.0, -90.0, 90.0).unwrap();
        assert!((t.intersection_area(&full).unwrap() - t.area()).abs() < 1e-9);
    }

    #[test]
    fn disjoint_box_has_zero_intersection() {
        let t = SphericalTriangle::from_htm_id(8).unwrap();
        // S0 lives in the southern hemisphere; a tiny box near the north
        // pole cannot intersect it.
        let box_ = SphericalBox::new(0.0, 10.0, 89.0, 90.0).unwrap();
        assert!(t.intersection_area(&box_).unwrap() < 1e-9);
    }

    #[test]
    fn wide_box_is_rejected() {
        let t = SphericalTriangle::from_htm_id(8).unwrap();
        let box_ = SphericalBox::new(0.0, 270.0, -90.0, 0.0).unwrap();
        assert!(matches!(
            t.intersection_area(&box_),
            Err(GeomError::NotImplemented)
        ));
    }

    #[test]
    fn barycentric_round_trip() {
        let t = SphericalTriangle::from_htm_id(htm_id(&cartesian(10.0, 20.0), 3).unwrap()).unwrap();
        let b = t.barycentric_transform().mul_vec(&t.vertex(0));
        let v = t.cartesian_transform().mul_vec(&b);
        assert!((v - t.vertex(0)).norm() < 1e-12);
    }
}
