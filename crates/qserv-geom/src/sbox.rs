//! A bounding box in spherical coordinate space: a pair of longitude and
//! latitude angles, possibly spanning the full sphere, a spherical cap, a
//! lune, or a box that wraps the 0/360 degree discontinuity.

use crate::htm::ROOT_VERT;
use crate::mat3::Mat3;
use crate::sphgeom::{ang_sep, clamp_lat, max_alpha, reduce_lon, spherical, RAD_PER_DEG};
use crate::vec3::Vec3;
use crate::{GeomError, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphericalBox {
    lon_min: f64,
    lon_max: f64,
    lat_min: f64,
    lat_max: f64,
}

impl Default for SphericalBox {
    /// The full sphere.
    fn default() -> Self {
        SphericalBox {
            lon_min: 0.0,
            lon_max: 360.0,
            lat_min: -90.0,
            lat_max: 90.0,
        }
    }
}

impl SphericalBox {
    pub fn new(lon_min: f64, lon_max: f64, lat_min: f64, lat_max: f64) -> Result<Self> {
        if lat_min > lat_max {
            return Err(GeomError::InvalidBox(format!(
                "latitude max {lat_max} < min {lat_min}"
            )));
        } else if lon_max < lon_min && (lon_max < 0.0 || lon_min > 360.0) {
            return Err(GeomError::InvalidBox(format!(
                "longitude max {lon_max} < min {lon_min}"
            )));
        }
        let (lon_min, lon_max) = if lon_max - lon_min >= 360.0 {
            (0.0, 360.0)
        } else {
            (reduce_lon(lon_min), reduce_lon(lon_max))
        };
        Ok(SphericalBox {
            lon_min,
            lon_max,
            lat_min: clamp_lat(lat_min),
            lat_max: clamp_lat(lat_max),
        })
    }

    /// A conservative bounding box for the given triangle, computed from
    /// its bounding circle.
    pub fn from_triangle(v0: Vec3, v1: Vec3, v2: Vec3) -> Result<Self> {
        let cv = v0 + v1 + v2;
        let mut r = ang_sep(&cv, &v0);
        r = r.max(ang_sep(&cv, &v1));
        r = r.max(ang_sep(&cv, &v2));
        let r = r * crate::sphgeom::DEG_PER_RAD + 1.0 / 3600.0;
        let (c_lon, c_lat) = spherical(&cv);
        let alpha = max_alpha(r, c_lat)?;
        let lat_min = clamp_lat(c_lat - r);
        let lat_max = clamp_lat(c_lat + r);
        if alpha > 180.0 - 1.0 / 3600.0 {
            return Ok(SphericalBox {
                lon_min: 0.0,
                lon_max: 360.0,
                lat_min,
                lat_max,
            });
        }
        let mut lon_min = c_lon - alpha;
        if lon_min < 0.0 {
            lon_min += 360.0;
            if lon_min == 360.0 {
                lon_min = 0.0;
            }
        }
        let mut lon_max = c_lon + alpha;
        if lon_max > 360.0 {
            lon_max -= 360.0;
        }
        Ok(SphericalBox {
            lon_min,
            lon_max,
            lat_min,
            lat_max,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.lat_max < self.lat_min
    }

    pub fn is_full(&self) -> bool {
        self.lat_min == -90.0 && self.lat_max == 90.0 && self.lon_min == 0.0 && self.lon_max == 360.0
    }

    /// Whether this box wraps the 0/360 degree longitude discontinuity.
    pub fn wraps(&self) -> bool {
        self.lon_max < self.lon_min
    }

    pub fn get_lon_min(&self) -> f64 {
        self.lon_min
    }
    pub fn get_lon_max(&self) -> f64 {
        self.lon_max
    }
    pub fn get_lat_min(&self) -> f64 {
        self.lat_min
    }
    pub fn get_lat_max(&self) -> f64 {
        self.lat_max
    }

    pub fn get_lon_extent(&self) -> f64 {
        if self.wraps() {
            360.0 - self.lon_min + self.lon_max
        } else {
            self.lon_max - self.lon_min
        }
    }

    /// Area of this box in steradians.
    pub fn area(&self) -> f64 {
        RAD_PER_DEG
            * self.get_lon_extent()
            * ((RAD_PER_DEG * self.lat_max).sin() - (RAD_PER_DEG * self.lat_min).sin())
    }

    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        if lat < self.lat_min || lat > self.lat_max {
            return false;
        }
        if self.wraps() {
            lon >= self.lon_min || lon <= self.lon_max
        } else {
            lon >= self.lon_min && lon <= self.lon_max
        }
    }

    pub fn intersects(&self, other: &SphericalBox) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        if other.lat_min > self.lat_max || other.lat_max < self.lat_min {
            return false;
        }
        if self.wraps() {
            if other.wraps() {
                return true;
            }
            return other.lon_min <= self.lon_max || other.lon_max >= self.lon_min;
        }
        if other.wraps() {
            return self.lon_min <= other.lon_max || self.lon_max >= other.lon_min;
        }
        self.lon_min <= other.lon_max && self.lon_max >= other.lon_min
    }

    /// Expand this box outward by `radius` degrees in every direction.
    pub fn expand(&mut self, radius: f64) -> Result<()> {
        if radius < 0.0 {
            return Err(GeomError::InvalidRadius(radius));
        }
        if radius == 0.0 {
            return Ok(());
        }
        let extent = self.get_lon_extent();
        let alpha = max_alpha(radius, self.lat_min.abs().max(self.lat_max.abs()))?;
        if extent + 2.0 * alpha >= 360.0 - 1.0 / 3600.0 {
            self.lon_min = 0.0;
            self.lon_max = 360.0;
        } else {
            self.lon_min -= alpha;
            if self.lon_min < 0.0 {
                self.lon_min += 360.0;
                if self.lon_min == 360.0 {
                    self.lon_min = 0.0;
                }
            }
            self.lon_max += alpha;
            if self.lon_max > 360.0 {
                self.lon_max -= 360.0;
            }
        }
        self.lat_min = clamp_lat(self.lat_min - radius);
        self.lat_max = clamp_lat(self.lat_max + radius);
        Ok(())
    }

    /// Conservative set of HTM ids at `level` that may overlap this box.
    /// Recurses into every root triangle, pruning subtrees whose bounding
    /// box doesn't intersect `self`.
    pub fn htm_ids(&self, level: i32) -> Result<Vec<u32>> {
        if !(0..=crate::sphgeom::HTM_MAX_LEVEL).contains(&level) {
            return Err(GeomError::InvalidLevel(level));
        }
        let mut ids = Vec::new();
        for r in 0..8u32 {
            let [v0, v1, v2] = ROOT_VERT[r as usize];
            self.find_ids(&mut ids, r + 8, level, Mat3::from_cols(v0, v1, v2))?;
        }
        Ok(ids)
    }

    fn find_ids(&self, ids: &mut Vec<u32>, id: u32, level: i32, m: Mat3) -> Result<()> {
        let bbox = SphericalBox::from_triangle(m.col[0], m.col[1], m.col[2])?;
        if !self.intersects(&bbox) {
            return Ok(());
        }
        if level == 0 {
            ids.push(id);
            return Ok(());
        }
        let sv0 = (m.col[1] + m.col[2]).normalize();
        let sv1 = (m.col[2] + m.col[0]).normalize();
        let sv2 = (m.col[0] + m.col[1]).normalize();
        self.find_ids(ids, id * 4, level - 1, Mat3::from_cols(m.col[0], sv2, sv1))?;
        self.find_ids(ids, id * 4 + 1, level - 1, Mat3::from_cols(m.col[1], sv0, sv2))?;
        self.find_ids(ids, id * 4 + 2, level - 1, Mat3::from_cols(m.col[2], sv1, sv0))?;
        self.find_ids(ids, id * 4 + 3, level - 1, Mat3::from_cols(sv0, sv1, sv2))
    }
}
