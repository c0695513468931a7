//! Tiles the sky into latitude stripes, each stripe into an integer number
//! of roughly-square chunks, and each chunk further into sub-chunks via
//! sub-stripes. This is the partitioning unit both the HTM indexer's sky
//! geometry and the duplicator's target chunks are expressed in terms of.

use qserv_geom::sphgeom::RAD_PER_DEG;
use qserv_geom::SphericalBox;

use crate::error::{PartError, Result};

/// A row/column location a position falls into: its chunk, the sub-chunk
/// within that chunk, and whether this is the row's primary location or an
/// overlap copy contributed by a neighboring (sub-)chunk's overlap region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkLocation {
    pub chunk_id: u32,
    pub sub_chunk_id: u32,
    pub overlap: bool,
}

#[derive(Debug, Clone, Copy)]
struct Stripe {
    lat_min: f64,
    lat_max: f64,
    num_chunks: i32,
    chunks_before: u32,
}

/// Partitioning scheme: an overlap radius (degrees), a stripe count, and a
/// sub-stripe-per-stripe count.
#[derive(Debug, Clone)]
pub struct Chunker {
    overlap: f64,
    num_stripes: i32,
    num_sub_stripes_per_stripe: i32,
    stripes: Vec<Stripe>,
}

impl Chunker {
    pub fn new(overlap: f64, num_stripes: i32, num_sub_stripes_per_stripe: i32) -> Result<Self> {
        if overlap < 0.0 {
            return Err(PartError::InvalidChunkerConfig(format!(
                "overlap must be non-negative, got {overlap}"
            )));
        }
        if num_stripes < 1 || num_sub_stripes_per_stripe < 1 {
            return Err(PartError::InvalidChunkerConfig(
                "numStripes and numSubStripesPerStripe must be at least 1".into(),
            ));
        }
        let stripe_height = 180.0 / num_stripes as f64;
        let mut stripes = Vec::with_capacity(num_stripes as usize);
        let mut chunks_before = 0u32;
        for i in 0..num_stripes {
            let lat_min = -90.0 + i as f64 * stripe_height;
            let lat_max = lat_min + stripe_height;
            let num_chunks = num_chunks_for_lat_range(lat_min, lat_max, stripe_height);
            stripes.push(Stripe {
                lat_min,
                lat_max,
                num_chunks,
                chunks_before,
            });
            chunks_before += num_chunks as u32;
        }
        Ok(Chunker {
            overlap,
            num_stripes,
            num_sub_stripes_per_stripe,
            stripes,
        })
    }

    pub fn num_stripes(&self) -> i32 {
        self.num_stripes
    }

    pub fn overlap(&self) -> f64 {
        self.overlap
    }

    pub fn num_chunks(&self) -> u32 {
        self.stripes
            .last()
            .map(|s| s.chunks_before + s.num_chunks as u32)
            .unwrap_or(0)
    }

    fn stripe_for_chunk(&self, chunk_id: u32) -> Result<(usize, &Stripe)> {
        self.stripes
            .iter()
            .enumerate()
            .find(|(_, s)| chunk_id >= s.chunks_before && chunk_id < s.chunks_before + s.num_chunks as u32)
            .ok_or(PartError::InvalidChunkId(chunk_id))
    }

    pub fn valid(&self, chunk_id: u32) -> bool {
        self.stripe_for_chunk(chunk_id).is_ok()
    }

    /// Conservative spherical bounds of the given chunk: its full stripe
    /// latitude range, and its share of the stripe's longitude range.
    pub fn get_chunk_bounds(&self, chunk_id: u32) -> Result<SphericalBox> {
        let (_, stripe) = self.stripe_for_chunk(chunk_id)?;
        let col = chunk_id - stripe.chunks_before;
        let chunk_width = 360.0 / stripe.num_chunks as f64;
        let lon_min = col as f64 * chunk_width;
        let lon_max = if col as i32 + 1 == stripe.num_chunks {
            360.0
        } else {
            lon_min + chunk_width
        };
        SphericalBox::new(lon_min, lon_max, stripe.lat_min, stripe.lat_max).map_err(PartError::Geom)
    }

    fn sub_chunks_per_chunk(&self, stripe: &Stripe, sub_stripe_idx: i32) -> i32 {
        let sub_stripe_height = (stripe.lat_max - stripe.lat_min) / self.num_sub_stripes_per_stripe as f64;
        let chunk_width = 360.0 / stripe.num_chunks as f64;
        let sub_lat_min = stripe.lat_min + sub_stripe_idx as f64 * sub_stripe_height;
        let sub_lat_max = sub_lat_min + sub_stripe_height;
        let max_abs_lat = sub_lat_min.abs().max(sub_lat_max.abs());
        let cos_lat = (max_abs_lat * RAD_PER_DEG).cos();
        ((chunk_width * cos_lat / sub_stripe_height).round() as i32).max(1)
    }

    /// Maximum number of sub-chunks any sub-stripe of `stripe` packs into a
    /// single chunk's longitude span. Used as the per-sub-stripe stride so
    /// sub-chunk ids are stable regardless of which row they fall in.
    fn max_sub_chunks_per_chunk(&self, stripe: &Stripe) -> i32 {
        (0..self.num_sub_stripes_per_stripe)
            .map(|j| self.sub_chunks_per_chunk(stripe, j))
            .max()
            .unwrap_or(1)
    }

    fn locate_in_stripe(&self, stripe: &Stripe, lon: f64, lat: f64) -> (u32, u32) {
        let chunk_width = 360.0 / stripe.num_chunks as f64;
        let col = ((lon / chunk_width) as i32).clamp(0, stripe.num_chunks - 1);
        let chunk_id = stripe.chunks_before + col as u32;

        let sub_stripe_height = (stripe.lat_max - stripe.lat_min) / self.num_sub_stripes_per_stripe as f64;
        let sub_stripe_idx = (((lat - stripe.lat_min) / sub_stripe_height) as i32)
            .clamp(0, self.num_sub_stripes_per_stripe - 1);
        let num_sub_chunks = self.sub_chunks_per_chunk(stripe, sub_stripe_idx);
        let stride = self.max_sub_chunks_per_chunk(stripe);
        let lon_in_chunk = lon - col as f64 * chunk_width;
        let sub_chunk_width = chunk_width / num_sub_chunks as f64;
        let sub_col = ((lon_in_chunk / sub_chunk_width) as i32).clamp(0, num_sub_chunks - 1);
        let sub_chunk_id = (sub_stripe_idx * stride + sub_col) as u32;
        (chunk_id, sub_chunk_id)
    }

    /// The primary (chunk, sub-chunk) location for `(lon, lat)`, plus any
    /// neighboring (sub-)chunk whose overlap region also contains the
    /// point. `chunk_hint`, when given, is tried first (the common case of
    /// scanning records that are already roughly chunk-sorted).
    pub fn locate(&self, lon: f64, lat: f64, chunk_hint: Option<u32>) -> Result<Vec<ChunkLocation>> {
        let (stripe_idx, stripe) = match chunk_hint.and_then(|id| self.stripe_for_chunk(id).ok()) {
            Some((idx, s)) if lat >= s.lat_min && lat <= s.lat_max => (idx, s),
            _ => self.stripe_for_lat(lat)?,
        };
        let (chunk_id, sub_chunk_id) = self.locate_in_stripe(stripe, lon, lat);
        let mut out = vec![ChunkLocation {
            chunk_id,
            sub_chunk_id,
            overlap: false,
        }];
        if self.overlap > 0.0 {
            'stripes: for cand_stripe_idx in
                (stripe_idx.saturating_sub(1))..=(stripe_idx + 1).min(self.stripes.len() - 1)
            {
                let cand_stripe = &self.stripes[cand_stripe_idx];
                let chunk_width = 360.0 / cand_stripe.num_chunks as f64;
                let delta_cols = (self.overlap / chunk_width).ceil() as i32 + 1;
                let base_col = ((lon / chunk_width) as i32).clamp(0, cand_stripe.num_chunks - 1);
                for dc in -delta_cols..=delta_cols {
                    let col = (base_col + dc).rem_euclid(cand_stripe.num_chunks);
                    let cid = cand_stripe.chunks_before + col as u32;
                    if cid == chunk_id && cand_stripe_idx == stripe_idx {
                        continue;
                    }
                    let mut expanded = self.get_chunk_bounds(cid)?;
                    expanded.expand(self.overlap).map_err(PartError::Geom)?;
                    if expanded.contains(lon, lat) {
                        let (_, sub) = self.locate_in_stripe(cand_stripe, lon, lat);
                        out.push(ChunkLocation {
                            chunk_id: cid,
                            sub_chunk_id: sub,
                            overlap: true,
                        });
                    }
                    if out.len() >= 9 {
                        break 'stripes;
                    }
                }
            }
        }
        out.truncate(9);
        Ok(out)
    }

    fn stripe_for_lat(&self, lat: f64) -> Result<(usize, &Stripe)> {
        self.stripes
            .iter()
            .enumerate()
            .find(|(_, s)| lat >= s.lat_min && lat <= s.lat_max)
            .ok_or_else(|| PartError::InvalidChunkerConfig(format!("latitude {lat} out of range")))
    }

    /// All chunk ids whose (overlap-expanded, when `with_overlap`) bounds
    /// intersect `box_`.
    pub fn chunks_in_box(&self, box_: &SphericalBox, with_overlap: bool) -> Result<Vec<u32>> {
        let mut ids = Vec::new();
        for stripe in &self.stripes {
            for col in 0..stripe.num_chunks {
                let chunk_id = stripe.chunks_before + col as u32;
                let mut bounds = self.get_chunk_bounds(chunk_id)?;
                if with_overlap {
                    bounds.expand(self.overlap).map_err(PartError::Geom)?;
                }
                if bounds.intersects(box_) {
                    ids.push(chunk_id);
                }
            }
        }
        Ok(ids)
    }
}

fn num_chunks_for_lat_range(lat_min: f64, lat_max: f64, height_deg: f64) -> i32 {
    let max_abs_lat = lat_min.abs().max(lat_max.abs());
    let cos_lat = (max_abs_lat * RAD_PER_DEG).cos();
    ((360.0 * cos_lat / height_deg).round() as i32).max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn equatorial_stripe_has_more_chunks_than_polar() {
        let c = Chunker::new(0.01, 18, 3).unwrap();
        let eq_bounds = c.get_chunk_bounds(c.num_chunks() / 2).unwrap();
        assert!(eq_bounds.get_lon_extent() < 90.0);
    }

    #[test]
    fn all_chunk_ids_are_valid_and_contiguous() {
        let c = Chunker::new(0.01, 6, 2).unwrap();
        for id in 0..c.num_chunks() {
            assert!(c.valid(id));
        }
        assert!(!c.valid(c.num_chunks()));
    }

    #[test]
    fn locate_returns_primary_location_inside_its_own_bounds() {
        let c = Chunker::new(0.01, 12, 3).unwrap();
        let locs = c.locate(182.3, 5.0, None).unwrap();
        assert!(!locs.is_empty());
        assert!(!locs[0].overlap);
        let bounds = c.get_chunk_bounds(locs[0].chunk_id).unwrap();
        assert!(bounds.contains(182.3, 5.0));
    }

    #[test]
    fn overlap_count_is_bounded() {
        let c = Chunker::new(5.0, 8, 2).unwrap();
        let locs = c.locate(10.0, 0.1, None).unwrap();
        assert!(locs.len() <= 9);
    }

    #[test]
    fn chunks_in_box_includes_the_chunk_found_by_locate() {
        let c = Chunker::new(0.01, 10, 2).unwrap();
        let locs = c.locate(45.0, -20.0, None).unwrap();
        let bounds = c.get_chunk_bounds(locs[0].chunk_id).unwrap();
        let ids = c.chunks_in_box(&bounds, false).unwrap();
        assert!(ids.contains(&locs[0].chunk_id));
    }
}
