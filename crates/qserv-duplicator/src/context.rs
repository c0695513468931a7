//! Shared, read-only state built once before the duplicator's map-reduce
//! pass runs: the chunker, the two HTM indexes, and the precomputed
//! source-triangle -> target (triangle, chunk) map. Kept as an explicit
//! context object (rather than a singleton) so worker threads can share
//! it behind an `Arc` instead of reconstructing the indexes per task.

use std::collections::HashMap;
use std::path::PathBuf;

use qserv_part::{Chunker, HtmIndex};

use crate::error::{DuplicatorError, Result};

/// One duplication target: an HTM triangle overlapping a chunk's
/// overlap-expanded bounds, and the chunk it belongs to.
#[derive(Debug, Clone, Copy)]
pub struct DuplicationTarget {
    pub htm_id: u32,
    pub chunk_id: u32,
}

pub struct DuplicatorContext {
    pub chunker: Chunker,
    pub part_index: HtmIndex,
    pub data_index: HtmIndex,
    pub level: i32,
    pub part_index_dir: PathBuf,
    pub data_index_dir: PathBuf,
    /// Source HTM triangle id -> targets to duplicate its rows into.
    target_map: HashMap<u32, Vec<DuplicationTarget>>,
}

impl DuplicatorContext {
    pub fn new(
        chunker: Chunker,
        part_index: HtmIndex,
        data_index: HtmIndex,
        part_index_dir: PathBuf,
        data_index_dir: PathBuf,
    ) -> Result<Self> {
        if part_index.level() != data_index.level() {
            return Err(DuplicatorError::InconsistentIndex(format!(
                "subdivision levels of the data set index ({}) and the partitioning position \
                 index ({}) do not match",
                data_index.level(),
                part_index.level()
            )));
        }
        Ok(DuplicatorContext {
            level: part_index.level(),
            chunker,
            part_index,
            data_index,
            part_index_dir,
            data_index_dir,
            target_map: HashMap::new(),
        })
    }

    /// Populate the target map for the given output chunks: expand each
    /// chunk's bounds by the chunker's overlap radius plus a 1 arcsec
    /// epsilon, enumerate the HTM triangles at the indexes' level that may
    /// overlap it, and map each to a non-empty source triangle.
    pub fn build_targets(&mut self, chunk_ids: &[u32]) -> Result<()> {
        const EPSILON_DEG: f64 = 1.0 / 3600.0;
        for &chunk_id in chunk_ids {
            let mut bounds = self.chunker.get_chunk_bounds(chunk_id)?;
            bounds.expand(self.chunker.overlap() + EPSILON_DEG)?;
            for target_htm_id in bounds.htm_ids(self.level)? {
                let source = self
                    .part_index
                    .map_to_non_empty(target_htm_id)
                    .ok_or(DuplicatorError::EmptyIndex)?;
                self.target_map
                    .entry(source)
                    .or_default()
                    .push(DuplicationTarget {
                        htm_id: target_htm_id,
                        chunk_id,
                    });
            }
        }
        Ok(())
    }

    /// Input file paths, one per non-empty source triangle that has
    /// targets: `htm_<hex(S)>.txt` under the data index directory.
    pub fn input_paths(&self) -> Vec<PathBuf> {
        self.target_map
            .keys()
            .map(|&htm_id| self.data_index_dir.join(qserv_core::paths::htm_records_file(htm_id)))
            .collect()
    }

    pub fn targets_for(&self, source_htm_id: u32) -> &[DuplicationTarget] {
        self.target_map
            .get(&source_htm_id)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qserv_geom::SphericalBox;

    fn build_index(level: i32, ids: &[u32]) -> HtmIndex {
        let mut idx = HtmIndex::new(level);
        for &id in ids {
            idx.add(id, 1);
        }
        idx
    }

    #[test]
    fn mismatched_levels_are_rejected() {
        let chunker = Chunker::new(0.01, 4, 2).unwrap();
        let part_index = build_index(1, &[32]);
        let data_index = build_index(2, &[128]);
        let err = DuplicatorContext::new(chunker, part_index, data_index, PathBuf::new(), PathBuf::new())
            .unwrap_err();
        assert!(matches!(err, DuplicatorError::InconsistentIndex(_)));
    }

    #[test]
    fn build_targets_maps_every_triangle_to_a_non_empty_source() {
        let chunker = Chunker::new(0.01, 4, 2).unwrap();
        let full = SphericalBox::default();
        let level = 1;
        let all_ids = full.htm_ids(level).unwrap();
        // only the first triangle is "non-empty"
        let non_empty = all_ids[0];
        let part_index = build_index(level, &[non_empty]);
        let data_index = part_index.clone();
        let mut ctx =
            DuplicatorContext::new(chunker, part_index, data_index, PathBuf::new(), PathBuf::new()).unwrap();
        ctx.build_targets(&[0]).unwrap();
        let targets = ctx.targets_for(non_empty);
        assert!(!targets.is_empty());
        assert!(targets.iter().all(|t| t.chunk_id == 0));
    }
}
