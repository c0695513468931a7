//! Remaps an input id into a dense `[0, n)` index unique to the source
//! triangle it belongs to, by sorting the triangle's `.ids` file and binary
//! searching it. The output record id is built from this index rather
//! than the original id, so that duplicated copies of the same source row
//! carry the same index across every target triangle (and so ids stay
//! dense per target even though the originals may not be).

use std::path::Path;

use qserv_part::HtmIndex;

use crate::error::{DuplicatorError, Result};

#[derive(Debug, Clone)]
pub struct IdIndex {
    ids: Vec<i64>,
}

impl IdIndex {
    /// Load and sort the `.ids` file for `htm_id` under `dir`, validating its
    /// size against `index`'s recorded count for that triangle.
    pub fn load(dir: &Path, htm_id: u32, index: &HtmIndex) -> Result<Self> {
        let path = dir.join(qserv_core::paths::htm_ids_file(htm_id));
        let bytes = std::fs::read(&path)?;
        let expected = index.get(htm_id) as usize;
        if bytes.len() != expected * 8 {
            return Err(DuplicatorError::Part(qserv_part::PartError::InvalidHtmIndexFile(format!(
                "{}: {} bytes, expected {} for {} ids",
                path.display(),
                bytes.len(),
                expected * 8,
                expected
            ))));
        }
        let mut ids: Vec<i64> = bytes
            .chunks_exact(8)
            .map(|c| i64::from_be_bytes(c.try_into().unwrap()))
            .collect();
        ids.sort_unstable();
        Ok(IdIndex { ids })
    }

    /// The position of `id` in the sorted array, i.e. the count of ids
    /// strictly less than it (assuming uniqueness).
    pub fn index_of(&self, id: i64) -> Result<u32> {
        self.ids
            .binary_search(&id)
            .map(|i| i as u32)
            .map_err(|_| DuplicatorError::IdNotFound(id))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_ids(dir: &Path, htm_id: u32, ids: &[i64]) {
        let mut f = std::fs::File::create(dir.join(qserv_core::paths::htm_ids_file(htm_id))).unwrap();
        for id in ids {
            f.write_all(&id.to_be_bytes()).unwrap();
        }
    }

    #[test]
    fn index_of_matches_sorted_position() {
        let dir = tempfile::tempdir().unwrap();
        write_ids(dir.path(), 8, &[30, 10, 20]);
        let mut index = HtmIndex::new(0);
        index.add(8, 3);
        let idx = IdIndex::load(dir.path(), 8, &index).unwrap();
        assert_eq!(idx.index_of(10).unwrap(), 0);
        assert_eq!(idx.index_of(20).unwrap(), 1);
        assert_eq!(idx.index_of(30).unwrap(), 2);
    }

    #[test]
    fn missing_id_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        write_ids(dir.path(), 8, &[10, 20]);
        let mut index = HtmIndex::new(0);
        index.add(8, 2);
        let idx = IdIndex::load(dir.path(), 8, &index).unwrap();
        assert!(matches!(idx.index_of(999), Err(DuplicatorError::IdNotFound(999))));
    }

    #[test]
    fn size_mismatch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        write_ids(dir.path(), 8, &[10, 20]);
        let mut index = HtmIndex::new(0);
        index.add(8, 3); // index claims 3 records, file only has 2
        assert!(IdIndex::load(dir.path(), 8, &index).is_err());
    }
}
