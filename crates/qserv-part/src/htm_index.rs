//! `HtmIndex`: a `htmId -> record count` map for one HTM subdivision level,
//! with the binary file format the indexer/duplicator persist it in.
//!
//! File format: a tightly packed sequence of 12-byte little-endian records
//! (4-byte htmId, 8-byte count). Concatenating two index files for the same
//! level is equal to merging the indexes (counts summed), since the format
//! carries no header to contradict that.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use qserv_geom::htm_level;

use crate::error::{PartError, Result};

#[derive(Debug, Clone, Default)]
pub struct HtmIndex {
    level: i32,
    counts: BTreeMap<u32, u64>,
}

impl HtmIndex {
    pub fn new(level: i32) -> Self {
        HtmIndex {
            level,
            counts: BTreeMap::new(),
        }
    }

    pub fn level(&self) -> i32 {
        self.level
    }

    pub fn add(&mut self, htm_id: u32, count: u64) {
        *self.counts.entry(htm_id).or_insert(0) += count;
    }

    pub fn increment(&mut self, htm_id: u32) {
        self.add(htm_id, 1);
    }

    pub fn get(&self, htm_id: u32) -> u64 {
        self.counts.get(&htm_id).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn ids(&self) -> impl Iterator<Item = u32> + '_ {
        self.counts.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, u64)> + '_ {
        self.counts.iter().map(|(&k, &v)| (k, v))
    }

    /// Merge `other`'s counts into `self`, summing shared ids.
    pub fn merge(&mut self, other: &HtmIndex) {
        for (&id, &count) in &other.counts {
            self.add(id, count);
        }
    }

    /// Deterministically map `id` (which need not be present in the index)
    /// to one of the index's non-empty ids, via `hash(id) mod size`.
    /// Returns `None` for an empty index.
    pub fn map_to_non_empty(&self, id: u32) -> Option<u32> {
        if self.counts.is_empty() {
            return None;
        }
        let keys: Vec<u32> = self.counts.keys().copied().collect();
        let h = crate::record::hash_u32(id) as usize % keys.len();
        Some(keys[h])
    }

    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "level": self.level,
            "counts": self.counts.iter().map(|(k, v)| (k.to_string(), v)).collect::<std::collections::BTreeMap<_, _>>(),
        })
    }

    pub fn write<W: Write>(&self, mut w: W) -> Result<()> {
        for (&id, &count) in &self.counts {
            w.write_all(&id.to_le_bytes())?;
            w.write_all(&count.to_le_bytes())?;
        }
        Ok(())
    }

    /// Like [`HtmIndex::read`], but infers the level from the first record's
    /// HTM id instead of requiring the caller to already know it. The
    /// duplicator loads index files this way, since the binary format
    /// carries no header to declare a level.
    pub fn read_inferring_level<R: Read>(mut r: R) -> Result<Self> {
        let mut buf = [0u8; 12];
        let n = read_full_or_eof(&mut r, &mut buf)?;
        if n == 0 {
            return Ok(HtmIndex::new(-1));
        }
        if n != 12 {
            return Err(PartError::InvalidHtmIndexFile(format!(
                "truncated record: {n} of 12 bytes"
            )));
        }
        let id = u32::from_le_bytes(buf[0..4].try_into().unwrap());
        let count = u64::from_le_bytes(buf[4..12].try_into().unwrap());
        let level = htm_level(id);
        if level < 0 {
            return Err(PartError::InvalidHtmIndexFile(format!(
                "htm id {id:#x} has no valid level"
            )));
        }
        let mut index = HtmIndex::new(level);
        index.add(id, count);
        let rest = Self::read(r, level)?;
        index.merge(&rest);
        Ok(index)
    }

    pub fn read<R: Read>(mut r: R, level: i32) -> Result<Self> {
        let mut index = HtmIndex::new(level);
        let mut buf = [0u8; 12];
        loop {
            let n = read_full_or_eof(&mut r, &mut buf)?;
            if n == 0 {
                break;
            }
            if n != 12 {
                return Err(PartError::InvalidHtmIndexFile(format!(
                    "truncated record: {n} of 12 bytes"
                )));
            }
            let id = u32::from_le_bytes(buf[0..4].try_into().unwrap());
            let count = u64::from_le_bytes(buf[4..12].try_into().unwrap());
            if htm_level(id) < 0 {
                return Err(PartError::InvalidHtmIndexFile(format!(
                    "htm id {id:#x} has no valid level"
                )));
            }
            if htm_level(id) != level {
                return Err(PartError::InvalidHtmIndexFile(format!(
                    "htm id {id:#x} is at level {}, expected {level}",
                    htm_level(id)
                )));
            }
            index.add(id, count);
        }
        Ok(index)
    }
}

/// Like `Read::read_exact`, but returns `Ok(0)` instead of erroring when the
/// stream is already at EOF before any byte is read.
fn read_full_or_eof<R: Read>(r: &mut R, buf: &mut [u8]) -> Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match r.read(&mut buf[filled..])? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}
