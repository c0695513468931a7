//! `ChunkIndex`: a `(chunkId, subChunkId) -> (main count, overlap count)`
//! map, persisted in the same binary format as [`crate::htm_index::HtmIndex`]
//! but with the key packed as `chunkId << 32 | subChunkId` and two records
//! per key — one with the main count, one with the overlap count stored at
//! `subChunkId | 0x8000_0000` so the format stays a flat list of
//! `(id, count)` pairs.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use crate::chunker::ChunkLocation;
use crate::error::Result;
use crate::htm_index::HtmIndex;

const OVERLAP_BIT: u32 = 0x8000_0000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChunkCounts {
    pub main: u64,
    pub overlap: u64,
}

#[derive(Debug, Clone, Default)]
pub struct ChunkIndex {
    counts: BTreeMap<(u32, u32), ChunkCounts>,
}

impl ChunkIndex {
    pub fn new() -> Self {
        ChunkIndex::default()
    }

    pub fn add(&mut self, chunk_id: u32, sub_chunk_id: u32, overlap: bool, count: u64) {
        let entry = self.counts.entry((chunk_id, sub_chunk_id)).or_default();
        if overlap {
            entry.overlap += count;
        } else {
            entry.main += count;
        }
    }

    pub fn record(&mut self, loc: ChunkLocation) {
        self.add(loc.chunk_id, loc.sub_chunk_id, loc.overlap, 1);
    }

    pub fn get(&self, chunk_id: u32, sub_chunk_id: u32) -> ChunkCounts {
        self.counts
            .get(&(chunk_id, sub_chunk_id))
            .copied()
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.counts.keys().copied()
    }

    pub fn merge(&mut self, other: &ChunkIndex) {
        for (&(chunk_id, sub_chunk_id), counts) in &other.counts {
            self.add(chunk_id, sub_chunk_id, false, counts.main);
            self.add(chunk_id, sub_chunk_id, true, counts.overlap);
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let entries: Vec<_> = self
            .counts
            .iter()
            .map(|(&(chunk_id, sub_chunk_id), counts)| {
                serde_json::json!({
                    "chunkId": chunk_id,
                    "subChunkId": sub_chunk_id,
                    "main": counts.main,
                    "overlap": counts.overlap,
                })
            })
            .collect();
        serde_json::json!({ "chunks": entries })
    }

    pub fn write<W: Write>(&self, mut w: W) -> Result<()> {
        for (&(chunk_id, sub_chunk_id), counts) in &self.counts {
            w.write_all(&sub_chunk_id.to_le_bytes())?;
            w.write_all(&chunk_id.to_le_bytes())?;
            w.write_all(&counts.main.to_le_bytes())?;
            w.write_all(&(sub_chunk_id | OVERLAP_BIT).to_le_bytes())?;
            w.write_all(&chunk_id.to_le_bytes())?;
            w.write_all(&counts.overlap.to_le_bytes())?;
        }
        Ok(())
    }

    pub fn read<R: Read>(mut r: R) -> Result<Self> {
        let mut index = ChunkIndex::new();
        let mut buf = [0u8; 16];
        loop {
            let n = read_full_or_eof(&mut r, &mut buf)?;
            if n == 0 {
                break;
            }
            let sub_chunk_raw = u32::from_le_bytes(buf[0..4].try_into().unwrap());
            let chunk_id = u32::from_le_bytes(buf[4..8].try_into().unwrap());
            let count = u64::from_le_bytes(buf[8..16].try_into().unwrap());
            let overlap = sub_chunk_raw & OVERLAP_BIT != 0;
            let sub_chunk_id = sub_chunk_raw & !OVERLAP_BIT;
            index.add(chunk_id, sub_chunk_id, overlap, count);
        }
        Ok(index)
    }

    /// Flatten into an `HtmIndex`-shaped total-count view keyed by chunk id
    /// alone (main + overlap), for callers that only need per-chunk totals.
    pub fn per_chunk_totals(&self) -> HtmIndex {
        let mut totals = HtmIndex::new(-1);
        for (&(chunk_id, _), counts) in &self.counts {
            totals.add(chunk_id, counts.main + counts.overlap);
        }
        totals
    }
}

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

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_main_and_overlap_separately() {
        let mut idx = ChunkIndex::new();
        idx.record(ChunkLocation {
            chunk_id: 1,
            sub_chunk_id: 2,
            overlap: false,
        });
        idx.record(ChunkLocation {
            chunk_id: 1,
            sub_chunk_id: 2,
            overlap: true,
        });
        idx.record(ChunkLocation {
            chunk_id: 1,
            sub_chunk_id: 2,
            overlap: true,
        });
        let counts = idx.get(1, 2);
        assert_eq!(counts.main, 1);
        assert_eq!(counts.overlap, 2);
    }

    #[test]
    fn file_round_trip() {
        let mut idx = ChunkIndex::new();
        idx.add(3, 1, false, 10);
        idx.add(3, 1, true, 4);
        idx.add(5, 0, false, 7);
        let mut buf = Vec::new();
        idx.write(&mut buf).unwrap();
        let back = ChunkIndex::read(&buf[..]).unwrap();
        assert_eq!(back.get(3, 1), idx.get(3, 1));
        assert_eq!(back.get(5, 0), idx.get(5, 0));
    }

    #[test]
    fn merge_sums_both_columns() {
        let mut a = ChunkIndex::new();
        a.add(1, 0, false, 2);
        let mut b = ChunkIndex::new();
        b.add(1, 0, false, 3);
        b.add(1, 0, true, 1);
        a.merge(&b);
        assert_eq!(a.get(1, 0), ChunkCounts { main: 5, overlap: 1 });
    }
}
