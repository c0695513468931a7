//! `Record<K>`: the unit the map-reduce shuffle sorts and groups by key.
//!
//! A record pairs a sort/hash key with a byte range of an edited CSV row.
//! The map phase emits these into a [`crate::silo`]-like bucket structure
//! (see the `qserv-mr` crate); here we define the key types and the record
//! envelope itself, which are shared between the indexer and duplicator
//! workers and the engine that shuffles their output.

use crate::chunker::ChunkLocation;

/// Anything usable as a map-reduce key: orderable (for the shuffle sort),
/// hashable into a bucket index, and serializable to the flat byte encoding
/// the external-sort run files use.
pub trait RecordKey: Ord + Clone + Send + 'static {
    fn bucket_hash(&self) -> u64;

    /// Append this key's byte encoding to `out`.
    fn encode(&self, out: &mut Vec<u8>);

    /// Parse a key previously written by [`RecordKey::encode`].
    fn decode(bytes: &[u8]) -> Self;

    /// Whether `self` and `other` belong to the same reduce-time group.
    /// Must be coarser than or equal to full equality and consistent with
    /// `Ord`: every pair of keys this reports as grouped must be
    /// contiguous once a run is sorted. The default is full equality;
    /// override it when the sort order breaks ties on a field that should
    /// not split a group (e.g. HTM records tie-break on row id but still
    /// group by HTM id alone).
    fn same_group(&self, other: &Self) -> bool {
        self == other
    }
}

/// Key for HTM-indexer records: the input row id plus the HTM triangle it
/// falls in. Ordered (and hashed) by `htm_id` alone, so that runs sharing a
/// triangle are contiguous after the shuffle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HtmKey {
    pub id: i64,
    pub htm_id: u32,
}

impl PartialOrd for HtmKey {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HtmKey {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.htm_id.cmp(&other.htm_id).then(self.id.cmp(&other.id))
    }
}

impl RecordKey for HtmKey {
    fn bucket_hash(&self) -> u64 {
        hash_u32(self.htm_id)
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.htm_id.to_le_bytes());
        out.extend_from_slice(&self.id.to_le_bytes());
    }

    fn decode(bytes: &[u8]) -> Self {
        HtmKey {
            htm_id: u32::from_le_bytes(bytes[0..4].try_into().unwrap()),
            id: i64::from_le_bytes(bytes[4..12].try_into().unwrap()),
        }
    }

    fn same_group(&self, other: &Self) -> bool {
        self.htm_id == other.htm_id
    }
}

/// Key for duplicator records: the chunk location a row was assigned to.
/// Ordered by chunk, then sub-chunk, then overlap, so the shuffle groups
/// all rows of one (sub-)chunk together with overlap rows trailing.
impl PartialOrd for ChunkLocation {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ChunkLocation {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.chunk_id
            .cmp(&other.chunk_id)
            .then(self.sub_chunk_id.cmp(&other.sub_chunk_id))
            .then(self.overlap.cmp(&other.overlap))
    }
}

impl RecordKey for ChunkLocation {
    fn bucket_hash(&self) -> u64 {
        hash_u32(self.chunk_id)
    }

    fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.chunk_id.to_le_bytes());
        out.extend_from_slice(&self.sub_chunk_id.to_le_bytes());
        out.push(self.overlap as u8);
    }

    fn decode(bytes: &[u8]) -> Self {
        ChunkLocation {
            chunk_id: u32::from_le_bytes(bytes[0..4].try_into().unwrap()),
            sub_chunk_id: u32::from_le_bytes(bytes[4..8].try_into().unwrap()),
            overlap: bytes[8] != 0,
        }
    }
}

/// A Fibonacci-hashed bucket index, matching what the indexer/duplicator
/// finish-time node layout (`hash(x) mod numNodes`) also uses.
pub fn hash_u32(x: u32) -> u64 {
    (x as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
}

/// One map-reduce record: a key plus the edited CSV row it carries.
#[derive(Debug, Clone)]
pub struct Record<K> {
    pub key: K,
    pub data: Vec<u8>,
    pub overlap: bool,
}

impl<K: RecordKey> Record<K> {
    pub fn new(key: K, data: Vec<u8>) -> Self {
        Record {
            key,
            data,
            overlap: false,
        }
    }

    pub fn bucket(&self, num_buckets: usize) -> usize {
        (self.key.bucket_hash() as usize) % num_buckets.max(1)
    }

    /// Append this record's flat encoding to `out`: a 4-byte key length, the
    /// key bytes, a 1-byte overlap flag, a 4-byte data length, and the data.
    /// Used by the shuffle phase's run files.
    pub fn encode(&self, out: &mut Vec<u8>) {
        let mut key_buf = Vec::new();
        self.key.encode(&mut key_buf);
        out.extend_from_slice(&(key_buf.len() as u32).to_le_bytes());
        out.extend_from_slice(&key_buf);
        out.push(self.overlap as u8);
        out.extend_from_slice(&(self.data.len() as u32).to_le_bytes());
        out.extend_from_slice(&self.data);
    }

    /// Parse one record previously written by [`Record::encode`] from the
    /// front of `bytes`, returning it along with the number of bytes it
    /// consumed.
    pub fn decode(bytes: &[u8]) -> (Self, usize) {
        let key_len = u32::from_le_bytes(bytes[0..4].try_into().unwrap()) as usize;
        let mut pos = 4;
        let key = K::decode(&bytes[pos..pos + key_len]);
        pos += key_len;
        let overlap = bytes[pos] != 0;
        pos += 1;
        let data_len = u32::from_le_bytes(bytes[pos..pos + 4].try_into().unwrap()) as usize;
        pos += 4;
        let data = bytes[pos..pos + data_len].to_vec();
        pos += data_len;
        (Record { key, data, overlap }, pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn htm_key_orders_by_htm_id_then_id() {
        let a = HtmKey { id: 5, htm_id: 10 };
        let b = HtmKey { id: 1, htm_id: 11 };
        assert!(a < b);
    }

    #[test]
    fn bucket_hash_is_deterministic() {
        let k = HtmKey { id: 0, htm_id: 42 };
        assert_eq!(k.bucket_hash(), k.bucket_hash());
    }

    #[test]
    fn htm_keys_group_by_htm_id_alone() {
        let a = HtmKey { id: 5, htm_id: 10 };
        let b = HtmKey { id: 6, htm_id: 10 };
        let c = HtmKey { id: 7, htm_id: 11 };
        assert!(a.same_group(&b));
        assert!(!a.same_group(&c));
    }

    #[test]
    fn chunk_locations_group_by_full_equality() {
        let a = ChunkLocation { chunk_id: 1, sub_chunk_id: 0, overlap: false };
        let b = ChunkLocation { chunk_id: 1, sub_chunk_id: 1, overlap: false };
        assert!(!a.same_group(&b));
        assert!(a.same_group(&a.clone()));
    }

    #[test]
    fn record_encode_decode_round_trip() {
        let r = Record::new(HtmKey { id: 7, htm_id: 99 }, b"row,data".to_vec());
        let mut buf = Vec::new();
        r.encode(&mut buf);
        buf.extend_from_slice(b"trailing garbage");
        let (back, consumed) = Record::<HtmKey>::decode(&buf);
        assert_eq!(back.key, r.key);
        assert_eq!(back.data, r.data);
        assert_eq!(consumed, buf.len() - b"trailing garbage".len());
    }

    #[test]
    fn chunk_location_encode_decode_round_trip() {
        let loc = ChunkLocation {
            chunk_id: 12,
            sub_chunk_id: 3,
            overlap: true,
        };
        let mut buf = Vec::new();
        loc.encode(&mut buf);
        assert_eq!(ChunkLocation::decode(&buf), loc);
    }
}
