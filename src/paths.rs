//! Path and naming conventions shared by the indexer, duplicator, and layout
//! viewer (spec §6.3, §6.4).

use std::path::{Path, PathBuf};

/// Node subdirectory name for a hashed-to-node record, `node_NNNNN`.
pub fn node_dir_name(node: u32) -> String {
    format!("node_{node:05}")
}

/// Resolve the directory a record belonging to `hash_key` lands in, given
/// `num_nodes` output nodes. When `num_nodes == 1` records are not bucketed
/// into a node subdirectory at all (flat layout).
pub fn node_dir(out_dir: &Path, hash_key: u64, num_nodes: u32) -> PathBuf {
    if num_nodes <= 1 {
        out_dir.to_path_buf()
    } else {
        out_dir.join(node_dir_name((hash_key % num_nodes as u64) as u32))
    }
}

/// Per-triangle CSV record file name, `htm_<hex(htmId)>.txt`.
pub fn htm_records_file(htm_id: u32) -> String {
    format!("htm_{htm_id:08x}.txt")
}

/// Per-triangle record-id file name, `htm_<hex(htmId)>.ids`.
pub fn htm_ids_file(htm_id: u32) -> String {
    format!("htm_{htm_id:08x}.ids")
}

/// Primary chunk file name, `chunk_<id>.txt`.
pub fn chunk_file(chunk_id: u32) -> String {
    format!("chunk_{chunk_id}.txt")
}

/// Overlap chunk file name, `chunk_<id>_overlap.txt`.
pub fn chunk_overlap_file(chunk_id: u32) -> String {
    format!("chunk_{chunk_id}_overlap.txt")
}

/// Merged binary triangle index file name.
pub const HTM_INDEX_FILE: &str = "htm_index.bin";

/// Merged binary chunk index file name.
pub const CHUNK_INDEX_FILE: &str = "chunk_index.bin";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_dir_is_zero_padded() {
        assert_eq!(node_dir_name(7), "node_00007");
        assert_eq!(node_dir_name(12345), "node_12345");
    }

    #[test]
    fn single_node_layout_is_flat() {
        let out = Path::new("/out");
        assert_eq!(node_dir(out, 42, 1), out);
    }

    #[test]
    fn multi_node_layout_hashes_by_key() {
        let out = Path::new("/out");
        assert_eq!(node_dir(out, 5, 3), out.join("node_00002"));
    }

    #[test]
    fn htm_file_names_are_hex_with_fixed_width() {
        assert_eq!(htm_records_file(0x32), "htm_00000032.txt");
        assert_eq!(htm_ids_file(0x32), "htm_00000032.ids");
    }

    #[test]
    fn chunk_file_names() {
        assert_eq!(chunk_file(101), "chunk_101.txt");
        assert_eq!(chunk_overlap_file(101), "chunk_101_overlap.txt");
    }
}
