//! Enumerates the chunks a `Chunker` produces and, optionally, which
//! worker a fixed-size round-robin assignment would place each one on
//! (spec 6.5's "layout viewer"). Grounded on `qserv-part::Chunker`, the
//! same chunk-layout scheme the HTM indexer and duplicator build on.

pub mod error;

use qserv_geom::SphericalBox;
use qserv_part::Chunker;

pub use error::{LayoutError, Result};

/// One row of the layout viewer's output: a chunk's id, its conservative
/// spherical bounds, and (if a worker count was given) the worker it was
/// assigned to.
#[derive(Debug, Clone, PartialEq)]
pub struct ChunkLayoutRow {
    pub chunk_id: u32,
    pub bounds: SphericalBox,
    pub worker: Option<u32>,
}

/// Deterministic `chunkId mod numWorkers` assignment. Qserv's real
/// Czar-side assignment additionally considers replica placement and
/// worker load; this viewer only needs a stable, reproducible mapping to
/// sanity-check a partitioning scheme's worker distribution.
pub fn worker_for_chunk(chunk_id: u32, num_workers: u32) -> u32 {
    if num_workers == 0 {
        return 0;
    }
    chunk_id % num_workers
}

/// Rows for chunk ids in `min_chunk..=max_chunk`, clamped to the
/// chunker's valid range, optionally annotated with a round-robin worker
/// assignment.
pub fn enumerate(
    chunker: &Chunker,
    min_chunk: u32,
    max_chunk: u32,
    chunk2worker: Option<u32>,
) -> Result<Vec<ChunkLayoutRow>> {
    let max_chunk = max_chunk.min(chunker.num_chunks().saturating_sub(1));
    let mut rows = Vec::new();
    for chunk_id in min_chunk..=max_chunk {
        if !chunker.valid(chunk_id) {
            continue;
        }
        let bounds = chunker.get_chunk_bounds(chunk_id)?;
        let worker = chunk2worker.map(|n| worker_for_chunk(chunk_id, n));
        rows.push(ChunkLayoutRow { chunk_id, bounds, worker });
    }
    Ok(rows)
}

/// Rows for exactly the given chunk ids, in the order given, rejecting
/// any id the chunker doesn't recognize.
pub fn rows_for_chunks(chunker: &Chunker, chunk_ids: &[u32], chunk2worker: Option<u32>) -> Result<Vec<ChunkLayoutRow>> {
    chunk_ids
        .iter()
        .map(|&chunk_id| {
            if !chunker.valid(chunk_id) {
                return Err(LayoutError::InvalidConfig(format!("chunk {chunk_id} is out of range")));
            }
            let bounds = chunker.get_chunk_bounds(chunk_id)?;
            let worker = chunk2worker.map(|n| worker_for_chunk(chunk_id, n));
            Ok(ChunkLayoutRow { chunk_id, bounds, worker })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_assignment_is_modulo_and_deterministic() {
        assert_eq!(worker_for_chunk(7, 4), 3);
        assert_eq!(worker_for_chunk(7, 4), worker_for_chunk(7, 4));
    }

    #[test]
    fn worker_assignment_with_zero_workers_is_always_zero() {
        assert_eq!(worker_for_chunk(7, 0), 0);
    }

    #[test]
    fn enumerate_clamps_to_valid_chunk_range() {
        let chunker = Chunker::new(0.01, 6, 2).unwrap();
        let rows = enumerate(&chunker, 0, u32::MAX, None).unwrap();
        assert_eq!(rows.len() as u32, chunker.num_chunks());
    }

    #[test]
    fn enumerate_annotates_worker_when_requested() {
        let chunker = Chunker::new(0.01, 6, 2).unwrap();
        let rows = enumerate(&chunker, 0, 2, Some(3)).unwrap();
        for row in &rows {
            assert_eq!(row.worker, Some(worker_for_chunk(row.chunk_id, 3)));
        }
    }

    #[test]
    fn rows_for_chunks_rejects_unknown_id() {
        let chunker = Chunker::new(0.01, 6, 2).unwrap();
        let err = rows_for_chunks(&chunker, &[chunker.num_chunks()], None).unwrap_err();
        assert!(matches!(err, LayoutError::InvalidConfig(_)));
    }
}
