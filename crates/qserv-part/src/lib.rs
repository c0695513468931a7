//! Partitioning primitives shared by the HTM indexer and duplicator
//! map-reduce workers: the sky [`Chunker`], the zero-copy [`csv`] editor,
//! the map-reduce [`record`] key types, and the two count indexes
//! ([`htm_index`], [`chunk_index`]).

pub mod chunk_index;
pub mod chunker;
pub mod csv;
pub mod error;
pub mod htm_index;
pub mod record;

pub use chunk_index::ChunkIndex;
pub use chunker::{ChunkLocation, Chunker};
pub use error::{PartError, Result};
pub use htm_index::HtmIndex;
pub use record::{HtmKey, Record, RecordKey};
