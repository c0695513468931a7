//! Out-of-core map-reduce: split a set of input files into line-aligned
//! blocks, map each block on a thread pool into hash-bucketed [`Silo`]
//! records, externally merge-sort each bucket, then reduce the sorted
//! groups on a second thread pool.
//!
//! This is the engine the HTM indexer and duplicator workers run on top
//! of; it knows nothing about HTM ids or chunk files, only about
//! [`qserv_part::RecordKey`]-ordered records and the [`Worker`] trait.

pub mod error;
pub mod input;
pub mod job;
pub mod runfile;
pub mod silo;
pub mod worker;

pub use error::{MrError, Result};
pub use input::{split_into_blocks, InputBlock, InputLines};
pub use job::{run, MrConfig, DEFAULT_BLOCK_SIZE_MIB};
pub use runfile::{merge_runs, merge_runs_with_capacity, BufferedAppender, RunFileReader};
pub use silo::Silo;
pub use worker::Worker;
