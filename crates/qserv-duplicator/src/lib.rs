//! Duplicator map-reduce worker: copies rows from non-empty HTM triangles
//! into empty ones so that every chunk a partitioning run produces is fully
//! populated, even where the underlying catalog has gaps (spec §4.6). The
//! `qserv-duplicator` binary is a thin `clap` shell that builds a
//! [`context::DuplicatorContext`] up front and drives
//! [`worker::DuplicatorWorker`] through `qserv_mr::run`.

pub mod context;
pub mod error;
pub mod id_index;
pub mod worker;

pub use context::{DuplicationTarget, DuplicatorContext};
pub use error::{DuplicatorError, Result};
pub use id_index::IdIndex;
pub use worker::{DuplicatorConfig, DuplicatorWorker};
