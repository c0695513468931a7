//! Qserv partitioning and control-plane core
//!
//! This crate is the "glue" layer: the shared error taxonomy, path/naming
//! conventions for the files the partitioning pipeline produces, shared CLI
//! flag structures, and logging setup. The actual subsystems live in their
//! own workspace crates:
//!
//! - [`qserv_geom`] — spherical geometry and the HTM index
//! - [`qserv_part`] — Chunker, CSV editor, `Record<K>`, `HtmIndex`/`ChunkIndex`
//! - [`qserv_mr`] — the out-of-core map-reduce engine
//! - `qserv-htm-indexer` / `qserv-duplicator` — map-reduce workers and CLIs
//! - [`qserv_registry`] — worker directory / persisted configuration
//! - [`qserv_control`] — the Controller and per-worker Request lifecycle
//! - [`qserv_jobs`] — the Job base and SQL/Replica job fan-out
//! - [`qserv_qmeta`] — the user-table ingest registry

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{QservError, Result};
