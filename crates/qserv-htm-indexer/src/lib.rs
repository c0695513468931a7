//! HTM indexer map-reduce worker: extracts an id and `(lon, lat)` pair from
//! each CSV row and partitions rows into per-triangle files keyed by HTM id
//! (spec §4.5). The `qserv-htm-indexer` binary is a thin `clap` shell around
//! [`worker::HtmIndexerWorker`] that drives it through `qserv_mr::run`.

pub mod error;
pub mod worker;

pub use error::{IndexerError, Result};
pub use worker::{HtmIndexerWorker, IndexerConfig};
