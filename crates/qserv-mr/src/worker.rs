//! The `Worker` trait a map-reduce job is built from: map an input line
//! into zero or more keyed records, reduce the records sharing a key, and
//! fold whatever per-thread state accumulated along the way into a result
//! the driver hands back to its caller.

use qserv_part::{Record, RecordKey};

use crate::error::Result;

/// One thread's worth of map-reduce logic. The driver constructs one
/// `Worker` per thread (map or reduce) via a factory closure, so a `Worker`
/// owns whatever per-thread accumulator it needs (an `HtmIndex`, a set of
/// open chunk files, ...) and is free to be stateful across calls.
pub trait Worker<K: RecordKey>: Send {
    /// Whatever this worker's `finish` produces, to be merged by the
    /// driver's caller across all worker threads.
    type Output: Send + 'static;

    /// Parse one input line and emit zero or more records through `emit`.
    fn map(&mut self, line: &[u8], emit: &mut dyn FnMut(Record<K>)) -> Result<()>;

    /// Handle every record sharing one key, in the order the shuffle sorted
    /// them (overlap copies trailing primaries, since keys compare overlap
    /// last).
    fn reduce(&mut self, key: &K, records: &[Record<K>]) -> Result<()>;

    /// Called once a worker thread has no more input left. Consumes the
    /// worker so ownership of any open resources is explicit.
    fn finish(self) -> Result<Self::Output>;
}
