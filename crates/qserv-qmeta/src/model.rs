//! `UserTableIngestRequest` (spec 4.9): the persistent record describing
//! one user-table ingest, plus its strictly-ordered status machine.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// `status` (spec 4.9): `IN_PROGRESS -> {COMPLETED|FAILED|FAILED_LR} ->
/// deleted`. There is no path back to `IN_PROGRESS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IngestStatus {
    InProgress,
    Completed,
    Failed,
    FailedLr,
}

impl IngestStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, IngestStatus::InProgress)
    }
}

/// Persistent record for one user-table ingest (spec 4.9).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserTableIngestRequest {
    pub id: u64,
    pub status: IngestStatus,
    pub begin_time_ms: i64,
    pub end_time_ms: Option<i64>,
    pub delete_time_ms: Option<i64>,
    pub error: Option<String>,
    pub database: String,
    pub table: String,
    pub table_type: String,
    pub is_temporary: bool,
    pub data_format: String,
    pub num_chunks: Option<u64>,
    pub num_rows: Option<u64>,
    pub num_bytes: Option<u64>,
    pub transaction_id: Option<u64>,
    /// Auxiliary `*Params` payload: the table's column schema.
    pub schema: Value,
    /// Auxiliary `*Params` payload: the indexes requested at ingest time.
    pub indexes: Value,
    /// Auxiliary `*Params` payload: free-form key-value metadata.
    pub extended: Value,
}

/// Fields supplied by the caller of `register_request`; `id` and the
/// initial status/timestamps are assigned by the store (spec 4.9:
/// "`id` is assigned on insertion").
#[derive(Debug, Clone)]
pub struct NewIngestRequest {
    pub database: String,
    pub table: String,
    pub table_type: String,
    pub is_temporary: bool,
    pub data_format: String,
    pub transaction_id: Option<u64>,
    pub schema: Value,
    pub indexes: Value,
    pub extended: Value,
}

/// Filter for `find_requests` (spec 4.9): a request to query by table
/// without a database is rejected by the store, not representable here.
#[derive(Debug, Clone, Default)]
pub struct FindRequestsFilter {
    pub database: Option<String>,
    pub table: Option<String>,
    pub status: Option<IngestStatus>,
    pub begin_time_ms: Option<i64>,
    pub end_time_ms: Option<i64>,
    pub limit: usize,
    pub extended: bool,
}
