//! Request/response message bodies for the representative SQL/Replica job
//! family (spec 4.8.x). These are opaque payloads from the Controller's
//! point of view — it frames and ships them, and never inspects their
//! contents — so the shapes here exist purely so `qserv-jobs` and a real
//! worker implementation agree on a wire format.

use serde::{Deserialize, Serialize};

/// One column index definition, as requested or as reported back by a
/// worker for `SqlGetIndexesJob`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlIndexSpec {
    pub name: String,
    pub columns: Vec<String>,
    pub unique: bool,
}

/// A worker's report of one table's index, keyed by the worker that
/// reported it, so `SqlGetIndexesJob` can compare definitions and replica
/// counts across workers (spec 4.8.x).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SqlIndexDef {
    pub worker: String,
    pub table: String,
    pub spec: SqlIndexSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RequestBody {
    CreateDb { database: String },
    DeleteDb { database: String },
    EnableDb { database: String },
    DisableDb { database: String },
    CreateTable { database: String, tables: Vec<String> },
    DeleteTable { database: String, tables: Vec<String> },
    RemoveTablePartitions { database: String, tables: Vec<String> },
    DeleteTablePartition {
        database: String,
        transaction_id: u64,
        base_table: String,
        worker_tables: Vec<String>,
    },
    CreateIndexes {
        database: String,
        tables: Vec<String>,
        index: SqlIndexSpec,
    },
    DropIndexes {
        database: String,
        tables: Vec<String>,
        index_name: String,
    },
    GetIndexes { database: String, tables: Vec<String> },
    Replicate { database: String, chunk: u32, source_worker: String },
    Delete { database: String, chunk: u32 },
    Find { database: String, chunk: u32 },
    FindAll { database: String },
    Echo { data: String, delay_ms: u64 },
    DirectorIndex { database: String, director_table: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ResponseBody {
    Ack,
    Indexes { definitions: Vec<SqlIndexDef> },
    Find { chunk: u32, exists: bool, rows: Option<u64> },
    FindAll { chunks: Vec<u32> },
    Echo { data: String },
    DirectorIndex { bytes: Vec<u8> },
}
