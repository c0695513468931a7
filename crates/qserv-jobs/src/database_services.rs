//! `DatabaseServices`: the collaborator a Job persists its terminal state
//! to (spec 4.8, 6.6). Production wiring to a real SQL-backed store is
//! outside this core, same as Registry/Configuration ("interface only") —
//! so this crate ships the trait plus an in-memory implementation good
//! enough for the Controller/Job unit tests and for embedding this core
//! in a single-process tool.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::SystemTime;

use uuid::Uuid;

use crate::state::{JobExtendedStatus, JobState};

/// One row of a Job's persisted record (spec 6.6):
/// `(jobId, type, state, extendedState, parentJobId, priority, beginTime,
/// endTime, [extendedKeyVal]*)`.
#[derive(Debug, Clone)]
pub struct JobRecord {
    pub job_id: Uuid,
    pub job_type: String,
    pub state: JobState,
    pub extended_state: JobExtendedStatus,
    pub parent_job_id: Option<Uuid>,
    pub priority: i32,
    pub begin_time: Option<SystemTime>,
    pub end_time: Option<SystemTime>,
    pub extended: Vec<(String, String)>,
}

/// Persistence boundary a `Job` writes its terminal record to at the
/// `FINISHED` transition (spec 4.8: "`extendedPersistentState()` ...
/// recorded in DatabaseServices at transition into FINISHED").
pub trait DatabaseServices: Send + Sync {
    fn save_job_state(&self, record: JobRecord);

    /// Readable only once the job has reached `FINISHED` (spec 6.6:
    /// "`persistentLogData()` be readable only in FINISHED").
    fn persistent_log_data(&self, job_id: Uuid) -> Option<JobRecord>;
}

/// In-memory `DatabaseServices`, used by tests and single-process tools.
#[derive(Default)]
pub struct InMemoryDatabaseServices {
    records: Mutex<HashMap<Uuid, JobRecord>>,
}

impl InMemoryDatabaseServices {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DatabaseServices for InMemoryDatabaseServices {
    fn save_job_state(&self, record: JobRecord) {
        self.records.lock().unwrap().insert(record.job_id, record);
    }

    fn persistent_log_data(&self, job_id: Uuid) -> Option<JobRecord> {
        let records = self.records.lock().unwrap();
        let record = records.get(&job_id)?;
        if record.state != JobState::Finished {
            return None;
        }
        Some(record.clone())
    }
}

/// State of a super-transaction, as needed by `SqlDeleteTablePartitionJob`'s
/// preconditions (spec 4.8.x).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    InProgress,
    Aborted,
    Committed,
}

#[derive(Debug, Clone)]
pub struct TransactionRecord {
    pub id: u64,
    pub database: String,
    pub state: TransactionState,
}

/// The super-transaction collaborator `SqlDeleteTablePartitionJob`
/// validates its preconditions against and expands worker table lists
/// from (spec 4.8.x: `workerTables(worker, txId, baseTable)`).
pub trait Transactions: Send + Sync {
    fn transaction(&self, id: u64) -> Option<TransactionRecord>;

    /// Chunked sibling table names (on `worker`) modified under `tx_id`
    /// for `base_table`, not including the prototype itself.
    fn modified_chunk_tables(&self, worker: &str, tx_id: u64, base_table: &str) -> Vec<String>;
}

/// In-memory `Transactions`, used by tests.
#[derive(Default)]
pub struct InMemoryTransactions {
    transactions: Mutex<HashMap<u64, TransactionRecord>>,
    modified: Mutex<HashMap<(String, u64, String), Vec<String>>>,
}

impl InMemoryTransactions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: TransactionRecord) {
        self.transactions.lock().unwrap().insert(record.id, record);
    }

    pub fn set_modified_chunk_tables(
        &self,
        worker: impl Into<String>,
        tx_id: u64,
        base_table: impl Into<String>,
        tables: Vec<String>,
    ) {
        self.modified
            .lock()
            .unwrap()
            .insert((worker.into(), tx_id, base_table.into()), tables);
    }
}

impl Transactions for InMemoryTransactions {
    fn transaction(&self, id: u64) -> Option<TransactionRecord> {
        self.transactions.lock().unwrap().get(&id).cloned()
    }

    fn modified_chunk_tables(&self, worker: &str, tx_id: u64, base_table: &str) -> Vec<String> {
        self.modified
            .lock()
            .unwrap()
            .get(&(worker.to_string(), tx_id, base_table.to_string()))
            .cloned()
            .unwrap_or_default()
    }
}
