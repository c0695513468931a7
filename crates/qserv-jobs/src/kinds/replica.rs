//! `ReplicationJob` / `DeleteJob` / `FindJob` / `FindAllJob` / `EchoJob` /
//! `DirectorIndexJob` (spec 4.8.x): per-replica operations against one or
//! more workers, where the result merge is just aggregation — no
//! consistency comparison like `SqlGetIndexesJob`'s.

use std::sync::Mutex;

use qserv_proto::{Opcode, RequestBody, ResponseBody};

use crate::job::SqlJobOps;

pub struct ReplicationOps {
    pub database: String,
    pub chunk: u32,
    pub source_worker: String,
}

impl SqlJobOps for ReplicationOps {
    fn job_type(&self) -> &'static str {
        "ReplicationJob"
    }

    fn opcode(&self) -> Opcode {
        Opcode::Replicate
    }

    fn launch_requests(&self, _worker: &str) -> Vec<RequestBody> {
        vec![RequestBody::Replicate {
            database: self.database.clone(),
            chunk: self.chunk,
            source_worker: self.source_worker.clone(),
        }]
    }
}

pub struct DeleteOps {
    pub database: String,
    pub chunk: u32,
}

impl SqlJobOps for DeleteOps {
    fn job_type(&self) -> &'static str {
        "DeleteJob"
    }

    fn opcode(&self) -> Opcode {
        Opcode::Delete
    }

    fn launch_requests(&self, _worker: &str) -> Vec<RequestBody> {
        vec![RequestBody::Delete { database: self.database.clone(), chunk: self.chunk }]
    }
}

/// One worker's report of whether `chunk` exists, and how many rows it
/// holds if so.
#[derive(Debug, Clone)]
pub struct FindResult {
    pub worker: String,
    pub exists: bool,
    pub rows: Option<u64>,
}

pub struct FindOps {
    pub database: String,
    pub chunk: u32,
    results: Mutex<Vec<FindResult>>,
}

impl FindOps {
    pub fn new(database: impl Into<String>, chunk: u32) -> Self {
        Self { database: database.into(), chunk, results: Mutex::new(Vec::new()) }
    }

    pub fn results(&self) -> Vec<FindResult> {
        self.results.lock().unwrap().clone()
    }
}

impl SqlJobOps for FindOps {
    fn job_type(&self) -> &'static str {
        "FindJob"
    }

    fn opcode(&self) -> Opcode {
        Opcode::Find
    }

    fn launch_requests(&self, _worker: &str) -> Vec<RequestBody> {
        vec![RequestBody::Find { database: self.database.clone(), chunk: self.chunk }]
    }

    fn on_response(&self, worker: &str, response: &ResponseBody) {
        if let ResponseBody::Find { exists, rows, .. } = response {
            self.results.lock().unwrap().push(FindResult { worker: worker.to_string(), exists: *exists, rows: *rows });
        }
    }
}

pub struct FindAllOps {
    pub database: String,
    chunks: Mutex<Vec<(String, Vec<u32>)>>,
}

impl FindAllOps {
    pub fn new(database: impl Into<String>) -> Self {
        Self { database: database.into(), chunks: Mutex::new(Vec::new()) }
    }

    /// Per-worker chunk lists collected so far, keyed by reporting worker.
    pub fn per_worker_chunks(&self) -> Vec<(String, Vec<u32>)> {
        self.chunks.lock().unwrap().clone()
    }
}

impl SqlJobOps for FindAllOps {
    fn job_type(&self) -> &'static str {
        "FindAllJob"
    }

    fn opcode(&self) -> Opcode {
        Opcode::FindAll
    }

    fn launch_requests(&self, _worker: &str) -> Vec<RequestBody> {
        vec![RequestBody::FindAll { database: self.database.clone() }]
    }

    fn on_response(&self, worker: &str, response: &ResponseBody) {
        if let ResponseBody::FindAll { chunks } = response {
            self.chunks.lock().unwrap().push((worker.to_string(), chunks.clone()));
        }
    }
}

pub struct EchoOps {
    pub data: String,
    pub delay_ms: u64,
    echoed: Mutex<Vec<String>>,
}

impl EchoOps {
    pub fn new(data: impl Into<String>, delay_ms: u64) -> Self {
        Self { data: data.into(), delay_ms, echoed: Mutex::new(Vec::new()) }
    }

    pub fn echoed(&self) -> Vec<String> {
        self.echoed.lock().unwrap().clone()
    }
}

impl SqlJobOps for EchoOps {
    fn job_type(&self) -> &'static str {
        "EchoJob"
    }

    fn opcode(&self) -> Opcode {
        Opcode::Echo
    }

    fn launch_requests(&self, _worker: &str) -> Vec<RequestBody> {
        vec![RequestBody::Echo { data: self.data.clone(), delay_ms: self.delay_ms }]
    }

    fn on_response(&self, _worker: &str, response: &ResponseBody) {
        if let ResponseBody::Echo { data } = response {
            self.echoed.lock().unwrap().push(data.clone());
        }
    }
}

pub struct DirectorIndexOps {
    pub database: String,
    pub director_table: String,
    bytes: Mutex<Vec<(String, Vec<u8>)>>,
}

impl DirectorIndexOps {
    pub fn new(database: impl Into<String>, director_table: impl Into<String>) -> Self {
        Self { database: database.into(), director_table: director_table.into(), bytes: Mutex::new(Vec::new()) }
    }

    pub fn per_worker_bytes(&self) -> Vec<(String, Vec<u8>)> {
        self.bytes.lock().unwrap().clone()
    }
}

impl SqlJobOps for DirectorIndexOps {
    fn job_type(&self) -> &'static str {
        "DirectorIndexJob"
    }

    fn opcode(&self) -> Opcode {
        Opcode::DirectorIndex
    }

    fn launch_requests(&self, _worker: &str) -> Vec<RequestBody> {
        vec![RequestBody::DirectorIndex {
            database: self.database.clone(),
            director_table: self.director_table.clone(),
        }]
    }

    fn on_response(&self, worker: &str, response: &ResponseBody) {
        if let ResponseBody::DirectorIndex { bytes } = response {
            self.bytes.lock().unwrap().push((worker.to_string(), bytes.clone()));
        }
    }
}

pub type ReplicationJob = crate::job::SqlJob<ReplicationOps>;
pub type DeleteJob = crate::job::SqlJob<DeleteOps>;
pub type FindJob = crate::job::SqlJob<FindOps>;
pub type FindAllJob = crate::job::SqlJob<FindAllOps>;
pub type EchoJob = crate::job::SqlJob<EchoOps>;
pub type DirectorIndexJob = crate::job::SqlJob<DirectorIndexOps>;
