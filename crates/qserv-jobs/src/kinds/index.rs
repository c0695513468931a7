//! `SqlCreateIndexesJob` / `SqlDropIndexesJob` / `SqlGetIndexesJob` (spec
//! 4.8.x): per worker the table list is split into batches of size
//! `<= max_per_worker`, each batch becoming one Request. `SqlGetIndexesJob`
//! additionally aggregates the per-worker result sets into one summary
//! with a per-index status.

use std::collections::HashMap;
use std::sync::Mutex;

use qserv_proto::{Opcode, RequestBody, ResponseBody, SqlIndexDef, SqlIndexSpec};

use crate::job::SqlJobOps;

fn batches(tables: &[String], max_per_worker: usize) -> Vec<Vec<String>> {
    let max_per_worker = max_per_worker.max(1);
    tables.chunks(max_per_worker).map(|chunk| chunk.to_vec()).collect()
}

pub struct SqlCreateIndexesOps {
    pub database: String,
    pub tables: Vec<String>,
    pub index: SqlIndexSpec,
    pub max_per_worker: usize,
}

impl SqlJobOps for SqlCreateIndexesOps {
    fn job_type(&self) -> &'static str {
        "SqlCreateIndexesJob"
    }

    fn opcode(&self) -> Opcode {
        Opcode::SqlCreateIndexes
    }

    fn max_requests_per_worker(&self) -> usize {
        self.max_per_worker
    }

    fn launch_requests(&self, _worker: &str) -> Vec<RequestBody> {
        batches(&self.tables, self.max_per_worker)
            .into_iter()
            .map(|tables| RequestBody::CreateIndexes {
                database: self.database.clone(),
                tables,
                index: self.index.clone(),
            })
            .collect()
    }
}

pub struct SqlDropIndexesOps {
    pub database: String,
    pub tables: Vec<String>,
    pub index_name: String,
    pub max_per_worker: usize,
}

impl SqlJobOps for SqlDropIndexesOps {
    fn job_type(&self) -> &'static str {
        "SqlDropIndexesJob"
    }

    fn opcode(&self) -> Opcode {
        Opcode::SqlDropIndexes
    }

    fn max_requests_per_worker(&self) -> usize {
        self.max_per_worker
    }

    fn launch_requests(&self, _worker: &str) -> Vec<RequestBody> {
        batches(&self.tables, self.max_per_worker)
            .into_iter()
            .map(|tables| RequestBody::DropIndexes {
                database: self.database.clone(),
                tables,
                index_name: self.index_name.clone(),
            })
            .collect()
    }
}

/// Per-index consistency across the replicas that reported it (spec
/// 4.8.x).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexConsistency {
    /// Reported by every targeted worker, with an identical definition.
    Complete,
    /// Reported by fewer workers than were targeted.
    Incomplete,
    /// Reported by every targeted worker, but with differing definitions.
    Inconsistent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SqlIndexStatus {
    pub table: String,
    pub name: String,
    pub status: IndexConsistency,
}

pub struct SqlGetIndexesOps {
    pub database: String,
    pub tables: Vec<String>,
    pub max_per_worker: usize,
    total_workers: usize,
    collected: Mutex<Vec<SqlIndexDef>>,
}

impl SqlGetIndexesOps {
    pub fn new(database: impl Into<String>, tables: Vec<String>, max_per_worker: usize, total_workers: usize) -> Self {
        Self {
            database: database.into(),
            tables,
            max_per_worker,
            total_workers,
            collected: Mutex::new(Vec::new()),
        }
    }

    /// Per-`(table, index name)` status, comparing definitions across
    /// replicas and replica count against `total_workers` (spec 4.8.x).
    pub fn summary(&self) -> Vec<SqlIndexStatus> {
        let collected = self.collected.lock().unwrap();
        let mut grouped: HashMap<(String, String), Vec<&SqlIndexDef>> = HashMap::new();
        for def in collected.iter() {
            grouped.entry((def.table.clone(), def.spec.name.clone())).or_default().push(def);
        }
        let mut out: Vec<SqlIndexStatus> = grouped
            .into_iter()
            .map(|((table, name), defs)| {
                let status = if defs.len() < self.total_workers {
                    IndexConsistency::Incomplete
                } else if defs.windows(2).all(|pair| pair[0].spec == pair[1].spec) {
                    IndexConsistency::Complete
                } else {
                    IndexConsistency::Inconsistent
                };
                SqlIndexStatus { table, name, status }
            })
            .collect();
        out.sort_by(|a, b| (a.table.clone(), a.name.clone()).cmp(&(b.table.clone(), b.name.clone())));
        out
    }
}

impl SqlJobOps for SqlGetIndexesOps {
    fn job_type(&self) -> &'static str {
        "SqlGetIndexesJob"
    }

    fn opcode(&self) -> Opcode {
        Opcode::SqlGetIndexes
    }

    fn max_requests_per_worker(&self) -> usize {
        self.max_per_worker
    }

    fn launch_requests(&self, _worker: &str) -> Vec<RequestBody> {
        batches(&self.tables, self.max_per_worker)
            .into_iter()
            .map(|tables| RequestBody::GetIndexes { database: self.database.clone(), tables })
            .collect()
    }

    fn on_response(&self, _worker: &str, response: &ResponseBody) {
        if let ResponseBody::Indexes { definitions } = response {
            self.collected.lock().unwrap().extend(definitions.iter().cloned());
        }
    }
}

pub type SqlCreateIndexesJob = crate::job::SqlJob<SqlCreateIndexesOps>;
pub type SqlDropIndexesJob = crate::job::SqlJob<SqlDropIndexesOps>;
pub type SqlGetIndexesJob = crate::job::SqlJob<SqlGetIndexesOps>;

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(name: &str) -> SqlIndexSpec {
        SqlIndexSpec { name: name.into(), columns: vec!["objectId".into()], unique: false }
    }

    #[test]
    fn create_indexes_batches_tables() {
        let ops = SqlCreateIndexesOps {
            database: "rdb".into(),
            tables: vec!["Object".into(), "Source".into(), "ForcedSource".into()],
            index: spec("idx_objectId"),
            max_per_worker: 2,
        };
        let reqs = ops.launch_requests("worker1");
        assert_eq!(reqs.len(), 2);
    }

    #[test]
    fn get_indexes_complete_when_all_workers_agree() {
        let ops = SqlGetIndexesOps::new("rdb", vec!["Object".into()], 10, 2);
        ops.on_response(
            "worker1",
            &ResponseBody::Indexes {
                definitions: vec![SqlIndexDef { worker: "worker1".into(), table: "Object".into(), spec: spec("idx_objectId") }],
            },
        );
        ops.on_response(
            "worker2",
            &ResponseBody::Indexes {
                definitions: vec![SqlIndexDef { worker: "worker2".into(), table: "Object".into(), spec: spec("idx_objectId") }],
            },
        );
        let summary = ops.summary();
        assert_eq!(summary.len(), 1);
        assert_eq!(summary[0].status, IndexConsistency::Complete);
    }

    #[test]
    fn get_indexes_incomplete_when_a_worker_never_reported() {
        let ops = SqlGetIndexesOps::new("rdb", vec!["Object".into()], 10, 2);
        ops.on_response(
            "worker1",
            &ResponseBody::Indexes {
                definitions: vec![SqlIndexDef { worker: "worker1".into(), table: "Object".into(), spec: spec("idx_objectId") }],
            },
        );
        let summary = ops.summary();
        assert_eq!(summary[0].status, IndexConsistency::Incomplete);
    }

    #[test]
    fn get_indexes_inconsistent_when_definitions_disagree() {
        let ops = SqlGetIndexesOps::new("rdb", vec!["Object".into()], 10, 2);
        ops.on_response(
            "worker1",
            &ResponseBody::Indexes {
                definitions: vec![SqlIndexDef { worker: "worker1".into(), table: "Object".into(), spec: spec("idx_objectId") }],
            },
        );
        ops.on_response(
            "worker2",
            &ResponseBody::Indexes {
                definitions: vec![SqlIndexDef {
                    worker: "worker2".into(),
                    table: "Object".into(),
                    spec: SqlIndexSpec { name: "idx_objectId".into(), columns: vec!["objectId".into(), "ra".into()], unique: false },
                }],
            },
        );
        let summary = ops.summary();
        assert_eq!(summary[0].status, IndexConsistency::Inconsistent);
    }
}
