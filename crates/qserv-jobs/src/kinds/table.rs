//! `SqlCreateTableJob` / `SqlDeleteTableJob` / `SqlRemoveTablePartitionsJob`
//! (spec 4.8.x): one request per worker, body carries the full table list;
//! the worker expands partitioned names into chunked siblings.

use qserv_proto::{Opcode, RequestBody};

use crate::job::SqlJobOps;

pub struct SqlCreateTableOps {
    pub database: String,
    pub tables: Vec<String>,
}

impl SqlJobOps for SqlCreateTableOps {
    fn job_type(&self) -> &'static str {
        "SqlCreateTableJob"
    }

    fn opcode(&self) -> Opcode {
        Opcode::SqlCreateTable
    }

    fn launch_requests(&self, _worker: &str) -> Vec<RequestBody> {
        vec![RequestBody::CreateTable {
            database: self.database.clone(),
            tables: self.tables.clone(),
        }]
    }
}

pub struct SqlDeleteTableOps {
    pub database: String,
    pub tables: Vec<String>,
}

impl SqlJobOps for SqlDeleteTableOps {
    fn job_type(&self) -> &'static str {
        "SqlDeleteTableJob"
    }

    fn opcode(&self) -> Opcode {
        Opcode::SqlDeleteTable
    }

    fn launch_requests(&self, _worker: &str) -> Vec<RequestBody> {
        vec![RequestBody::DeleteTable {
            database: self.database.clone(),
            tables: self.tables.clone(),
        }]
    }
}

pub struct SqlRemoveTablePartitionsOps {
    pub database: String,
    pub tables: Vec<String>,
}

impl SqlJobOps for SqlRemoveTablePartitionsOps {
    fn job_type(&self) -> &'static str {
        "SqlRemoveTablePartitionsJob"
    }

    fn opcode(&self) -> Opcode {
        Opcode::SqlRemoveTablePartitions
    }

    fn launch_requests(&self, _worker: &str) -> Vec<RequestBody> {
        vec![RequestBody::RemoveTablePartitions {
            database: self.database.clone(),
            tables: self.tables.clone(),
        }]
    }
}

pub type SqlCreateTableJob = crate::job::SqlJob<SqlCreateTableOps>;
pub type SqlDeleteTableJob = crate::job::SqlJob<SqlDeleteTableOps>;
pub type SqlRemoveTablePartitionsJob = crate::job::SqlJob<SqlRemoveTablePartitionsOps>;
