//! `SqlCreateDbJob` / `SqlDeleteDbJob` / `SqlEnableDbJob` / `SqlDisableDbJob`
//! (spec 4.8.x): exactly one request per worker, body = `{database}`.

use qserv_proto::{Opcode, RequestBody};

use crate::job::SqlJobOps;

pub struct SqlCreateDbOps {
    pub database: String,
}

impl SqlJobOps for SqlCreateDbOps {
    fn job_type(&self) -> &'static str {
        "SqlCreateDbJob"
    }

    fn opcode(&self) -> Opcode {
        Opcode::SqlCreateDb
    }

    fn launch_requests(&self, _worker: &str) -> Vec<RequestBody> {
        vec![RequestBody::CreateDb { database: self.database.clone() }]
    }
}

pub struct SqlDeleteDbOps {
    pub database: String,
}

impl SqlJobOps for SqlDeleteDbOps {
    fn job_type(&self) -> &'static str {
        "SqlDeleteDbJob"
    }

    fn opcode(&self) -> Opcode {
        Opcode::SqlDeleteDb
    }

    fn launch_requests(&self, _worker: &str) -> Vec<RequestBody> {
        vec![RequestBody::DeleteDb { database: self.database.clone() }]
    }
}

pub struct SqlEnableDbOps {
    pub database: String,
}

impl SqlJobOps for SqlEnableDbOps {
    fn job_type(&self) -> &'static str {
        "SqlEnableDbJob"
    }

    fn opcode(&self) -> Opcode {
        Opcode::SqlEnableDb
    }

    fn launch_requests(&self, _worker: &str) -> Vec<RequestBody> {
        vec![RequestBody::EnableDb { database: self.database.clone() }]
    }
}

pub struct SqlDisableDbOps {
    pub database: String,
}

impl SqlJobOps for SqlDisableDbOps {
    fn job_type(&self) -> &'static str {
        "SqlDisableDbJob"
    }

    fn opcode(&self) -> Opcode {
        Opcode::SqlDisableDb
    }

    fn launch_requests(&self, _worker: &str) -> Vec<RequestBody> {
        vec![RequestBody::DisableDb { database: self.database.clone() }]
    }
}

pub type SqlCreateDbJob = crate::job::SqlJob<SqlCreateDbOps>;
pub type SqlDeleteDbJob = crate::job::SqlJob<SqlDeleteDbOps>;
pub type SqlEnableDbJob = crate::job::SqlJob<SqlEnableDbOps>;
pub type SqlDisableDbJob = crate::job::SqlJob<SqlDisableDbOps>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_db_launches_one_request_per_worker() {
        let ops = SqlCreateDbOps { database: "rdb".into() };
        let reqs = ops.launch_requests("worker1");
        assert_eq!(reqs.len(), 1);
        assert!(matches!(&reqs[0], RequestBody::CreateDb { database } if database == "rdb"));
    }
}
