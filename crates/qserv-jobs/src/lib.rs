//! The Job base and the representative SQL/Replica job family (spec 4.8,
//! 4.8.x): a `CREATED -> IN_PROGRESS -> FINISHED` state machine with
//! expiration bookkeeping, composed with `qserv-control::Request` for the
//! actual per-worker wire work.

pub mod database_services;
pub mod error;
pub mod job;
pub mod kinds;
pub mod state;

pub use database_services::{
    DatabaseServices, InMemoryDatabaseServices, InMemoryTransactions, JobRecord, TransactionRecord,
    TransactionState, Transactions,
};
pub use error::{JobError, Result};
pub use job::{JobSnapshot, OnJobFinish, SqlJob, SqlJobOps};
pub use state::{JobExtendedStatus, JobState, Progress};

pub use kinds::db::{
    SqlCreateDbJob, SqlCreateDbOps, SqlDeleteDbJob, SqlDeleteDbOps, SqlDisableDbJob, SqlDisableDbOps,
    SqlEnableDbJob, SqlEnableDbOps,
};
pub use kinds::index::{
    IndexConsistency, SqlCreateIndexesJob, SqlCreateIndexesOps, SqlDropIndexesJob, SqlDropIndexesOps,
    SqlGetIndexesJob, SqlGetIndexesOps, SqlIndexStatus,
};
pub use kinds::partition::{SqlDeleteTablePartitionJob, SqlDeleteTablePartitionOps};
pub use kinds::replica::{
    DeleteJob, DeleteOps, DirectorIndexJob, DirectorIndexOps, EchoJob, EchoOps, FindAllJob, FindAllOps,
    FindJob, FindOps, FindResult, ReplicationJob, ReplicationOps,
};
pub use kinds::table::{
    SqlCreateTableJob, SqlCreateTableOps, SqlDeleteTableJob, SqlDeleteTableOps, SqlRemoveTablePartitionsJob,
    SqlRemoveTablePartitionsOps,
};
