//! `SqlDeleteTablePartitionJob` (spec 4.8.x): drops the MySQL partition for
//! one super-transaction. Preconditions are enforced eagerly, at
//! construction, rather than deferred into `launch_requests` — a bad
//! transaction id or state should fail before a single Request is ever
//! fired, not after the job has already been marked IN_PROGRESS.

use std::sync::Arc;

use qserv_proto::{Opcode, RequestBody};

use crate::database_services::{TransactionState, Transactions};
use crate::error::{JobError, Result};
use crate::job::SqlJobOps;

pub struct SqlDeleteTablePartitionOps {
    database: String,
    transaction_id: u64,
    base_table: String,
    transactions: Arc<dyn Transactions>,
}

impl SqlDeleteTablePartitionOps {
    /// Validates the three preconditions from spec 4.8.x: the transaction
    /// exists, is ABORTED, and `base_table` belongs to its database.
    pub fn new(
        database: impl Into<String>,
        transaction_id: u64,
        base_table: impl Into<String>,
        transactions: Arc<dyn Transactions>,
    ) -> Result<Self> {
        let database = database.into();
        let base_table = base_table.into();
        let tx = transactions
            .transaction(transaction_id)
            .ok_or(JobError::TransactionNotFound(transaction_id))?;
        if tx.state != TransactionState::Aborted {
            return Err(JobError::TransactionNotAborted(transaction_id));
        }
        if tx.database != database {
            return Err(JobError::TableNotInTransactionDatabase {
                tx_id: transaction_id,
                table: base_table,
                database,
            });
        }
        Ok(Self { database, transaction_id, base_table, transactions })
    }
}

impl SqlJobOps for SqlDeleteTablePartitionOps {
    fn job_type(&self) -> &'static str {
        "SqlDeleteTablePartitionJob"
    }

    fn opcode(&self) -> Opcode {
        Opcode::SqlDeleteTablePartition
    }

    /// `workerTables(worker, txId, baseTable)`: the prototype plus every
    /// chunked sibling modified during the transaction.
    fn launch_requests(&self, worker: &str) -> Vec<RequestBody> {
        let mut worker_tables =
            self.transactions.modified_chunk_tables(worker, self.transaction_id, &self.base_table);
        worker_tables.push(self.base_table.clone());
        vec![RequestBody::DeleteTablePartition {
            database: self.database.clone(),
            transaction_id: self.transaction_id,
            base_table: self.base_table.clone(),
            worker_tables,
        }]
    }
}

pub type SqlDeleteTablePartitionJob = crate::job::SqlJob<SqlDeleteTablePartitionOps>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database_services::{InMemoryTransactions, TransactionRecord};

    fn aborted_tx() -> Arc<InMemoryTransactions> {
        let txs = Arc::new(InMemoryTransactions::new());
        txs.insert(TransactionRecord { id: 7, database: "rdb".into(), state: TransactionState::Aborted });
        txs
    }

    #[test]
    fn unknown_transaction_rejected() {
        let txs = Arc::new(InMemoryTransactions::new());
        let err = SqlDeleteTablePartitionOps::new("rdb", 7, "Object", txs).unwrap_err();
        assert!(matches!(err, JobError::TransactionNotFound(7)));
    }

    #[test]
    fn non_aborted_transaction_rejected() {
        let txs = Arc::new(InMemoryTransactions::new());
        txs.insert(TransactionRecord { id: 7, database: "rdb".into(), state: TransactionState::InProgress });
        let err = SqlDeleteTablePartitionOps::new("rdb", 7, "Object", txs).unwrap_err();
        assert!(matches!(err, JobError::TransactionNotAborted(7)));
    }

    #[test]
    fn mismatched_database_rejected() {
        let txs = aborted_tx();
        let err = SqlDeleteTablePartitionOps::new("other_db", 7, "Object", txs).unwrap_err();
        assert!(matches!(err, JobError::TableNotInTransactionDatabase { .. }));
    }

    #[test]
    fn worker_tables_includes_prototype_and_siblings() {
        let txs = aborted_tx();
        txs.set_modified_chunk_tables("worker1", 7, "Object", vec!["Object_100".into(), "Object_101".into()]);
        let ops = SqlDeleteTablePartitionOps::new("rdb", 7, "Object", txs).unwrap();
        let reqs = ops.launch_requests("worker1");
        match &reqs[0] {
            RequestBody::DeleteTablePartition { worker_tables, .. } => {
                assert_eq!(worker_tables, &vec!["Object_100".to_string(), "Object_101".to_string(), "Object".to_string()]);
            }
            other => panic!("unexpected body: {other:?}"),
        }
    }
}
