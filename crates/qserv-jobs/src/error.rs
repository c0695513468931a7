pub type Result<T> = std::result::Result<T, JobError>;

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("no eligible workers for job")]
    NoEligibleWorkers,

    #[error("transaction {0} not found")]
    TransactionNotFound(u64),

    #[error("transaction {0} is not ABORTED")]
    TransactionNotAborted(u64),

    #[error("table {table} does not belong to transaction {tx_id}'s database {database}")]
    TableNotInTransactionDatabase { tx_id: u64, table: String, database: String },

    #[error(transparent)]
    Control(#[from] qserv_control::ControlError),
}
