pub type Result<T> = std::result::Result<T, QMetaError>;

/// QMeta's error taxonomy (spec 4.9).
#[derive(Debug, thiserror::Error)]
pub enum QMetaError {
    #[error("ingest request {0} not found")]
    IngestRequestNotFound(u64),

    #[error("sql error: {0}")]
    SqlError(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

pub(crate) fn invalid_argument(msg: impl Into<String>) -> QMetaError {
    QMetaError::InvalidArgument(msg.into())
}
