//! Errors raised by the map-reduce engine.
//!
//! Any failure here is meant to be fatal to the job: a worker exception
//! aborts the whole run, its run files are cleaned up, and the caller gets
//! back one of these rather than a partial result.

#[derive(Debug, thiserror::Error)]
pub enum MrError {
    #[error("partitioning error: {0}")]
    Part(#[from] qserv_part::PartError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("worker failed: {0}")]
    Worker(String),

    #[error("invalid map-reduce configuration: {0}")]
    InvalidConfig(String),

    #[error("run file {0} is truncated or corrupt")]
    CorruptRunFile(String),

    #[error("job cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, MrError>;
