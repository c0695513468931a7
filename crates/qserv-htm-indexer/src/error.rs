//! Errors raised building and validating the HTM indexer's configuration
//! and worker.

#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    #[error("partitioning error: {0}")]
    Part(#[from] qserv_part::PartError),

    #[error("geometry error: {0}")]
    Geom(#[from] qserv_geom::GeomError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid indexer configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, IndexerError>;

impl From<IndexerError> for qserv_mr::MrError {
    fn from(e: IndexerError) -> Self {
        qserv_mr::MrError::Worker(e.to_string())
    }
}
