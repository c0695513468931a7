//! Errors raised building the duplicator's context and running its worker
//! (spec §4.6 failure modes).

#[derive(Debug, thiserror::Error)]
pub enum DuplicatorError {
    #[error("partitioning error: {0}")]
    Part(#[from] qserv_part::PartError),

    #[error("geometry error: {0}")]
    Geom(#[from] qserv_geom::GeomError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The data-set index (`--index`) and the partitioning-position index
    /// (`--part.index`) were built at different HTM levels.
    #[error("inconsistent index: {0}")]
    InconsistentIndex(String),

    /// A remapped id was not found in its source triangle's sorted id array.
    #[error("id {0} not found in source triangle's id file")]
    IdNotFound(i64),

    #[error("sampling fraction must be in (0, 1], got {0}")]
    InvalidSamplingFraction(f64),

    /// A chunk's overlap-expanded bounds covered no non-empty source triangle.
    #[error("source triangle has no non-empty mapping: the index is empty")]
    EmptyIndex,

    #[error("invalid duplicator configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, DuplicatorError>;

impl From<DuplicatorError> for qserv_mr::MrError {
    fn from(e: DuplicatorError) -> Self {
        qserv_mr::MrError::Worker(e.to_string())
    }
}
