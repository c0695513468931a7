//! Errors raised by the partitioning primitives.

#[derive(Debug, thiserror::Error)]
pub enum PartError {
    #[error("geometry error: {0}")]
    Geom(#[from] qserv_geom::GeomError),

    #[error("invalid chunk id: {0}")]
    InvalidChunkId(u32),

    #[error("invalid sub-chunk id: {0}")]
    InvalidSubChunkId(u32),

    #[error("invalid chunker configuration: {0}")]
    InvalidChunkerConfig(String),

    #[error("CSV field {field} too long: {len} bytes exceeds the {max} byte limit")]
    FieldTooLong { field: usize, len: usize, max: usize },

    #[error("CSV line too long: {len} bytes exceeds the {max} byte limit")]
    LineTooLong { len: usize, max: usize },

    #[error("field index {0} out of range")]
    FieldIndexOutOfRange(usize),

    #[error("malformed CSV record: {0}")]
    MalformedRecord(String),

    #[error("invalid HTM index file: {0}")]
    InvalidHtmIndexFile(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PartError>;
