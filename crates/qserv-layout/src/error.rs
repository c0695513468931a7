//! Errors raised building and validating the layout viewer's configuration.

#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("partitioning error: {0}")]
    Part(#[from] qserv_part::PartError),

    #[error("geometry error: {0}")]
    Geom(#[from] qserv_geom::GeomError),

    #[error("invalid layout configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, LayoutError>;
