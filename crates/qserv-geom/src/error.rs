//! Errors raised by the geometry core: invalid HTM ids/levels, malformed
//! spherical boxes, and the one unsupported triangle/box intersection case.

/// Errors from the geometry primitives.
#[derive(Debug, thiserror::Error, PartialEq, Clone)]
pub enum GeomError {
    /// `htmId` bit pattern does not have the expected leading nibble / length.
    #[error("invalid HTM id: {0:#x}")]
    InvalidHtmId(u32),

    /// Requested HTM level outside `[0, HTM_MAX_LEVEL]`.
    #[error("invalid HTM level: {0}")]
    InvalidLevel(i32),

    /// A radius passed to [`crate::sphgeom::max_alpha`] outside `[0, 90]` degrees.
    #[error("angular radius out of range [0, 90]: {0}")]
    InvalidRadius(f64),

    /// Malformed spherical box bounds (e.g. `latMax < latMin`).
    #[error("invalid spherical box: {0}")]
    InvalidBox(String),

    /// Triangle/box intersection for a box whose longitude extent exceeds
    /// 180 degrees; splitting such a box into two convex halves first would
    /// make this representable but isn't implemented yet.
    #[error("not implemented: triangle/box intersection for lon-extent > 180 degrees")]
    NotImplemented,
}

pub type Result<T> = std::result::Result<T, GeomError>;
