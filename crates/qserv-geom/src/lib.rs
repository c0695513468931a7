//! Spherical partitioning geometry: `Vec3`/`Mat3` linear algebra, the
//! Hierarchical Triangular Mesh (HTM) index, and the spherical box/triangle
//! types used to compute chunk and sub-chunk boundaries.

pub mod error;
pub mod htm;
pub mod mat3;
pub mod sbox;
pub mod sphgeom;
pub mod triangle;
pub mod vec3;

pub use error::{GeomError, Result};
pub use htm::{htm_id, htm_level};
pub use mat3::Mat3;
pub use sbox::SphericalBox;
pub use sphgeom::{ang_sep, cartesian, clamp_lat, clamp_lon, max_alpha, min_delta_lon, reduce_lon};
pub use triangle::SphericalTriangle;
pub use vec3::Vec3;
