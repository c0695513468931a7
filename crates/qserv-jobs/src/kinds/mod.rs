//! Concrete job kinds (spec 4.8.x), grouped by shared request shape.

pub mod db;
pub mod index;
pub mod partition;
pub mod replica;
pub mod table;
