//! Operation codes a `Request` carries (spec 4.8.x's representative SQL/
//! Replica job family).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    SqlCreateDb,
    SqlDeleteDb,
    SqlEnableDb,
    SqlDisableDb,
    SqlCreateTable,
    SqlDeleteTable,
    SqlRemoveTablePartitions,
    SqlDeleteTablePartition,
    SqlCreateIndexes,
    SqlDropIndexes,
    SqlGetIndexes,
    Replicate,
    Delete,
    Find,
    FindAll,
    Echo,
    DirectorIndex,
}

impl Opcode {
    /// The `body_version` frames of this opcode carry; bumped only if a
    /// body's shape changes incompatibly.
    pub fn body_version(self) -> u32 {
        1
    }
}
