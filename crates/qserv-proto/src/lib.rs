//! Wire message bodies for worker requests (spec 4.7/4.8) and the
//! versioned length-prefixed framing design note 9 calls for in place of
//! virtual-inheritance dispatch across request types.

pub mod error;
pub mod framing;
pub mod messages;
pub mod opcode;

pub use error::{ProtoError, Result};
pub use framing::{decode_frame, encode_frame, peek_version};
pub use messages::{RequestBody, ResponseBody, SqlIndexDef, SqlIndexSpec};
pub use opcode::Opcode;
