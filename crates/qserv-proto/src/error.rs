pub type Result<T> = std::result::Result<T, ProtoError>;

#[derive(Debug, thiserror::Error)]
pub enum ProtoError {
    #[error("frame truncated: need at least {need} bytes, have {have}")]
    Truncated { need: usize, have: usize },

    #[error("frame body_version mismatch: expected {expected}, got {got}")]
    VersionMismatch { expected: u32, got: u32 },

    #[error("failed to encode message body: {0}")]
    Encode(String),

    #[error("failed to decode message body: {0}")]
    Decode(String),
}
