pub type Result<T> = std::result::Result<T, ControlError>;

#[derive(Debug, thiserror::Error)]
pub enum ControlError {
    #[error("controller is not running")]
    NotRunning,

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("worker not found: {0}")]
    WorkerNotFound(String),

    #[error("request not found: {0}")]
    RequestNotFound(uuid::Uuid),

    #[error("worker response malformed: {0}")]
    BadResult(String),

    #[error("worker reported an error: {0}")]
    Worker(String),
}
