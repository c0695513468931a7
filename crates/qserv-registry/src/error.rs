//! Leaf error type for [`crate::configuration::Configuration`] and
//! [`crate::service::ServiceRegistry`] implementations.

pub type Result<T> = std::result::Result<T, RegistryError>;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("worker not found: {0}")]
    WorkerNotFound(String),

    #[error("worker already registered: {0}")]
    DuplicateWorker(String),

    #[error("invalid worker config: {0}")]
    InvalidWorkerConfig(String),
}
