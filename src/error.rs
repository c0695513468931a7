//! Shared error taxonomy for the Qserv partitioning and control-plane core.
//!
//! Every crate in the workspace defines its own `thiserror`-based leaf error
//! type and converts into [`QservError`] at its public boundary, so callers
//! that compose multiple crates (the CLI binaries, the Controller) see one
//! consistent set of categories matching spec section 7.

use std::fmt;
use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, QservError>;

/// Cross-crate error taxonomy (spec §7).
#[derive(Debug, thiserror::Error)]
pub enum QservError {
    /// Invalid CLI / configuration value (e.g. `numNodes` out of range).
    #[error("configuration error: {0}")]
    Config(String),

    /// Malformed request at the API level (bad state transition, empty worker set).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Request / Job / UserTable / Transaction not in the persistent store.
    #[error("not found: {0}")]
    NotFound(String),

    /// Index or IO file with inconsistent header or size.
    #[error("invalid file {path}: {reason}")]
    InvalidFile { path: PathBuf, reason: String },

    /// Worker response malformed.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Worker returned a negative outcome.
    #[error("worker error: {0}")]
    Worker(String),

    /// Expiration timer fired before completion.
    #[error("timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Explicit cancellation.
    #[error("cancelled")]
    Cancelled,

    /// Feature explicitly deferred (e.g. lon-extent > 180 in triangle∩box).
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// I/O error bubbled up from the standard library.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Any unexpected condition; never crashes the process, propagated as a typed value.
    #[error("fatal: {0}")]
    Fatal(String),
}

impl QservError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn invalid_file(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::InvalidFile {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Whether a request/job that failed with this error is safe to retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            QservError::Protocol(_) | QservError::Worker(_) | QservError::Io(_)
        )
    }

    /// Stable category used by logging and by job/request bookkeeping.
    pub fn category(&self) -> ErrorCategory {
        match self {
            QservError::Config(_) => ErrorCategory::Config,
            QservError::InvalidArgument(_) => ErrorCategory::InvalidArgument,
            QservError::NotFound(_) => ErrorCategory::NotFound,
            QservError::InvalidFile { .. } => ErrorCategory::InvalidFile,
            QservError::Protocol(_) => ErrorCategory::Protocol,
            QservError::Worker(_) => ErrorCategory::Worker,
            QservError::Timeout(_) => ErrorCategory::Timeout,
            QservError::Cancelled => ErrorCategory::Cancelled,
            QservError::NotImplemented(_) => ErrorCategory::NotImplemented,
            QservError::Io(_) => ErrorCategory::Io,
            QservError::Fatal(_) => ErrorCategory::Fatal,
        }
    }
}

/// Classification used for logging fields and for job extended-status mapping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Config,
    InvalidArgument,
    NotFound,
    InvalidFile,
    Protocol,
    Worker,
    Timeout,
    Cancelled,
    NotImplemented,
    Io,
    Fatal,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCategory::Config => "config",
            ErrorCategory::InvalidArgument => "invalid_argument",
            ErrorCategory::NotFound => "not_found",
            ErrorCategory::InvalidFile => "invalid_file",
            ErrorCategory::Protocol => "protocol",
            ErrorCategory::Worker => "worker",
            ErrorCategory::Timeout => "timeout",
            ErrorCategory::Cancelled => "cancelled",
            ErrorCategory::NotImplemented => "not_implemented",
            ErrorCategory::Io => "io",
            ErrorCategory::Fatal => "fatal",
        };
        write!(f, "{s}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_categories() {
        assert!(QservError::Worker("bad".into()).is_retryable());
        assert!(!QservError::Config("bad".into()).is_retryable());
        assert!(!QservError::Cancelled.is_retryable());
    }

    #[test]
    fn category_display() {
        assert_eq!(QservError::Cancelled.category().to_string(), "cancelled");
        assert_eq!(
            QservError::invalid_argument("x").category().to_string(),
            "invalid_argument"
        );
    }

    #[test]
    fn invalid_file_formats_path_and_reason() {
        let err = QservError::invalid_file("htm_index.bin", "truncated record");
        assert_eq!(
            err.to_string(),
            "invalid file htm_index.bin: truncated record"
        );
    }
}
