use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable error kind surfaced to API and CLI callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    Unauthorized,
    StorageFailure,
    SkippedGuard,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::InvalidInput => "INVALID_INPUT",
            ErrorKind::Unauthorized => "UNAUTHORIZED",
            ErrorKind::StorageFailure => "STORAGE_FAILURE",
            ErrorKind::SkippedGuard => "SKIPPED_GUARD",
        }
    }
}

#[derive(Debug, Error)]
pub enum ReconcileError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Opaque failure of the underlying store, rendered with its context chain.
    #[error("storage failure: {0}")]
    StorageFailure(String),
    /// The reset pass was declined by its guard. A no-op signal, not a fault.
    #[error("reset pass skipped: {0}")]
    SkippedGuard(String),
}

impl ReconcileError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ReconcileError::NotFound(_) => ErrorKind::NotFound,
            ReconcileError::InvalidInput(_) => ErrorKind::InvalidInput,
            ReconcileError::Unauthorized(_) => ErrorKind::Unauthorized,
            ReconcileError::StorageFailure(_) => ErrorKind::StorageFailure,
            ReconcileError::SkippedGuard(_) => ErrorKind::SkippedGuard,
        }
    }
}

impl From<anyhow::Error> for ReconcileError {
    fn from(e: anyhow::Error) -> Self {
        ReconcileError::StorageFailure(format!("{e:#}"))
    }
}
