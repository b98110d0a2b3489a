//! Storage error types.

use thiserror::Error;

/// Storage operation errors.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("object not found: {0}")]
    NotFound(String),

    #[error("object already exists: {0}")]
    AlreadyExists(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid key: {0}")]
    InvalidKey(String),

    #[error("length mismatch: expected {expected} bytes, object has {actual}")]
    LengthMismatch { expected: u64, actual: u64 },

    #[error("configuration error: {0}")]
    Config(String),
}

impl StorageError {
    /// Map an I/O error, turning `NotFound` into a keyed storage error.
    pub(crate) fn from_io(key: &str, err: std::io::Error) -> Self {
        match err.kind() {
            std::io::ErrorKind::NotFound => StorageError::NotFound(key.to_string()),
            std::io::ErrorKind::AlreadyExists => StorageError::AlreadyExists(key.to_string()),
            _ => StorageError::Io(err),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::NotFound(_))
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = std::result::Result<T, StorageError>;
