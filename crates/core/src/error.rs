//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid hash: {0}")]
    InvalidHash(String),

    #[error("invalid upload id: {0}")]
    InvalidUploadId(String),

    #[error("invalid upload status: {0}")]
    InvalidStatus(String),

    #[error("invalid media kind: {0}")]
    InvalidMediaKind(String),

    #[error("invalid filename: {0}")]
    InvalidFilename(String),

    #[error("invalid token: {0}")]
    InvalidToken(String),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
