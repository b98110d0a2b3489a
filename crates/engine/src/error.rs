//! Upload engine error taxonomy.

use ridelog_core::{ContentHash, UploadId, UploadStatus};
use ridelog_metadata::MetadataError;
use ridelog_storage::StorageError;
use thiserror::Error;

/// Errors returned by upload engine operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Declared length above the configured maximum. Raised before any allocation.
    #[error("declared length {declared} exceeds maximum upload size {max}")]
    TooLarge { declared: u64, max: u64 },

    /// Session absent, or owned by someone else.
    #[error("upload not found: {0}")]
    NotFound(UploadId),

    /// Caller may not upload to the requested target.
    #[error("not authorized: {0}")]
    Unauthorized(String),

    #[error("offset conflict: upload is at {expected}, chunk claims {claimed}")]
    OffsetConflict { expected: u64, claimed: u64 },

    #[error("upload is already {status}")]
    AlreadyTerminal { status: UploadStatus },

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch {
        expected: ContentHash,
        actual: ContentHash,
    },

    /// Chunk would carry the upload past its declared length.
    #[error("chunk of {len} bytes at offset {offset} exceeds declared length {declared}")]
    LengthExceeded { offset: u64, len: u64, declared: u64 },

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("storage failure: {0}")]
    Storage(#[from] StorageError),

    #[error("metadata failure: {0}")]
    Metadata(#[from] MetadataError),
}

impl EngineError {
    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::TooLarge { .. } => "too_large",
            EngineError::NotFound(_) => "not_found",
            EngineError::Unauthorized(_) => "unauthorized",
            EngineError::OffsetConflict { .. } => "offset_conflict",
            EngineError::AlreadyTerminal { .. } => "already_terminal",
            EngineError::ChecksumMismatch { .. } => "checksum_mismatch",
            EngineError::LengthExceeded { .. } => "length_exceeded",
            EngineError::InvalidRequest(_) => "invalid_request",
            EngineError::Storage(_) | EngineError::Metadata(_) => "storage_failure",
        }
    }

    /// Whether the error came from the blob store or the metadata store.
    /// Session state is unchanged, so the request is safe to retry.
    pub fn is_storage_failure(&self) -> bool {
        matches!(self, EngineError::Storage(_) | EngineError::Metadata(_))
    }
}

impl From<ridelog_core::Error> for EngineError {
    fn from(err: ridelog_core::Error) -> Self {
        EngineError::InvalidRequest(err.to_string())
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = std::result::Result<T, EngineError>;
