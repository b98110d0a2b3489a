//! API error types.

use crate::handlers::uploads::{TUS_RESUMABLE, TUS_VERSION, UPLOAD_OFFSET};
use axum::Json;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use ridelog_engine::EngineError;
use serde::Serialize;

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("unauthorized: {0}")]
    Unauthorized(String),

    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Engine(#[from] EngineError),

    #[error("metadata error: {0}")]
    Metadata(#[from] ridelog_metadata::MetadataError),
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Unauthorized(_) => "unauthorized",
            Self::UnsupportedMediaType(_) => "unsupported_media_type",
            Self::Internal(_) => "internal_error",
            Self::Engine(e) => e.code(),
            Self::Metadata(_) => "storage_failure",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::UnsupportedMediaType(_) => StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Self::Internal(_) | Self::Metadata(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Engine(e) => match e {
                EngineError::TooLarge { .. } | EngineError::LengthExceeded { .. } => {
                    StatusCode::PAYLOAD_TOO_LARGE
                }
                EngineError::NotFound(_) => StatusCode::NOT_FOUND,
                // The caller is authenticated; the target just isn't theirs.
                EngineError::Unauthorized(_) => StatusCode::FORBIDDEN,
                EngineError::OffsetConflict { .. } | EngineError::AlreadyTerminal { .. } => {
                    StatusCode::CONFLICT
                }
                EngineError::ChecksumMismatch { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                EngineError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
                EngineError::Storage(_) | EngineError::Metadata(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }

        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        let mut response = (status, Json(body)).into_response();

        // A conflicting client learns where to resume without another HEAD.
        if let Self::Engine(EngineError::OffsetConflict { expected, .. }) = &self {
            response
                .headers_mut()
                .insert(UPLOAD_OFFSET, HeaderValue::from(*expected));
        }
        response
            .headers_mut()
            .insert(TUS_RESUMABLE, HeaderValue::from_static(TUS_VERSION));
        response
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;
