//! tus-style resumable upload endpoints.
//!
//! Creation is a JSON POST; chunks are PATCHed with an `Upload-Offset` header;
//! HEAD reports where to resume. Every owner-facing decision is delegated to
//! [`UploadEngine`](ridelog_engine::UploadEngine); this module only translates
//! headers and bodies.

use crate::auth::AuthenticatedOwner;
use crate::error::{ApiError, ApiResult};
use crate::metrics::{
    BYTES_RECEIVED, CHUNK_ACCEPT_DURATION, OFFSET_CONFLICTS, UPLOAD_LIFETIME,
    UPLOAD_SESSIONS_CANCELLED, UPLOAD_SESSIONS_COMPLETED, UPLOAD_SESSIONS_CREATED,
    UPLOAD_SESSIONS_FAILED, record_upload_error,
};
use crate::state::AppState;
use axum::Json;
use axum::body::Bytes;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_TYPE, LOCATION};
use axum::http::{HeaderMap, HeaderName, StatusCode};
use axum::response::{IntoResponse, Response};
use ridelog_core::upload::{CreateUploadRequest, UploadSessionResponse};
use ridelog_core::{UploadId, UploadStatus, UploadTarget};
use ridelog_engine::{CancelOutcome, CreateUpload, EngineError};
use serde::Deserialize;
use std::time::Instant;
use time::OffsetDateTime;

/// Protocol version spoken on every upload route.
pub const TUS_VERSION: &str = "1.0.0";
/// Content type required on PATCH bodies.
pub const OFFSET_OCTET_STREAM: &str = "application/offset+octet-stream";

pub const TUS_RESUMABLE: HeaderName = HeaderName::from_static("tus-resumable");
pub const TUS_VERSION_HEADER: HeaderName = HeaderName::from_static("tus-version");
pub const TUS_EXTENSION: HeaderName = HeaderName::from_static("tus-extension");
pub const TUS_MAX_SIZE: HeaderName = HeaderName::from_static("tus-max-size");
pub const UPLOAD_OFFSET: HeaderName = HeaderName::from_static("upload-offset");
pub const UPLOAD_LENGTH: HeaderName = HeaderName::from_static("upload-length");
pub const UPLOAD_STATUS: HeaderName = HeaderName::from_static("upload-status");

const DEFAULT_LIST_LIMIT: u32 = 50;
const MAX_LIST_LIMIT: u32 = 500;

/// Unknown or malformed ids look exactly like someone else's upload.
fn parse_upload_id(raw: &str) -> ApiResult<UploadId> {
    UploadId::parse(raw).map_err(|_| ApiError::NotFound(format!("upload not found: {raw}")))
}

/// Parse the `Upload-Offset` header: a non-negative decimal integer.
fn parse_upload_offset(headers: &HeaderMap) -> ApiResult<u64> {
    let raw = headers
        .get(UPLOAD_OFFSET)
        .ok_or_else(|| ApiError::BadRequest("missing Upload-Offset header".to_string()))?
        .to_str()
        .map_err(|_| ApiError::BadRequest("Upload-Offset is not ASCII".to_string()))?;
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ApiError::BadRequest(format!("invalid Upload-Offset: {raw:?}")));
    }
    raw.parse()
        .map_err(|_| ApiError::BadRequest(format!("Upload-Offset out of range: {raw}")))
}

/// Require `application/offset+octet-stream`, ignoring any parameters.
fn require_offset_octet_stream(headers: &HeaderMap) -> ApiResult<()> {
    let essence = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::trim);
    match essence {
        Some(ct) if ct.eq_ignore_ascii_case(OFFSET_OCTET_STREAM) => Ok(()),
        Some(ct) => Err(ApiError::UnsupportedMediaType(format!(
            "expected {OFFSET_OCTET_STREAM}, got {ct}"
        ))),
        None => Err(ApiError::UnsupportedMediaType(format!(
            "expected {OFFSET_OCTET_STREAM}"
        ))),
    }
}

fn record_engine_error(err: &EngineError) {
    record_upload_error(err.code());
    match err {
        EngineError::OffsetConflict { .. } => OFFSET_CONFLICTS.inc(),
        EngineError::ChecksumMismatch { .. } => UPLOAD_SESSIONS_FAILED.inc(),
        _ => {}
    }
}

/// OPTIONS /v1/uploads - protocol discovery.
pub async fn upload_options(State(state): State<AppState>) -> Response {
    (
        StatusCode::NO_CONTENT,
        [
            (TUS_VERSION_HEADER, TUS_VERSION.to_string()),
            (TUS_EXTENSION, "creation,termination".to_string()),
            (TUS_MAX_SIZE, state.config.server.max_upload_size.to_string()),
        ],
    )
        .into_response()
}

/// POST /v1/uploads - create an upload session.
#[tracing::instrument(skip(state, auth, body), fields(owner = %auth.owner()))]
pub async fn create_upload(
    State(state): State<AppState>,
    auth: AuthenticatedOwner,
    body: Result<Json<CreateUploadRequest>, JsonRejection>,
) -> ApiResult<Response> {
    let Json(body) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let request = CreateUpload {
        target: UploadTarget {
            trip_id: body.trip_id,
            segment_id: body.segment_id,
        },
        filename: body.filename,
        media_kind: body.media_kind,
        declared_length: body.upload_length,
        expected_sha256: body.sha256,
    };

    let session = state
        .engine
        .create(auth.owner(), request)
        .await
        .inspect_err(record_engine_error)?;
    UPLOAD_SESSIONS_CREATED.inc();

    Ok((
        StatusCode::CREATED,
        [
            (LOCATION, format!("/v1/uploads/{}", session.id)),
            (UPLOAD_OFFSET, session.received_offset.to_string()),
        ],
        Json(UploadSessionResponse::from(&session)),
    )
        .into_response())
}

#[derive(Debug, Deserialize)]
pub struct ListUploadsQuery {
    pub limit: Option<u32>,
}

/// GET /v1/uploads - the caller's sessions, most recently updated first.
pub async fn list_uploads(
    State(state): State<AppState>,
    auth: AuthenticatedOwner,
    Query(query): Query<ListUploadsQuery>,
) -> ApiResult<Json<Vec<UploadSessionResponse>>> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_LIST_LIMIT)
        .clamp(1, MAX_LIST_LIMIT);
    let sessions = state.engine.list_sessions(auth.owner(), limit).await?;
    Ok(Json(sessions.iter().map(UploadSessionResponse::from).collect()))
}

/// HEAD /v1/uploads/{upload_id} - where to resume.
pub async fn head_upload(
    State(state): State<AppState>,
    auth: AuthenticatedOwner,
    Path(upload_id): Path<String>,
) -> ApiResult<Response> {
    let id = parse_upload_id(&upload_id)?;
    let info = state.engine.query_offset(id, auth.owner()).await?;

    Ok((
        StatusCode::OK,
        [
            (UPLOAD_OFFSET, info.offset.to_string()),
            (UPLOAD_LENGTH, info.length.to_string()),
            (UPLOAD_STATUS, info.status.to_string()),
            (CACHE_CONTROL, "no-store".to_string()),
        ],
    )
        .into_response())
}

/// GET /v1/uploads/{upload_id} - session view.
pub async fn get_upload(
    State(state): State<AppState>,
    auth: AuthenticatedOwner,
    Path(upload_id): Path<String>,
) -> ApiResult<Json<UploadSessionResponse>> {
    let id = parse_upload_id(&upload_id)?;
    let session = state.engine.session(id, auth.owner()).await?;
    Ok(Json(UploadSessionResponse::from(&session)))
}

/// PATCH /v1/uploads/{upload_id} - append a chunk at `Upload-Offset`.
///
/// An empty body is a heartbeat. The response carries the new offset and the
/// session status, which becomes `complete` on the chunk that finishes the upload.
#[tracing::instrument(skip(state, auth, headers, body), fields(upload_id = %upload_id, len = body.len()))]
pub async fn patch_upload(
    State(state): State<AppState>,
    auth: AuthenticatedOwner,
    Path(upload_id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Response> {
    let id = parse_upload_id(&upload_id)?;
    require_offset_octet_stream(&headers)?;
    let offset = parse_upload_offset(&headers)?;

    let started = Instant::now();
    let outcome = state
        .engine
        .accept_chunk(id, auth.owner(), offset, body)
        .await
        .inspect_err(record_engine_error)?;
    CHUNK_ACCEPT_DURATION.observe(started.elapsed().as_secs_f64());
    BYTES_RECEIVED.inc_by(outcome.offset.saturating_sub(offset));

    if outcome.status == UploadStatus::Complete {
        UPLOAD_SESSIONS_COMPLETED.inc();
        let lifetime = OffsetDateTime::now_utc() - outcome.created_at;
        UPLOAD_LIFETIME.observe(lifetime.as_seconds_f64().max(0.0));
    }

    Ok((
        StatusCode::NO_CONTENT,
        [
            (UPLOAD_OFFSET, outcome.offset.to_string()),
            (UPLOAD_STATUS, outcome.status.to_string()),
        ],
    )
        .into_response())
}

/// DELETE /v1/uploads/{upload_id} - cancel. Idempotent: 204 whether or not
/// anything was deleted.
pub async fn delete_upload(
    State(state): State<AppState>,
    auth: AuthenticatedOwner,
    Path(upload_id): Path<String>,
) -> ApiResult<StatusCode> {
    let Ok(id) = UploadId::parse(&upload_id) else {
        return Ok(StatusCode::NO_CONTENT);
    };

    if state.engine.cancel(id, auth.owner()).await? == CancelOutcome::Deleted {
        UPLOAD_SESSIONS_CANCELLED.inc();
    }
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(HeaderName, &'static str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(name.clone(), HeaderValue::from_static(value));
        }
        map
    }

    #[test]
    fn test_parse_upload_offset() {
        assert_eq!(
            parse_upload_offset(&headers(&[(UPLOAD_OFFSET, "42")])).unwrap(),
            42
        );
        for bad in ["", "-1", "+3", "1.5", "0x10", "99999999999999999999999"] {
            assert!(
                matches!(
                    parse_upload_offset(&headers(&[(UPLOAD_OFFSET, bad)])),
                    Err(ApiError::BadRequest(_))
                ),
                "{bad:?} should be rejected"
            );
        }
        assert!(parse_upload_offset(&HeaderMap::new()).is_err());
    }

    #[test]
    fn test_offset_octet_stream_required() {
        assert!(require_offset_octet_stream(&headers(&[(CONTENT_TYPE, OFFSET_OCTET_STREAM)])).is_ok());
        assert!(
            require_offset_octet_stream(&headers(&[(
                CONTENT_TYPE,
                "Application/Offset+Octet-Stream; charset=binary"
            )]))
            .is_ok()
        );
        assert!(matches!(
            require_offset_octet_stream(&headers(&[(CONTENT_TYPE, "application/octet-stream")])),
            Err(ApiError::UnsupportedMediaType(_))
        ));
        assert!(matches!(
            require_offset_octet_stream(&HeaderMap::new()),
            Err(ApiError::UnsupportedMediaType(_))
        ));
    }
}
