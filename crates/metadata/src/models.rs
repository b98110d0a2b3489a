//! Database models mapping to the metadata schema.

use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// Upload sessions
// =============================================================================

/// Upload session record.
#[derive(Debug, Clone, FromRow)]
pub struct UploadSessionRow {
    pub upload_id: Uuid,
    pub owner_id: Uuid,
    pub trip_id: Uuid,
    pub segment_id: Uuid,
    pub filename: String,
    pub media_kind: String,
    /// Lowercase hex SHA-256 the client declared at creation, if any.
    pub expected_sha256: Option<String>,
    pub declared_length: i64,
    pub received_offset: i64,
    pub status: String,
    pub error_code: Option<String>,
    pub error_detail: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

// =============================================================================
// Trip catalog
// =============================================================================

/// Trip record. A trip belongs to exactly one owner.
#[derive(Debug, Clone, FromRow)]
pub struct TripRow {
    pub trip_id: Uuid,
    pub owner_id: Uuid,
    pub title: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Segment of a trip. Size and hash are filled in once the primary video lands.
#[derive(Debug, Clone, FromRow)]
pub struct SegmentRow {
    pub segment_id: Uuid,
    pub trip_id: Uuid,
    pub sequence: i64,
    pub file_size_bytes: Option<i64>,
    pub sha256: Option<String>,
    pub created_at: OffsetDateTime,
}

/// A completed artifact recorded against a segment.
#[derive(Debug, Clone, FromRow)]
pub struct StoredFileRow {
    pub file_id: Uuid,
    pub segment_id: Uuid,
    pub upload_id: Uuid,
    pub media_kind: String,
    pub storage_uri: String,
    pub sha256: String,
    pub size_bytes: i64,
    pub created_at: OffsetDateTime,
}

// =============================================================================
// Tokens
// =============================================================================

/// API token record. Only the SHA-256 of the secret is stored.
#[derive(Debug, Clone, FromRow)]
pub struct TokenRow {
    pub token_id: Uuid,
    pub owner_id: Uuid,
    pub token_hash: String,
    pub expires_at: Option<OffsetDateTime>,
    pub revoked_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub last_used_at: Option<OffsetDateTime>,
    pub description: Option<String>,
}
