//! Upload session types and lifecycle.

use crate::hash::ContentHash;
use crate::media::MediaKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use time::OffsetDateTime;
use uuid::Uuid;

/// Unique identifier for an upload session.
///
/// Always server-issued and random; never derived from request parameters.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UploadId(Uuid);

impl UploadId {
    /// Generate a new random upload ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wrap an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Parse from a string.
    pub fn parse(s: &str) -> crate::Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| crate::Error::InvalidUploadId(e.to_string()))
    }

    /// Get the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for UploadId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UploadId({})", self.0)
    }
}

impl fmt::Display for UploadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of the account that owns an upload, as resolved by the identity provider.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(pub Uuid);

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Logical destination of a finished upload: one segment of a recorded trip.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UploadTarget {
    pub trip_id: Uuid,
    pub segment_id: Uuid,
}

/// Upload session status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UploadStatus {
    /// Created, no bytes accepted yet.
    Pending,
    /// At least one non-empty chunk accepted.
    Receiving,
    /// All bytes received, verified and promoted.
    Complete,
    /// Integrity check failed after all bytes were received.
    Failed,
}

impl UploadStatus {
    /// Get the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Receiving => "receiving",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }

    /// Check if the session can still accept chunks.
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Pending | Self::Receiving)
    }

    /// Check if the session reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }
}

impl FromStr for UploadStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "pending" => Ok(Self::Pending),
            "receiving" => Ok(Self::Receiving),
            "complete" => Ok(Self::Complete),
            "failed" => Ok(Self::Failed),
            other => Err(crate::Error::InvalidStatus(other.to_string())),
        }
    }
}

impl fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A resumable upload session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadSession {
    /// Unique session identifier.
    pub id: UploadId,
    /// Account that created the session.
    pub owner: OwnerId,
    /// Where the finished artifact belongs.
    pub target: UploadTarget,
    /// Client-supplied file name, validated by [`validate_filename`].
    pub filename: String,
    /// Declared media kind.
    pub media_kind: MediaKind,
    /// Hash the finished artifact must match, if supplied.
    pub expected_sha256: Option<ContentHash>,
    /// Total number of bytes the client will send.
    pub declared_length: u64,
    /// Bytes durably accepted so far.
    pub received_offset: u64,
    /// Current status.
    pub status: UploadStatus,
    /// Machine-readable reason for a FAILED status.
    pub error_code: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl UploadSession {
    /// Create a new PENDING session at offset 0.
    pub fn new(
        owner: OwnerId,
        target: UploadTarget,
        filename: String,
        media_kind: MediaKind,
        declared_length: u64,
        expected_sha256: Option<ContentHash>,
    ) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: UploadId::new(),
            owner,
            target,
            filename,
            media_kind,
            expected_sha256,
            declared_length,
            received_offset: 0,
            status: UploadStatus::Pending,
            error_code: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Bytes still expected from the client.
    pub fn remaining(&self) -> u64 {
        self.declared_length.saturating_sub(self.received_offset)
    }

    /// Whether every declared byte has been credited.
    pub fn is_fully_received(&self) -> bool {
        self.received_offset == self.declared_length
    }
}

/// Validate a client-supplied filename.
///
/// The name becomes the last component of the permanent storage key, so it must be
/// a single plain path component.
pub fn validate_filename(name: &str) -> crate::Result<()> {
    let invalid = |reason: &str| -> crate::Result<()> {
        Err(crate::Error::InvalidFilename(format!("{reason}: {name:?}")))
    };

    if name.is_empty() {
        return invalid("empty filename");
    }
    if name.len() > crate::MAX_FILENAME_LEN {
        return invalid("filename too long");
    }
    if name == "." || name == ".." {
        return invalid("reserved filename");
    }
    if name.contains(['/', '\\']) {
        return invalid("filename contains a path separator");
    }
    if name.chars().any(|c| c.is_control()) {
        return invalid("filename contains control characters");
    }
    Ok(())
}

/// Request body for creating an upload session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CreateUploadRequest {
    pub trip_id: Uuid,
    pub segment_id: Uuid,
    pub filename: String,
    pub media_kind: MediaKind,
    /// Total upload length in bytes.
    pub upload_length: u64,
    /// Optional lowercase or uppercase hex SHA-256 of the whole file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

/// Public view of an upload session.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct UploadSessionResponse {
    pub upload_id: String,
    pub trip_id: Uuid,
    pub segment_id: Uuid,
    pub filename: String,
    pub media_kind: MediaKind,
    pub upload_length: u64,
    pub offset: u64,
    pub status: UploadStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

impl From<&UploadSession> for UploadSessionResponse {
    fn from(session: &UploadSession) -> Self {
        Self {
            upload_id: session.id.to_string(),
            trip_id: session.target.trip_id,
            segment_id: session.target.segment_id,
            filename: session.filename.clone(),
            media_kind: session.media_kind,
            upload_length: session.declared_length,
            offset: session.received_offset,
            status: session.status,
            sha256: session.expected_sha256.map(|h| h.to_hex()),
            error_code: session.error_code.clone(),
            created_at: session.created_at,
            updated_at: session.updated_at,
        }
    }
}
