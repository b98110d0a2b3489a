//! Upload session repository.

use crate::error::MetadataResult;
use crate::models::UploadSessionRow;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

/// Repository for upload session operations.
#[async_trait]
pub trait UploadRepo: Send + Sync {
    /// Create a new upload session.
    async fn create_session(&self, session: &UploadSessionRow) -> MetadataResult<()>;

    /// Get an upload session by ID.
    async fn get_session(&self, upload_id: Uuid) -> MetadataResult<Option<UploadSessionRow>>;

    /// Delete a session. Returns whether a row was removed.
    async fn delete_session(&self, upload_id: Uuid) -> MetadataResult<bool>;

    /// Move `received_offset` from `expected_offset` to `new_offset` and set `status`.
    ///
    /// Only applies while the stored offset still equals `expected_offset` and the
    /// session is not terminal. Returns `false` when the guard did not match.
    async fn advance_offset(
        &self,
        upload_id: Uuid,
        expected_offset: i64,
        new_offset: i64,
        status: &str,
        updated_at: OffsetDateTime,
    ) -> MetadataResult<bool>;

    /// Set the session status (and error code) unconditionally.
    async fn set_status(
        &self,
        upload_id: Uuid,
        status: &str,
        error_code: Option<&str>,
        updated_at: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// Fail a session with error details.
    async fn fail_session(
        &self,
        upload_id: Uuid,
        error_code: &str,
        error_detail: Option<&str>,
        failed_at: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// Sessions owned by `owner_id`, most recently updated first.
    async fn list_sessions_for_owner(
        &self,
        owner_id: Uuid,
        limit: u32,
    ) -> MetadataResult<Vec<UploadSessionRow>>;
}
