//! Upload session store: the durable record each upload resumes from.

use crate::error::{EngineError, EngineResult};
use ridelog_core::{
    ContentHash, MediaKind, OwnerId, UploadId, UploadSession, UploadStatus, UploadTarget,
};
use ridelog_metadata::models::UploadSessionRow;
use ridelog_metadata::{MetadataError, MetadataStore};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::debug;

/// Typed access to upload session records.
///
/// Offsets move only through a compare-and-set, so two writers holding a
/// stale view of the same session cannot both advance it.
#[derive(Clone)]
pub struct SessionStore {
    metadata: Arc<dyn MetadataStore>,
}

impl SessionStore {
    pub fn new(metadata: Arc<dyn MetadataStore>) -> Self {
        Self { metadata }
    }

    /// Persist a newly created session.
    pub async fn create(&self, session: &UploadSession) -> EngineResult<()> {
        let row = to_row(session)?;
        self.metadata.create_session(&row).await?;
        Ok(())
    }

    pub async fn get(&self, id: UploadId) -> EngineResult<Option<UploadSession>> {
        match self.metadata.get_session(*id.as_uuid()).await? {
            Some(row) => Ok(Some(from_row(row)?)),
            None => Ok(None),
        }
    }

    /// Credit bytes up to `new_offset` and mark the session RECEIVING.
    ///
    /// Fails with `OffsetConflict` (or `AlreadyTerminal`) when the stored record
    /// no longer matches `session`; `session` is updated only on success.
    pub async fn advance(&self, session: &mut UploadSession, new_offset: u64) -> EngineResult<()> {
        let now = OffsetDateTime::now_utc();
        let applied = self
            .metadata
            .advance_offset(
                *session.id.as_uuid(),
                to_i64(session.received_offset)?,
                to_i64(new_offset)?,
                UploadStatus::Receiving.as_str(),
                now,
            )
            .await?;

        if !applied {
            let stored = self
                .get(session.id)
                .await?
                .ok_or(EngineError::NotFound(session.id))?;
            debug!(
                upload_id = %session.id,
                stored_offset = stored.received_offset,
                stored_status = %stored.status,
                "offset update lost compare-and-set"
            );
            if stored.status.is_terminal() {
                return Err(EngineError::AlreadyTerminal {
                    status: stored.status,
                });
            }
            return Err(EngineError::OffsetConflict {
                expected: stored.received_offset,
                claimed: session.received_offset,
            });
        }

        session.received_offset = new_offset;
        session.status = UploadStatus::Receiving;
        session.updated_at = now;
        Ok(())
    }

    /// Mark the session COMPLETE.
    pub async fn complete(&self, session: &mut UploadSession) -> EngineResult<()> {
        let now = OffsetDateTime::now_utc();
        self.metadata
            .set_status(*session.id.as_uuid(), UploadStatus::Complete.as_str(), None, now)
            .await?;
        session.status = UploadStatus::Complete;
        session.error_code = None;
        session.updated_at = now;
        Ok(())
    }

    /// Mark the session FAILED with a machine-readable code.
    pub async fn fail(
        &self,
        session: &mut UploadSession,
        error_code: &str,
        detail: Option<&str>,
    ) -> EngineResult<()> {
        let now = OffsetDateTime::now_utc();
        self.metadata
            .fail_session(*session.id.as_uuid(), error_code, detail, now)
            .await?;
        session.status = UploadStatus::Failed;
        session.error_code = Some(error_code.to_string());
        session.updated_at = now;
        Ok(())
    }

    /// Remove the record. Returns whether one existed.
    pub async fn delete(&self, id: UploadId) -> EngineResult<bool> {
        Ok(self.metadata.delete_session(*id.as_uuid()).await?)
    }

    pub async fn list_for_owner(
        &self,
        owner: OwnerId,
        limit: u32,
    ) -> EngineResult<Vec<UploadSession>> {
        self.metadata
            .list_sessions_for_owner(owner.0, limit)
            .await?
            .into_iter()
            .map(from_row)
            .collect()
    }
}

fn to_i64(value: u64) -> EngineResult<i64> {
    i64::try_from(value)
        .map_err(|_| EngineError::InvalidRequest(format!("length {value} out of range")))
}

fn corrupt(id: uuid::Uuid, what: impl std::fmt::Display) -> EngineError {
    EngineError::Metadata(MetadataError::Internal(format!(
        "corrupt upload session {id}: {what}"
    )))
}

fn to_row(session: &UploadSession) -> EngineResult<UploadSessionRow> {
    Ok(UploadSessionRow {
        upload_id: *session.id.as_uuid(),
        owner_id: session.owner.0,
        trip_id: session.target.trip_id,
        segment_id: session.target.segment_id,
        filename: session.filename.clone(),
        media_kind: session.media_kind.as_str().to_string(),
        expected_sha256: session.expected_sha256.map(|h| h.to_hex()),
        declared_length: to_i64(session.declared_length)?,
        received_offset: to_i64(session.received_offset)?,
        status: session.status.as_str().to_string(),
        error_code: session.error_code.clone(),
        error_detail: None,
        created_at: session.created_at,
        updated_at: session.updated_at,
    })
}

fn from_row(row: UploadSessionRow) -> EngineResult<UploadSession> {
    let id = row.upload_id;
    let media_kind: MediaKind = row.media_kind.parse().map_err(|e| corrupt(id, e))?;
    let status: UploadStatus = row.status.parse().map_err(|e| corrupt(id, e))?;
    let expected_sha256 = row
        .expected_sha256
        .as_deref()
        .map(ContentHash::from_hex)
        .transpose()
        .map_err(|e| corrupt(id, e))?;
    let declared_length = u64::try_from(row.declared_length).map_err(|e| corrupt(id, e))?;
    let received_offset = u64::try_from(row.received_offset).map_err(|e| corrupt(id, e))?;

    Ok(UploadSession {
        id: UploadId::from_uuid(id),
        owner: OwnerId(row.owner_id),
        target: UploadTarget {
            trip_id: row.trip_id,
            segment_id: row.segment_id,
        },
        filename: row.filename,
        media_kind,
        expected_sha256,
        declared_length,
        received_offset,
        status,
        error_code: row.error_code,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}
