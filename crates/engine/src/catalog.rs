//! The relational catalog collaborator: target ownership and completion records.

use crate::error::{EngineError, EngineResult};
use async_trait::async_trait;
use ridelog_core::{OwnerId, StoredArtifact, UploadSession, UploadTarget};
use ridelog_metadata::models::StoredFileRow;
use ridelog_metadata::repos::SegmentUpdate;
use ridelog_metadata::{MetadataError, MetadataStore};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing::debug;
use uuid::Uuid;

/// Receives finished artifacts and answers target ownership questions.
#[async_trait]
pub trait Catalog: Send + Sync + 'static {
    /// Whether `owner` may upload into `target`.
    async fn owns_target(&self, owner: OwnerId, target: &UploadTarget) -> EngineResult<bool>;

    /// Record a promoted artifact. Must be idempotent per session.
    async fn record_artifact(
        &self,
        session: &UploadSession,
        artifact: &StoredArtifact,
    ) -> EngineResult<()>;
}

/// [`Catalog`] backed by the metadata store's trip tables.
pub struct SqlCatalog {
    metadata: Arc<dyn MetadataStore>,
}

impl SqlCatalog {
    pub fn new(metadata: Arc<dyn MetadataStore>) -> Self {
        Self { metadata }
    }
}

#[async_trait]
impl Catalog for SqlCatalog {
    async fn owns_target(&self, owner: OwnerId, target: &UploadTarget) -> EngineResult<bool> {
        Ok(self
            .metadata
            .segment_owned_by(target.trip_id, target.segment_id, owner.0)
            .await?)
    }

    async fn record_artifact(
        &self,
        session: &UploadSession,
        artifact: &StoredArtifact,
    ) -> EngineResult<()> {
        let size_bytes = i64::try_from(artifact.size)
            .map_err(|_| EngineError::InvalidRequest(format!("size {} out of range", artifact.size)))?;
        let file = StoredFileRow {
            file_id: Uuid::new_v4(),
            segment_id: session.target.segment_id,
            upload_id: *session.id.as_uuid(),
            media_kind: session.media_kind.as_str().to_string(),
            storage_uri: artifact.location.clone(),
            sha256: artifact.sha256.to_hex(),
            size_bytes,
            created_at: OffsetDateTime::now_utc(),
        };
        // Only the primary video carries the segment's size and hash.
        let segment_update = session.media_kind.is_segment_primary().then(|| SegmentUpdate {
            file_size_bytes: size_bytes,
            sha256: artifact.sha256.to_hex(),
        });

        match self
            .metadata
            .record_stored_file(&file, segment_update.as_ref())
            .await
        {
            Ok(()) => Ok(()),
            Err(MetadataError::AlreadyExists(_)) => {
                debug!(upload_id = %session.id, "artifact already recorded");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
