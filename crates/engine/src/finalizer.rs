//! Finalizer: verify a fully received artifact and move it into place.

use crate::chunk_writer::partial_key;
use crate::error::{EngineError, EngineResult};
use futures::StreamExt;
use ridelog_core::{ContentHash, ContentHasher, StoredArtifact, UploadSession};
use ridelog_storage::{BlobStore, StorageError};
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Storage key of a session's permanent artifact.
///
/// Includes the upload id so two sessions with the same filename on one
/// segment never share a location.
pub fn permanent_key(session: &UploadSession) -> String {
    format!(
        "segments/{}/{}/{}",
        session.target.segment_id, session.id, session.filename
    )
}

/// Result of hashing a fully received artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinalizeOutcome {
    /// Promoted into its permanent location.
    Stored(StoredArtifact),
    /// Content did not match the declared hash. Nothing was promoted.
    Mismatch {
        expected: ContentHash,
        actual: ContentHash,
    },
}

pub struct Finalizer {
    store: Arc<dyn BlobStore>,
}

impl Finalizer {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// Hash the session's artifact and, if it verifies, promote it.
    ///
    /// Picks up where an earlier attempt stopped: if the partial artifact is
    /// gone but the permanent one exists, that one is verified instead.
    #[instrument(skip(self, session), fields(upload_id = %session.id))]
    pub async fn finalize(&self, session: &UploadSession) -> EngineResult<FinalizeOutcome> {
        let partial = partial_key(session.id);
        let location = permanent_key(session);

        let already_promoted = if self.store.exists(&partial).await? {
            false
        } else if self.store.exists(&location).await? {
            true
        } else {
            return Err(StorageError::NotFound(partial).into());
        };
        let source = if already_promoted { &location } else { &partial };

        let (sha256, size) = self.hash_object(source).await?;
        if size != session.declared_length {
            return Err(EngineError::Storage(StorageError::LengthMismatch {
                expected: session.declared_length,
                actual: size,
            }));
        }

        if let Some(expected) = session.expected_sha256
            && expected != sha256
        {
            return Ok(FinalizeOutcome::Mismatch {
                expected,
                actual: sha256,
            });
        }

        if !already_promoted {
            self.store.promote(&partial, &location).await?;
        }
        info!(location = %location, size, sha256 = %sha256, "artifact promoted");

        Ok(FinalizeOutcome::Stored(StoredArtifact {
            location,
            sha256,
            size,
        }))
    }

    /// Move a promoted artifact back to the partial key so finalize can run again.
    pub async fn rollback(
        &self,
        session: &UploadSession,
        artifact: &StoredArtifact,
    ) -> EngineResult<()> {
        warn!(upload_id = %session.id, location = %artifact.location, "rolling back promotion");
        self.store
            .promote(&artifact.location, &partial_key(session.id))
            .await?;
        Ok(())
    }

    /// Whether the session's artifact already sits at its permanent location.
    pub async fn is_promoted(&self, session: &UploadSession) -> EngineResult<bool> {
        Ok(self.store.exists(&permanent_key(session)).await?)
    }

    /// Delete whatever artifact a rejected session left behind.
    pub async fn discard(&self, session: &UploadSession) -> EngineResult<()> {
        for key in [partial_key(session.id), permanent_key(session)] {
            match self.store.delete(&key).await {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    async fn hash_object(&self, key: &str) -> EngineResult<(ContentHash, u64)> {
        let mut stream = self.store.get_stream(key).await?;
        let mut hasher = ContentHasher::new();
        while let Some(chunk) = stream.next().await {
            hasher.update(&chunk?);
        }
        let size = hasher.len();
        Ok((hasher.finalize(), size))
    }
}
