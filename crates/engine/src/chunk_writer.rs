//! Append-only writer for partial upload artifacts.

use crate::error::{EngineError, EngineResult};
use bytes::Bytes;
use ridelog_core::UploadId;
use ridelog_storage::{BlobStore, StorageError};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Storage key of a session's partial artifact.
pub fn partial_key(id: UploadId) -> String {
    format!("uploads/{id}.part")
}

/// Writes byte ranges into a session's partial artifact.
///
/// Knows nothing about sessions beyond their id: the only precondition it
/// enforces is that each write starts at the artifact's current length.
#[derive(Clone)]
pub struct ChunkWriter {
    store: Arc<dyn BlobStore>,
}

impl ChunkWriter {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// Allocate an empty partial artifact.
    pub async fn allocate(&self, id: UploadId) -> EngineResult<()> {
        self.store.create(&partial_key(id)).await?;
        Ok(())
    }

    /// Current length of the partial artifact.
    pub async fn observed_len(&self, id: UploadId) -> EngineResult<u64> {
        Ok(self.store.head(&partial_key(id)).await?.size)
    }

    /// Append `bytes` at `offset` and return the new durable length.
    ///
    /// `OffsetConflict` if `offset` is not the artifact's current length; nothing
    /// is written in that case. An empty `bytes` returns the length unchanged.
    #[instrument(skip(self, bytes), fields(upload_id = %id, len = bytes.len()))]
    pub async fn write(&self, id: UploadId, offset: u64, bytes: Bytes) -> EngineResult<u64> {
        match self.store.append(&partial_key(id), offset, bytes).await {
            Ok(len) => Ok(len),
            Err(StorageError::LengthMismatch { expected, actual }) => {
                Err(EngineError::OffsetConflict {
                    expected: actual,
                    claimed: expected,
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Drop bytes past `credited` that reached the artifact but were never
    /// credited to the session (a crash or failed record update between the
    /// write and the offset update).
    pub async fn discard_uncredited(&self, id: UploadId, credited: u64) -> EngineResult<()> {
        let key = partial_key(id);
        debug!(upload_id = %id, credited, "discarding uncredited tail");
        self.store.truncate(&key, credited).await?;
        Ok(())
    }

    /// Delete the partial artifact. Absent artifacts are not an error.
    pub async fn remove(&self, id: UploadId) -> EngineResult<()> {
        match self.store.delete(&partial_key(id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.is_not_found() => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
