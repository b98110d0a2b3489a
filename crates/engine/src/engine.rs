//! Upload protocol handler: session creation, offset negotiation, chunk
//! acceptance, completion and cancellation.

use crate::catalog::Catalog;
use crate::chunk_writer::ChunkWriter;
use crate::error::{EngineError, EngineResult};
use crate::finalizer::{FinalizeOutcome, Finalizer};
use crate::locks::SessionLocks;
use crate::sessions::SessionStore;
use bytes::Bytes;
use ridelog_core::config::ServerConfig;
use ridelog_core::upload::validate_filename;
use ridelog_core::{
    ContentHash, MediaKind, OwnerId, StoredArtifact, UploadId, UploadSession, UploadStatus,
    UploadTarget,
};
use ridelog_metadata::MetadataStore;
use ridelog_storage::{BlobStore, StorageError};
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Instant;
use time::OffsetDateTime;
use tracing::{error, info, instrument, warn};

/// Limits injected at construction.
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Largest `declared_length` accepted by `create`.
    pub max_upload_size: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_upload_size: ridelog_core::DEFAULT_MAX_UPLOAD_SIZE,
        }
    }
}

impl From<&ServerConfig> for EngineConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            max_upload_size: config.max_upload_size,
        }
    }
}

/// Parameters for a new upload.
#[derive(Clone, Debug)]
pub struct CreateUpload {
    pub target: UploadTarget,
    pub filename: String,
    pub media_kind: MediaKind,
    pub declared_length: u64,
    /// Lowercase or uppercase hex SHA-256 the finished artifact must match.
    pub expected_sha256: Option<String>,
}

/// Answer to an offset query.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OffsetInfo {
    pub offset: u64,
    pub length: u64,
    pub status: UploadStatus,
}

/// Result of an accepted chunk.
#[derive(Clone, Debug)]
pub struct ChunkOutcome {
    /// Bytes durably received after this chunk.
    pub offset: u64,
    pub status: UploadStatus,
    /// When the session was created.
    pub created_at: OffsetDateTime,
    /// Set when this chunk completed the upload.
    pub artifact: Option<StoredArtifact>,
}

/// Result of a cancel request. Cancel never fails for unknown ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CancelOutcome {
    /// Partial artifact and record removed.
    Deleted,
    /// No such session for this caller.
    NotPresent,
    /// Session already finished; left intact.
    Terminal(UploadStatus),
}

/// Drives upload sessions through PENDING → RECEIVING → COMPLETE | FAILED.
///
/// Every mutation of a session runs under that session's lock; different
/// sessions proceed in parallel.
pub struct UploadEngine {
    config: EngineConfig,
    sessions: SessionStore,
    writer: ChunkWriter,
    finalizer: Finalizer,
    catalog: Arc<dyn Catalog>,
    locks: SessionLocks,
}

impl UploadEngine {
    pub fn new(
        config: EngineConfig,
        storage: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataStore>,
        catalog: Arc<dyn Catalog>,
    ) -> Self {
        Self {
            config,
            sessions: SessionStore::new(metadata),
            writer: ChunkWriter::new(Arc::clone(&storage)),
            finalizer: Finalizer::new(storage),
            catalog,
            locks: SessionLocks::new(),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Sessions currently locked or awaited.
    pub fn in_flight_sessions(&self) -> usize {
        self.locks.in_flight()
    }

    /// Create a session and its empty partial artifact.
    #[instrument(skip(self, request), fields(owner = %owner, declared_length = request.declared_length))]
    pub async fn create(&self, owner: OwnerId, request: CreateUpload) -> EngineResult<UploadSession> {
        if request.declared_length > self.config.max_upload_size {
            return Err(EngineError::TooLarge {
                declared: request.declared_length,
                max: self.config.max_upload_size,
            });
        }
        validate_filename(&request.filename)?;
        let expected_sha256 = request
            .expected_sha256
            .as_deref()
            .map(ContentHash::from_hex)
            .transpose()?;

        if !self.catalog.owns_target(owner, &request.target).await? {
            return Err(EngineError::Unauthorized(format!(
                "segment {} of trip {}",
                request.target.segment_id, request.target.trip_id
            )));
        }

        let session = UploadSession::new(
            owner,
            request.target,
            request.filename,
            request.media_kind,
            request.declared_length,
            expected_sha256,
        );

        self.writer.allocate(session.id).await?;
        if let Err(e) = self.sessions.create(&session).await {
            if let Err(cleanup) = self.writer.remove(session.id).await {
                warn!(upload_id = %session.id, error = %cleanup, "failed to remove orphaned partial artifact");
            }
            return Err(e);
        }

        info!(
            upload_id = %session.id,
            media_kind = %session.media_kind,
            "upload session created"
        );
        Ok(session)
    }

    /// Current offset and length. Safe to call any number of times, in any status.
    pub async fn query_offset(&self, id: UploadId, owner: OwnerId) -> EngineResult<OffsetInfo> {
        let session = self.load_owned(id, owner).await?;
        Ok(OffsetInfo {
            offset: session.received_offset,
            length: session.declared_length,
            status: session.status,
        })
    }

    /// Full session view for its owner.
    pub async fn session(&self, id: UploadId, owner: OwnerId) -> EngineResult<UploadSession> {
        self.load_owned(id, owner).await
    }

    /// The owner's sessions, most recently updated first.
    pub async fn list_sessions(
        &self,
        owner: OwnerId,
        limit: u32,
    ) -> EngineResult<Vec<UploadSession>> {
        self.sessions.list_for_owner(owner, limit).await
    }

    /// Accept `payload` at `claimed_offset`.
    ///
    /// An empty payload at the current offset is a heartbeat and changes
    /// nothing, except on a fully received session that has not reached a
    /// terminal status, where it retries finalization.
    #[instrument(
        skip(self, payload),
        fields(upload_id = %id, offset = claimed_offset, len = payload.len())
    )]
    pub async fn accept_chunk(
        &self,
        id: UploadId,
        owner: OwnerId,
        claimed_offset: u64,
        payload: Bytes,
    ) -> EngineResult<ChunkOutcome> {
        let _guard = self.locks.acquire(id).await;
        let mut session = self.load_owned(id, owner).await?;

        if session.status.is_terminal() {
            return Err(EngineError::AlreadyTerminal {
                status: session.status,
            });
        }
        if claimed_offset != session.received_offset {
            return Err(EngineError::OffsetConflict {
                expected: session.received_offset,
                claimed: claimed_offset,
            });
        }

        let len = payload.len() as u64;
        if session.remaining() < len {
            return Err(EngineError::LengthExceeded {
                offset: claimed_offset,
                len,
                declared: session.declared_length,
            });
        }

        if len == 0 {
            if session.is_fully_received() {
                if session.status == UploadStatus::Pending {
                    // Finalizing only ever leaves RECEIVING.
                    let offset = session.received_offset;
                    self.sessions.advance(&mut session, offset).await?;
                }
                return self.finalize_locked(&mut session).await;
            }
            return Ok(ChunkOutcome {
                offset: session.received_offset,
                status: session.status,
                created_at: session.created_at,
                artifact: None,
            });
        }

        self.reconcile(&session).await?;
        let new_len = self.writer.write(id, claimed_offset, payload).await?;

        if let Err(e) = self.sessions.advance(&mut session, new_len).await {
            // The bytes are on disk but not credited; drop them so a retry
            // at the same offset finds the artifact where the record says.
            if let Err(discard) = self
                .writer
                .discard_uncredited(id, session.received_offset)
                .await
            {
                warn!(upload_id = %id, error = %discard, "failed to discard uncredited bytes");
            }
            return Err(e);
        }

        if session.is_fully_received() {
            return self.finalize_locked(&mut session).await;
        }

        Ok(ChunkOutcome {
            offset: session.received_offset,
            status: session.status,
            created_at: session.created_at,
            artifact: None,
        })
    }

    /// Cancel a non-terminal session: delete its partial artifact and record.
    ///
    /// A session whose artifact was already promoted by an interrupted
    /// finalization is finished instead, so the permanent location is never
    /// left without a catalog record.
    #[instrument(skip(self), fields(upload_id = %id))]
    pub async fn cancel(&self, id: UploadId, owner: OwnerId) -> EngineResult<CancelOutcome> {
        let _guard = self.locks.acquire(id).await;

        let mut session = match self.sessions.get(id).await? {
            Some(session) if session.owner == owner => session,
            _ => return Ok(CancelOutcome::NotPresent),
        };
        if session.status.is_terminal() {
            return Ok(CancelOutcome::Terminal(session.status));
        }

        if self.finalizer.is_promoted(&session).await? {
            match self.finalize_locked(&mut session).await {
                Ok(outcome) => {
                    info!(upload_id = %id, "cancel found a promoted artifact, upload completed");
                    return Ok(CancelOutcome::Terminal(outcome.status));
                }
                Err(EngineError::ChecksumMismatch { .. }) => {
                    return Ok(CancelOutcome::Terminal(UploadStatus::Failed));
                }
                Err(e) => {
                    if self.finalizer.is_promoted(&session).await? {
                        return Err(e);
                    }
                    warn!(upload_id = %id, error = %e, "promotion rolled back, cancelling");
                }
            }
        }

        self.writer.remove(id).await?;
        self.sessions.delete(id).await?;
        info!(upload_id = %id, received = session.received_offset, "upload cancelled");
        Ok(CancelOutcome::Deleted)
    }

    async fn load_owned(&self, id: UploadId, owner: OwnerId) -> EngineResult<UploadSession> {
        match self.sessions.get(id).await? {
            Some(session) if session.owner == owner => Ok(session),
            _ => Err(EngineError::NotFound(id)),
        }
    }

    /// Make the partial artifact's length agree with the credited offset.
    async fn reconcile(&self, session: &UploadSession) -> EngineResult<()> {
        let observed = self.writer.observed_len(session.id).await?;
        match observed.cmp(&session.received_offset) {
            Ordering::Equal => Ok(()),
            Ordering::Greater => {
                warn!(
                    upload_id = %session.id,
                    observed,
                    credited = session.received_offset,
                    "partial artifact longer than credited offset"
                );
                self.writer
                    .discard_uncredited(session.id, session.received_offset)
                    .await
            }
            Ordering::Less => Err(EngineError::Storage(StorageError::LengthMismatch {
                expected: session.received_offset,
                actual: observed,
            })),
        }
    }

    /// Verify, promote and record a fully received session. Caller holds the lock.
    async fn finalize_locked(&self, session: &mut UploadSession) -> EngineResult<ChunkOutcome> {
        let started = Instant::now();

        match self.finalizer.finalize(session).await? {
            FinalizeOutcome::Mismatch { expected, actual } => {
                let detail = format!("expected {expected}, got {actual}");
                self.sessions
                    .fail(session, "checksum_mismatch", Some(&detail))
                    .await?;
                if let Err(e) = self.finalizer.discard(session).await {
                    warn!(upload_id = %session.id, error = %e, "failed to discard rejected artifact");
                }
                warn!(upload_id = %session.id, %expected, %actual, "upload failed integrity check");
                Err(EngineError::ChecksumMismatch { expected, actual })
            }
            FinalizeOutcome::Stored(artifact) => {
                if let Err(e) = self.catalog.record_artifact(session, &artifact).await {
                    error!(upload_id = %session.id, error = %e, "catalog rejected artifact");
                    if let Err(rollback) = self.finalizer.rollback(session, &artifact).await {
                        error!(upload_id = %session.id, error = %rollback, "promotion rollback failed");
                    }
                    return Err(e);
                }
                self.sessions.complete(session).await?;

                info!(
                    upload_id = %session.id,
                    location = %artifact.location,
                    size = artifact.size,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "upload complete"
                );
                Ok(ChunkOutcome {
                    offset: session.received_offset,
                    status: session.status,
                    created_at: session.created_at,
                    artifact: Some(artifact),
                })
            }
        }
    }
}
