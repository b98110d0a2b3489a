//! An engine over a temp directory and a temp SQLite file, with one owner,
//! one trip and one segment seeded.

use super::flaky::{FlakyCatalog, FlakyStore};
use ridelog_core::{ContentHash, MediaKind, OwnerId, UploadTarget};
use ridelog_engine::{CreateUpload, EngineConfig, SqlCatalog, UploadEngine};
use ridelog_metadata::models::{SegmentRow, TripRow};
use ridelog_metadata::repos::CatalogRepo;
use ridelog_metadata::{MetadataStore, SqliteStore};
use ridelog_storage::{BlobStore, FilesystemBackend};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use time::OffsetDateTime;
use uuid::Uuid;

#[allow(dead_code)]
pub struct Harness {
    pub engine: Arc<UploadEngine>,
    pub storage: Arc<FlakyStore>,
    pub catalog: Arc<FlakyCatalog>,
    pub metadata: Arc<SqliteStore>,
    pub owner: OwnerId,
    pub target: UploadTarget,
    pub storage_root: PathBuf,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl Harness {
    pub async fn new() -> Self {
        Self::with_config(EngineConfig::default()).await
    }

    pub async fn with_config(config: EngineConfig) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let storage_root = temp_dir.path().join("storage");
        let backend = FilesystemBackend::new(&storage_root).await.unwrap();
        let storage = Arc::new(FlakyStore::new(backend));
        let metadata = Arc::new(
            SqliteStore::new(temp_dir.path().join("metadata.db"), None)
                .await
                .unwrap(),
        );
        let catalog = Arc::new(FlakyCatalog::new(
            SqlCatalog::new(metadata.clone() as Arc<dyn MetadataStore>),
            storage.clone(),
        ));

        let owner = OwnerId(Uuid::new_v4());
        let target = seed_target(&metadata, owner).await;

        let engine = Arc::new(UploadEngine::new(
            config,
            storage.clone() as Arc<dyn BlobStore>,
            metadata.clone() as Arc<dyn MetadataStore>,
            catalog.clone(),
        ));

        Self {
            engine,
            storage,
            catalog,
            metadata,
            owner,
            target,
            storage_root,
            _temp_dir: temp_dir,
        }
    }

    /// A video upload request for the seeded segment.
    pub fn request(&self, declared_length: u64, expected: Option<&[u8]>) -> CreateUpload {
        CreateUpload {
            target: self.target,
            filename: "front.mp4".to_string(),
            media_kind: MediaKind::VideoMp4,
            declared_length,
            expected_sha256: expected.map(|data| ContentHash::compute(data).to_hex()),
        }
    }

    /// Seed another owner's trip and segment.
    pub async fn foreign_target(&self) -> UploadTarget {
        seed_target(&self.metadata, OwnerId(Uuid::new_v4())).await
    }

    /// Files currently present under the partial-upload prefix.
    pub fn partial_files(&self) -> Vec<PathBuf> {
        match std::fs::read_dir(self.storage_root.join("uploads")) {
            Ok(entries) => entries.map(|e| e.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

async fn seed_target(metadata: &SqliteStore, owner: OwnerId) -> UploadTarget {
    let now = OffsetDateTime::now_utc();
    let target = UploadTarget {
        trip_id: Uuid::new_v4(),
        segment_id: Uuid::new_v4(),
    };
    metadata
        .create_trip(&TripRow {
            trip_id: target.trip_id,
            owner_id: owner.0,
            title: None,
            created_at: now,
        })
        .await
        .unwrap();
    metadata
        .create_segment(&SegmentRow {
            segment_id: target.segment_id,
            trip_id: target.trip_id,
            sequence: 0,
            file_size_bytes: None,
            sha256: None,
            created_at: now,
        })
        .await
        .unwrap();
    target
}
