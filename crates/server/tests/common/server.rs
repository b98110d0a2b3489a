//! Server test utilities.

use super::fixtures::sha256_hash;
use ridelog_core::config::{AppConfig, MetadataConfig, StorageConfig};
use ridelog_core::{OwnerId, UploadTarget};
use ridelog_metadata::models::{SegmentRow, TokenRow, TripRow};
use ridelog_metadata::{MetadataStore, SqliteStore};
use ridelog_server::bootstrap::seed_tokens;
use ridelog_server::{AppState, create_router};
use ridelog_storage::{BlobStore, FilesystemBackend};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use time::OffsetDateTime;
use uuid::Uuid;

/// A router over temp storage and a temp SQLite file, with the test token's
/// owner holding one trip and one segment.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    pub owner: OwnerId,
    pub target: UploadTarget,
    pub storage_root: PathBuf,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let storage_root = temp_dir.path().join("storage");
        let db_path = temp_dir.path().join("metadata.db");

        let mut config = AppConfig::for_testing();
        config.storage = StorageConfig::Filesystem {
            path: storage_root.clone(),
        };
        config.metadata = MetadataConfig::Sqlite {
            path: db_path.clone(),
            query_timeout_secs: None,
        };
        modifier(&mut config);

        let storage: Arc<dyn BlobStore> = Arc::new(
            FilesystemBackend::new(&storage_root)
                .await
                .expect("Failed to create storage backend"),
        );
        let metadata: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(&db_path, None)
                .await
                .expect("Failed to create metadata store"),
        );

        seed_tokens(metadata.as_ref(), &config.auth)
            .await
            .expect("Failed to seed tokens");
        let owner = OwnerId(Uuid::nil());
        let target = seed_target(metadata.as_ref(), owner).await;

        let state = AppState::new(config, storage, metadata);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            owner,
            target,
            storage_root,
            _temp_dir: temp_dir,
        }
    }

    pub fn metadata(&self) -> Arc<dyn MetadataStore> {
        self.state.metadata.clone()
    }

    /// Seed a trip and segment belonging to someone else.
    pub async fn foreign_target(&self) -> UploadTarget {
        seed_target(self.metadata().as_ref(), OwnerId(Uuid::new_v4())).await
    }

    /// Insert a token for a fresh owner and return its bearer secret.
    pub async fn token_for_new_owner(&self) -> String {
        let secret = format!("test-token-{}", Uuid::new_v4());
        self.insert_token(&secret, Uuid::new_v4(), None, None).await;
        secret
    }

    pub async fn insert_token(
        &self,
        secret: &str,
        owner_id: Uuid,
        expires_at: Option<OffsetDateTime>,
        revoked_at: Option<OffsetDateTime>,
    ) {
        let token = TokenRow {
            token_id: Uuid::new_v4(),
            owner_id,
            token_hash: sha256_hash(secret.as_bytes()),
            expires_at,
            revoked_at,
            created_at: OffsetDateTime::now_utc(),
            last_used_at: None,
            description: Some("Test Token".to_string()),
        };
        self.metadata()
            .create_token(&token)
            .await
            .expect("Failed to create token");
    }
}

async fn seed_target(metadata: &dyn MetadataStore, owner: OwnerId) -> UploadTarget {
    let now = OffsetDateTime::now_utc();
    let target = UploadTarget {
        trip_id: Uuid::new_v4(),
        segment_id: Uuid::new_v4(),
    };
    metadata
        .create_trip(&TripRow {
            trip_id: target.trip_id,
            owner_id: owner.0,
            title: Some("Morning loop".to_string()),
            created_at: now,
        })
        .await
        .expect("Failed to create trip");
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
        .expect("Failed to create segment");
    target
}
