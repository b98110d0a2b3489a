//! Application state shared across handlers.

use ridelog_core::config::AppConfig;
use ridelog_engine::{EngineConfig, SqlCatalog, UploadEngine};
use ridelog_metadata::MetadataStore;
use ridelog_storage::BlobStore;
use std::sync::Arc;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Upload session engine.
    pub engine: Arc<UploadEngine>,
    /// Blob store, for health checks.
    pub storage: Arc<dyn BlobStore>,
    /// Metadata store, for token lookup and health checks.
    pub metadata: Arc<dyn MetadataStore>,
}

impl AppState {
    /// Wire the engine over the given stores, with the SQL catalog as its
    /// completion collaborator.
    pub fn new(
        config: AppConfig,
        storage: Arc<dyn BlobStore>,
        metadata: Arc<dyn MetadataStore>,
    ) -> Self {
        let catalog = Arc::new(SqlCatalog::new(metadata.clone()));
        let engine = UploadEngine::new(
            EngineConfig::from(&config.server),
            storage.clone(),
            metadata.clone(),
            catalog,
        );

        Self {
            config: Arc::new(config),
            engine: Arc::new(engine),
            storage,
            metadata,
        }
    }
}
