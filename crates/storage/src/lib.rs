//! Durable blob storage for ridelog uploads.
//!
//! This crate provides:
//! - Append-at-offset writes for partial upload artifacts
//! - Atomic, write-once promotion into permanent locations
//! - A local filesystem backend

pub mod backends;
pub mod error;
pub mod traits;

pub use backends::filesystem::FilesystemBackend;
pub use error::{StorageError, StorageResult};
pub use traits::{BlobStore, ByteStream, ObjectMeta};

use ridelog_core::config::StorageConfig;
use std::sync::Arc;

/// Create a blob store from configuration.
pub async fn from_config(config: &StorageConfig) -> StorageResult<Arc<dyn BlobStore>> {
    match config {
        StorageConfig::Filesystem { path } => {
            if path.as_os_str().is_empty() {
                return Err(StorageError::Config(
                    "filesystem storage path must not be empty".to_string(),
                ));
            }
            let backend = FilesystemBackend::new(path).await?;
            Ok(Arc::new(backend))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use ridelog_core::config::StorageConfig;
    use tempfile::tempdir;

    #[tokio::test]
    async fn from_config_filesystem_ok() {
        let temp = tempdir().unwrap();
        let config = StorageConfig::Filesystem {
            path: temp.path().join("store"),
        };

        let store = from_config(&config).await.unwrap();
        store.create("uploads/a.part").await.unwrap();
        store
            .append("uploads/a.part", 0, Bytes::from_static(b"hi"))
            .await
            .unwrap();
        assert!(store.exists("uploads/a.part").await.unwrap());
        assert_eq!(store.backend_name(), "filesystem");
    }

    #[tokio::test]
    async fn from_config_rejects_empty_path() {
        let config = StorageConfig::Filesystem {
            path: std::path::PathBuf::new(),
        };

        match from_config(&config).await {
            Ok(_) => panic!("expected error"),
            Err(StorageError::Config(_)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
}
