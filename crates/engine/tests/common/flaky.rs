//! Failure-injecting wrappers around the real blob store and catalog.

use async_trait::async_trait;
use bytes::Bytes;
use ridelog_core::{OwnerId, StoredArtifact, UploadSession, UploadTarget};
use ridelog_engine::{Catalog, EngineError, EngineResult, SqlCatalog};
use ridelog_metadata::MetadataError;
use ridelog_storage::{
    BlobStore, ByteStream, FilesystemBackend, ObjectMeta, StorageError, StorageResult,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

fn injected(op: &str) -> StorageError {
    StorageError::Io(std::io::Error::other(format!("injected {op} failure")))
}

/// Filesystem store whose appends and promotions can be made to fail.
#[allow(dead_code)]
pub struct FlakyStore {
    inner: FilesystemBackend,
    fail_append: AtomicBool,
    fail_promote: AtomicBool,
    pub appends: AtomicUsize,
}

#[allow(dead_code)]
impl FlakyStore {
    pub fn new(inner: FilesystemBackend) -> Self {
        Self {
            inner,
            fail_append: AtomicBool::new(false),
            fail_promote: AtomicBool::new(false),
            appends: AtomicUsize::new(0),
        }
    }

    pub fn fail_appends(&self, on: bool) {
        self.fail_append.store(on, Ordering::SeqCst);
    }

    pub fn fail_promotes(&self, on: bool) {
        self.fail_promote.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl BlobStore for FlakyStore {
    async fn exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.exists(key).await
    }

    async fn head(&self, key: &str) -> StorageResult<ObjectMeta> {
        self.inner.head(key).await
    }

    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        self.inner.get(key).await
    }

    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream> {
        self.inner.get_stream(key).await
    }

    async fn create(&self, key: &str) -> StorageResult<()> {
        self.inner.create(key).await
    }

    async fn append(&self, key: &str, expected_len: u64, data: Bytes) -> StorageResult<u64> {
        if self.fail_append.load(Ordering::SeqCst) {
            return Err(injected("append"));
        }
        self.appends.fetch_add(1, Ordering::SeqCst);
        self.inner.append(key, expected_len, data).await
    }

    async fn truncate(&self, key: &str, len: u64) -> StorageResult<()> {
        self.inner.truncate(key, len).await
    }

    async fn promote(&self, from: &str, to: &str) -> StorageResult<()> {
        if self.fail_promote.load(Ordering::SeqCst) {
            return Err(injected("promote"));
        }
        self.inner.promote(from, to).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.inner.delete(key).await
    }

    fn backend_name(&self) -> &'static str {
        "flaky"
    }
}

/// SQL catalog whose completion records can be made to fail.
///
/// With `jam_rollback` set, a failing record also makes the store refuse
/// promotions, so the engine cannot move the artifact back.
#[allow(dead_code)]
pub struct FlakyCatalog {
    inner: SqlCatalog,
    store: Arc<FlakyStore>,
    fail_record: AtomicBool,
    jam_rollback: AtomicBool,
    pub records: AtomicUsize,
}

#[allow(dead_code)]
impl FlakyCatalog {
    pub fn new(inner: SqlCatalog, store: Arc<FlakyStore>) -> Self {
        Self {
            inner,
            store,
            fail_record: AtomicBool::new(false),
            jam_rollback: AtomicBool::new(false),
            records: AtomicUsize::new(0),
        }
    }

    pub fn fail_records(&self, on: bool) {
        self.fail_record.store(on, Ordering::SeqCst);
    }

    pub fn jam_rollback(&self, on: bool) {
        self.jam_rollback.store(on, Ordering::SeqCst);
    }
}

#[async_trait]
impl Catalog for FlakyCatalog {
    async fn owns_target(&self, owner: OwnerId, target: &UploadTarget) -> EngineResult<bool> {
        self.inner.owns_target(owner, target).await
    }

    async fn record_artifact(
        &self,
        session: &UploadSession,
        artifact: &StoredArtifact,
    ) -> EngineResult<()> {
        if self.fail_record.load(Ordering::SeqCst) {
            if self.jam_rollback.load(Ordering::SeqCst) {
                self.store.fail_promotes(true);
            }
            return Err(EngineError::Metadata(MetadataError::Internal(
                "injected catalog failure".to_string(),
            )));
        }
        self.inner.record_artifact(session, artifact).await?;
        self.records.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
