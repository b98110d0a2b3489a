//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

/// A boxed stream of bytes for streaming reads.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Durable blob storage for partial and permanent upload artifacts.
///
/// Partial artifacts grow by `append` at a known length and are moved into
/// their permanent location with `promote`. A permanent location is written
/// exactly once.
#[async_trait]
pub trait BlobStore: Send + Sync + 'static {
    /// Check if an object exists.
    async fn exists(&self, key: &str) -> StorageResult<bool>;

    /// Get an object's size without fetching content.
    async fn head(&self, key: &str) -> StorageResult<ObjectMeta>;

    /// Get an object's content.
    async fn get(&self, key: &str) -> StorageResult<Bytes>;

    /// Get an object as a byte stream.
    async fn get_stream(&self, key: &str) -> StorageResult<ByteStream>;

    /// Allocate an empty object. Fails with `AlreadyExists` if the key is taken.
    async fn create(&self, key: &str) -> StorageResult<()>;

    /// Append `data` to an object whose current length must equal `expected_len`.
    ///
    /// Returns the new length once the bytes are durable. If the object length
    /// differs, returns `LengthMismatch` without writing. A failed write leaves
    /// the object at `expected_len`.
    async fn append(&self, key: &str, expected_len: u64, data: Bytes) -> StorageResult<u64>;

    /// Shrink an object to `len` bytes.
    async fn truncate(&self, key: &str, len: u64) -> StorageResult<()>;

    /// Atomically move an object to `to`. Fails with `AlreadyExists` if `to` is present.
    async fn promote(&self, from: &str, to: &str) -> StorageResult<()>;

    /// Delete an object.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Get the name of this storage backend, used for metrics and logging.
    fn backend_name(&self) -> &'static str;

    /// Verify storage backend connectivity.
    ///
    /// Called during server startup before accepting requests.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

/// Metadata about a stored object.
#[derive(Clone, Debug)]
pub struct ObjectMeta {
    /// Object size in bytes.
    pub size: u64,
    /// Last modification time (if available).
    pub last_modified: Option<time::OffsetDateTime>,
}
