//! Trip catalog repository.

use crate::error::MetadataResult;
use crate::models::{SegmentRow, StoredFileRow, TripRow};
use async_trait::async_trait;
use uuid::Uuid;

/// Size and hash written onto a segment when its primary video is stored.
#[derive(Debug, Clone)]
pub struct SegmentUpdate {
    pub file_size_bytes: i64,
    pub sha256: String,
}

/// Repository for trips, segments and the files stored against them.
#[async_trait]
pub trait CatalogRepo: Send + Sync {
    async fn create_trip(&self, trip: &TripRow) -> MetadataResult<()>;

    async fn get_trip(&self, trip_id: Uuid) -> MetadataResult<Option<TripRow>>;

    async fn create_segment(&self, segment: &SegmentRow) -> MetadataResult<()>;

    async fn get_segment(&self, segment_id: Uuid) -> MetadataResult<Option<SegmentRow>>;

    /// True when the segment exists, belongs to the trip, and the trip belongs to the owner.
    async fn segment_owned_by(
        &self,
        trip_id: Uuid,
        segment_id: Uuid,
        owner_id: Uuid,
    ) -> MetadataResult<bool>;

    /// Insert a stored file and optionally update its segment, in one transaction.
    async fn record_stored_file(
        &self,
        file: &StoredFileRow,
        segment_update: Option<&SegmentUpdate>,
    ) -> MetadataResult<()>;

    /// Files stored against a segment, oldest first.
    async fn list_stored_files(&self, segment_id: Uuid) -> MetadataResult<Vec<StoredFileRow>>;
}
