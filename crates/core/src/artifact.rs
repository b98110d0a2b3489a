//! Artifacts produced by a successful finalization.

use crate::hash::ContentHash;
use serde::{Deserialize, Serialize};

/// A finished upload moved into permanent storage.
///
/// Produced exactly once per completed session and handed to the catalog;
/// never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredArtifact {
    /// Storage key of the permanent object, relative to the storage root.
    pub location: String,
    /// SHA-256 of the stored bytes.
    pub sha256: ContentHash,
    /// Size in bytes.
    pub size: u64,
}
