//! Resumable upload session engine.
//!
//! Transport-agnostic: callers supply an owner resolved by their own
//! identity layer and map [`EngineError`] onto their protocol.
//!
//! - [`ChunkWriter`] appends byte ranges at a verified offset
//! - [`Finalizer`] hashes a completed artifact and promotes it
//! - [`SessionStore`] holds the durable session record
//! - [`UploadEngine`] composes them under a per-session lock

pub mod catalog;
pub mod chunk_writer;
pub mod engine;
pub mod error;
pub mod finalizer;
pub mod locks;
pub mod sessions;

pub use catalog::{Catalog, SqlCatalog};
pub use chunk_writer::{ChunkWriter, partial_key};
pub use engine::{
    CancelOutcome, ChunkOutcome, CreateUpload, EngineConfig, OffsetInfo, UploadEngine,
};
pub use error::{EngineError, EngineResult};
pub use finalizer::{FinalizeOutcome, Finalizer, permanent_key};
pub use locks::{SessionGuard, SessionLocks};
pub use sessions::SessionStore;
