//! Core domain types and shared logic for the ridelog upload server.
//!
//! This crate defines the data model used by every other crate:
//! - Upload session identity, status and lifecycle
//! - Upload targets (trip segments) and media kinds
//! - Stored artifacts produced by finalization
//! - Content hashing
//! - Tokens resolved by the identity provider
//! - Application configuration

pub mod artifact;
pub mod config;
pub mod error;
pub mod hash;
pub mod media;
pub mod token;
pub mod upload;

pub use artifact::StoredArtifact;
pub use error::{Error, Result};
pub use hash::{ContentHash, ContentHasher};
pub use media::MediaKind;
pub use token::{Token, TokenId};
pub use upload::{OwnerId, UploadId, UploadSession, UploadStatus, UploadTarget};

/// Default ceiling for a declared upload length: 1 GiB.
pub const DEFAULT_MAX_UPLOAD_SIZE: u64 = 1024 * 1024 * 1024;

/// Default ceiling for a single PATCH body: 64 MiB.
pub const DEFAULT_MAX_CHUNK_SIZE: u64 = 64 * 1024 * 1024;

/// Maximum filename length accepted for an upload.
pub const MAX_FILENAME_LEN: usize = 255;
