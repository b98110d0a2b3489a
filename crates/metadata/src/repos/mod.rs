//! Repository traits for metadata operations.

pub mod catalog;
pub mod tokens;
pub mod uploads;

pub use catalog::{CatalogRepo, SegmentUpdate};
pub use tokens::TokenRepo;
pub use uploads::UploadRepo;
