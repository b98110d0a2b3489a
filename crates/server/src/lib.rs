//! HTTP server for ridelog resumable media uploads.
//!
//! Exposes the upload engine over a tus-style protocol:
//! - session creation with declared length and optional SHA-256
//! - offset discovery (HEAD) and chunk append (PATCH)
//! - idempotent cancel (DELETE)
//! - health and Prometheus endpoints

pub mod auth;
pub mod bootstrap;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;

pub use auth::{AuthenticatedOwner, TraceId};
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
