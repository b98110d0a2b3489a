//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Largest declared length a client may create an upload for.
    #[serde(default = "default_max_upload_size")]
    pub max_upload_size: u64,
    /// Largest request body accepted for a single chunk.
    #[serde(default = "default_max_chunk_size")]
    pub max_chunk_size: u64,
    /// Requests processed concurrently before new ones wait.
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    /// The endpoint is unauthenticated; restrict it at the network level.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_max_upload_size() -> u64 {
    crate::DEFAULT_MAX_UPLOAD_SIZE
}

fn default_max_chunk_size() -> u64 {
    crate::DEFAULT_MAX_CHUNK_SIZE
}

fn default_max_concurrent_requests() -> usize {
    256
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_size: default_max_upload_size(),
            max_chunk_size: default_max_chunk_size(),
            max_concurrent_requests: default_max_concurrent_requests(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

impl ServerConfig {
    /// Validate size and concurrency limits.
    pub fn validate(&self) -> Result<(), String> {
        if self.max_upload_size == 0 {
            return Err("server.max_upload_size must be greater than zero".to_string());
        }
        if self.max_chunk_size == 0 {
            return Err("server.max_chunk_size must be greater than zero".to_string());
        }
        if self.max_chunk_size > self.max_upload_size {
            return Err(format!(
                "server.max_chunk_size ({}) must not exceed server.max_upload_size ({})",
                self.max_chunk_size, self.max_upload_size
            ));
        }
        if self.max_concurrent_requests == 0 {
            return Err("server.max_concurrent_requests must be greater than zero".to_string());
        }
        Ok(())
    }
}

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Filesystem {
        /// Root directory for partial and permanent objects.
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/storage"),
        }
    }
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MetadataConfig {
    /// SQLite database.
    Sqlite {
        /// Database file path.
        path: PathBuf,
        /// Advisory query timeout in seconds. Slow queries are logged, not cancelled.
        #[serde(default = "default_sqlite_query_timeout_secs")]
        query_timeout_secs: Option<u64>,
    },
}

fn default_sqlite_query_timeout_secs() -> Option<u64> {
    Some(30)
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self::Sqlite {
            path: PathBuf::from("./data/metadata.db"),
            query_timeout_secs: default_sqlite_query_timeout_secs(),
        }
    }
}

/// A bearer token seeded into the metadata store at startup.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StaticTokenConfig {
    /// SHA256 hex of the bearer secret (64 characters, optional `sha256:` prefix).
    /// Generate with: `echo -n "your-secret-token" | sha256sum`
    pub token_hash: String,
    /// Owner the token authenticates as.
    pub owner_id: Uuid,
    pub description: Option<String>,
}

/// Authentication configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AuthConfig {
    #[serde(default)]
    pub tokens: Vec<StaticTokenConfig>,
}

impl AuthConfig {
    /// Create a test configuration with one deterministic token.
    ///
    /// **For testing only.**
    pub fn for_testing() -> Self {
        Self {
            tokens: vec![StaticTokenConfig {
                // SHA256 of "test-upload-token"
                token_hash: crate::hash::ContentHash::compute(b"test-upload-token").to_hex(),
                owner_id: Uuid::nil(),
                description: Some("Test upload token".to_string()),
            }],
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Metadata store configuration.
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Tokens seeded at startup.
    #[serde(default)]
    pub auth: AuthConfig,
}

impl AppConfig {
    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses filesystem storage, SQLite metadata,
    /// and a dummy upload token.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            metadata: MetadataConfig::default(),
            auth: AuthConfig::for_testing(),
        }
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        self.server.validate()
    }
}
