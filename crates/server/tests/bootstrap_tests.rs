//! Tests for seeding configured tokens at startup.

mod common;

use common::sha256_hash;
use ridelog_core::config::{AuthConfig, StaticTokenConfig};
use ridelog_metadata::models::TokenRow;
use ridelog_metadata::SqliteStore;
use ridelog_metadata::repos::TokenRepo;
use ridelog_server::bootstrap::seed_tokens;
use time::OffsetDateTime;
use uuid::Uuid;

async fn store() -> (tempfile::TempDir, SqliteStore) {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::new(dir.path().join("metadata.db"), None)
        .await
        .unwrap();
    (dir, store)
}

fn config(secret: &str, owner_id: Uuid) -> AuthConfig {
    AuthConfig {
        tokens: vec![StaticTokenConfig {
            token_hash: format!("sha256:{}", sha256_hash(secret.as_bytes()).to_uppercase()),
            owner_id,
            description: Some("dashcam uploader".to_string()),
        }],
    }
}

#[tokio::test]
async fn test_seed_creates_then_skips() {
    let (_dir, store) = store().await;
    let owner = Uuid::new_v4();
    let config = config("rider-secret", owner);

    assert_eq!(seed_tokens(&store, &config).await.unwrap(), 1);
    assert_eq!(seed_tokens(&store, &config).await.unwrap(), 0);

    let row = store
        .get_token_by_hash(&sha256_hash(b"rider-secret"))
        .await
        .unwrap()
        .expect("token seeded under its normalized hash");
    assert_eq!(row.owner_id, owner);
    assert_eq!(row.description.as_deref(), Some("dashcam uploader"));
}

#[tokio::test]
async fn test_seed_rejects_malformed_hash() {
    let (_dir, store) = store().await;
    let config = AuthConfig {
        tokens: vec![StaticTokenConfig {
            token_hash: "abc123".to_string(),
            owner_id: Uuid::new_v4(),
            description: None,
        }],
    };
    assert!(seed_tokens(&store, &config).await.is_err());
}

#[tokio::test]
async fn test_seed_rejects_revoked_or_reassigned_token() {
    let (_dir, store) = store().await;
    let owner = Uuid::new_v4();
    let now = OffsetDateTime::now_utc();

    store
        .create_token(&TokenRow {
            token_id: Uuid::new_v4(),
            owner_id: owner,
            token_hash: sha256_hash(b"revoked-secret"),
            expires_at: None,
            revoked_at: Some(now),
            created_at: now,
            last_used_at: None,
            description: None,
        })
        .await
        .unwrap();
    assert!(
        seed_tokens(&store, &config("revoked-secret", owner))
            .await
            .is_err()
    );

    seed_tokens(&store, &config("shared-secret", owner))
        .await
        .unwrap();
    assert!(
        seed_tokens(&store, &config("shared-secret", Uuid::new_v4()))
            .await
            .is_err()
    );
}
