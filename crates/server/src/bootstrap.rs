//! Seeding of configured API tokens.

use anyhow::{Result, bail};
use ridelog_core::config::{AuthConfig, StaticTokenConfig};
use ridelog_metadata::MetadataStore;
use ridelog_metadata::models::TokenRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Normalize a configured hash to the lowercase hex form tokens are looked up by.
fn normalize_hash(config: &StaticTokenConfig) -> Result<String> {
    let hash = config
        .token_hash
        .strip_prefix("sha256:")
        .unwrap_or(&config.token_hash)
        .to_lowercase();
    if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        bail!("invalid token_hash: expected 64 hex chars");
    }
    Ok(hash)
}

/// Ensure every configured token exists in the token table.
///
/// Tokens already present are left alone as long as they still belong to the
/// configured owner and have not been revoked. Returns the number of tokens created.
pub async fn seed_tokens(metadata: &dyn MetadataStore, config: &AuthConfig) -> Result<usize> {
    let now = OffsetDateTime::now_utc();
    let mut created = 0;

    for entry in &config.tokens {
        let hash = normalize_hash(entry)?;

        if let Some(existing) = metadata.get_token_by_hash(&hash).await? {
            if existing.revoked_at.is_some() {
                bail!(
                    "configured token matches a revoked token (id={}); use a new token",
                    existing.token_id
                );
            }
            if existing.owner_id != entry.owner_id {
                bail!(
                    "configured token (id={}) belongs to owner {}, not {}",
                    existing.token_id,
                    existing.owner_id,
                    entry.owner_id
                );
            }
            tracing::debug!(token_id = %existing.token_id, "configured token already present");
            continue;
        }

        let token = TokenRow {
            token_id: Uuid::new_v4(),
            owner_id: entry.owner_id,
            token_hash: hash,
            expires_at: None,
            revoked_at: None,
            created_at: now,
            last_used_at: None,
            description: entry.description.clone(),
        };
        metadata.create_token(&token).await?;
        tracing::info!(token_id = %token.token_id, owner_id = %token.owner_id, "configured token created");
        created += 1;
    }

    Ok(created)
}
