//! Admin API key initialization.

use anyhow::{Result, bail};
use pavilion_core::config::AdminConfig;
use pavilion_metadata::MetadataStore;
use pavilion_metadata::models::TokenRow;
use time::OffsetDateTime;
use uuid::Uuid;

/// Ensure the configured admin API key exists, rotating the previous one
/// if needed.
///
/// If the key hash changes between restarts, the previous admin key is
/// automatically revoked and a new one is created with the new hash.
pub async fn ensure_admin_key(metadata: &dyn MetadataStore, config: &AdminConfig) -> Result<()> {
    // Normalize to lowercase to match auth.rs hash_token() which uses
    // lowercase hex encoding.
    let hash = config
        .key_hash
        .strip_prefix("sha256:")
        .unwrap_or(&config.key_hash)
        .to_lowercase();
    let hash = hash.as_str();
    if hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()) {
        bail!("invalid admin key_hash: expected 64 hex chars");
    }

    if let Some(existing) = metadata.get_token_by_hash(hash).await? {
        if existing.revoked_at.is_some() {
            bail!(
                "admin key hash matches a revoked key (id={}); \
                 use a new key hash or clear the revoked key",
                existing.token_id
            );
        }
        let now = OffsetDateTime::now_utc();
        if let Some(expires_at) = existing.expires_at {
            if expires_at <= now {
                bail!(
                    "admin key hash matches an expired key (id={}, expired={}); \
                     use a new key hash",
                    existing.token_id,
                    expires_at
                );
            }
        }
        metadata.set_bootstrap_token_id(existing.token_id).await?;
        tracing::debug!("Admin key already exists");
        return Ok(());
    }

    let now = OffsetDateTime::now_utc();
    if let Some(prev_id) = metadata.get_bootstrap_token_id().await? {
        metadata.revoke_token(prev_id, now).await?;
        tracing::info!(token_id = %prev_id, "Previous admin key revoked");
    }

    let token = TokenRow {
        token_id: Uuid::new_v4(),
        agent_id: None,
        token_hash: hash.to_string(),
        scopes: serde_json::to_string(&["admin"])?,
        expires_at: None,
        revoked_at: None,
        created_at: now,
        last_used_at: None,
        description: config.key_description.clone(),
    };

    metadata.create_token(&token).await?;
    metadata.set_bootstrap_token_id(token.token_id).await?;
    tracing::info!(token_id = %token.token_id, "Admin key created");

    Ok(())
}
