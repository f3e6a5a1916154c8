//! API key repository.

use crate::error::MetadataResult;
use crate::models::TokenRow;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

/// Repository for API key operations.
#[async_trait]
pub trait TokenRepo: Send + Sync {
    /// Create an API key record.
    async fn create_token(&self, token: &TokenRow) -> MetadataResult<()>;

    /// Get a key by hash.
    async fn get_token_by_hash(&self, token_hash: &str) -> MetadataResult<Option<TokenRow>>;

    /// Get a key by ID.
    async fn get_token(&self, token_id: Uuid) -> MetadataResult<Option<TokenRow>>;

    /// Update last used time.
    async fn touch_token(&self, token_id: Uuid, used_at: OffsetDateTime) -> MetadataResult<()>;

    /// Revoke a key.
    async fn revoke_token(&self, token_id: Uuid, revoked_at: OffsetDateTime)
    -> MetadataResult<()>;

    /// List all keys, newest first.
    async fn list_tokens(&self) -> MetadataResult<Vec<TokenRow>>;
}
