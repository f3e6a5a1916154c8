//! Bootstrap metadata repository.

use crate::error::MetadataResult;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for bootstrap bookkeeping (which API key was created from
/// the configured admin hash, so a hash change can revoke it).
#[async_trait]
pub trait BootstrapRepo: Send + Sync {
    /// Record the admin key created from config.
    async fn set_bootstrap_token_id(&self, token_id: Uuid) -> MetadataResult<()>;

    /// Get the previously recorded admin key, if any.
    async fn get_bootstrap_token_id(&self) -> MetadataResult<Option<Uuid>>;
}
