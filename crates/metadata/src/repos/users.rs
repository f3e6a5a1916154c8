//! Mirrored identity-provider user repository.

use crate::error::MetadataResult;
use crate::models::UserRow;
use async_trait::async_trait;
use time::OffsetDateTime;

/// Repository for users mirrored from identity-provider webhook events.
#[async_trait]
pub trait UserRepo: Send + Sync {
    /// Insert or update a user by external identifier. An update clears a
    /// previous soft-delete (the provider resurrected the account).
    async fn upsert_user(&self, user: &UserRow) -> MetadataResult<()>;

    /// Get a user by external identifier.
    async fn get_user_by_external_id(&self, external_id: &str)
    -> MetadataResult<Option<UserRow>>;

    /// Soft-delete a user. Returns true if a row was marked.
    async fn soft_delete_user(
        &self,
        external_id: &str,
        deleted_at: OffsetDateTime,
    ) -> MetadataResult<bool>;
}
