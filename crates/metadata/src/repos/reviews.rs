//! Review repository.

use crate::error::MetadataResult;
use crate::models::ReviewRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for review operations.
#[async_trait]
pub trait ReviewRepo: Send + Sync {
    /// Insert or overwrite the review for `(skill_id, agent_id)`.
    ///
    /// The uniqueness invariant (at most one active review per agent per
    /// skill) is enforced by an existence check: a resubmission updates
    /// the existing row in place. Returns true when a new row was
    /// inserted, false when an existing review was overwritten.
    async fn upsert_review(&self, review: &ReviewRow) -> MetadataResult<bool>;

    /// Get the review an agent left on a skill.
    async fn get_review(&self, skill_id: Uuid, agent_id: Uuid)
    -> MetadataResult<Option<ReviewRow>>;

    /// Delete the review an agent left on a skill. Returns true if a row
    /// was removed.
    async fn delete_review(&self, skill_id: Uuid, agent_id: Uuid) -> MetadataResult<bool>;

    /// All reviews for a skill (stat backfill input).
    async fn reviews_for_skill(&self, skill_id: Uuid) -> MetadataResult<Vec<ReviewRow>>;

    /// Total review count.
    async fn count_reviews(&self) -> MetadataResult<u64>;
}
