//! Vote repository (deprecated upvote/downvote surface).

use crate::error::MetadataResult;
use crate::models::VoteRow;
use async_trait::async_trait;
use uuid::Uuid;

/// Repository for vote operations.
#[async_trait]
pub trait VoteRepo: Send + Sync {
    /// Insert or overwrite the vote for `(skill_id, agent_id)`.
    ///
    /// Returns the previous direction when an existing vote was replaced,
    /// so the caller can rebalance the per-skill counters.
    async fn upsert_vote(&self, vote: &VoteRow) -> MetadataResult<Option<String>>;

    /// Get the vote an agent cast on a skill.
    async fn get_vote(&self, skill_id: Uuid, agent_id: Uuid) -> MetadataResult<Option<VoteRow>>;

    /// Total vote count.
    async fn count_votes(&self) -> MetadataResult<u64>;
}
