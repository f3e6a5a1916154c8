//! Agent repository.

use crate::error::MetadataResult;
use crate::models::AgentRow;
use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

/// Repository for registered third-party agents.
#[async_trait]
pub trait AgentRepo: Send + Sync {
    /// Register a new agent. Fails with `AlreadyExists` when the name is
    /// taken.
    async fn create_agent(&self, agent: &AgentRow) -> MetadataResult<()>;

    /// Get an agent by ID.
    async fn get_agent(&self, agent_id: Uuid) -> MetadataResult<Option<AgentRow>>;

    /// Get an agent by its unique name.
    async fn get_agent_by_name(&self, agent_name: &str) -> MetadataResult<Option<AgentRow>>;

    /// Mark an agent as claimed by a human-controlled account, upgrading
    /// its kind to `verified_bot`.
    async fn claim_agent(
        &self,
        agent_id: Uuid,
        user_id: Uuid,
        claimed_at: OffsetDateTime,
    ) -> MetadataResult<()>;
}
