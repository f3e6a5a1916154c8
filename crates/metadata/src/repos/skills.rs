//! Skill repository.

use crate::error::MetadataResult;
use crate::models::{CatalogUpdate, SkillFilter, SkillRow};
use async_trait::async_trait;
use pavilion_core::{ReviewerKind, SkillRatings};
use time::OffsetDateTime;
use uuid::Uuid;

/// Repository for the cached catalog entries.
#[async_trait]
pub trait SkillRepo: Send + Sync {
    /// Insert a freshly observed skill.
    async fn insert_skill(&self, skill: &SkillRow) -> MetadataResult<()>;

    /// Get a skill by local ID.
    async fn get_skill(&self, skill_id: Uuid) -> MetadataResult<Option<SkillRow>>;

    /// Get a skill by slug.
    async fn get_skill_by_slug(&self, slug: &str) -> MetadataResult<Option<SkillRow>>;

    /// Get a skill by external catalog identifier.
    async fn get_skill_by_external_id(
        &self,
        external_id: &str,
    ) -> MetadataResult<Option<SkillRow>>;

    /// Apply catalog-owned fields to an existing row, leaving locally-owned
    /// columns (votes, review aggregates, moderation) untouched.
    async fn update_catalog_fields(
        &self,
        skill_id: Uuid,
        update: &CatalogUpdate,
        synced_at: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// Set the category (AI categorization job).
    async fn set_category(
        &self,
        skill_id: Uuid,
        category: &str,
        updated_at: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// Set moderation visibility.
    async fn set_hidden(
        &self,
        skill_id: Uuid,
        hidden: bool,
        reason: Option<&str>,
        updated_at: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// List skills matching a filter, newest first.
    async fn list_skills(&self, filter: &SkillFilter) -> MetadataResult<Vec<SkillRow>>;

    /// Page through all skills in stable `skill_id` order. Used by the
    /// stat backfill and summary recomputation; batch boundaries are
    /// contiguous because the ordering key is the cursor itself.
    async fn list_skills_page(
        &self,
        after: Option<Uuid>,
        limit: u32,
    ) -> MetadataResult<Vec<SkillRow>>;

    /// Count skills not hidden by moderation.
    async fn count_visible_skills(&self) -> MetadataResult<u64>;

    /// Adjust one vote counter by a delta.
    async fn adjust_vote_counter(
        &self,
        skill_id: Uuid,
        kind: ReviewerKind,
        upvote: bool,
        delta: i64,
    ) -> MetadataResult<()>;

    /// Write recomputed review aggregates (stat backfill).
    async fn write_review_aggregates(
        &self,
        skill_id: Uuid,
        ratings: &SkillRatings,
        updated_at: OffsetDateTime,
    ) -> MetadataResult<()>;

    /// Skills with no category yet, oldest first.
    async fn uncategorized_skills(&self, limit: u32) -> MetadataResult<Vec<SkillRow>>;
}
