//! Database models mapping to the metadata schema.

use pavilion_core::{RatingSummary, ReviewerKind, SkillRatings, TagSet};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::BTreeMap;
use time::OffsetDateTime;
use uuid::Uuid;

// =============================================================================
// Skills (local mirror of the external catalog)
// =============================================================================

/// Locally cached catalog entry for one external skill.
///
/// Catalog-owned fields (name, description, author, tags, downloads, stars,
/// installs, external timestamps) are written only by the sync job.
/// Vote counters and review aggregates are written only by user-facing
/// mutations and the stat backfill. Moderation fields are written only by
/// admin endpoints. Rows are never hard-deleted; moderation hides them.
#[derive(Debug, Clone, FromRow)]
pub struct SkillRow {
    pub skill_id: Uuid,
    /// External catalog identifier. Optional: rows created before the
    /// catalog exposed identifiers are matched by slug instead.
    pub external_id: Option<String>,
    pub slug: String,
    pub name: String,
    pub description: Option<String>,
    pub author: Option<String>,
    pub category: Option<String>,
    /// Canonical tags as a JSON string array.
    pub tags: String,
    pub downloads: i64,
    pub stars: i64,
    pub installs: i64,
    pub upvotes_human: i64,
    pub upvotes_bot: i64,
    pub upvotes_verified: i64,
    pub downvotes_human: i64,
    pub downvotes_bot: i64,
    pub downvotes_verified: i64,
    pub reviews_human_count: i64,
    pub reviews_human_mean: Option<f64>,
    pub reviews_bot_count: i64,
    pub reviews_bot_mean: Option<f64>,
    pub reviews_verified_count: i64,
    pub reviews_verified_mean: Option<f64>,
    pub hidden: bool,
    pub hidden_reason: Option<String>,
    pub external_updated_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub last_synced_at: OffsetDateTime,
}

impl SkillRow {
    /// Decode the stored tag list.
    pub fn tag_set(&self) -> TagSet {
        TagSet::from_json(&self.tags)
    }

    /// Review aggregates partitioned by reviewer kind.
    pub fn ratings(&self) -> SkillRatings {
        SkillRatings {
            human: RatingSummary {
                count: self.reviews_human_count.max(0) as u64,
                mean: self.reviews_human_mean,
            },
            bot: RatingSummary {
                count: self.reviews_bot_count.max(0) as u64,
                mean: self.reviews_bot_mean,
            },
            verified_bot: RatingSummary {
                count: self.reviews_verified_count.max(0) as u64,
                mean: self.reviews_verified_mean,
            },
        }
    }

    /// Net upvotes across voter kinds.
    pub fn upvotes(&self) -> i64 {
        self.upvotes_human + self.upvotes_bot + self.upvotes_verified
    }

    /// Net downvotes across voter kinds.
    pub fn downvotes(&self) -> i64 {
        self.downvotes_human + self.downvotes_bot + self.downvotes_verified
    }
}

/// Catalog-owned fields applied by the reconciler.
///
/// Deliberately excludes vote counters, review aggregates, and moderation
/// fields so a sync can never clobber locally-owned state.
#[derive(Debug, Clone)]
pub struct CatalogUpdate {
    pub external_id: Option<String>,
    pub name: String,
    pub description: Option<String>,
    pub author: Option<String>,
    /// Only overwrites the stored category when present; an absent catalog
    /// category leaves an AI-assigned one in place.
    pub category: Option<String>,
    pub tags: String,
    pub downloads: i64,
    pub stars: i64,
    pub installs: i64,
    pub external_updated_at: Option<OffsetDateTime>,
}

/// Filter for skill listings.
#[derive(Debug, Clone, Default)]
pub struct SkillFilter {
    pub category: Option<String>,
    pub tag: Option<String>,
    /// Substring match against name and description.
    pub search: Option<String>,
    pub include_hidden: bool,
    pub limit: u32,
    pub offset: u32,
}

/// Denormalized directory roll-up, recomputed at the end of each
/// successful sync run so listing pages never need a full-table scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DirectorySummary {
    pub total_visible: u64,
    pub categories: BTreeMap<String, u64>,
    pub tags: BTreeMap<String, u64>,
}

// =============================================================================
// Sync and backfill checkpoints
// =============================================================================

/// Resumable sync checkpoint, one row per sync key.
///
/// The `version` column makes every transition a compare-and-swap: a
/// concurrent invocation that lost the race fails its guarded update and
/// skips, instead of clobbering the winner's cursor.
#[derive(Debug, Clone, FromRow)]
pub struct SyncStateRow {
    pub state_key: String,
    /// One of `idle`, `running`, `error`.
    pub status: String,
    pub cursor: Option<String>,
    pub last_full_sync_at: Option<OffsetDateTime>,
    pub last_incremental_sync_at: Option<OffsetDateTime>,
    pub last_error: Option<String>,
    /// Serialized [`DirectorySummary`].
    pub summary_json: Option<String>,
    pub version: i64,
    pub updated_at: OffsetDateTime,
}

impl SyncStateRow {
    pub fn summary(&self) -> Option<DirectorySummary> {
        self.summary_json
            .as_deref()
            .and_then(|raw| serde_json::from_str(raw).ok())
    }
}

/// Sync checkpoint status values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Idle,
    Running,
    Error,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Error => "error",
        }
    }
}

/// Resumable stat backfill checkpoint, one row per backfill key.
///
/// Invariant: `cursor` is NULL once a full pass completes, signalling the
/// next invocation to restart from the beginning of the table.
#[derive(Debug, Clone, FromRow)]
pub struct BackfillStateRow {
    pub state_key: String,
    pub cursor: Option<String>,
    pub last_completed_at: Option<OffsetDateTime>,
    pub version: i64,
    pub updated_at: OffsetDateTime,
}

// =============================================================================
// Quota windows
// =============================================================================

/// Fixed-window request counter for one identity.
///
/// Windows are deterministic epoch-aligned buckets. The count never
/// exceeds the stored limit for a completed window.
#[derive(Debug, Clone, FromRow)]
pub struct RateWindowRow {
    pub identity_key: String,
    pub window_start: OffsetDateTime,
    pub count: i64,
    pub max_requests: i64,
}

// =============================================================================
// Reviews and votes
// =============================================================================

/// Review record. At most one active review per (skill, agent).
#[derive(Debug, Clone, FromRow)]
pub struct ReviewRow {
    pub review_id: Uuid,
    pub skill_id: Uuid,
    pub agent_id: Uuid,
    pub reviewer_kind: String,
    pub rating: i64,
    pub body: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

impl ReviewRow {
    pub fn kind(&self) -> Option<ReviewerKind> {
        ReviewerKind::parse(&self.reviewer_kind).ok()
    }
}

/// Vote record (deprecated surface). At most one active vote per
/// (skill, agent).
#[derive(Debug, Clone, FromRow)]
pub struct VoteRow {
    pub vote_id: Uuid,
    pub skill_id: Uuid,
    pub agent_id: Uuid,
    pub voter_kind: String,
    /// `up` or `down`.
    pub direction: String,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

// =============================================================================
// Agents, API keys, mirrored users
// =============================================================================

/// Registered third-party agent.
#[derive(Debug, Clone, FromRow)]
pub struct AgentRow {
    pub agent_id: Uuid,
    pub agent_name: String,
    pub contact: Option<String>,
    /// `bot` or `verified_bot`.
    pub kind: String,
    /// Set when a human-controlled account claims the registration.
    pub claimed_by_user_id: Option<Uuid>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

/// API key record. The raw secret is shown once at creation; only its
/// SHA-256 hash is stored.
#[derive(Debug, Clone, FromRow)]
pub struct TokenRow {
    pub token_id: Uuid,
    pub agent_id: Option<Uuid>,
    pub token_hash: String,
    pub scopes: String, // JSON array
    pub expires_at: Option<OffsetDateTime>,
    pub revoked_at: Option<OffsetDateTime>,
    pub created_at: OffsetDateTime,
    pub last_used_at: Option<OffsetDateTime>,
    pub description: Option<String>,
}

/// User mirrored from the identity provider via webhook events.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub user_id: Uuid,
    pub external_id: String,
    pub handle: Option<String>,
    pub email: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub deleted_at: Option<OffsetDateTime>,
}
