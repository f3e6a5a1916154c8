//! Sync and backfill checkpoint repositories.
//!
//! Both checkpoints are singleton rows keyed by a constant key, written
//! with compare-and-swap semantics on a `version` column. Every guarded
//! transition bumps the version; a caller holding a stale version loses
//! the swap and must skip its run.

use crate::error::MetadataResult;
use crate::models::{BackfillStateRow, SyncStateRow};
use async_trait::async_trait;
use time::OffsetDateTime;

/// Checkpoint key for the catalog sync job.
pub const CATALOG_SYNC_KEY: &str = "catalog";

/// Checkpoint key for the review stat backfill job.
pub const REVIEW_BACKFILL_KEY: &str = "review_stats";

/// Repository for the sync state machine (`idle -> running -> idle|error`).
#[async_trait]
pub trait SyncStateRepo: Send + Sync {
    /// Get the checkpoint row.
    async fn get_sync_state(&self, state_key: &str) -> MetadataResult<Option<SyncStateRow>>;

    /// Create the checkpoint row if it does not exist yet.
    async fn ensure_sync_state(
        &self,
        state_key: &str,
        now: OffsetDateTime,
    ) -> MetadataResult<SyncStateRow>;

    /// Transition to `running` if currently idle or errored and the
    /// version matches. Returns false when the claim lost the swap or a
    /// run is already in flight.
    async fn claim_sync_run(
        &self,
        state_key: &str,
        expected_version: i64,
        now: OffsetDateTime,
    ) -> MetadataResult<bool>;

    /// Persist an advanced cursor mid-run. Guarded by version.
    async fn advance_sync_cursor(
        &self,
        state_key: &str,
        expected_version: i64,
        cursor: &str,
        now: OffsetDateTime,
    ) -> MetadataResult<bool>;

    /// Transition back to `idle` after a clean run. A full run (started
    /// with no cursor) stamps `last_full_sync_at`; an incremental run
    /// stamps `last_incremental_sync_at`. Clears `last_error` and stores
    /// the recomputed summary.
    async fn complete_sync_run(
        &self,
        state_key: &str,
        expected_version: i64,
        cursor: Option<&str>,
        full: bool,
        summary_json: &str,
        now: OffsetDateTime,
    ) -> MetadataResult<bool>;

    /// Transition to `error` with a stored message. The cursor stays at
    /// the last successfully persisted position so the next scheduled
    /// run resumes rather than restarts.
    async fn fail_sync_run(
        &self,
        state_key: &str,
        expected_version: i64,
        error: &str,
        now: OffsetDateTime,
    ) -> MetadataResult<bool>;

    /// Force a `running` checkpoint into `error` regardless of version.
    /// Used by startup recovery and the panic watchdog, where the writer
    /// that held the version is known to be gone.
    async fn force_fail_running_sync(
        &self,
        state_key: &str,
        error: &str,
        now: OffsetDateTime,
    ) -> MetadataResult<bool>;
}

/// Repository for the stat backfill checkpoint.
#[async_trait]
pub trait BackfillRepo: Send + Sync {
    /// Get the checkpoint row.
    async fn get_backfill_state(
        &self,
        state_key: &str,
    ) -> MetadataResult<Option<BackfillStateRow>>;

    /// Create the checkpoint row if it does not exist yet.
    async fn ensure_backfill_state(
        &self,
        state_key: &str,
        now: OffsetDateTime,
    ) -> MetadataResult<BackfillStateRow>;

    /// Persist the cursor after a batch, or clear it (cursor = None) and
    /// stamp completion when the pass reached the end of the table.
    /// Guarded by version.
    async fn advance_backfill_cursor(
        &self,
        state_key: &str,
        expected_version: i64,
        cursor: Option<&str>,
        completed_at: Option<OffsetDateTime>,
        now: OffsetDateTime,
    ) -> MetadataResult<bool>;
}
