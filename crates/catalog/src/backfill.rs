//! Stat backfill: recomputes review aggregates in resumable batches.
//!
//! Each invocation processes at most `batch_size * max_batches` skills in
//! stable `skill_id` order starting after the persisted cursor, so batch
//! boundaries are contiguous across invocations. Reaching the end of the
//! table clears the cursor and stamps completion; the next invocation
//! starts a fresh full pass.

use crate::error::CatalogResult;
use pavilion_core::config::BackfillConfig;
use pavilion_core::{RatingSummary, ReviewerKind, SkillRatings};
use pavilion_metadata::MetadataStore;
use pavilion_metadata::models::ReviewRow;
use pavilion_metadata::repos::sync_state::REVIEW_BACKFILL_KEY;
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

/// Result of one backfill invocation.
#[derive(Debug, Default)]
pub struct BackfillOutcome {
    /// Skills whose aggregates were recomputed.
    pub skills_processed: u64,
    /// Whether this invocation finished a full pass over the table.
    pub completed_pass: bool,
    /// Whether the run stopped early because a concurrent invocation won
    /// the checkpoint swap.
    pub lost_checkpoint: bool,
}

/// Drives review-aggregate recomputation against the metadata store.
pub struct BackfillRunner {
    metadata: Arc<dyn MetadataStore>,
    config: BackfillConfig,
}

impl BackfillRunner {
    pub fn new(metadata: Arc<dyn MetadataStore>, config: BackfillConfig) -> Self {
        Self { metadata, config }
    }

    /// Execute one bounded backfill invocation.
    pub async fn run(&self) -> CatalogResult<BackfillOutcome> {
        let now = OffsetDateTime::now_utc();
        let state = self
            .metadata
            .ensure_backfill_state(REVIEW_BACKFILL_KEY, now)
            .await?;
        let mut version = state.version;
        let mut cursor: Option<Uuid> = state
            .cursor
            .as_deref()
            .and_then(|raw| Uuid::parse_str(raw).ok());
        let mut outcome = BackfillOutcome::default();

        for _ in 0..self.config.max_batches {
            let page = self
                .metadata
                .list_skills_page(cursor, self.config.batch_size)
                .await?;

            if page.is_empty() {
                if !self.finish_pass(&mut version).await? {
                    outcome.lost_checkpoint = true;
                    return Ok(outcome);
                }
                outcome.completed_pass = true;
                return Ok(outcome);
            }

            for skill in &page {
                let reviews = self.metadata.reviews_for_skill(skill.skill_id).await?;
                let ratings = aggregate_reviews(&reviews);
                self.metadata
                    .write_review_aggregates(skill.skill_id, &ratings, OffsetDateTime::now_utc())
                    .await?;
                outcome.skills_processed += 1;
            }

            // page.last() is Some because the page is non-empty
            let last = page.last().map(|s| s.skill_id).unwrap_or_default();
            cursor = Some(last);

            let short_page = page.len() < self.config.batch_size as usize;
            if short_page {
                if !self.finish_pass(&mut version).await? {
                    outcome.lost_checkpoint = true;
                    return Ok(outcome);
                }
                outcome.completed_pass = true;
                return Ok(outcome);
            }

            if !self
                .metadata
                .advance_backfill_cursor(
                    REVIEW_BACKFILL_KEY,
                    version,
                    Some(&last.to_string()),
                    None,
                    OffsetDateTime::now_utc(),
                )
                .await?
            {
                outcome.lost_checkpoint = true;
                return Ok(outcome);
            }
            version += 1;
        }

        tracing::debug!(
            skills_processed = outcome.skills_processed,
            "Backfill batch budget exhausted, cursor persisted for next invocation"
        );
        Ok(outcome)
    }

    /// Clear the cursor and stamp completion time.
    async fn finish_pass(&self, version: &mut i64) -> CatalogResult<bool> {
        let now = OffsetDateTime::now_utc();
        let ok = self
            .metadata
            .advance_backfill_cursor(REVIEW_BACKFILL_KEY, *version, None, Some(now), now)
            .await?;
        if ok {
            *version += 1;
            tracing::info!("Stat backfill pass completed");
        }
        Ok(ok)
    }
}

/// Partition reviews by reviewer kind and compute each summary.
///
/// A partition with no reviews reports a `None` mean, never `0.0`.
pub fn aggregate_reviews(reviews: &[ReviewRow]) -> SkillRatings {
    let mut ratings = SkillRatings::default();

    for kind in [
        ReviewerKind::Human,
        ReviewerKind::Bot,
        ReviewerKind::VerifiedBot,
    ] {
        let values: Vec<u8> = reviews
            .iter()
            .filter(|r| r.kind() == Some(kind))
            .map(|r| r.rating.clamp(0, u8::MAX as i64) as u8)
            .collect();
        ratings.set_for_kind(kind, RatingSummary::from_ratings(&values));
    }

    ratings
}
