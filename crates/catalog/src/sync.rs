//! Catalog sync run driver.
//!
//! One run: claim the checkpoint (`idle|error -> running`), fetch up to the
//! configured page budget strictly in cursor order, reconcile each page,
//! persist the advanced cursor after every page, then transition back to
//! `idle` with a freshly recomputed directory summary. Exhausted retries
//! or an unexpected failure transition to `error` with the message stored
//! and the cursor left at the last successfully processed position, so the
//! next scheduled run resumes instead of restarting.

use crate::client::CatalogClient;
use crate::error::{CatalogError, CatalogResult};
use crate::reconcile::{Reconciler, SyncStats};
use pavilion_core::config::CatalogConfig;
use pavilion_metadata::MetadataStore;
use pavilion_metadata::models::DirectorySummary;
use pavilion_metadata::repos::sync_state::CATALOG_SYNC_KEY;
use std::sync::Arc;
use time::OffsetDateTime;

/// Result of one sync invocation.
#[derive(Debug)]
pub enum SyncOutcome {
    /// The run completed and the checkpoint is idle again.
    Completed(SyncStats),
    /// Another invocation holds the checkpoint; nothing was done.
    Skipped,
}

/// Drives catalog sync runs against the metadata store.
pub struct SyncRunner {
    metadata: Arc<dyn MetadataStore>,
    client: CatalogClient,
    reconciler: Reconciler,
    config: CatalogConfig,
}

impl SyncRunner {
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        client: CatalogClient,
        config: CatalogConfig,
    ) -> Self {
        let reconciler = Reconciler::new(metadata.clone());
        Self {
            metadata,
            client,
            reconciler,
            config,
        }
    }

    /// Execute one sync run.
    pub async fn run(&self) -> CatalogResult<SyncOutcome> {
        let now = OffsetDateTime::now_utc();
        let state = self
            .metadata
            .ensure_sync_state(CATALOG_SYNC_KEY, now)
            .await?;

        if !self
            .metadata
            .claim_sync_run(CATALOG_SYNC_KEY, state.version, now)
            .await?
        {
            tracing::debug!("Sync checkpoint already claimed, skipping run");
            return Ok(SyncOutcome::Skipped);
        }

        let mut version = state.version + 1;
        let started_with_cursor = state.cursor.is_some();
        let mut cursor = state.cursor.clone();
        let mut stats = SyncStats::default();

        tracing::info!(
            cursor = ?cursor,
            full = !started_with_cursor,
            "Catalog sync run started"
        );

        match self
            .drive_pages(&mut cursor, &mut version, &mut stats)
            .await
        {
            Ok(exhausted) => {
                let summary = self.collect_summary().await?;
                let summary_json = serde_json::to_string(&summary)
                    .map_err(|e| CatalogError::Decode(e.to_string()))?;

                let final_cursor = if exhausted { None } else { cursor.as_deref() };
                // A run that started with no prior cursor is a full sync;
                // one resuming an existing cursor is incremental.
                let full = !started_with_cursor;
                let done = self
                    .metadata
                    .complete_sync_run(
                        CATALOG_SYNC_KEY,
                        version,
                        final_cursor,
                        full,
                        &summary_json,
                        OffsetDateTime::now_utc(),
                    )
                    .await?;
                if !done {
                    tracing::warn!("Sync completion lost the checkpoint swap");
                    return Ok(SyncOutcome::Skipped);
                }

                tracing::info!(
                    pages = stats.pages,
                    inserted = stats.inserted,
                    updated = stats.updated,
                    skipped = stats.skipped,
                    exhausted,
                    "Catalog sync run completed"
                );
                Ok(SyncOutcome::Completed(stats))
            }
            Err(e) => {
                let message = e.to_string();
                tracing::error!(error = %message, "Catalog sync run failed");
                if let Err(persist_err) = self
                    .metadata
                    .fail_sync_run(
                        CATALOG_SYNC_KEY,
                        version,
                        &message,
                        OffsetDateTime::now_utc(),
                    )
                    .await
                {
                    tracing::error!(
                        error = %persist_err,
                        "Failed to persist sync error status"
                    );
                }
                Err(e)
            }
        }
    }

    /// Fetch and reconcile pages in cursor order. Returns true when the
    /// catalog was exhausted, false when the page budget ran out first.
    async fn drive_pages(
        &self,
        cursor: &mut Option<String>,
        version: &mut i64,
        stats: &mut SyncStats,
    ) -> CatalogResult<bool> {
        for _ in 0..self.config.max_pages {
            let page = self.client.fetch_page(cursor.as_deref()).await?;
            let now = OffsetDateTime::now_utc();
            let page_stats = self.reconciler.apply_page(&page.records, now).await?;
            stats.merge(page_stats);

            match page.next_cursor {
                Some(next) => {
                    if !self
                        .metadata
                        .advance_sync_cursor(CATALOG_SYNC_KEY, *version, &next, now)
                        .await?
                    {
                        return Err(CatalogError::CheckpointLost);
                    }
                    *version += 1;
                    *cursor = Some(next);
                }
                None => return Ok(true),
            }
        }
        Ok(false)
    }

    /// Recompute the denormalized directory summary by paging the skills
    /// table once, so listing queries never need a full scan.
    async fn collect_summary(&self) -> CatalogResult<DirectorySummary> {
        const PAGE: u32 = 500;
        let mut summary = DirectorySummary::default();
        let mut after = None;

        loop {
            let page = self.metadata.list_skills_page(after, PAGE).await?;
            if page.is_empty() {
                break;
            }
            after = page.last().map(|s| s.skill_id);

            for skill in &page {
                if skill.hidden {
                    continue;
                }
                summary.total_visible += 1;
                if let Some(category) = &skill.category {
                    *summary.categories.entry(category.clone()).or_default() += 1;
                }
                for tag in skill.tag_set().as_slice() {
                    *summary.tags.entry(tag.clone()).or_default() += 1;
                }
            }

            if page.len() < PAGE as usize {
                break;
            }
        }

        Ok(summary)
    }
}
