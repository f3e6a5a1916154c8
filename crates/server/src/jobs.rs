//! Background job spawning and fixed-interval scheduling.
//!
//! Every scheduled tick spawns the run in its own task registered with
//! the [`JobTaskRegistry`], so a panicking run cannot take the scheduler
//! loop down with it, and the watchdog can fail a wedged checkpoint over.

use crate::metrics;
use crate::state::{AppState, JobKind};
use pavilion_catalog::{
    BackfillRunner, CatalogClient, CategorizeRunner, LlmClient, SyncOutcome, SyncRunner,
};
use uuid::Uuid;

/// Spawn one catalog sync run in the background.
pub async fn spawn_sync_run(state: &AppState) {
    let client = match CatalogClient::new(&state.config.catalog) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "Cannot build catalog client, sync run not started");
            return;
        }
    };
    let runner = SyncRunner::new(
        state.metadata.clone(),
        client,
        state.config.catalog.clone(),
    );

    let run_id = Uuid::new_v4();
    metrics::JOBS_ACTIVE.inc();
    let handle = tokio::spawn(async move {
        match runner.run().await {
            Ok(SyncOutcome::Completed(stats)) => {
                metrics::SYNC_RUNS.with_label_values(&["completed"]).inc();
                metrics::SKILLS_INSERTED.inc_by(stats.inserted);
                metrics::SKILLS_UPDATED.inc_by(stats.updated);
                metrics::RECORDS_SKIPPED.inc_by(stats.skipped);
            }
            Ok(SyncOutcome::Skipped) => {
                metrics::SYNC_RUNS.with_label_values(&["skipped"]).inc();
            }
            Err(e) => {
                metrics::SYNC_RUNS.with_label_values(&["failed"]).inc();
                tracing::error!(error = %e, "Catalog sync run failed");
            }
        }
        metrics::JOBS_ACTIVE.dec();
    });

    state
        .jobs
        .register(run_id, JobKind::CatalogSync, handle)
        .await;
}

/// Spawn one stat backfill invocation in the background.
pub async fn spawn_backfill_run(state: &AppState) {
    let runner = BackfillRunner::new(state.metadata.clone(), state.config.backfill.clone());

    let run_id = Uuid::new_v4();
    metrics::JOBS_ACTIVE.inc();
    let handle = tokio::spawn(async move {
        match runner.run().await {
            Ok(outcome) => {
                if outcome.completed_pass {
                    metrics::BACKFILL_PASSES.inc();
                }
                if outcome.lost_checkpoint {
                    tracing::debug!("Backfill invocation lost its checkpoint, stopped early");
                }
            }
            Err(e) => {
                tracing::error!(error = %e, "Stat backfill invocation failed");
            }
        }
        metrics::JOBS_ACTIVE.dec();
    });

    state
        .jobs
        .register(run_id, JobKind::StatBackfill, handle)
        .await;
}

/// Spawn one categorization run in the background.
pub async fn spawn_categorize_run(state: &AppState) {
    let client = match LlmClient::new(&state.config.categorize) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "Cannot build completion client, categorization not started");
            return;
        }
    };
    let runner = CategorizeRunner::new(
        state.metadata.clone(),
        client,
        state.config.categorize.clone(),
    );

    let run_id = Uuid::new_v4();
    metrics::JOBS_ACTIVE.inc();
    let handle = tokio::spawn(async move {
        if let Err(e) = runner.run().await {
            tracing::error!(error = %e, "Categorization run failed");
        }
        metrics::JOBS_ACTIVE.dec();
    });

    state
        .jobs
        .register(run_id, JobKind::Categorize, handle)
        .await;
}

/// Spawn the fixed-interval schedulers configured for this deployment.
pub fn spawn_schedulers(state: AppState) {
    if state.config.catalog.schedule_enabled {
        let interval = state.config.catalog.interval();
        let sync_state = state.clone();
        tokio::spawn(async move {
            tracing::info!(
                interval_secs = interval.as_secs(),
                "Catalog sync scheduler enabled"
            );
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            // The immediate first tick would race server startup; skip it.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                spawn_sync_run(&sync_state).await;
            }
        });
    }

    if state.config.backfill.schedule_enabled {
        let interval = state.config.backfill.interval();
        let backfill_state = state.clone();
        tokio::spawn(async move {
            tracing::info!(
                interval_secs = interval.as_secs(),
                "Stat backfill scheduler enabled"
            );
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                spawn_backfill_run(&backfill_state).await;
            }
        });
    }

    if state.config.categorize.enabled {
        let interval = state.config.categorize.interval();
        let categorize_state = state.clone();
        tokio::spawn(async move {
            tracing::info!(
                interval_secs = interval.as_secs(),
                "Categorization scheduler enabled"
            );
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                spawn_categorize_run(&categorize_state).await;
            }
        });
    }
}
