//! Prometheus metrics for the Pavilion server.
//!
//! # Security Note
//!
//! The `/metrics` endpoint is unauthenticated to allow Prometheus
//! scraping. It exposes only aggregate counters (no slugs, identities, or
//! key material), but should still be network-restricted to authorized
//! scraper IPs at the infrastructure level.

use axum::http::StatusCode;
use axum::response::IntoResponse;
use prometheus::{
    Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};
use std::sync::{LazyLock, Once};

/// Global Prometheus registry for all metrics.
pub static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

// Sync metrics
pub static SYNC_RUNS: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "pavilion_sync_runs_total",
            "Catalog sync runs by outcome (completed, skipped, failed)",
        ),
        &["outcome"],
    )
    .expect("metric creation failed")
});

pub static SKILLS_INSERTED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "pavilion_skills_inserted_total",
        "Skills first observed and inserted by the reconciler",
    )
    .expect("metric creation failed")
});

pub static SKILLS_UPDATED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "pavilion_skills_updated_total",
        "Existing skills updated by the reconciler",
    )
    .expect("metric creation failed")
});

pub static RECORDS_SKIPPED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "pavilion_catalog_records_skipped_total",
        "Malformed or unappliable catalog records skipped",
    )
    .expect("metric creation failed")
});

// Backfill metrics
pub static BACKFILL_PASSES: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "pavilion_backfill_passes_total",
        "Completed full stat-backfill passes",
    )
    .expect("metric creation failed")
});

// Agent traffic metrics
pub static REVIEWS_SUBMITTED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "pavilion_reviews_submitted_total",
        "Reviews submitted or updated via the API",
    )
    .expect("metric creation failed")
});

pub static VOTES_SUBMITTED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "pavilion_votes_submitted_total",
        "Votes submitted via the deprecated vote endpoint",
    )
    .expect("metric creation failed")
});

pub static QUOTA_REJECTIONS: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "pavilion_quota_rejections_total",
        "Requests rejected by the fixed-window quota gate",
    )
    .expect("metric creation failed")
});

// Background job health
pub static JOBS_PANICKED: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "pavilion_jobs_panicked_total",
        "Background job tasks that panicked",
    )
    .expect("metric creation failed")
});

pub static JOBS_ACTIVE: LazyLock<IntGauge> = LazyLock::new(|| {
    IntGauge::new(
        "pavilion_jobs_active",
        "Background job tasks currently running",
    )
    .expect("metric creation failed")
});

static REGISTER: Once = Once::new();

/// Register all metrics with the global registry. Idempotent.
pub fn register_metrics() {
    REGISTER.call_once(|| {
        let registry = &*REGISTRY;
        registry
            .register(Box::new(SYNC_RUNS.clone()))
            .expect("metric registration failed");
        registry
            .register(Box::new(SKILLS_INSERTED.clone()))
            .expect("metric registration failed");
        registry
            .register(Box::new(SKILLS_UPDATED.clone()))
            .expect("metric registration failed");
        registry
            .register(Box::new(RECORDS_SKIPPED.clone()))
            .expect("metric registration failed");
        registry
            .register(Box::new(BACKFILL_PASSES.clone()))
            .expect("metric registration failed");
        registry
            .register(Box::new(REVIEWS_SUBMITTED.clone()))
            .expect("metric registration failed");
        registry
            .register(Box::new(VOTES_SUBMITTED.clone()))
            .expect("metric registration failed");
        registry
            .register(Box::new(QUOTA_REJECTIONS.clone()))
            .expect("metric registration failed");
        registry
            .register(Box::new(JOBS_PANICKED.clone()))
            .expect("metric registration failed");
        registry
            .register(Box::new(JOBS_ACTIVE.clone()))
            .expect("metric registration failed");
    });
}

/// Handler for the `/metrics` endpoint.
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let families = REGISTRY.gather();
    let mut buffer = Vec::new();
    match encoder.encode(&families, &mut buffer) {
        Ok(()) => (
            StatusCode::OK,
            [("Content-Type", encoder.format_type().to_string())],
            buffer,
        )
            .into_response(),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            StatusCode::INTERNAL_SERVER_ERROR.into_response()
        }
    }
}
