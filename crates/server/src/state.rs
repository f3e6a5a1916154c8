//! Application state shared across handlers.

use crate::quota::QuotaGate;
use pavilion_core::config::AppConfig;
use pavilion_metadata::MetadataStore;
use pavilion_metadata::repos::sync_state::CATALOG_SYNC_KEY;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// Kind of background job tracked by the registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobKind {
    CatalogSync,
    StatBackfill,
    Categorize,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CatalogSync => "catalog_sync",
            Self::StatBackfill => "stat_backfill",
            Self::Categorize => "categorize",
        }
    }
}

/// Registry for tracking background job tasks and detecting panics.
///
/// A sync run that panics would otherwise leave its checkpoint wedged in
/// `running` forever, blocking every future run until a restart. This
/// registry tracks spawned run tasks and fails the checkpoint over when a
/// task died without completing.
pub struct JobTaskRegistry {
    /// Map of run_id -> (kind, task handle)
    tasks: Arc<Mutex<HashMap<Uuid, (JobKind, JoinHandle<()>)>>>,
    /// Metadata store for failing over a wedged checkpoint
    metadata: Arc<dyn MetadataStore>,
}

impl JobTaskRegistry {
    /// Create a new job task registry.
    pub fn new(metadata: Arc<dyn MetadataStore>) -> Self {
        Self {
            tasks: Arc::new(Mutex::new(HashMap::new())),
            metadata,
        }
    }

    /// Register a spawned job task.
    pub async fn register(&self, run_id: Uuid, kind: JobKind, handle: JoinHandle<()>) {
        self.tasks.lock().await.insert(run_id, (kind, handle));
    }

    /// Spawn a watchdog task that periodically checks for panicked tasks.
    /// Returns the watchdog's JoinHandle (caller should keep it to prevent
    /// early termination).
    pub fn spawn_watchdog(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(10)).await;
                self.check_tasks().await;
            }
        })
    }

    /// Check all tracked tasks for completion or panics.
    async fn check_tasks(&self) {
        let mut finished = Vec::new();

        // Collect finished task handles while holding the mutex briefly
        {
            let mut tasks = self.tasks.lock().await;
            let done: Vec<Uuid> = tasks
                .iter()
                .filter(|(_, (_, handle))| handle.is_finished())
                .map(|(run_id, _)| *run_id)
                .collect();
            for run_id in done {
                if let Some(entry) = tasks.remove(&run_id) {
                    finished.push((run_id, entry));
                }
            }
        }

        // Process finished tasks without holding the mutex
        for (run_id, (kind, handle)) in finished {
            match handle.await {
                Err(join_err) if join_err.is_panic() => {
                    crate::metrics::JOBS_ACTIVE.dec();
                    crate::metrics::JOBS_PANICKED.inc();
                    tracing::error!(
                        run_id = %run_id,
                        kind = kind.as_str(),
                        panic = ?join_err,
                        "Background job task panicked"
                    );

                    if kind == JobKind::CatalogSync {
                        // Fail the checkpoint over so the next scheduled
                        // run is not blocked by a phantom 'running' state.
                        if let Err(e) = self
                            .metadata
                            .force_fail_running_sync(
                                CATALOG_SYNC_KEY,
                                "sync task panicked",
                                time::OffsetDateTime::now_utc(),
                            )
                            .await
                        {
                            tracing::error!(
                                run_id = %run_id,
                                error = %e,
                                "Failed to mark panicked sync run as errored"
                            );
                        }
                    }
                }
                Err(join_err) if join_err.is_cancelled() => {
                    crate::metrics::JOBS_ACTIVE.dec();
                    tracing::warn!(run_id = %run_id, kind = kind.as_str(), "Job task was cancelled");
                }
                Ok(()) => {
                    tracing::debug!(run_id = %run_id, kind = kind.as_str(), "Job task completed");
                }
                Err(e) => {
                    crate::metrics::JOBS_ACTIVE.dec();
                    tracing::error!(
                        run_id = %run_id,
                        kind = kind.as_str(),
                        error = ?e,
                        "Job task failed with unknown error"
                    );
                }
            }
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Metadata store.
    pub metadata: Arc<dyn MetadataStore>,
    /// Fixed-window quota gate.
    pub quota: QuotaGate,
    /// Background job registry for panic detection.
    pub jobs: Arc<JobTaskRegistry>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Performs configuration validation and logs warnings for
    /// questionable settings.
    ///
    /// # Panics
    ///
    /// Panics if configuration validation fails with an error.
    pub fn new(
        config: AppConfig,
        metadata: Arc<dyn MetadataStore>,
        jobs: Arc<JobTaskRegistry>,
    ) -> Self {
        match config.quota.validate() {
            Ok(warnings) => {
                for warning in warnings {
                    tracing::warn!("Configuration warning: {}", warning);
                }
            }
            Err(error) => {
                panic!("Invalid quota configuration: {error}");
            }
        }
        if let Err(error) = config.catalog.validate() {
            panic!("Invalid catalog configuration: {error}");
        }
        if let Err(error) = config.backfill.validate() {
            panic!("Invalid backfill configuration: {error}");
        }

        let quota = QuotaGate::new(metadata.clone(), config.quota.clone());

        Self {
            config: Arc::new(config),
            metadata,
            quota,
            jobs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pavilion_core::config::AppConfig;
    use pavilion_metadata::SqliteStore;
    use tempfile::tempdir;

    async fn build_state(config: AppConfig) -> (tempfile::TempDir, AppState) {
        let temp = tempdir().unwrap();
        let metadata: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(temp.path().join("metadata.db"))
                .await
                .unwrap(),
        );
        let jobs = Arc::new(JobTaskRegistry::new(metadata.clone()));
        let state = AppState::new(config, metadata, jobs);
        (temp, state)
    }

    #[tokio::test]
    async fn state_builds_with_test_config() {
        let (_temp, state) = build_state(AppConfig::for_testing()).await;
        assert!(!state.quota.is_enabled());
    }

    #[tokio::test]
    #[should_panic(expected = "Invalid quota configuration")]
    async fn state_rejects_zero_window() {
        let mut config = AppConfig::for_testing();
        config.quota.enabled = true;
        config.quota.window_secs = 0;
        let _ = build_state(config).await;
    }
}
