//! Fixed-window quota gate for agent write traffic.
//!
//! Windows are deterministic epoch-aligned buckets of `window_secs`
//! seconds, not a sliding average. The counter row for
//! `(identity, window_start)` is test-and-incremented atomically in the
//! metadata store; a full window rejects without touching the counter, so
//! the count can never exceed the limit. Expired windows are pruned by a
//! background sweep rather than being left to grow.

use crate::error::{ApiError, ApiResult};
use pavilion_core::config::QuotaConfig;
use pavilion_metadata::MetadataStore;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;

/// Quota gate consulted by mutating agent-facing handlers.
#[derive(Clone)]
pub struct QuotaGate {
    metadata: Arc<dyn MetadataStore>,
    config: QuotaConfig,
}

impl QuotaGate {
    pub fn new(metadata: Arc<dyn MetadataStore>, config: QuotaConfig) -> Self {
        Self { metadata, config }
    }

    /// Check if quota enforcement is enabled.
    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    /// Compute the fixed window containing `now`.
    pub fn window_start(&self, now: OffsetDateTime) -> OffsetDateTime {
        let window = self.config.window_secs.max(1) as i64;
        let ts = now.unix_timestamp();
        let aligned = ts.div_euclid(window) * window;
        // aligned is derived from a valid timestamp, so conversion back
        // cannot fail
        OffsetDateTime::from_unix_timestamp(aligned).unwrap_or(now)
    }

    /// Test-and-increment the counter for `identity` in the current
    /// window. Rejects with a quota-exceeded error carrying the seconds
    /// until the window resets.
    pub async fn check(&self, identity: &str) -> ApiResult<()> {
        self.check_at(identity, OffsetDateTime::now_utc()).await
    }

    /// Like [`check`](Self::check) with an explicit clock, for tests.
    pub async fn check_at(&self, identity: &str, now: OffsetDateTime) -> ApiResult<()> {
        if !self.config.enabled {
            return Ok(());
        }

        let window_start = self.window_start(now);
        let allowed = self
            .metadata
            .try_increment_window(identity, window_start, self.config.max_requests as i64)
            .await?;

        if allowed {
            Ok(())
        } else {
            let window_end = window_start + time::Duration::seconds(self.config.window_secs as i64);
            let retry_after_secs = (window_end - now).whole_seconds().max(1) as u64;
            crate::metrics::QUOTA_REJECTIONS.inc();
            tracing::debug!(identity, retry_after_secs, "Quota exceeded");
            Err(ApiError::QuotaExceeded { retry_after_secs })
        }
    }
}

/// Spawn a background task that periodically prunes expired quota
/// windows. Returns the task handle.
pub fn spawn_cleanup_task(
    metadata: Arc<dyn MetadataStore>,
    config: QuotaConfig,
) -> tokio::task::JoinHandle<()> {
    let interval = config.cleanup_interval();
    let retention = Duration::from_secs(config.retention_secs);

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            let cutoff = OffsetDateTime::now_utc() - retention;
            match metadata.delete_windows_before(cutoff).await {
                Ok(0) => {}
                Ok(pruned) => {
                    tracing::info!(pruned, "Pruned expired quota windows");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Quota window pruning failed");
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pavilion_metadata::SqliteStore;

    async fn test_gate(config: QuotaConfig) -> (tempfile::TempDir, QuotaGate) {
        let temp = tempfile::tempdir().unwrap();
        let store = SqliteStore::new(temp.path().join("metadata.db"))
            .await
            .unwrap();
        let metadata: Arc<dyn MetadataStore> = Arc::new(store);
        (temp, QuotaGate::new(metadata, config))
    }

    fn at(ts: i64) -> OffsetDateTime {
        OffsetDateTime::from_unix_timestamp(ts).unwrap()
    }

    #[tokio::test]
    async fn disabled_gate_admits_everything() {
        let (_temp, gate) = test_gate(QuotaConfig::default()).await;
        for _ in 0..1000 {
            gate.check_at("token:a", at(1_700_000_000)).await.unwrap();
        }
    }

    #[tokio::test]
    async fn limit_rejects_within_window_and_resets_after() {
        let config = QuotaConfig {
            enabled: true,
            window_secs: 60,
            max_requests: 100,
            ..Default::default()
        };
        let (_temp, gate) = test_gate(config).await;

        // 101 requests inside one minute from the same key: the 101st is
        // rejected.
        let now = at(1_700_000_005);
        for _ in 0..100 {
            gate.check_at("token:a", now).await.unwrap();
        }
        let err = gate.check_at("token:a", now).await.unwrap_err();
        match err {
            ApiError::QuotaExceeded { retry_after_secs } => {
                assert!(retry_after_secs >= 1 && retry_after_secs <= 60);
            }
            other => panic!("expected QuotaExceeded, got {other:?}"),
        }

        // A different key is unaffected.
        gate.check_at("token:b", now).await.unwrap();

        // The 102nd request one window later succeeds.
        gate.check_at("token:a", at(1_700_000_065)).await.unwrap();
    }

    #[tokio::test]
    async fn window_start_is_deterministic() {
        let config = QuotaConfig {
            enabled: true,
            window_secs: 60,
            ..Default::default()
        };
        let (_temp, gate) = test_gate(config).await;

        assert_eq!(gate.window_start(at(120)), at(120));
        assert_eq!(gate.window_start(at(179)), at(120));
        assert_eq!(gate.window_start(at(180)), at(180));
    }
}
