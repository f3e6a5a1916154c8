//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Default page size for skill listings.
    #[serde(default = "default_list_page_size")]
    pub list_page_size: u32,
    /// Maximum page size a client may request.
    #[serde(default = "default_max_list_page_size")]
    pub max_list_page_size: u32,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    /// SECURITY: when enabled, restrict this endpoint to authorized
    /// scraper IPs at the infrastructure level.
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_list_page_size() -> u32 {
    25
}

fn default_max_list_page_size() -> u32 {
    100
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            list_page_size: default_list_page_size(),
            max_list_page_size: default_max_list_page_size(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

/// Metadata store configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MetadataConfig {
    /// Database file path.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./data/pavilion.db")
}

impl Default for MetadataConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Admin API key configuration.
///
/// The admin key is required for server operation. It provides initial
/// access to manage API keys, trigger syncs, and moderate skills. If the
/// key hash changes between restarts, the previous admin key is revoked
/// and a new one is created.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AdminConfig {
    /// Pre-computed hash of the admin API key (SHA256 hex, 64 characters).
    /// Generate with: `echo -n "your-secret-key" | sha256sum`
    pub key_hash: String,
    /// Description for the admin key.
    pub key_description: Option<String>,
}

impl AdminConfig {
    /// Create a test configuration with a dummy key hash.
    ///
    /// **For testing only.** The hash is deterministic but not a real key.
    pub fn for_testing() -> Self {
        Self {
            // SHA256 of "test-admin-key"
            key_hash: "944650a7cd0f9e14d5c4fb15edbffb7fa45fb9ed36a4fa9be3d7e5476ae51bd9"
                .to_string(),
            key_description: Some("Test admin key".to_string()),
        }
    }
}

/// Catalog synchronization configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Base URL of the external skills catalog API.
    #[serde(default = "default_catalog_base_url")]
    pub base_url: String,
    /// Records requested per page.
    #[serde(default = "default_catalog_page_size")]
    pub page_size: u32,
    /// Maximum pages fetched per sync invocation.
    #[serde(default = "default_catalog_max_pages")]
    pub max_pages: u32,
    /// Maximum HTTP attempts per page request.
    #[serde(default = "default_catalog_max_attempts")]
    pub max_attempts: u32,
    /// Fixed delay between retry attempts, in milliseconds.
    #[serde(default = "default_catalog_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// Request timeout in seconds.
    #[serde(default = "default_catalog_timeout_secs")]
    pub timeout_secs: u64,
    /// Enable the periodic sync job.
    #[serde(default = "default_true")]
    pub schedule_enabled: bool,
    /// Interval in seconds between sync runs.
    #[serde(default = "default_catalog_interval_secs")]
    pub interval_secs: u64,
}

fn default_catalog_base_url() -> String {
    "https://catalog.example.com/api".to_string()
}

fn default_catalog_page_size() -> u32 {
    crate::DEFAULT_CATALOG_PAGE_SIZE
}

fn default_catalog_max_pages() -> u32 {
    20
}

fn default_catalog_max_attempts() -> u32 {
    3
}

fn default_catalog_retry_delay_ms() -> u64 {
    1000
}

fn default_catalog_timeout_secs() -> u64 {
    30
}

fn default_catalog_interval_secs() -> u64 {
    900 // 15 minutes
}

fn default_true() -> bool {
    true
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: default_catalog_base_url(),
            page_size: default_catalog_page_size(),
            max_pages: default_catalog_max_pages(),
            max_attempts: default_catalog_max_attempts(),
            retry_delay_ms: default_catalog_retry_delay_ms(),
            timeout_secs: default_catalog_timeout_secs(),
            schedule_enabled: default_true(),
            interval_secs: default_catalog_interval_secs(),
        }
    }
}

impl CatalogConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Validate catalog configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.page_size == 0 || self.page_size > crate::MAX_CATALOG_PAGE_SIZE {
            return Err(format!(
                "catalog.page_size {} out of range (1..={})",
                self.page_size,
                crate::MAX_CATALOG_PAGE_SIZE
            ));
        }
        if self.max_attempts == 0 {
            return Err("catalog.max_attempts cannot be 0".to_string());
        }
        if self.schedule_enabled && self.interval_secs == 0 {
            return Err("catalog.interval_secs cannot be 0 when scheduling is enabled".to_string());
        }
        Ok(())
    }
}

/// Stat backfill configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackfillConfig {
    /// Skills processed per batch.
    #[serde(default = "default_backfill_batch_size")]
    pub batch_size: u32,
    /// Maximum batches per invocation.
    #[serde(default = "default_backfill_max_batches")]
    pub max_batches: u32,
    /// Enable the periodic backfill job.
    #[serde(default = "default_true")]
    pub schedule_enabled: bool,
    /// Interval in seconds between backfill invocations.
    #[serde(default = "default_backfill_interval_secs")]
    pub interval_secs: u64,
}

fn default_backfill_batch_size() -> u32 {
    100
}

fn default_backfill_max_batches() -> u32 {
    10
}

fn default_backfill_interval_secs() -> u64 {
    300 // 5 minutes
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            batch_size: default_backfill_batch_size(),
            max_batches: default_backfill_max_batches(),
            schedule_enabled: default_true(),
            interval_secs: default_backfill_interval_secs(),
        }
    }
}

impl BackfillConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    /// Validate backfill configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.batch_size == 0 {
            return Err("backfill.batch_size cannot be 0".to_string());
        }
        if self.max_batches == 0 {
            return Err("backfill.max_batches cannot be 0".to_string());
        }
        if self.schedule_enabled && self.interval_secs == 0 {
            return Err("backfill.interval_secs cannot be 0 when scheduling is enabled".to_string());
        }
        Ok(())
    }
}

/// Fixed-window quota configuration for agent write traffic.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QuotaConfig {
    /// Enable quota enforcement.
    #[serde(default)]
    pub enabled: bool,
    /// Window size in seconds. Windows are deterministic fixed-size
    /// buckets aligned to the epoch, not sliding.
    #[serde(default = "default_quota_window_secs")]
    pub window_secs: u64,
    /// Maximum requests per identity per window.
    #[serde(default = "default_quota_max_requests")]
    pub max_requests: u32,
    /// How long completed windows are retained before pruning, in seconds.
    #[serde(default = "default_quota_retention_secs")]
    pub retention_secs: u64,
    /// Interval in seconds between pruning sweeps of expired windows.
    #[serde(default = "default_quota_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

fn default_quota_window_secs() -> u64 {
    60
}

fn default_quota_max_requests() -> u32 {
    100
}

fn default_quota_retention_secs() -> u64 {
    86400 // 24 hours
}

fn default_quota_cleanup_interval_secs() -> u64 {
    3600 // hourly sweep
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            window_secs: default_quota_window_secs(),
            max_requests: default_quota_max_requests(),
            retention_secs: default_quota_retention_secs(),
            cleanup_interval_secs: default_quota_cleanup_interval_secs(),
        }
    }
}

impl QuotaConfig {
    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    /// Validate quota configuration for dangerous settings.
    /// Returns warnings for configs that are allowed but questionable,
    /// and errors for configs that would misbehave at runtime.
    pub fn validate(&self) -> Result<Vec<String>, String> {
        let mut warnings = Vec::new();

        if !self.enabled {
            return Ok(warnings);
        }

        if self.window_secs == 0 {
            return Err("quota.window_secs cannot be 0".to_string());
        }
        if self.max_requests == 0 {
            return Err("quota.max_requests cannot be 0; disable the quota instead".to_string());
        }
        if self.cleanup_interval_secs == 0 {
            return Err(
                "quota.cleanup_interval_secs cannot be 0. \
                 This would cause a panic when creating the cleanup timer. \
                 Use a value >= 1 second."
                    .to_string(),
            );
        }
        if self.retention_secs < self.window_secs * 2 {
            warnings.push(format!(
                "quota.retention_secs={} is shorter than two windows; \
                 counters may be pruned while still relevant for diagnostics. \
                 Recommended minimum: {} seconds.",
                self.retention_secs,
                self.window_secs * 2
            ));
        }

        Ok(warnings)
    }
}

/// Identity provider webhook configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Shared signing secret, base64-encoded. May carry a `whsec_` prefix.
    pub secret: String,
    /// Maximum accepted clock skew on the signed timestamp, in seconds.
    #[serde(default = "default_webhook_tolerance_secs")]
    pub tolerance_secs: u64,
}

fn default_webhook_tolerance_secs() -> u64 {
    300
}

impl WebhookConfig {
    /// Create a test configuration with a fixed secret.
    ///
    /// **For testing only.**
    pub fn for_testing() -> Self {
        Self {
            secret: "whsec_dGVzdC13ZWJob29rLXNlY3JldA==".to_string(),
            tolerance_secs: default_webhook_tolerance_secs(),
        }
    }
}

/// AI categorization configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CategorizeConfig {
    /// Enable the periodic categorization job.
    #[serde(default)]
    pub enabled: bool,
    /// Base URL of the completion API.
    #[serde(default = "default_categorize_base_url")]
    pub base_url: String,
    /// API key for the completion API, if required.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Model identifier sent with each completion request.
    #[serde(default = "default_categorize_model")]
    pub model: String,
    /// Skills categorized per invocation.
    #[serde(default = "default_categorize_batch_size")]
    pub batch_size: u32,
    /// Interval in seconds between categorization runs.
    #[serde(default = "default_categorize_interval_secs")]
    pub interval_secs: u64,
}

fn default_categorize_base_url() -> String {
    "https://api.openai.com".to_string()
}

fn default_categorize_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_categorize_batch_size() -> u32 {
    20
}

fn default_categorize_interval_secs() -> u64 {
    3600
}

impl Default for CategorizeConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: default_categorize_base_url(),
            api_key: None,
            model: default_categorize_model(),
            batch_size: default_categorize_batch_size(),
            interval_secs: default_categorize_interval_secs(),
        }
    }
}

impl CategorizeConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Metadata store configuration.
    #[serde(default)]
    pub metadata: MetadataConfig,
    /// Admin key configuration (required).
    pub admin: AdminConfig,
    /// Catalog sync configuration.
    #[serde(default)]
    pub catalog: CatalogConfig,
    /// Stat backfill configuration.
    #[serde(default)]
    pub backfill: BackfillConfig,
    /// Quota configuration.
    #[serde(default)]
    pub quota: QuotaConfig,
    /// Identity webhook configuration (optional; webhook endpoint is
    /// disabled when absent).
    pub webhook: Option<WebhookConfig>,
    /// AI categorization configuration.
    #[serde(default)]
    pub categorize: CategorizeConfig,
}

impl AppConfig {
    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Scheduling is disabled so tests drive jobs
    /// explicitly.
    pub fn for_testing() -> Self {
        let catalog = CatalogConfig {
            schedule_enabled: false,
            retry_delay_ms: 10,
            ..Default::default()
        };
        let backfill = BackfillConfig {
            schedule_enabled: false,
            ..Default::default()
        };

        Self {
            server: ServerConfig::default(),
            metadata: MetadataConfig::default(),
            admin: AdminConfig::for_testing(),
            catalog,
            backfill,
            quota: QuotaConfig::default(),
            webhook: Some(WebhookConfig::for_testing()),
            categorize: CategorizeConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quota_validate_disabled_is_quiet() {
        let config = QuotaConfig::default();
        assert!(config.validate().unwrap().is_empty());
    }

    #[test]
    fn test_quota_validate_zero_window_rejected() {
        let config = QuotaConfig {
            enabled: true,
            window_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_quota_validate_short_retention_warns() {
        let config = QuotaConfig {
            enabled: true,
            window_secs: 60,
            retention_secs: 60,
            ..Default::default()
        };
        let warnings = config.validate().unwrap();
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn test_catalog_validate_page_size_bounds() {
        let mut config = CatalogConfig::default();
        config.page_size = 0;
        assert!(config.validate().is_err());

        config.page_size = crate::MAX_CATALOG_PAGE_SIZE + 1;
        assert!(config.validate().is_err());

        config.page_size = crate::MAX_CATALOG_PAGE_SIZE;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backfill_deserialize_defaults() {
        let config: BackfillConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.batch_size, 100);
        assert_eq!(config.max_batches, 10);
        assert!(config.schedule_enabled);
    }
}
