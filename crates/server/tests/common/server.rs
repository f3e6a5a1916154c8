//! Server test utilities.

use pavilion_core::config::AppConfig;
use pavilion_metadata::{MetadataStore, SqliteStore};
use pavilion_server::bootstrap::ensure_admin_key;
use pavilion_server::{AppState, JobTaskRegistry, create_router};
use std::sync::Arc;
use tempfile::TempDir;

/// Raw admin API key matching `AdminConfig::for_testing()`.
pub const TEST_ADMIN_KEY: &str = "test-admin-key";

/// A test server wrapper with all dependencies.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestServer {
    pub router: axum::Router,
    pub state: AppState,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestServer {
    /// Create a new test server over a temporary SQLite database.
    pub async fn new() -> Self {
        Self::with_config(|_| {}).await
    }

    /// Create a test server with custom config modifications.
    pub async fn with_config<F>(modifier: F) -> Self
    where
        F: FnOnce(&mut AppConfig),
    {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");

        let db_path = temp_dir.path().join("pavilion.db");
        let metadata: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(&db_path)
                .await
                .expect("Failed to create metadata store"),
        );

        let mut config = AppConfig::for_testing();
        config.metadata.path = db_path;
        modifier(&mut config);

        ensure_admin_key(metadata.as_ref(), &config.admin)
            .await
            .expect("Failed to bootstrap admin key");

        let job_registry = Arc::new(JobTaskRegistry::new(metadata.clone()));
        let state = AppState::new(config, metadata, job_registry);
        let router = create_router(state.clone());

        Self {
            router,
            state,
            _temp_dir: temp_dir,
        }
    }

    /// Get access to the underlying metadata store.
    pub fn metadata(&self) -> Arc<dyn MetadataStore> {
        self.state.metadata.clone()
    }
}
