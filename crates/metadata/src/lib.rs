//! Metadata store abstraction and SQLite implementation for Pavilion.
//!
//! This crate provides the control-plane data model:
//! - Cached catalog entries and their locally-owned counters
//! - Sync and backfill checkpoints with CAS semantics
//! - Fixed-window quota counters
//! - Reviews, votes, agents, API keys
//! - Users mirrored from the identity provider

pub mod error;
pub mod models;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use store::{MetadataStore, SqliteStore};

use pavilion_core::config::MetadataConfig;
use std::sync::Arc;

/// Create a metadata store from configuration.
pub async fn from_config(config: &MetadataConfig) -> MetadataResult<Arc<dyn MetadataStore>> {
    let store = SqliteStore::new(&config.path).await?;
    Ok(Arc::new(store) as Arc<dyn MetadataStore>)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pavilion_core::config::MetadataConfig;

    #[tokio::test]
    async fn test_from_config_sqlite() {
        let temp_dir = tempfile::tempdir().unwrap();
        let db_path = temp_dir.path().join("pavilion.db");
        let config = MetadataConfig {
            path: db_path.clone(),
        };

        let store = from_config(&config).await.unwrap();
        store.health_check().await.unwrap();
        assert!(db_path.exists());
    }
}
