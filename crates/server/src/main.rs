//! Pavilion server binary.

use anyhow::{Context, Result};
use clap::Parser;
use figment::Figment;
use figment::providers::{Env, Format, Toml};
use pavilion_core::config::AppConfig;
use pavilion_metadata::repos::sync_state::CATALOG_SYNC_KEY;
use pavilion_server::bootstrap::ensure_admin_key;
use pavilion_server::{AppState, JobTaskRegistry, create_router, jobs, quota};
use std::sync::Arc;
use time::OffsetDateTime;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Pavilion - a skills directory sync and API server
#[derive(Parser, Debug)]
#[command(name = "paviliond")]
#[command(version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(
        short,
        long,
        env = "PAVILION_CONFIG",
        default_value = "config/server.toml"
    )]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Pavilion v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration (file is optional, env vars can provide/override everything)
    let config_path = std::path::Path::new(&args.config);
    let mut figment = Figment::new();
    let has_config_file = config_path.exists();

    if has_config_file {
        tracing::info!(config_path = %args.config, "Loading configuration from file");
        figment = figment.merge(Toml::file(&args.config));
    } else {
        tracing::debug!("No config file found at {}", args.config);
    }

    let has_env_config =
        std::env::vars().any(|(key, _)| key.starts_with("PAVILION_") && key != "PAVILION_CONFIG");

    if !has_config_file && !has_env_config {
        anyhow::bail!(
            "No configuration provided.\n\n\
             Provide configuration via one of:\n  \
             1. Config file: paviliond --config /path/to/config.toml\n  \
             2. Environment variables: PAVILION_SERVER__BIND=0.0.0.0:8080 \
             PAVILION_ADMIN__KEY_HASH=YOUR_KEY_HASH_HERE paviliond\n\n\
             Set PAVILION_CONFIG to specify a default config file path."
        );
    }

    if !has_config_file {
        tracing::info!("Using environment variables for configuration");
    }

    let config: AppConfig = figment
        .merge(Env::prefixed("PAVILION_").split("__"))
        .extract()
        .context("failed to load configuration")?;

    // Register Prometheus metrics
    pavilion_server::metrics::register_metrics();

    // Initialize metadata store (runs migrations)
    let metadata = pavilion_metadata::from_config(&config.metadata)
        .await
        .context("failed to initialize metadata store")?;
    tracing::info!("Metadata store initialized");

    // Initialize the admin key
    ensure_admin_key(metadata.as_ref(), &config.admin).await?;

    // Recover a checkpoint left in 'running' by an interrupted process.
    // The previous writer is gone, so the next scheduled run can reclaim it.
    let recovered = metadata
        .force_fail_running_sync(
            CATALOG_SYNC_KEY,
            "interrupted by server restart",
            OffsetDateTime::now_utc(),
        )
        .await?;
    if recovered {
        tracing::warn!("Recovered sync checkpoint stuck in 'running' from a previous process");
    }

    // Create job registry and spawn its panic watchdog
    let job_registry = Arc::new(JobTaskRegistry::new(metadata.clone()));
    let _watchdog_handle = job_registry.clone().spawn_watchdog();

    // Create application state
    let state = AppState::new(config.clone(), metadata.clone(), job_registry);

    // Spawn quota window pruning if the gate is enabled
    if config.quota.enabled {
        quota::spawn_cleanup_task(metadata.clone(), config.quota.clone());
        tracing::info!(
            interval_secs = config.quota.cleanup_interval_secs,
            retention_secs = config.quota.retention_secs,
            "Quota window pruning task spawned"
        );
    }

    // Spawn the fixed-interval job schedulers
    jobs::spawn_schedulers(state.clone());

    // Serve
    let router = create_router(state);
    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("failed to bind {}", config.server.bind))?;
    tracing::info!(bind = %config.server.bind, "Pavilion server listening");

    axum::serve(listener, router)
        .await
        .context("server error")?;

    Ok(())
}
