use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use harvester_core::{
    load_config, validate_config, ArtifactCache, ArtifactSink, CheckpointStore, ChunkedSnapshot,
    Config, DemoProvider, DocumentProvider, FetchClient, FileSnapshot, HttpProvider,
    JobOrchestrator, JobStore, SnapshotBackend, SqliteArtifactSink, SqliteCheckpointStore,
    SqliteJobStore,
};
use harvester_server::{create_router, AppState};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Determine config path
    let config_path = std::env::var("HARVESTER_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config.toml"));

    // Load configuration
    info!("Loading configuration from {:?}", config_path);
    let config = load_config(&config_path)
        .with_context(|| format!("Failed to load config from {:?}", config_path))?;

    // Validate configuration
    validate_config(&config).context("Configuration validation failed")?;

    let config_json = serde_json::to_string(&config).unwrap_or_default();
    let config_hash = format!("{:x}", Sha256::digest(config_json.as_bytes()));
    info!(config_hash = &config_hash[..16], "Configuration loaded successfully");
    info!("Database path: {:?}", config.database.path);

    // SQLite stores share one database file
    let job_store: Arc<dyn JobStore> = Arc::new(
        SqliteJobStore::new(&config.database.path).context("Failed to create job store")?,
    );
    info!("Job store initialized");

    let checkpoints: Arc<dyn CheckpointStore> = Arc::new(
        SqliteCheckpointStore::new(&config.database.path)
            .context("Failed to create checkpoint store")?,
    );
    info!("Checkpoint store initialized");

    let sink: Arc<dyn ArtifactSink> = Arc::new(
        SqliteArtifactSink::new(&config.database.path)
            .context("Failed to create artifact sink")?,
    );

    // Reload the artifact cache from its last snapshot
    let cache = Arc::new(load_cache(&config).await?);
    let stats = cache.stats();
    info!(
        entries = stats.entries,
        live = stats.live,
        fallback = stats.fallback,
        "Artifact cache loaded"
    );

    let fetch_client = FetchClient::new(
        create_provider(&config)?,
        Duration::from_secs(config.provider.timeout_secs),
    );
    info!(
        provider = fetch_client.provider_name(),
        timeout_secs = fetch_client.timeout().as_secs(),
        "Fetch client ready"
    );

    let orchestrator = Arc::new(
        JobOrchestrator::new(
            config.orchestrator.clone(),
            job_store,
            checkpoints,
            Arc::clone(&cache),
            fetch_client,
        )
        .with_sink(sink),
    );

    if config.orchestrator.enabled {
        orchestrator
            .start()
            .await
            .context("Failed to start orchestrator")?;
    } else {
        // Jobs can still be created and inspected; nothing runs them.
        orchestrator
            .recover()
            .context("Failed to recover interrupted jobs")?;
        info!("Orchestrator disabled in config");
    }

    // Create app state
    let state = Arc::new(AppState::new(config.clone(), Arc::clone(&orchestrator)));

    // Create router
    let app = create_router(state);

    // Start server
    let addr = SocketAddr::new(config.server.host, config.server.port);
    info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    if orchestrator.is_running() {
        info!("Stopping orchestrator...");
        orchestrator.stop().await;
    }

    // Final forced snapshot so nothing fetched since the last one is lost
    info!("Server shutting down...");
    let snapshot = tokio::task::spawn_blocking(move || cache.force_snapshot())
        .await
        .context("Snapshot task panicked")?;
    match snapshot {
        Ok(_) => info!("Artifact cache snapshot written"),
        Err(e) => warn!("Final cache snapshot failed: {}", e),
    }

    Ok(())
}

async fn load_cache(config: &Config) -> Result<ArtifactCache> {
    let backend: Arc<dyn SnapshotBackend> = match config.cache.chunk_size {
        Some(chunk_size) => {
            info!(
                "Using chunked cache snapshots in {:?} ({} per chunk)",
                config.cache.path, chunk_size
            );
            Arc::new(ChunkedSnapshot::new(config.cache.path.clone(), chunk_size))
        }
        None => {
            info!("Using cache snapshot file {:?}", config.cache.path);
            Arc::new(FileSnapshot::new(config.cache.path.clone()))
        }
    };

    tokio::task::spawn_blocking(move || ArtifactCache::load(backend))
        .await
        .context("Cache load task panicked")
}

fn create_provider(config: &Config) -> Result<Arc<dyn DocumentProvider>> {
    match config.provider.credential() {
        Some(api_key) => {
            info!("Using document provider at {}", config.provider.base_url);
            let provider = HttpProvider::new(&config.provider, api_key)
                .context("Failed to create HTTP provider")?;
            Ok(Arc::new(provider))
        }
        None => {
            warn!("No provider api_key configured, running in demo mode (fallback artifacts only)");
            Ok(Arc::new(DemoProvider::new()))
        }
    }
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
