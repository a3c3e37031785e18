//! Image Upload Service
//!
//! Stores uploaded images as base64 documents, transcoding oversized
//! uploads to WebP. REST API served with Axum.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use imgstash::api::{create_rest_router, AppState};
use imgstash::config::{Config, StorageType};
use imgstash::service::ImageService;
use imgstash::storage::{ImageStore, MemoryStore, SqliteStorage};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .init();

    info!("Starting Image Upload Service v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let path = Config::default_path();
    let config = Config::load(&path).unwrap_or_else(|e| {
        info!("Using default config ({})", e);
        Config::default()
    });
    let config = config.apply_env()?;
    config.validate()?;

    info!("Configuration loaded:");
    info!("  REST port: {}", config.server.rest_port);
    info!("  CORS enabled: {}", config.server.cors_enabled);
    info!("  Storage: {:?}", config.storage.storage_type);
    info!("  Collection: {}", config.storage.collection);
    info!("  Max base64 bytes: {}", config.limits.max_b64_bytes);

    // Initialize storage
    match config.storage.storage_type {
        StorageType::Sqlite => {
            let storage_path = config
                .storage
                .sqlite_path
                .to_str()
                .context("sqlite_path is not valid UTF-8")?;
            let storage = Arc::new(SqliteStorage::new(storage_path, &config.storage.collection).await?);
            info!("SQLite storage initialized at: {}", storage_path);
            serve(storage, &config).await
        }
        StorageType::Memory => {
            info!("In-memory storage initialized; records are lost on shutdown");
            serve(Arc::new(MemoryStore::new()), &config).await
        }
    }
}

async fn serve<S: ImageStore>(storage: Arc<S>, config: &Config) -> Result<()> {
    let service = Arc::new(ImageService::from_config(storage, config));
    let app_state = Arc::new(AppState::new(service));
    let rest_router = create_rest_router(app_state, &config.server);

    let addr = format!("0.0.0.0:{}", config.server.rest_port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("REST API listening on http://{}", addr);
    info!("REST: http://localhost:{}/health", config.server.rest_port);

    axum::serve(listener, rest_router)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received, cleaning up...");
        })
        .await?;

    info!("Goodbye!");
    Ok(())
}
