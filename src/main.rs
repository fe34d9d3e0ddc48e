mod config;
mod error;
mod extract;
mod fallback;
mod generation;
mod models;
mod normalize;
mod openrouter;
mod pipeline;
mod progress;
mod prompt;
mod routes;

use anyhow::Context;
use routes::{router, AppState};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use crate::{
    config::AppConfig,
    openrouter::OpenRouterClient,
    pipeline::StoryPipeline,
    progress::{InMemoryStore, ProgressTracker},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = AppConfig::from_env();
    match &config.api_key {
        Some(key) => tracing::info!("Using API key: {}...", key.chars().take(6).collect::<String>()),
        None => tracing::warn!("OPENROUTER_API_KEY not set, serving fallback stories only"),
    }

    let generator = Arc::new(OpenRouterClient::from_config(&config));
    let state = AppState {
        development: config.development,
        progress: Arc::new(ProgressTracker::new(Arc::new(InMemoryStore::default()))),
        pipeline: Arc::new(StoryPipeline::new(config.clone(), generator)),
    };

    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}
