use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::http::HeaderValue;
use tower_http::cors::{Any, CorsLayer};
use tracing::info;
use tracing_subscriber::EnvFilter;

mod client;
mod config;
mod error;
mod form;
mod models;
mod render;
mod routes;
mod session;
mod suggest;


use client::HttpHrApi;
use config::{DashboardConfig, DEFAULT_CONFIG_PATH};
use routes::{create_router, AppState};

const EVICTION_SWEEP: Duration = Duration::from_secs(60);

/// Dashboard view-model service.
/// Session state lives in memory only; all data comes from the upstream API.
#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let config = DashboardConfig::load(&config_path)
        .with_context(|| format!("Failed to load config: {}", config_path.display()))?;

    init_tracing(&config.log_filter);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        upstream = %config.api_base_url,
        timeout_secs = config.request_timeout_secs,
        session_idle_secs = config.session_idle_secs,
        "Starting HR dashboard API"
    );

    let api = HttpHrApi::new(&config.api_base_url, config.request_timeout())
        .context("Failed to build upstream HTTP client")?;
    let state = AppState::new(Arc::new(api));
    let idle = config.session_idle();
    let _sweeper = state
        .sessions
        .spawn_eviction(idle, idle.min(EVICTION_SWEEP).max(Duration::from_secs(1)));

    let origin: HeaderValue = config
        .frontend_url
        .parse()
        .with_context(|| format!("Invalid frontend_url: {}", config.frontend_url))?;
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state).layer(cors);

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!("Server running on http://{}", config.bind);

    axum::serve(listener, app).await?;
    Ok(())
}

fn init_tracing(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}
