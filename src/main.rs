// =============================================================================
// Candle Indicators: Main Entry Point
// =============================================================================
//
// Polls Bybit klines into a bounded candle window, recomputes every configured
// indicator over it and serves the results over REST and WebSocket.
// =============================================================================

// ── Module declarations ──────────────────────────────────────────────────────
mod api;
mod app_state;
mod definitions;
mod engine;
mod indicators;
mod market_data;
mod results_cache;
mod runtime_config;
mod types;

use std::sync::Arc;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::app_state::AppState;
use crate::definitions::JsonDefinitionStore;
use crate::market_data::{BybitKlineClient, CandleSource};
use crate::runtime_config::EngineConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = EngineConfig::from_env()?;
    info!(
        symbol = %config.symbol,
        category = %config.category,
        interval = %config.interval,
        window_size = config.window_size,
        poll_secs = config.poll_interval_secs,
        "candle indicators starting"
    );

    // ── 2. Definitions & shared state ────────────────────────────────────
    let store = Arc::new(JsonDefinitionStore::open(&config.definitions_path)?);
    let state = Arc::new(AppState::new(config.clone(), store));

    // ── 3. Candle poller ─────────────────────────────────────────────────
    let source: Arc<dyn CandleSource> = Arc::new(BybitKlineClient::new(&config)?);
    let poll_state = state.clone();
    let every = config.poll_interval();
    tokio::spawn(async move {
        market_data::bybit::run_candle_poller(source, poll_state, every).await;
    });

    // ── 4. API server ────────────────────────────────────────────────────
    let app = api::rest::router(state.clone());
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind API server on {}", config.bind_addr))?;
    info!(addr = %config.bind_addr, "API server listening");

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            error!(error = %e, "API server failed");
        }
    });

    info!("All subsystems running. Press Ctrl+C to stop.");

    // ── 5. Graceful shutdown ─────────────────────────────────────────────
    tokio::signal::ctrl_c().await?;
    warn!("Shutdown signal received, stopping");

    info!(
        definitions = state.engine.get_results().len(),
        "candle indicators shut down complete"
    );
    Ok(())
}
