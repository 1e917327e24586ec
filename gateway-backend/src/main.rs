mod routes;
mod state;
mod ws;

use anyhow::Result;
use clap::Parser;
use gateway_core::exchange::{MarketSource, OrderVenue, WalletSource};
use gateway_core::model::MarginCurrency;
use gateway_core::{
    DerivativesClient, ExecutionOrchestrator, GatewayConfig, MarketDataCache, OrderQueue, PriceHub,
    WalletCache,
};
use log::{info, warn};
use state::AppState;
use std::sync::Arc;
use std::time::Duration;

/// HTTP and websocket gateway for INR-margined crypto futures orders.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a configuration file (TOML, YAML, or JSON)
    #[arg(long)]
    config: Option<String>,

    /// Overrides the configured HTTP port
    #[arg(long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    info!("=== Order Gateway Starting ===");

    let args = Args::parse();
    let mut config = GatewayConfig::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.server_port = port;
    }
    info!(
        "venue {} | credentials {}",
        config.base_url,
        if config.has_credentials() { "SET" } else { "not set" }
    );

    // 1. One venue client serves all three seams.
    let client = Arc::new(DerivativesClient::new(&config)?);
    let market_source: Arc<dyn MarketSource> = client.clone();
    let wallet_source: Arc<dyn WalletSource> = client.clone();
    let venue: Arc<dyn OrderVenue> = client;

    // 2. Shared state: hub, caches, queue, executor.
    let hub = Arc::new(PriceHub::new());
    let market_data = Arc::new(MarketDataCache::new(market_source, hub.clone(), &config));
    let wallets = Arc::new(WalletCache::new(wallet_source, &config));
    let queue = Arc::new(OrderQueue::new(config.max_bulk_orders));
    let executor = Arc::new(ExecutionOrchestrator::new(
        queue.clone(),
        market_data.clone(),
        wallets.clone(),
        venue,
    ));

    // 3. Prime the caches, then keep the ticker book polling.
    if market_data.refresh().await {
        info!("ticker book primed with {} symbols", market_data.symbol_count());
    } else {
        warn!("could not prime ticker book, continuing without prices");
    }
    market_data.active_instruments(MarginCurrency::Inr).await;
    if config.has_credentials() {
        wallets.refresh().await;
    }
    let poller = market_data
        .spawn_poller(Duration::from_secs_f64(config.ticker_refresh_interval_secs));

    let state = AppState {
        config: Arc::new(config),
        market_data,
        wallets,
        queue,
        executor,
        hub,
        started_at: chrono::Utc::now(),
    };

    // 4. HTTP surface.
    let addr = format!("0.0.0.0:{}", state.config.server_port);
    let app = routes::router(state);
    info!("Order Gateway listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    poller.stop().await;
    info!("=== Order Gateway Stopped ===");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("could not listen for shutdown signal: {err}");
    }
}
