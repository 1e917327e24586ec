use chrono::{DateTime, Utc};
use gateway_core::{
    ExecutionOrchestrator, GatewayConfig, MarketDataCache, OrderQueue, PriceHub, WalletCache,
};
use std::sync::Arc;

/// Shared handles every HTTP and websocket handler works against.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<GatewayConfig>,
    pub market_data: Arc<MarketDataCache>,
    pub wallets: Arc<WalletCache>,
    pub queue: Arc<OrderQueue>,
    pub executor: Arc<ExecutionOrchestrator>,
    pub hub: Arc<PriceHub>,
    pub started_at: DateTime<Utc>,
}
