//! # Gateway Core Library
//!
//! Order gateway internals for INR-margined crypto futures: cached
//! market state, wallet snapshots, the order queue, and the execution
//! path that sizes and submits orders to the derivatives venue.
//!
//! ## Modules
//! - `model`: Order, instrument, and wallet types shared across the gateway.
//! - `config`: Layered runtime configuration (file, environment, secrets).
//! - `exchange`: Signed REST client for the venue plus test doubles.
//! - `market_data`: Polled ticker, instrument, and FX caches.
//! - `wallet`: Futures wallet snapshot cache.
//! - `sizing`: INR notional to contract quantity conversion and checks.
//! - `queue`: In-memory order queue with claim-once execution semantics.
//! - `executor`: Batch execution against the venue.
//! - `hub`: Price fan-out to websocket subscribers.

pub mod config;
pub mod exchange;
pub mod executor;
pub mod hub;
pub mod market_data;
pub mod model;
pub mod queue;
pub mod sizing;
pub mod wallet;

pub use config::GatewayConfig;
pub use exchange::DerivativesClient;
pub use executor::{BatchOutcome, ExecutionOrchestrator};
pub use hub::{ClientMessage, ConnectionId, PriceHub, PriceTick};
pub use market_data::MarketDataCache;
pub use model::{MarginCurrency, OrderDraft, OrderStatus, QueuedOrder};
pub use queue::{OrderQueue, QueueError};
pub use wallet::{WalletCache, WalletLookup};
