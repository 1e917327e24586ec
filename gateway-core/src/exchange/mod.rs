//! Access to the derivatives venue: signed REST client, response
//! decoding, and the seams the rest of the gateway tests against.

use crate::model::{InstrumentSpec, MarginCurrency, Wallet};
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

pub mod client;
pub mod mock;
pub mod parse;
pub mod signing;

pub use client::DerivativesClient;

/// Time-in-force the venue expects on every futures order.
pub const GOOD_TILL_CANCEL: &str = "good_till_cancel";

#[derive(Debug, Error)]
pub enum ExchangeError {
    #[error("transport error talking to the venue: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("venue returned {status} from {endpoint}: {body}")]
    Status {
        endpoint: &'static str,
        status: u16,
        body: String,
    },
    #[error("unexpected {endpoint} response shape: {detail}")]
    Shape {
        endpoint: &'static str,
        detail: String,
    },
    #[error("could not encode request body: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("venue credentials are not configured")]
    MissingCredentials,
}

/// Signed order-create body. Field order matters: the signature is
/// computed over the serialized bytes, so this struct is serialized
/// exactly once per submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitPayload {
    pub timestamp: i64,
    pub order: SubmitOrder,
}

#[derive(Debug, Clone, Serialize)]
pub struct SubmitOrder {
    pub pair: String,
    pub side: String,
    pub order_type: String,
    pub price: f64,
    pub total_quantity: f64,
    pub leverage: u32,
    pub time_in_force: String,
    pub margin_currency_short_name: String,
    pub client_order_id: String,
}

/// Raw venue answer to an order submission. The gateway treats 200/201
/// as accepted and keeps the body for diagnostics.
#[derive(Debug, Clone)]
pub struct OrderReceipt {
    pub status: u16,
    pub body: String,
}

impl OrderReceipt {
    pub fn is_accepted(&self) -> bool {
        matches!(self.status, 200 | 201)
    }
}

/// Public market data endpoints (no signature required).
#[async_trait]
pub trait MarketSource: Send + Sync {
    /// Full ticker dump, one loosely-typed entry per market.
    async fn fetch_tickers(&self) -> Result<Vec<Value>, ExchangeError>;

    /// Pairs currently tradable for the given margin currency.
    async fn fetch_active_instruments(
        &self,
        margin_currency: MarginCurrency,
    ) -> Result<Vec<String>, ExchangeError>;

    /// Sizing metadata for one pair.
    async fn fetch_instrument(
        &self,
        pair: &str,
        margin_currency: MarginCurrency,
    ) -> Result<InstrumentSpec, ExchangeError>;
}

/// Signed wallet endpoint.
#[async_trait]
pub trait WalletSource: Send + Sync {
    async fn fetch_wallets(&self) -> Result<Vec<Wallet>, ExchangeError>;
}

/// Signed order placement.
#[async_trait]
pub trait OrderVenue: Send + Sync {
    async fn submit_order(&self, payload: &SubmitPayload) -> Result<OrderReceipt, ExchangeError>;
}

/// Clips response bodies before they land in errors or traces.
pub(crate) fn snippet(text: &str) -> String {
    const MAX_CHARS: usize = 300;
    if text.chars().count() <= MAX_CHARS {
        text.to_string()
    } else {
        let mut out: String = text.chars().take(MAX_CHARS).collect();
        out.push_str("...");
        out
    }
}
