//! In-memory venue doubles used by unit and integration tests.

use super::{
    ExchangeError, MarketSource, OrderReceipt, OrderVenue, SubmitPayload, WalletSource,
};
use crate::model::{InstrumentSpec, MarginCurrency, Wallet};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

enum ScriptedSubmit {
    Receipt(OrderReceipt),
    Failure(String),
}

/// Order venue double. Records every submitted payload; by default it
/// accepts everything with a 201, individual outcomes can be queued up
/// front with `push_receipt` / `push_failure`.
#[derive(Default)]
pub struct MockVenue {
    script: Mutex<VecDeque<ScriptedSubmit>>,
    submitted: Mutex<Vec<SubmitPayload>>,
}

impl MockVenue {
    pub fn accepting() -> Self {
        Self::default()
    }

    pub fn push_receipt(&self, status: u16, body: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(ScriptedSubmit::Receipt(OrderReceipt {
                status,
                body: body.to_string(),
            }));
    }

    pub fn push_failure(&self, detail: &str) {
        self.script
            .lock()
            .unwrap()
            .push_back(ScriptedSubmit::Failure(detail.to_string()));
    }

    pub fn submitted(&self) -> Vec<SubmitPayload> {
        self.submitted.lock().unwrap().clone()
    }
}

#[async_trait]
impl OrderVenue for MockVenue {
    async fn submit_order(&self, payload: &SubmitPayload) -> Result<OrderReceipt, ExchangeError> {
        self.submitted.lock().unwrap().push(payload.clone());
        match self.script.lock().unwrap().pop_front() {
            Some(ScriptedSubmit::Receipt(receipt)) => Ok(receipt),
            Some(ScriptedSubmit::Failure(detail)) => Err(ExchangeError::Shape {
                endpoint: "mock",
                detail,
            }),
            None => Ok(OrderReceipt {
                status: 201,
                body: r#"{"status":"accepted"}"#.to_string(),
            }),
        }
    }
}

/// Market data double backed by plain maps. Tests flip prices or force
/// failures between calls to drive cache behaviour.
#[derive(Default)]
pub struct StaticMarketSource {
    tickers: Mutex<Vec<Value>>,
    active: Mutex<Vec<String>>,
    instruments: Mutex<HashMap<String, InstrumentSpec>>,
    failing: Mutex<bool>,
    ticker_calls: Mutex<u32>,
    active_calls: Mutex<u32>,
    instrument_calls: Mutex<u32>,
}

impl StaticMarketSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the ticker dump with `(symbol, price)` entries.
    pub fn set_prices(&self, prices: &[(&str, f64)]) {
        let items = prices
            .iter()
            .map(|(sym, px)| serde_json::json!({"market": sym, "last_price": px}))
            .collect();
        *self.tickers.lock().unwrap() = items;
    }

    pub fn set_active(&self, pairs: &[&str]) {
        *self.active.lock().unwrap() = pairs.iter().map(|p| p.to_string()).collect();
    }

    pub fn set_instrument(&self, pair: &str, spec: InstrumentSpec) {
        self.instruments
            .lock()
            .unwrap()
            .insert(pair.to_string(), spec);
    }

    /// When set, every fetch answers with an error until cleared.
    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn ticker_calls(&self) -> u32 {
        *self.ticker_calls.lock().unwrap()
    }

    pub fn active_calls(&self) -> u32 {
        *self.active_calls.lock().unwrap()
    }

    pub fn instrument_calls(&self) -> u32 {
        *self.instrument_calls.lock().unwrap()
    }

    fn check_up(&self) -> Result<(), ExchangeError> {
        if *self.failing.lock().unwrap() {
            Err(ExchangeError::Shape {
                endpoint: "mock",
                detail: "scripted outage".to_string(),
            })
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MarketSource for StaticMarketSource {
    async fn fetch_tickers(&self) -> Result<Vec<Value>, ExchangeError> {
        *self.ticker_calls.lock().unwrap() += 1;
        self.check_up()?;
        Ok(self.tickers.lock().unwrap().clone())
    }

    async fn fetch_active_instruments(
        &self,
        _margin_currency: MarginCurrency,
    ) -> Result<Vec<String>, ExchangeError> {
        *self.active_calls.lock().unwrap() += 1;
        self.check_up()?;
        Ok(self.active.lock().unwrap().clone())
    }

    async fn fetch_instrument(
        &self,
        pair: &str,
        _margin_currency: MarginCurrency,
    ) -> Result<InstrumentSpec, ExchangeError> {
        *self.instrument_calls.lock().unwrap() += 1;
        self.check_up()?;
        Ok(self
            .instruments
            .lock()
            .unwrap()
            .get(pair)
            .cloned()
            .unwrap_or_default())
    }
}

/// Wallet source double.
#[derive(Default)]
pub struct StaticWallets {
    wallets: Mutex<Vec<Wallet>>,
    failing: Mutex<bool>,
    calls: Mutex<u32>,
}

impl StaticWallets {
    pub fn with_inr_balance(balance: f64) -> Self {
        let src = Self::default();
        src.set_wallets(vec![Wallet::new("w-inr", "INR", balance)]);
        src
    }

    pub fn set_wallets(&self, wallets: Vec<Wallet>) {
        *self.wallets.lock().unwrap() = wallets;
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap() = failing;
    }

    pub fn calls(&self) -> u32 {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl WalletSource for StaticWallets {
    async fn fetch_wallets(&self) -> Result<Vec<Wallet>, ExchangeError> {
        *self.calls.lock().unwrap() += 1;
        if *self.failing.lock().unwrap() {
            return Err(ExchangeError::Shape {
                endpoint: "mock",
                detail: "scripted outage".to_string(),
            });
        }
        Ok(self.wallets.lock().unwrap().clone())
    }
}
