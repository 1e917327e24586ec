//! Polled market data cache.
//!
//! One shared cache holds the last known ticker book, the active
//! instrument sets and per-pair instrument metadata. Lookups serve from
//! memory while entries are fresh; a stale or missing entry triggers an
//! inline refetch. Upstream failures never clear state: the cache keeps
//! serving the previous snapshot and retries on the next occasion.
//!
//! Writers replace whole maps under a short write lock, so readers see
//! either the old book or the new one, never a half-applied mix. After
//! every successful ticker refresh the new snapshot is handed to the
//! [`PriceHub`] for fan-out.

use crate::config::GatewayConfig;
use crate::exchange::{parse, MarketSource};
use crate::hub::PriceHub;
use crate::model::{InstrumentSpec, MarginCurrency};
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Symbol carrying the USDT/INR conversion rate in the ticker dump.
const FX_SYMBOL: &str = "USDTINR";
/// The FX rate tolerates more staleness than regular price lookups.
const FX_MAX_AGE: Duration = Duration::from_secs(30);

#[derive(Default)]
struct TickerBook {
    prices: HashMap<String, f64>,
    refreshed_at: Option<Instant>,
    refreshed_wall: Option<DateTime<Utc>>,
}

impl TickerBook {
    fn fresh_within(&self, max_age: Duration) -> bool {
        matches!(self.refreshed_at, Some(at) if at.elapsed() <= max_age)
    }
}

struct Stamped<T> {
    value: T,
    at: Instant,
}

pub struct MarketDataCache {
    source: Arc<dyn MarketSource>,
    hub: Arc<PriceHub>,
    tickers: RwLock<TickerBook>,
    active: RwLock<HashMap<MarginCurrency, Stamped<HashSet<String>>>>,
    instruments: RwLock<HashMap<(String, MarginCurrency), Stamped<InstrumentSpec>>>,
    /// Serializes refreshes so concurrent stale lookups fetch once.
    refresh_gate: tokio::sync::Mutex<()>,
    ticker_ttl: Duration,
    instrument_ttl: Duration,
    fx_fallback_rate: f64,
}

impl MarketDataCache {
    pub fn new(source: Arc<dyn MarketSource>, hub: Arc<PriceHub>, config: &GatewayConfig) -> Self {
        Self {
            source,
            hub,
            tickers: RwLock::new(TickerBook::default()),
            active: RwLock::new(HashMap::new()),
            instruments: RwLock::new(HashMap::new()),
            refresh_gate: tokio::sync::Mutex::new(()),
            ticker_ttl: Duration::from_secs_f64(config.ticker_ttl_secs),
            instrument_ttl: Duration::from_secs_f64(config.instrument_ttl_secs),
            fx_fallback_rate: config.fx_fallback_rate,
        }
    }

    /// Fetches the full ticker dump and replaces the book. Returns true
    /// on success. An empty or failed fetch leaves the previous book in
    /// place.
    pub async fn refresh(&self) -> bool {
        let _gate = self.refresh_gate.lock().await;
        self.refresh_locked().await
    }

    async fn refresh_locked(&self) -> bool {
        let items = match self.source.fetch_tickers().await {
            Ok(items) => items,
            Err(e) => {
                warn!("ticker refresh failed, serving previous snapshot: {e}");
                return false;
            }
        };
        let parsed = parse::parse_ticker_list(&items);
        if parsed.is_empty() {
            warn!(
                "ticker refresh yielded no usable entries ({} raw), keeping previous snapshot",
                items.len()
            );
            return false;
        }
        let snapshot = parsed.clone();
        {
            let mut book = self.tickers.write().unwrap();
            book.prices = parsed;
            book.refreshed_at = Some(Instant::now());
            book.refreshed_wall = Some(Utc::now());
        }
        debug!("ticker cache refreshed ({} symbols)", snapshot.len());
        let delivered = self.hub.broadcast(&snapshot);
        if delivered > 0 {
            debug!("fanned out {delivered} price ticks");
        }
        true
    }

    /// Last price for a symbol. A stale book or an unknown symbol
    /// triggers one inline refresh; if the refresh fails the previous
    /// value still answers, and `None` means the symbol is unknown.
    pub async fn price(&self, symbol: &str) -> Option<f64> {
        let symbol = symbol.trim().to_uppercase();
        if let Some(px) = self.fresh_price(&symbol) {
            return Some(px);
        }
        let _gate = self.refresh_gate.lock().await;
        // Someone else may have refreshed while we waited for the gate.
        if self.fresh_price(&symbol).is_none() {
            self.refresh_locked().await;
        }
        self.tickers.read().unwrap().prices.get(&symbol).copied()
    }

    fn fresh_price(&self, symbol: &str) -> Option<f64> {
        let book = self.tickers.read().unwrap();
        if book.fresh_within(self.ticker_ttl) {
            book.prices.get(symbol).copied()
        } else {
            None
        }
    }

    /// USDT to INR conversion rate from the ticker book, refreshed when
    /// older than [`FX_MAX_AGE`]. Falls back to the configured rate if
    /// the venue does not list the FX symbol.
    pub async fn usdt_inr_rate(&self) -> f64 {
        let usable = {
            let book = self.tickers.read().unwrap();
            book.fresh_within(FX_MAX_AGE) && book.prices.contains_key(FX_SYMBOL)
        };
        if !usable {
            self.refresh().await;
        }
        match self.tickers.read().unwrap().prices.get(FX_SYMBOL) {
            Some(&rate) if rate > 0.0 => rate,
            _ => {
                warn!(
                    "{FX_SYMBOL} not present in ticker book, using fallback rate {}",
                    self.fx_fallback_rate
                );
                self.fx_fallback_rate
            }
        }
    }

    /// Pairs currently tradable for a margin currency. Serves the
    /// cached set while fresh; on fetch failure the stale set (or an
    /// empty one) answers.
    pub async fn active_instruments(&self, margin_currency: MarginCurrency) -> HashSet<String> {
        {
            let cache = self.active.read().unwrap();
            if let Some(entry) = cache.get(&margin_currency) {
                if entry.at.elapsed() <= self.instrument_ttl {
                    return entry.value.clone();
                }
            }
        }
        match self.source.fetch_active_instruments(margin_currency).await {
            Ok(pairs) => {
                let set: HashSet<String> = pairs.into_iter().collect();
                info!(
                    "active instrument set for {margin_currency} refreshed ({} pairs)",
                    set.len()
                );
                self.active.write().unwrap().insert(
                    margin_currency,
                    Stamped {
                        value: set.clone(),
                        at: Instant::now(),
                    },
                );
                set
            }
            Err(e) => {
                warn!("active instrument fetch for {margin_currency} failed: {e}");
                let cache = self.active.read().unwrap();
                cache
                    .get(&margin_currency)
                    .map(|entry| entry.value.clone())
                    .unwrap_or_default()
            }
        }
    }

    /// Sizing metadata for one pair. `None` only when the venue cannot
    /// be reached and nothing is cached.
    pub async fn instrument(
        &self,
        pair: &str,
        margin_currency: MarginCurrency,
    ) -> Option<InstrumentSpec> {
        let key = (pair.to_string(), margin_currency);
        {
            let cache = self.instruments.read().unwrap();
            if let Some(entry) = cache.get(&key) {
                if entry.at.elapsed() <= self.instrument_ttl {
                    return Some(entry.value.clone());
                }
            }
        }
        match self.source.fetch_instrument(pair, margin_currency).await {
            Ok(spec) => {
                debug!("instrument metadata for {pair} refreshed");
                self.instruments.write().unwrap().insert(
                    key,
                    Stamped {
                        value: spec.clone(),
                        at: Instant::now(),
                    },
                );
                Some(spec)
            }
            Err(e) => {
                warn!("instrument fetch for {pair} failed: {e}");
                let cache = self.instruments.read().unwrap();
                cache.get(&key).map(|entry| entry.value.clone())
            }
        }
    }

    /// Sorted list of known symbols, fetching the book first if it has
    /// never been filled.
    pub async fn symbols(&self) -> Vec<String> {
        if self.tickers.read().unwrap().prices.is_empty() {
            self.refresh().await;
        }
        let book = self.tickers.read().unwrap();
        let mut symbols: Vec<String> = book.prices.keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn symbol_count(&self) -> usize {
        self.tickers.read().unwrap().prices.len()
    }

    /// Wall-clock time of the last successful ticker refresh.
    pub fn last_refreshed(&self) -> Option<DateTime<Utc>> {
        self.tickers.read().unwrap().refreshed_wall
    }

    /// Starts the background ticker poll loop. The returned handle is
    /// the only way to stop it; dropping the handle also ends the loop
    /// at its next wakeup.
    pub fn spawn_poller(self: &Arc<Self>, interval: Duration) -> PollerHandle {
        let cache = Arc::clone(self);
        let (stop_tx, mut stop_rx) = watch::channel(false);
        let task = tokio::spawn(async move {
            info!("ticker poller started (every {:.1}s)", interval.as_secs_f64());
            loop {
                cache.refresh().await;
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    changed = stop_rx.changed() => {
                        if changed.is_err() || *stop_rx.borrow() {
                            break;
                        }
                    }
                }
            }
            info!("ticker poller stopped");
        });
        PollerHandle {
            stop: stop_tx,
            task,
        }
    }
}

/// Handle to the background poll loop. An in-flight refresh finishes
/// before the loop observes the stop signal.
pub struct PollerHandle {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl PollerHandle {
    /// Signals the loop to stop and waits for it to wind down.
    pub async fn stop(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.task.await {
            warn!("ticker poller task ended abnormally: {e}");
        }
    }
}
