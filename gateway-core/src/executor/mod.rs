//! Execution of claimed orders against the venue.
//!
//! The orchestrator pulls queued orders, resolves every input the
//! sizing engine needs from the caches, and submits whatever survives.
//! Each attempt produces a trace with the intermediate figures so a
//! rejected batch can be diagnosed without replaying it.

use crate::exchange::{
    snippet, OrderVenue, SubmitOrder, SubmitPayload, GOOD_TILL_CANCEL,
};
use crate::market_data::MarketDataCache;
use crate::model::{derive_pair, MarginCurrency, QueuedOrder};
use crate::queue::{ExecutionOutcome, OrderQueue};
use crate::sizing::{size_order, SizedOrder, SizingError, SizingRequest};
use crate::wallet::{WalletCache, WalletLookup};
use chrono::Utc;
use log::{info, warn};
use serde::Serialize;
use std::sync::Arc;

/// Every order is margined in INR on this venue.
const MARGIN_CURRENCY: MarginCurrency = MarginCurrency::Inr;

/// One order's journey through an execution pass.
#[derive(Debug, Clone, Serialize)]
pub struct AttemptTrace {
    pub id: u64,
    pub symbol: String,
    /// Whether a submission actually left for the venue.
    pub sent: bool,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Sizing figures, present once sizing succeeded.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit: Option<SizedOrder>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_body: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
}

impl AttemptTrace {
    fn start(id: u64, symbol: &str) -> Self {
        Self {
            id,
            symbol: symbol.to_string(),
            sent: false,
            success: false,
            error: None,
            audit: None,
            response_status: None,
            response_body: None,
            client_order_id: None,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedOrder {
    pub id: u64,
    pub error: String,
}

/// Aggregate result of one execution pass.
#[derive(Debug, Default, Serialize)]
pub struct BatchOutcome {
    pub executed: Vec<QueuedOrder>,
    pub failed: Vec<FailedOrder>,
    pub not_found: Vec<u64>,
    pub debug: Vec<AttemptTrace>,
}

enum Attempt {
    Submitted {
        client_order_id: String,
        trace: AttemptTrace,
    },
    Failed {
        code: String,
        trace: AttemptTrace,
    },
}

impl Attempt {
    fn fail(mut trace: AttemptTrace, code: &str) -> Self {
        trace.error = Some(code.to_string());
        Attempt::Failed {
            code: code.to_string(),
            trace,
        }
    }
}

/// Hands unsettled claims back to the queue if an execution pass is
/// dropped before finishing. A disconnecting HTTP caller cancels the
/// handler future anywhere between claim and settlement; without the
/// give-back those orders would sit in pending forever.
struct ClaimGuard {
    queue: Arc<OrderQueue>,
    unsettled: Vec<u64>,
}

impl ClaimGuard {
    fn new(queue: Arc<OrderQueue>, claimed: &[QueuedOrder]) -> Self {
        Self {
            queue,
            unsettled: claimed.iter().map(QueuedOrder::id).collect(),
        }
    }

    fn settled(&mut self, id: u64) {
        self.unsettled.retain(|&left| left != id);
    }
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        for &id in &self.unsettled {
            if self.queue.release_claim(id) {
                warn!("order {id}: execution pass dropped mid-flight, order returned to the queue");
            }
        }
    }
}

pub struct ExecutionOrchestrator {
    queue: Arc<OrderQueue>,
    market_data: Arc<MarketDataCache>,
    wallets: Arc<WalletCache>,
    venue: Arc<dyn OrderVenue>,
}

impl ExecutionOrchestrator {
    pub fn new(
        queue: Arc<OrderQueue>,
        market_data: Arc<MarketDataCache>,
        wallets: Arc<WalletCache>,
        venue: Arc<dyn OrderVenue>,
    ) -> Self {
        Self {
            queue,
            market_data,
            wallets,
            venue,
        }
    }

    /// Claims and executes the given order ids. Orders are processed
    /// one at a time; a failure settles that order and moves on rather
    /// than aborting the batch. A pass that is dropped mid-flight
    /// returns its still-unsettled claims to the queue.
    pub async fn execute_batch(&self, ids: &[u64]) -> BatchOutcome {
        let batch = self.queue.take_for_execution(ids);
        info!(
            "execution pass: {} claimed, {} not found, {} not executable",
            batch.claimed.len(),
            batch.not_found.len(),
            batch.not_executable.len()
        );

        let mut outcome = BatchOutcome {
            not_found: batch.not_found,
            ..BatchOutcome::default()
        };
        let mut guard = ClaimGuard::new(Arc::clone(&self.queue), &batch.claimed);

        for &id in &batch.not_executable {
            let symbol = self
                .queue
                .get(id)
                .map(|o| o.symbol().to_string())
                .unwrap_or_default();
            let mut trace = AttemptTrace::start(id, &symbol);
            trace.error = Some("order_not_executable".to_string());
            outcome.debug.push(trace);
            outcome.failed.push(FailedOrder {
                id,
                error: "order_not_executable".to_string(),
            });
        }

        for order in &batch.claimed {
            match self.attempt(order).await {
                Attempt::Submitted {
                    client_order_id,
                    trace,
                } => {
                    if let Some(done) = self
                        .queue
                        .finish_execution(order.id(), ExecutionOutcome::Submitted { client_order_id })
                    {
                        outcome.executed.push(done);
                    }
                    outcome.debug.push(trace);
                }
                Attempt::Failed { code, trace } => {
                    self.queue.finish_execution(
                        order.id(),
                        ExecutionOutcome::Failed { error: code.clone() },
                    );
                    outcome.failed.push(FailedOrder {
                        id: order.id(),
                        error: code,
                    });
                    outcome.debug.push(trace);
                }
            }
            guard.settled(order.id());
        }

        info!(
            "execution pass done: {} executed, {} failed",
            outcome.executed.len(),
            outcome.failed.len()
        );
        outcome
    }

    async fn attempt(&self, order: &QueuedOrder) -> Attempt {
        let mut trace = AttemptTrace::start(order.id(), order.symbol());
        let pair = derive_pair(order.symbol());
        info!(
            "executing order {}: {} {} notional {} INR at {}x ({pair})",
            order.id(),
            order.side(),
            order.symbol(),
            order.qty(),
            order.leverage()
        );

        // Limit orders size against their own price; market orders use
        // the cached mark price.
        let price = match order.limit_price().filter(|p| *p > 0.0) {
            Some(p) => Some(p),
            None => self.market_data.price(order.symbol()).await,
        };
        let Some(price) = price else {
            warn!("order {}: no price for {}", order.id(), order.symbol());
            return Attempt::fail(trace, "no_price_available");
        };

        let balance = match self.wallets.wallet(MARGIN_CURRENCY.as_str()).await {
            WalletLookup::Found(wallet) => {
                info!(
                    "order {}: using futures INR wallet id={} balance={} locked={}",
                    order.id(),
                    wallet.id,
                    wallet.balance,
                    wallet.locked_balance
                );
                wallet.balance
            }
            WalletLookup::Missing | WalletLookup::Unavailable => {
                warn!("order {}: no INR futures wallet", order.id());
                return Attempt::fail(trace, "no_inr_futures_wallet");
            }
        };

        let active = self.market_data.active_instruments(MARGIN_CURRENCY).await;
        // Membership is decided before the per-instrument fetch, so an
        // inactive pair never triggers a metadata lookup.
        if !active.contains(&pair) {
            let err = SizingError::InstrumentNotActive { pair: pair.clone() };
            warn!("order {}: {err}", order.id());
            return Attempt::fail(trace, err.code());
        }

        let Some(spec) = self.market_data.instrument(&pair, MARGIN_CURRENCY).await else {
            warn!("order {}: no instrument metadata for {pair}", order.id());
            return Attempt::fail(trace, "instrument_unavailable");
        };

        let fx_rate = self.market_data.usdt_inr_rate().await;

        let sized = match size_order(&SizingRequest {
            pair: &pair,
            notional_inr: order.qty(),
            mark_price: price,
            fx_rate,
            leverage: order.leverage(),
            wallet_balance: balance,
            spec: &spec,
            active_pairs: &active,
        }) {
            Ok(sized) => sized,
            Err(err) => {
                warn!("order {} rejected by sizing: {err}", order.id());
                return Attempt::fail(trace, err.code());
            }
        };
        trace.audit = Some(sized.clone());

        let timestamp = Utc::now().timestamp_millis();
        let client_order_id = format!("{}-{}", order.id(), timestamp);
        trace.client_order_id = Some(client_order_id.clone());

        let payload = SubmitPayload {
            timestamp,
            order: SubmitOrder {
                pair,
                side: order.side().as_exchange_str().to_string(),
                order_type: order.order_type().as_exchange_str().to_string(),
                price,
                total_quantity: sized.quantity,
                leverage: order.leverage(),
                time_in_force: GOOD_TILL_CANCEL.to_string(),
                margin_currency_short_name: MARGIN_CURRENCY.as_str().to_string(),
                client_order_id: client_order_id.clone(),
            },
        };

        trace.sent = true;
        match self.venue.submit_order(&payload).await {
            Err(err) => {
                warn!("order {} submission failed: {err}", order.id());
                Attempt::fail(trace, "upstream_error")
            }
            Ok(receipt) => {
                trace.response_status = Some(receipt.status);
                trace.response_body = Some(snippet(&receipt.body));
                if receipt.is_accepted() {
                    trace.success = true;
                    info!(
                        "order {} accepted by venue as {client_order_id} (qty {})",
                        order.id(),
                        sized.quantity
                    );
                    Attempt::Submitted {
                        client_order_id,
                        trace,
                    }
                } else {
                    warn!(
                        "order {} rejected by venue with {}: {}",
                        order.id(),
                        receipt.status,
                        snippet(&receipt.body)
                    );
                    Attempt::fail(trace, "upstream_error")
                }
            }
        }
    }
}
