use async_trait::async_trait;
use gateway_core::exchange::mock::{MockVenue, StaticMarketSource, StaticWallets};
use gateway_core::exchange::{
    ExchangeError, MarketSource, OrderReceipt, OrderVenue, SubmitPayload, WalletSource,
    GOOD_TILL_CANCEL,
};
use gateway_core::model::{InstrumentSpec, MarginCurrency, OrderDraft, OrderKind, Side};
use gateway_core::{
    ExecutionOrchestrator, GatewayConfig, MarketDataCache, OrderQueue, OrderStatus, PriceHub,
    WalletCache,
};
use std::sync::Arc;
use std::time::Duration;

// Full wiring of the execution path: queue, market data cache, wallet
// cache, sizing, and the venue double, exactly as the backend builds it.
struct Gateway {
    queue: Arc<OrderQueue>,
    market: Arc<StaticMarketSource>,
    venue: Arc<MockVenue>,
    cache: Arc<MarketDataCache>,
    orchestrator: ExecutionOrchestrator,
}

fn gateway_with_balance(balance: f64) -> Gateway {
    let config = GatewayConfig::default();

    let market = Arc::new(StaticMarketSource::new());
    market.set_prices(&[("BTCUSDT", 60000.0), ("USDTINR", 90.0)]);
    market.set_active(&["B-BTC_USDT"]);
    market.set_instrument(
        "B-BTC_USDT",
        InstrumentSpec {
            unit_contract_value: 0.001,
            quantity_increment: 0.001,
            min_quantity: 0.001,
            max_quantity: 1000.0,
            ..InstrumentSpec::default()
        },
    );

    let wallets = Arc::new(StaticWallets::with_inr_balance(balance));
    let venue = Arc::new(MockVenue::accepting());
    let hub = Arc::new(PriceHub::new());

    let cache = Arc::new(MarketDataCache::new(
        market.clone() as Arc<dyn MarketSource>,
        hub,
        &config,
    ));
    let wallet_cache = Arc::new(WalletCache::new(
        wallets.clone() as Arc<dyn WalletSource>,
        &config,
    ));
    let queue = Arc::new(OrderQueue::new(config.max_bulk_orders));
    let orchestrator = ExecutionOrchestrator::new(
        queue.clone(),
        cache.clone(),
        wallet_cache,
        venue.clone() as Arc<dyn OrderVenue>,
    );

    Gateway {
        queue,
        market,
        venue,
        cache,
        orchestrator,
    }
}

fn market_draft(symbol: &str, notional_inr: f64, leverage: u32) -> OrderDraft {
    OrderDraft {
        symbol: symbol.to_string(),
        side: Side::Buy,
        order_type: OrderKind::Market,
        qty: notional_inr,
        leverage,
        limit_price: None,
        margin: None,
    }
}

// A venue whose submission never completes, for tests that abandon an
// execution pass partway through.
struct StallingVenue;

#[async_trait]
impl OrderVenue for StallingVenue {
    async fn submit_order(&self, _payload: &SubmitPayload) -> Result<OrderReceipt, ExchangeError> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn happy_path_sizes_submits_and_settles() {
    let gw = gateway_with_balance(5000.0);
    let order = gw.queue.create(&market_draft("BTCUSDT", 10000.0, 10));

    let outcome = gw.orchestrator.execute_batch(&[order.id()]).await;

    // 1. The order landed in the executed bucket and left the queue.
    assert_eq!(outcome.executed.len(), 1);
    assert!(outcome.failed.is_empty());
    assert!(outcome.not_found.is_empty());
    let done = &outcome.executed[0];
    assert_eq!(done.status(), OrderStatus::Executed);
    assert!(done.executed_at().is_some());
    assert!(gw.queue.get(order.id()).is_none());

    // 2. Exactly one submission with the sized quantity. Ten thousand
    // INR at 90 INR/USDT and 60k mark works out to 1.851 contracts.
    let sent = gw.venue.submitted();
    assert_eq!(sent.len(), 1);
    let submitted = &sent[0].order;
    assert_eq!(submitted.pair, "B-BTC_USDT");
    assert_eq!(submitted.side, "buy");
    assert_eq!(submitted.order_type, "market_order");
    assert_eq!(submitted.price, 60000.0);
    assert_eq!(submitted.total_quantity, 1.851);
    assert_eq!(submitted.leverage, 10);
    assert_eq!(submitted.time_in_force, GOOD_TILL_CANCEL);
    assert_eq!(submitted.margin_currency_short_name, "INR");
    assert_eq!(Some(submitted.client_order_id.as_str()), done.client_order_id());
    assert!(submitted.client_order_id.starts_with(&format!("{}-", order.id())));

    // 3. The trace carries the audit figures and the venue answer.
    assert_eq!(outcome.debug.len(), 1);
    let trace = &outcome.debug[0];
    assert!(trace.sent && trace.success);
    assert_eq!(trace.response_status, Some(201));
    let audit = trace.audit.as_ref().unwrap();
    assert_eq!(audit.quantity, 1.851);
    assert!((audit.estimated_margin - 999.54).abs() < 1e-6);
}

#[tokio::test]
async fn mixed_batch_settles_each_order_separately() {
    let gw = gateway_with_balance(5000.0);
    let good = gw.queue.create(&market_draft("BTCUSDT", 10000.0, 10));
    // Unlevered ten thousand INR wants the full notional as margin.
    let broke = gw.queue.create(&market_draft("BTCUSDT", 10000.0, 1));

    let outcome = gw
        .orchestrator
        .execute_batch(&[good.id(), broke.id(), 999])
        .await;

    assert_eq!(outcome.executed.len(), 1);
    assert_eq!(outcome.executed[0].id(), good.id());
    assert_eq!(outcome.not_found, vec![999]);

    assert_eq!(outcome.failed.len(), 1);
    assert_eq!(outcome.failed[0].id, broke.id());
    assert_eq!(outcome.failed[0].error, "estimated_margin_exceeds_balance");

    // The failed order stays queued as a failed record; only the good
    // one reached the venue.
    let stored = gw.queue.get(broke.id()).unwrap();
    assert_eq!(stored.status(), OrderStatus::Failed);
    assert_eq!(
        stored.error_message(),
        Some("estimated_margin_exceeds_balance")
    );
    assert_eq!(gw.venue.submitted().len(), 1);

    let broke_trace = outcome
        .debug
        .iter()
        .find(|t| t.id == broke.id())
        .unwrap();
    assert!(!broke_trace.sent);
    assert_eq!(
        broke_trace.error.as_deref(),
        Some("estimated_margin_exceeds_balance")
    );
}

#[tokio::test]
async fn venue_rejection_keeps_order_as_failed() {
    let gw = gateway_with_balance(5000.0);
    gw.venue
        .push_receipt(400, r#"{"message":"Insufficient margin"}"#);
    let order = gw.queue.create(&market_draft("BTCUSDT", 10000.0, 10));

    let outcome = gw.orchestrator.execute_batch(&[order.id()]).await;

    assert!(outcome.executed.is_empty());
    assert_eq!(outcome.failed[0].error, "upstream_error");

    let trace = &outcome.debug[0];
    assert!(trace.sent);
    assert!(!trace.success);
    assert_eq!(trace.response_status, Some(400));
    assert!(trace
        .response_body
        .as_deref()
        .unwrap()
        .contains("Insufficient margin"));

    let stored = gw.queue.get(order.id()).unwrap();
    assert_eq!(stored.status(), OrderStatus::Failed);

    // A failed record cannot be claimed again.
    let again = gw.orchestrator.execute_batch(&[order.id()]).await;
    assert!(again.executed.is_empty());
    assert_eq!(again.failed[0].error, "order_not_executable");
    assert_eq!(gw.venue.submitted().len(), 1);
}

#[tokio::test]
async fn transport_failure_reports_upstream_error() {
    let gw = gateway_with_balance(5000.0);
    gw.venue.push_failure("connection reset");
    let order = gw.queue.create(&market_draft("BTCUSDT", 10000.0, 10));

    let outcome = gw.orchestrator.execute_batch(&[order.id()]).await;

    assert_eq!(outcome.failed[0].error, "upstream_error");
    let trace = &outcome.debug[0];
    assert!(trace.sent);
    assert_eq!(trace.response_status, None);
    assert_eq!(
        gw.queue.get(order.id()).unwrap().status(),
        OrderStatus::Failed
    );
}

#[tokio::test]
async fn unknown_symbol_never_reaches_the_venue() {
    let gw = gateway_with_balance(5000.0);
    let order = gw.queue.create(&market_draft("DOGEUSDT", 10000.0, 10));

    let outcome = gw.orchestrator.execute_batch(&[order.id()]).await;

    assert_eq!(outcome.failed[0].error, "no_price_available");
    assert!(gw.venue.submitted().is_empty());
    assert!(!outcome.debug[0].sent);
}

#[tokio::test]
async fn instrument_outage_fails_before_submission() {
    let gw = gateway_with_balance(5000.0);
    // Warm the ticker book and the active set, then cut the venue off:
    // price and membership still answer from cache while instrument
    // metadata cannot be fetched.
    assert!(gw.cache.refresh().await);
    assert!(gw
        .cache
        .active_instruments(MarginCurrency::Inr)
        .await
        .contains("B-BTC_USDT"));
    gw.market.set_failing(true);

    let order = gw.queue.create(&market_draft("BTCUSDT", 10000.0, 10));
    let outcome = gw.orchestrator.execute_batch(&[order.id()]).await;

    assert_eq!(outcome.failed[0].error, "instrument_unavailable");
    assert!(gw.venue.submitted().is_empty());
}

#[tokio::test]
async fn inactive_pair_short_circuits_the_metadata_lookup() {
    let gw = gateway_with_balance(5000.0);
    gw.market.set_active(&["B-ETH_USDT"]);

    let order = gw.queue.create(&market_draft("BTCUSDT", 10000.0, 10));
    let outcome = gw.orchestrator.execute_batch(&[order.id()]).await;

    assert_eq!(outcome.failed[0].error, "instrument_not_active");
    // The verdict comes from the active set alone; no per-instrument
    // fetch happens for a pair that is not trading.
    assert_eq!(gw.market.instrument_calls(), 0);
    assert!(gw.venue.submitted().is_empty());
}

#[tokio::test]
async fn missing_inr_wallet_blocks_execution() {
    let gw = gateway_with_balance(5000.0);
    // Rebuild the wallet cache over a source that answers with no
    // wallets at all: the venue is reachable, the wallet is absent.
    let empty = Arc::new(StaticWallets::default());
    empty.set_wallets(vec![]);
    let wallet_cache = Arc::new(WalletCache::new(
        empty as Arc<dyn WalletSource>,
        &GatewayConfig::default(),
    ));
    let orchestrator = ExecutionOrchestrator::new(
        gw.queue.clone(),
        gw.cache.clone(),
        wallet_cache,
        gw.venue.clone() as Arc<dyn OrderVenue>,
    );

    let order = gw.queue.create(&market_draft("BTCUSDT", 10000.0, 10));
    let outcome = orchestrator.execute_batch(&[order.id()]).await;

    assert_eq!(outcome.failed[0].error, "no_inr_futures_wallet");
    assert!(gw.venue.submitted().is_empty());
}

#[tokio::test]
async fn limit_orders_size_against_their_own_price() {
    let gw = gateway_with_balance(5000.0);
    let order = gw.queue.create(&OrderDraft {
        symbol: "BTCUSDT".to_string(),
        side: Side::Sell,
        order_type: OrderKind::Limit,
        qty: 10000.0,
        leverage: 10,
        limit_price: Some(58000.0),
        margin: None,
    });

    let outcome = gw.orchestrator.execute_batch(&[order.id()]).await;

    assert_eq!(outcome.executed.len(), 1);
    let sent = gw.venue.submitted();
    let submitted = &sent[0].order;
    assert_eq!(submitted.side, "sell");
    assert_eq!(submitted.order_type, "limit_order");
    assert_eq!(submitted.price, 58000.0);
    // (10000 / 90) / (58000 * 0.001), floored to the 0.001 grid.
    assert_eq!(submitted.total_quantity, 1.915);
}

#[tokio::test(start_paused = true)]
async fn abandoned_pass_returns_claims_to_the_queue() {
    let gw = gateway_with_balance(5000.0);
    // Same wiring over the shared queue, but submission never returns,
    // so the pass can be dropped while its claim is still open. That is
    // what a disconnecting HTTP caller does to the execute handler.
    let wallet_cache = Arc::new(WalletCache::new(
        Arc::new(StaticWallets::with_inr_balance(5000.0)) as Arc<dyn WalletSource>,
        &GatewayConfig::default(),
    ));
    let stalled = ExecutionOrchestrator::new(
        gw.queue.clone(),
        gw.cache.clone(),
        wallet_cache,
        Arc::new(StallingVenue) as Arc<dyn OrderVenue>,
    );
    let order = gw.queue.create(&market_draft("BTCUSDT", 10000.0, 10));

    let ids = [order.id()];
    tokio::select! {
        _ = stalled.execute_batch(&ids) => {
            panic!("a stalled submission must not settle the pass")
        }
        _ = tokio::time::sleep(Duration::from_millis(50)) => {}
    }

    // The abandoned claim is back in the queue and can be edited or
    // claimed again rather than sitting in pending forever.
    let stored = gw.queue.get(order.id()).unwrap();
    assert_eq!(stored.status(), OrderStatus::Queued);
    assert!(stored.error_message().is_none());
    assert!(gw
        .queue
        .update(order.id(), &market_draft("BTCUSDT", 9000.0, 10))
        .is_ok());

    let outcome = gw.orchestrator.execute_batch(&[order.id()]).await;
    assert_eq!(outcome.executed.len(), 1);
    assert_eq!(gw.venue.submitted().len(), 1);
}
