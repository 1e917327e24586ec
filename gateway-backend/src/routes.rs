//! REST surface of the gateway.
//!
//! Success responses carry the affected records; errors come back as
//! `{"status": "ERROR", "msg": "..."}` with a code that tells the
//! client whether to fix the request (4xx) or retry later (502).

use crate::state::AppState;
use crate::ws;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use gateway_core::{MarginCurrency, OrderDraft, OrderStatus, QueueError, WalletLookup};
use serde::Deserialize;
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/status", get(status))
        .route("/trade/securities", get(securities))
        .route("/trade/price/:symbol", get(price))
        .route("/trade/balance", get(balance))
        .route("/trade/wallets", get(wallets))
        .route(
            "/trade/orders",
            post(create_order).get(list_orders).delete(clear_orders),
        )
        .route("/trade/orders/bulk", post(create_orders_bulk))
        .route("/trade/orders/execute", post(execute_orders))
        .route("/trade/orders/:id", put(update_order).delete(delete_order))
        .route("/ws/prices", get(ws::prices_ws))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

fn error_response(status: StatusCode, msg: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "status": "ERROR", "msg": msg })))
}

fn queue_error(err: QueueError) -> (StatusCode, Json<Value>) {
    let status = match err {
        QueueError::NotFound { .. } => StatusCode::NOT_FOUND,
        QueueError::NotEditable { .. } => StatusCode::BAD_REQUEST,
        QueueError::BulkTooLarge { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    };
    error_response(status, &err.to_string())
}

async fn health() -> &'static str {
    "OK"
}

async fn status(State(state): State<AppState>) -> Json<Value> {
    let uptime = (Utc::now() - state.started_at).num_seconds();
    Json(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running",
        "uptime_secs": uptime,
        "queued_orders": state.queue.queued_count(),
        "symbols_cached": state.market_data.symbol_count(),
        "ws_connections": state.hub.connection_count(),
        "last_refresh": state.market_data.last_refreshed(),
        "credentials_configured": state.config.has_credentials(),
    }))
}

async fn securities(State(state): State<AppState>) -> Json<Value> {
    let symbols = state.market_data.symbols().await;
    Json(json!({ "symbols": symbols, "count": symbols.len() }))
}

async fn price(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
) -> (StatusCode, Json<Value>) {
    match state.market_data.price(&symbol).await {
        Some(price) => (
            StatusCode::OK,
            Json(json!({
                "symbol": symbol.trim().to_uppercase(),
                "price": price,
                "source": "cache",
                "ts": state
                    .market_data
                    .last_refreshed()
                    .map(|t| t.timestamp_millis()),
            })),
        ),
        None => error_response(
            StatusCode::NOT_FOUND,
            &format!("no price available for {symbol}"),
        ),
    }
}

#[derive(Debug, Deserialize)]
struct BalanceQuery {
    currency: Option<String>,
}

async fn balance(
    State(state): State<AppState>,
    Query(query): Query<BalanceQuery>,
) -> (StatusCode, Json<Value>) {
    let raw = query.currency.as_deref().unwrap_or("INR");
    // "USD" is a UI alias for USDT margin; anything else passes through
    // uppercased and resolves to a 404 if no such wallet exists.
    let currency = raw
        .parse::<MarginCurrency>()
        .map(|c| c.as_str().to_string())
        .unwrap_or_else(|_| raw.trim().to_uppercase());
    match state.wallets.wallet(&currency).await {
        WalletLookup::Found(wallet) => (
            StatusCode::OK,
            Json(json!({
                "currency": wallet.currency,
                "balance": wallet.balance,
                "locked_balance": wallet.locked_balance,
                "wallet_id": wallet.id,
            })),
        ),
        WalletLookup::Missing => error_response(
            StatusCode::NOT_FOUND,
            &format!("futures wallet for {currency} not found"),
        ),
        WalletLookup::Unavailable => {
            error_response(StatusCode::BAD_GATEWAY, "wallet data unavailable")
        }
    }
}

async fn wallets(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.wallets.refresh_and_list().await {
        Ok(wallets) => (StatusCode::OK, Json(json!({ "wallets": wallets }))),
        Err(err) => error_response(StatusCode::BAD_GATEWAY, &err.to_string()),
    }
}

async fn create_order(
    State(state): State<AppState>,
    Json(draft): Json<OrderDraft>,
) -> (StatusCode, Json<Value>) {
    if let Err(msg) = draft.validate() {
        return error_response(StatusCode::UNPROCESSABLE_ENTITY, &msg);
    }
    let order = state.queue.create(&draft);
    (StatusCode::OK, Json(json!({ "success": true, "order": order })))
}

async fn create_orders_bulk(
    State(state): State<AppState>,
    Json(drafts): Json<Vec<OrderDraft>>,
) -> (StatusCode, Json<Value>) {
    for (i, draft) in drafts.iter().enumerate() {
        if let Err(msg) = draft.validate() {
            return error_response(
                StatusCode::UNPROCESSABLE_ENTITY,
                &format!("order {i}: {msg}"),
            );
        }
    }
    match state.queue.bulk_create(&drafts) {
        Ok(orders) => (
            StatusCode::OK,
            Json(json!({ "success": true, "orders": orders })),
        ),
        Err(err) => queue_error(err),
    }
}

#[derive(Debug, Deserialize)]
struct ListQuery {
    status: Option<OrderStatus>,
}

async fn list_orders(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Json<Value> {
    let orders = state.queue.list(query.status);
    Json(json!({ "orders": orders }))
}

async fn update_order(
    State(state): State<AppState>,
    Path(id): Path<u64>,
    Json(draft): Json<OrderDraft>,
) -> (StatusCode, Json<Value>) {
    if let Err(msg) = draft.validate() {
        return error_response(StatusCode::UNPROCESSABLE_ENTITY, &msg);
    }
    match state.queue.update(id, &draft) {
        Ok(order) => (StatusCode::OK, Json(json!({ "success": true, "order": order }))),
        Err(err) => queue_error(err),
    }
}

async fn delete_order(
    State(state): State<AppState>,
    Path(id): Path<u64>,
) -> (StatusCode, Json<Value>) {
    match state.queue.delete(id) {
        Ok(order) => (StatusCode::OK, Json(json!({ "success": true, "order": order }))),
        Err(err) => queue_error(err),
    }
}

async fn clear_orders(State(state): State<AppState>) -> Json<Value> {
    let deleted = state.queue.clear_queued();
    Json(json!({
        "message": format!("Cleared {deleted} queued orders"),
        "deleted_count": deleted,
    }))
}

#[derive(Debug, Deserialize)]
struct ExecuteRequest {
    ids: Vec<u64>,
}

async fn execute_orders(
    State(state): State<AppState>,
    Json(req): Json<ExecuteRequest>,
) -> (StatusCode, Json<Value>) {
    if req.ids.is_empty() {
        return error_response(StatusCode::UNPROCESSABLE_ENTITY, "ids must not be empty");
    }
    let outcome = state.executor.execute_batch(&req.ids).await;
    (StatusCode::OK, Json(json!(outcome)))
}
