//! Order intents and their lifecycle inside the gateway queue.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Wire value expected by the derivatives venue.
    pub fn as_exchange_str(&self) -> &'static str {
        match self {
            Side::Buy => "buy",
            Side::Sell => "sell",
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "BUY"),
            Side::Sell => write!(f, "SELL"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderKind {
    #[default]
    Market,
    Limit,
}

impl OrderKind {
    pub fn as_exchange_str(&self) -> &'static str {
        match self {
            OrderKind::Market => "market_order",
            OrderKind::Limit => "limit_order",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Claimed by an execution pass, submission in flight.
    Pending,
    Queued,
    Executed,
    Failed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Queued => "queued",
            OrderStatus::Executed => "executed",
            OrderStatus::Failed => "failed",
            OrderStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_leverage() -> u32 {
    1
}

/// Client-supplied order intent, before it is accepted into the queue.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderDraft {
    pub symbol: String,
    pub side: Side,
    #[serde(default)]
    pub order_type: OrderKind,
    pub qty: f64,
    #[serde(default = "default_leverage")]
    pub leverage: u32,
    #[serde(default)]
    pub limit_price: Option<f64>,
    #[serde(default)]
    pub margin: Option<f64>,
}

impl OrderDraft {
    /// Field-level checks applied before an intent enters the queue.
    pub fn validate(&self) -> Result<(), String> {
        if self.symbol.trim().is_empty() {
            return Err("symbol must not be empty".to_string());
        }
        if !self.qty.is_finite() || self.qty <= 0.0 {
            return Err("qty must be a positive number".to_string());
        }
        if self.leverage < 1 || self.leverage > 100 {
            return Err("leverage must be between 1 and 100".to_string());
        }
        if let Some(p) = self.limit_price {
            if !p.is_finite() || p <= 0.0 {
                return Err("limit_price must be a positive number".to_string());
            }
        }
        if self.order_type == OrderKind::Limit && self.limit_price.is_none() {
            return Err("limit orders require a limit_price".to_string());
        }
        if let Some(m) = self.margin {
            if !m.is_finite() || m < 0.0 {
                return Err("margin must not be negative".to_string());
            }
        }
        Ok(())
    }

    fn normalized_symbol(&self) -> String {
        self.symbol.trim().to_uppercase()
    }
}

/// An accepted order intent tracked by the gateway.
#[derive(Debug, Clone, Serialize)]
pub struct QueuedOrder {
    id: u64,
    symbol: String,
    side: Side,
    order_type: OrderKind,
    qty: f64,
    leverage: u32,
    limit_price: Option<f64>,
    margin: Option<f64>,
    status: OrderStatus,
    client_order_id: Option<String>,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    executed_at: Option<DateTime<Utc>>,
}

impl QueuedOrder {
    pub(crate) fn new(id: u64, draft: &OrderDraft) -> Self {
        let now = Utc::now();
        Self {
            id,
            symbol: draft.normalized_symbol(),
            side: draft.side,
            order_type: draft.order_type,
            qty: draft.qty,
            leverage: draft.leverage,
            limit_price: draft.limit_price,
            margin: draft.margin,
            status: OrderStatus::Queued,
            client_order_id: None,
            error_message: None,
            created_at: now,
            updated_at: now,
            executed_at: None,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn side(&self) -> Side {
        self.side
    }

    pub fn order_type(&self) -> OrderKind {
        self.order_type
    }

    pub fn qty(&self) -> f64 {
        self.qty
    }

    pub fn leverage(&self) -> u32 {
        self.leverage
    }

    pub fn limit_price(&self) -> Option<f64> {
        self.limit_price
    }

    pub fn margin(&self) -> Option<f64> {
        self.margin
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn client_order_id(&self) -> Option<&str> {
        self.client_order_id.as_deref()
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn executed_at(&self) -> Option<DateTime<Utc>> {
        self.executed_at
    }

    /// Replaces the editable fields with a fresh draft. Status is untouched.
    pub(crate) fn apply_draft(&mut self, draft: &OrderDraft) {
        self.symbol = draft.normalized_symbol();
        self.side = draft.side;
        self.order_type = draft.order_type;
        self.qty = draft.qty;
        self.leverage = draft.leverage;
        self.limit_price = draft.limit_price;
        self.margin = draft.margin;
        self.updated_at = Utc::now();
    }

    pub(crate) fn set_status(&mut self, status: OrderStatus) {
        self.status = status;
        self.updated_at = Utc::now();
    }

    pub(crate) fn mark_executed(&mut self, client_order_id: String) {
        self.status = OrderStatus::Executed;
        self.client_order_id = Some(client_order_id);
        self.error_message = None;
        let now = Utc::now();
        self.executed_at = Some(now);
        self.updated_at = now;
    }

    pub(crate) fn mark_failed(&mut self, error: String) {
        self.status = OrderStatus::Failed;
        self.error_message = Some(error);
        self.updated_at = Utc::now();
    }
}
