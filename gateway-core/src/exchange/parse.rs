//! Tolerant decoding of venue responses.
//!
//! The venue's public endpoints are loosely typed: field names drift
//! between `market`, `symbol` and `pair`, numbers arrive as strings
//! (sometimes with thousands separators), and some payloads nest the
//! interesting part under a `ticker` or `instrument` key. Everything in
//! here tolerates the drift and drops entries it cannot make sense of.

use crate::model::{InstrumentSpec, Wallet};
use serde_json::Value;
use std::collections::HashMap;

const SYMBOL_KEYS: [&str; 4] = ["market", "symbol", "pair", "market_symbol"];
const PRICE_KEYS: [&str; 4] = ["last", "last_price", "price", "close"];
const NESTED_SYMBOL_KEYS: [&str; 2] = ["symbol", "pair"];
const NESTED_PRICE_KEYS: [&str; 4] = ["last", "last_price", "close", "price"];

/// Reads a float out of a JSON number or a numeric string. Strings may
/// carry thousands separators (`"61,250.5"`).
pub fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.replace(',', "").trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn first_symbol(item: &Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        match item.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => {
                return Some(s.trim().to_uppercase());
            }
            _ => {}
        }
    }
    None
}

fn first_price(item: &Value, keys: &[&str]) -> Option<f64> {
    for key in keys {
        if let Some(raw) = item.get(key) {
            if let Some(px) = coerce_f64(raw) {
                if px.is_finite() && px > 0.0 {
                    return Some(px);
                }
            }
        }
    }
    None
}

/// Extracts `(symbol, price)` from one ticker item, looking through the
/// known field aliases and falling back to a nested `ticker` object.
pub fn parse_ticker_entry(item: &Value) -> Option<(String, f64)> {
    if !item.is_object() {
        return None;
    }
    let nested = item.get("ticker").filter(|t| t.is_object());

    let symbol = first_symbol(item, &SYMBOL_KEYS)
        .or_else(|| nested.and_then(|t| first_symbol(t, &NESTED_SYMBOL_KEYS)))?;
    let price = first_price(item, &PRICE_KEYS)
        .or_else(|| nested.and_then(|t| first_price(t, &NESTED_PRICE_KEYS)))?;
    Some((symbol, price))
}

/// Builds a symbol-to-price map from a raw ticker array, skipping
/// entries without a usable symbol or a positive price.
pub fn parse_ticker_list(items: &[Value]) -> HashMap<String, f64> {
    let mut out = HashMap::with_capacity(items.len());
    for item in items {
        if let Some((symbol, price)) = parse_ticker_entry(item) {
            out.insert(symbol, price);
        }
    }
    out
}

/// Decodes instrument metadata, unwrapping an `instrument` envelope if
/// present. Missing or malformed fields fall back to defaults that keep
/// sizing well defined.
pub fn parse_instrument(value: &Value) -> InstrumentSpec {
    let inst = match value.get("instrument") {
        Some(inner) if inner.is_object() => inner,
        _ => value,
    };
    if !inst.is_object() {
        return InstrumentSpec::default();
    }
    let field = |key: &str, fallback: f64| {
        inst.get(key).and_then(coerce_f64).unwrap_or(fallback)
    };
    let quantity_increment = field("quantity_increment", 1.0);
    let max_leverage_long = field("max_leverage_long", 0.0);
    InstrumentSpec {
        unit_contract_value: field("unit_contract_value", 1.0),
        quantity_increment,
        // An instrument without an explicit minimum trades down to one increment.
        min_quantity: field("min_quantity", quantity_increment),
        max_quantity: field("max_quantity", InstrumentSpec::DEFAULT_MAX_QUANTITY),
        max_leverage_long,
        max_leverage_short: field("max_leverage_short", max_leverage_long),
    }
    .sanitized()
}

fn parse_wallet(item: &Value) -> Option<Wallet> {
    let currency = item
        .get("currency_short_name")
        .and_then(Value::as_str)
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())?;
    let id = match item.get("id") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    };
    Some(Wallet {
        id,
        currency,
        balance: item.get("balance").and_then(coerce_f64).unwrap_or(0.0),
        locked_balance: item
            .get("locked_balance")
            .and_then(coerce_f64)
            .unwrap_or(0.0),
    })
}

/// Decodes the wallets response. A bare object is treated as a
/// single-element list, entries without a currency are dropped.
pub fn parse_wallet_list(value: &Value) -> Vec<Wallet> {
    match value {
        Value::Array(items) => items.iter().filter_map(parse_wallet).collect(),
        Value::Object(_) => parse_wallet(value).into_iter().collect(),
        _ => Vec::new(),
    }
}

/// Decodes a list of pair names, stringifying non-string entries.
pub fn parse_string_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
        _ => Vec::new(),
    }
}
