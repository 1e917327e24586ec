//! Conversion of an INR notional into a venue-valid contract quantity.
//!
//! The venue prices futures in USDT and counts size in contracts, while
//! clients think in INR notionals. Sizing walks that chain: INR to USDT
//! through the FX rate, USDT to raw contracts through mark price and
//! unit contract value, then down to the instrument's quantity
//! increment. All checks happen here so execution can treat the result
//! as submittable.

use crate::model::InstrumentSpec;
use serde::Serialize;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum SizingError {
    #[error("{pair} is not active for the selected margin currency")]
    InstrumentNotActive { pair: String },
    #[error("sized quantity {quantity} is below the instrument minimum {min_quantity}")]
    TradeSizeTooSmall { quantity: f64, min_quantity: f64 },
    #[error("sized quantity {quantity} exceeds the instrument maximum {max_quantity}")]
    TradeSizeTooLarge { quantity: f64, max_quantity: f64 },
    #[error("estimated margin {estimated_margin:.2} INR exceeds wallet balance {balance:.2} INR")]
    MarginExceedsBalance { estimated_margin: f64, balance: f64 },
    #[error("no usable mark price for sizing")]
    PriceUnavailable,
    #[error("no usable USDT/INR rate for sizing")]
    FxRateUnavailable,
}

impl SizingError {
    /// Stable machine-readable code carried in execution reports.
    pub fn code(&self) -> &'static str {
        match self {
            SizingError::InstrumentNotActive { .. } => "instrument_not_active",
            SizingError::TradeSizeTooSmall { .. } => "trade_size_too_small_for_instrument",
            SizingError::TradeSizeTooLarge { .. } => "trade_size_too_large_for_instrument",
            SizingError::MarginExceedsBalance { .. } => "estimated_margin_exceeds_balance",
            SizingError::PriceUnavailable => "price_unavailable",
            SizingError::FxRateUnavailable => "fx_rate_unavailable",
        }
    }
}

/// Inputs for sizing one order. All market state is passed in by the
/// caller; this module performs no I/O.
pub struct SizingRequest<'a> {
    pub pair: &'a str,
    pub notional_inr: f64,
    pub mark_price: f64,
    pub fx_rate: f64,
    pub leverage: u32,
    pub wallet_balance: f64,
    pub spec: &'a InstrumentSpec,
    pub active_pairs: &'a HashSet<String>,
}

/// A sized, fully validated order along with the intermediate figures
/// for audit trails.
#[derive(Debug, Clone, Serialize)]
pub struct SizedOrder {
    /// Contract quantity to submit, snapped to the increment.
    pub quantity: f64,
    /// Quantity before flooring, kept for diagnostics.
    pub contracts_raw: f64,
    /// USDT notional of the floored quantity.
    pub notional_usdt: f64,
    /// INR notional of the floored quantity.
    pub notional_inr: f64,
    pub estimated_margin: f64,
    pub mark_price: f64,
    pub fx_rate: f64,
}

/// Rounds away float noise after increment flooring. Eight decimals is
/// what the venue accepts on quantities.
fn snap8(value: f64) -> f64 {
    (value * 1e8).round() / 1e8
}

pub fn size_order(req: &SizingRequest<'_>) -> Result<SizedOrder, SizingError> {
    if !req.active_pairs.contains(req.pair) {
        return Err(SizingError::InstrumentNotActive {
            pair: req.pair.to_string(),
        });
    }
    if !req.mark_price.is_finite() || req.mark_price <= 0.0 {
        return Err(SizingError::PriceUnavailable);
    }
    if !req.fx_rate.is_finite() || req.fx_rate <= 0.0 {
        return Err(SizingError::FxRateUnavailable);
    }

    let spec = req.spec;
    let notional_usdt = req.notional_inr / req.fx_rate;
    let contracts_raw = notional_usdt / (req.mark_price * spec.unit_contract_value);
    let floored = (contracts_raw / spec.quantity_increment).floor() * spec.quantity_increment;
    let quantity = snap8(floored);

    if quantity < spec.min_quantity {
        return Err(SizingError::TradeSizeTooSmall {
            quantity,
            min_quantity: spec.min_quantity,
        });
    }
    if quantity > spec.max_quantity {
        return Err(SizingError::TradeSizeTooLarge {
            quantity,
            max_quantity: spec.max_quantity,
        });
    }

    let order_notional_usdt = req.mark_price * spec.unit_contract_value * quantity;
    let order_notional_inr = order_notional_usdt * req.fx_rate;
    // Leverage zero would mean dividing by nothing; treat it as 1x so
    // the margin requirement is the full notional.
    let estimated_margin = order_notional_inr / f64::from(req.leverage.max(1));
    if estimated_margin > req.wallet_balance {
        return Err(SizingError::MarginExceedsBalance {
            estimated_margin,
            balance: req.wallet_balance,
        });
    }

    Ok(SizedOrder {
        quantity,
        contracts_raw,
        notional_usdt: order_notional_usdt,
        notional_inr: order_notional_inr,
        estimated_margin,
        mark_price: req.mark_price,
        fx_rate: req.fx_rate,
    })
}

#[cfg(test)]
mod tests;
