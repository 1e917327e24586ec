//! Instrument metadata and symbol-to-pair mapping for the derivatives venue.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Currency a position's margin is posted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarginCurrency {
    Inr,
    Usdt,
}

impl MarginCurrency {
    pub fn as_str(&self) -> &'static str {
        match self {
            MarginCurrency::Inr => "INR",
            MarginCurrency::Usdt => "USDT",
        }
    }
}

impl fmt::Display for MarginCurrency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MarginCurrency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "INR" => Ok(MarginCurrency::Inr),
            "USDT" | "USD" => Ok(MarginCurrency::Usdt),
            other => Err(format!("unknown margin currency: {other}")),
        }
    }
}

/// Sizing limits for one tradable pair.
///
/// The venue occasionally serves incomplete metadata, so every field
/// falls back to a value that keeps the sizing arithmetic well defined.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentSpec {
    pub unit_contract_value: f64,
    pub quantity_increment: f64,
    pub min_quantity: f64,
    pub max_quantity: f64,
    /// Venue-advertised leverage ceilings. Informational; zero means
    /// the venue did not report one.
    pub max_leverage_long: f64,
    pub max_leverage_short: f64,
}

impl InstrumentSpec {
    pub const DEFAULT_MAX_QUANTITY: f64 = 1e18;

    /// Clamps non-finite or non-positive fields back to their defaults.
    pub fn sanitized(mut self) -> Self {
        if !self.unit_contract_value.is_finite() || self.unit_contract_value <= 0.0 {
            self.unit_contract_value = 1.0;
        }
        if !self.quantity_increment.is_finite() || self.quantity_increment <= 0.0 {
            self.quantity_increment = 1.0;
        }
        if !self.min_quantity.is_finite() || self.min_quantity <= 0.0 {
            self.min_quantity = self.quantity_increment;
        }
        if !self.max_quantity.is_finite() || self.max_quantity <= 0.0 {
            self.max_quantity = Self::DEFAULT_MAX_QUANTITY;
        }
        if !self.max_leverage_long.is_finite() || self.max_leverage_long < 0.0 {
            self.max_leverage_long = 0.0;
        }
        if !self.max_leverage_short.is_finite() || self.max_leverage_short <= 0.0 {
            self.max_leverage_short = self.max_leverage_long;
        }
        self
    }
}

impl Default for InstrumentSpec {
    fn default() -> Self {
        Self {
            unit_contract_value: 1.0,
            quantity_increment: 1.0,
            min_quantity: 1.0,
            max_quantity: Self::DEFAULT_MAX_QUANTITY,
            max_leverage_long: 0.0,
            max_leverage_short: 0.0,
        }
    }
}

const QUOTE_SUFFIXES: [&str; 3] = ["USDT", "INR", "USD"];

/// Maps a client-facing symbol like `BTCUSDT` onto the venue's pair
/// notation `B-BTC_USDT`. Symbols already in pair notation pass through.
pub fn derive_pair(symbol: &str) -> String {
    let s = symbol.trim().to_uppercase();
    if s.starts_with("B-") {
        return s;
    }
    for suffix in QUOTE_SUFFIXES {
        if s.len() > suffix.len() {
            if let Some(base) = s.strip_suffix(suffix) {
                return format!("B-{base}_USDT");
            }
        }
    }
    format!("B-{s}_USDT")
}
