use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single OHLCV candle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: i64,
    #[serde(with = "rust_decimal::serde::str")]
    pub open: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub high: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub low: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub close: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub volume: Decimal,
}

/// Free/total holdings for one asset.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct AssetBalance {
    #[serde(with = "rust_decimal::serde::str")]
    pub free: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub total: Decimal,
}

/// Account balances keyed by asset code.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Balance {
    pub assets: HashMap<String, AssetBalance>,
}

impl Balance {
    /// Free balance for `asset`, zero when the account holds none.
    pub fn free(&self, asset: &str) -> Decimal {
        self.assets.get(asset).map(|a| a.free).unwrap_or_default()
    }

    /// Total balance for `asset`, zero when the account holds none.
    pub fn total(&self, asset: &str) -> Decimal {
        self.assets.get(asset).map(|a| a.total).unwrap_or_default()
    }
}

/// Latest traded price for a symbol.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: String,
    #[serde(with = "rust_decimal::serde::str")]
    pub last: Decimal,
}
