use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// MACD line, its signal EMA, and their difference.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdValue {
    #[serde(with = "rust_decimal::serde::str")]
    pub macd: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub signal: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub histogram: Decimal,
}

/// Stochastic oscillator %K and smoothed %D.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StochValue {
    #[serde(with = "rust_decimal::serde::str")]
    pub k: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub d: Decimal,
}

/// All technical values derived from one bar window. Recomputed every
/// cycle, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    #[serde(with = "rust_decimal::serde::str")]
    pub price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub sma20: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub ema_fast: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub ema_slow: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub rsi: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub atr: Decimal,
    pub macd: MacdValue,
    pub stoch: StochValue,
    #[serde(with = "rust_decimal::serde::str")]
    pub volatility_ratio: Decimal,
}
