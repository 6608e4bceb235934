//! Multi-symbol spot/futures trading bot: periodic indicator-driven decision
//! cycles, a background exchange reconciler, risk-based sizing, and durable
//! per-symbol trade state.

pub mod config;
pub mod constants;
pub mod core;
pub mod errors;
pub mod exchange;
pub mod logging;
pub mod storage;
pub mod types;
