use rust_decimal::Decimal;
use thiserror::Error;

/// Typed error hierarchy for the trading bot.
///
/// Library-internal errors use specific variants; application code wraps with
/// `anyhow::Context` for propagation. Only `CredentialMissing` and `Config`
/// are fatal, and only at startup — no per-cycle error terminates the process.
#[derive(Error, Debug)]
pub enum BotError {
    // -- Market data --------------------------------------------------------
    #[error("insufficient data: {have} bars, need {need}")]
    InsufficientData { have: usize, need: usize },

    #[error("exchange unavailable: {name}")]
    ExchangeUnavailable { name: String },

    // -- Trading ------------------------------------------------------------
    #[error("insufficient balance: need {required} {asset}, have {available}")]
    InsufficientBalance {
        asset: String,
        required: Decimal,
        available: Decimal,
    },

    #[error("order rejected: {reason}")]
    OrderRejected { reason: String },

    // -- Startup ------------------------------------------------------------
    #[error("exchange credentials missing: {0}")]
    CredentialMissing(String),

    #[error("configuration error: {0}")]
    Config(String),

    // -- Forwarded errors ---------------------------------------------------
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),

    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
