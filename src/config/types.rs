use rust_decimal::Decimal;
use serde::Deserialize;

use crate::constants;
use crate::types::signal::ClassifierMode;

// ---------------------------------------------------------------------------
// Top-level aggregate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct BotConfig {
    pub app: AppConfig,
    pub trading: TradingConfig,
    pub risk: RiskConfig,
    pub exchange: ExchangeConfig,
}

// ---------------------------------------------------------------------------
// app.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub logging: LoggingConfig,
    /// Directory for daily trade ledger files.
    pub ledger_dir: String,
    /// Directory for per-symbol trade state files.
    pub state_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub log_dir: String,
}

// ---------------------------------------------------------------------------
// trading.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    /// Symbols in unified `BASE/QUOTE` form, e.g. `BTC/USDT`.
    pub symbols: Vec<String>,
    /// Candle interval, e.g. `1m`, `15m`, `1h`.
    pub timeframe: String,
    /// Candles requested per fetch.
    #[serde(default = "default_candle_limit")]
    pub candle_limit: u32,
    /// Decision cycle cadence.
    pub cycle_interval_seconds: u64,
    /// Reconciler cadence; must not exceed the cycle interval.
    pub sync_interval_seconds: u64,
    /// Classifier rule set.
    pub mode: ClassifierMode,
    /// EMA separation below which the classifier holds.
    #[serde(with = "rust_decimal::serde::str")]
    pub noise_epsilon: Decimal,
    /// Futures leverage multiplier applied before entries.
    #[serde(default = "default_leverage")]
    pub leverage: u32,
    #[serde(default)]
    pub indicators: IndicatorParams,
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct IndicatorParams {
    pub sma_period: usize,
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub rsi_period: usize,
    pub atr_period: usize,
    pub macd_signal: usize,
    pub stoch_period: usize,
    pub stoch_smoothing: usize,
    /// Minimum bars required before any indicator is computed.
    pub min_bars: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            sma_period: 20,
            ema_fast: 12,
            ema_slow: 26,
            rsi_period: 14,
            atr_period: 14,
            macd_signal: 9,
            stoch_period: 14,
            stoch_smoothing: 3,
            min_bars: constants::DEFAULT_MIN_BARS,
        }
    }
}

// ---------------------------------------------------------------------------
// risk.json
// ---------------------------------------------------------------------------

/// Take-profit / stop-loss thresholds in percent (both positive).
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ExitRules {
    #[serde(with = "rust_decimal::serde::str")]
    pub take_profit_pct: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub stop_loss_pct: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    /// Percent of portfolio value risked per trade.
    #[serde(with = "rust_decimal::serde::str", default = "default_risk_percent")]
    pub risk_percent: Decimal,
    /// Fraction of free balance a single position may consume.
    #[serde(
        with = "rust_decimal::serde::str",
        default = "default_max_position_fraction"
    )]
    pub max_position_fraction: Decimal,
    /// Venue minimum order size in base-asset units.
    #[serde(with = "rust_decimal::serde::str", default = "default_min_trade_amount")]
    pub min_trade_amount: Decimal,
    /// Floor applied to ATR before it divides the risk budget.
    #[serde(with = "rust_decimal::serde::str", default = "default_floor_volatility")]
    pub floor_volatility: Decimal,
    /// ATR/price ratio required for aggressive-mode entries.
    #[serde(with = "rust_decimal::serde::str")]
    pub min_volatility_ratio: Decimal,
    /// Decimal places kept when rounding quantities down.
    #[serde(default = "default_amount_precision")]
    pub amount_precision: u32,
    /// Minimum gap between confirmed fills.
    #[serde(default = "default_cooldown_seconds")]
    pub cooldown_seconds: u64,
    /// Classifier exits against the recorded entry price.
    pub signal_exit: ExitRules,
    /// Reconciler forced exits against exchange-reported excursion.
    pub forced_exit: ExitRules,
}

// ---------------------------------------------------------------------------
// exchange.json
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    /// REST base URL; empty selects the default for the sandbox flag.
    pub rest_url: String,
    /// Route signed calls to the venue testnet.
    pub sandbox: bool,
    /// Simulate fills locally against real market data.
    pub paper: bool,
    /// Settlement asset, e.g. `USDT`.
    pub quote_asset: String,
    /// Signed-request validity window in milliseconds.
    #[serde(default = "default_recv_window_ms")]
    pub recv_window_ms: u64,
    #[serde(with = "rust_decimal::serde::str")]
    pub paper_starting_balance: Decimal,
    /// Simulated fill slippage in basis points.
    pub paper_slippage_bps: u32,
}

// ---------------------------------------------------------------------------
// Serde defaults
// ---------------------------------------------------------------------------

fn default_candle_limit() -> u32 {
    constants::DEFAULT_CANDLE_LIMIT
}

fn default_leverage() -> u32 {
    constants::DEFAULT_LEVERAGE
}

fn default_risk_percent() -> Decimal {
    constants::DEFAULT_RISK_PERCENT
}

fn default_max_position_fraction() -> Decimal {
    constants::DEFAULT_MAX_POSITION_FRACTION
}

fn default_min_trade_amount() -> Decimal {
    constants::MIN_TRADE_AMOUNT
}

fn default_floor_volatility() -> Decimal {
    constants::FLOOR_VOLATILITY
}

fn default_amount_precision() -> u32 {
    constants::AMOUNT_PRECISION
}

fn default_cooldown_seconds() -> u64 {
    constants::DEFAULT_COOLDOWN_SECONDS
}

fn default_recv_window_ms() -> u64 {
    constants::RECV_WINDOW_MS
}
