use rust_decimal::Decimal;
use rust_decimal_macros::dec;

// ---------------------------------------------------------------------------
// Numeric Constants
// ---------------------------------------------------------------------------

/// Floor applied to ATR before it divides the risk budget. Keeps sizing
/// finite on dead-flat windows.
pub const FLOOR_VOLATILITY: Decimal = dec!(0.000001);

/// Smallest order the venue accepts in base-asset units.
pub const MIN_TRADE_AMOUNT: Decimal = dec!(0.00001);

/// Decimal places kept when rounding an order quantity down.
pub const AMOUNT_PRECISION: u32 = 5;

// ---------------------------------------------------------------------------
// Exchange Defaults
// ---------------------------------------------------------------------------

/// Signed-request validity window in milliseconds.
pub const RECV_WINDOW_MS: u64 = 60_000;

/// Binance USD-M futures REST base URLs.
pub const BINANCE_FUTURES_URL: &str = "https://fapi.binance.com";
pub const BINANCE_FUTURES_TESTNET_URL: &str = "https://testnet.binancefuture.com";

// ---------------------------------------------------------------------------
// Default Risk Values
// ---------------------------------------------------------------------------

pub const DEFAULT_RISK_PERCENT: Decimal = dec!(1);
pub const DEFAULT_MAX_POSITION_FRACTION: Decimal = dec!(0.2);
pub const DEFAULT_COOLDOWN_SECONDS: u64 = 300;
pub const DEFAULT_LEVERAGE: u32 = 5;
pub const DEFAULT_CANDLE_LIMIT: u32 = 100;
pub const DEFAULT_MIN_BARS: usize = 50;
