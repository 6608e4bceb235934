pub mod types;
pub mod validate;

pub use types::*;

use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

/// Load and merge all config JSON files into a single [`BotConfig`],
/// then apply environment variable overrides and validate.
///
/// Expected directory layout:
/// ```text
/// config/
///   app.json
///   trading.json
///   risk.json
///   exchange.json
/// ```
///
/// # Environment variable overrides
///
/// The following env vars override the corresponding JSON config values:
///
/// | Env Var                  | Config Field                      |
/// |--------------------------|-----------------------------------|
/// | `PULSE_PAPER`            | `exchange.paper`                  |
/// | `PULSE_SANDBOX`          | `exchange.sandbox`                |
/// | `PULSE_REST_URL`         | `exchange.rest_url`               |
/// | `PULSE_SYMBOLS`          | `trading.symbols` (comma-separated) |
/// | `PULSE_TIMEFRAME`        | `trading.timeframe`               |
/// | `PULSE_CYCLE_SECONDS`    | `trading.cycle_interval_seconds`  |
/// | `PULSE_RISK_PERCENT`     | `risk.risk_percent`               |
/// | `PULSE_COOLDOWN_SECONDS` | `risk.cooldown_seconds`           |
pub fn load_config(config_dir: &Path) -> Result<BotConfig> {
    let read = |name: &str| -> Result<String> {
        let path = config_dir.join(name);
        std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read config file: {}", path.display()))
    };

    let app: AppConfig =
        serde_json::from_str(&read("app.json")?).context("parsing app.json")?;

    let trading: TradingConfig =
        serde_json::from_str(&read("trading.json")?).context("parsing trading.json")?;

    let risk: RiskConfig =
        serde_json::from_str(&read("risk.json")?).context("parsing risk.json")?;

    let exchange: ExchangeConfig =
        serde_json::from_str(&read("exchange.json")?).context("parsing exchange.json")?;

    let mut config = BotConfig {
        app,
        trading,
        risk,
        exchange,
    };

    apply_env_overrides(&mut config);
    validate::validate_config(&config)?;

    Ok(config)
}

// ---------------------------------------------------------------------------
// Environment variable overrides
// ---------------------------------------------------------------------------

/// Apply environment variable overrides to the loaded config.
///
/// Only non-empty env vars take effect. Parse failures are skipped (the JSON
/// default remains).
fn apply_env_overrides(config: &mut BotConfig) {
    if let Some(val) = env_bool("PULSE_PAPER") {
        info!(paper = val, "env override: PULSE_PAPER");
        config.exchange.paper = val;
    }

    if let Some(val) = env_bool("PULSE_SANDBOX") {
        info!(sandbox = val, "env override: PULSE_SANDBOX");
        config.exchange.sandbox = val;
    }

    if let Some(val) = env_string("PULSE_REST_URL") {
        info!("env override: PULSE_REST_URL");
        config.exchange.rest_url = val;
    }

    if let Some(val) = env_string("PULSE_SYMBOLS") {
        info!(symbols = %val, "env override: PULSE_SYMBOLS");
        config.trading.symbols = val.split(',').map(|s| s.trim().to_string()).collect();
    }

    if let Some(val) = env_string("PULSE_TIMEFRAME") {
        info!(timeframe = %val, "env override: PULSE_TIMEFRAME");
        config.trading.timeframe = val;
    }

    if let Some(val) = env_parse::<u64>("PULSE_CYCLE_SECONDS") {
        info!(val, "env override: PULSE_CYCLE_SECONDS");
        config.trading.cycle_interval_seconds = val;
    }

    if let Some(val) = env_decimal("PULSE_RISK_PERCENT") {
        info!(%val, "env override: PULSE_RISK_PERCENT");
        config.risk.risk_percent = val;
    }

    if let Some(val) = env_parse::<u64>("PULSE_COOLDOWN_SECONDS") {
        info!(val, "env override: PULSE_COOLDOWN_SECONDS");
        config.risk.cooldown_seconds = val;
    }
}

/// Read a non-empty env var as a `String`.
fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

/// Read a non-empty env var as a bool (`true`, `1`, `yes` → true).
fn env_bool(key: &str) -> Option<bool> {
    env_string(key).map(|v| matches!(v.to_lowercase().as_str(), "true" | "1" | "yes"))
}

/// Read a non-empty env var and parse it as `T`.
fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    env_string(key).and_then(|v| v.parse().ok())
}

/// Read a non-empty env var and parse it as `Decimal`.
fn env_decimal(key: &str) -> Option<Decimal> {
    env_string(key).and_then(|v| Decimal::from_str(&v).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serial_test::serial;

    // -----------------------------------------------------------------------
    // Helper: write a minimal set of config JSON files to a temp dir.
    // -----------------------------------------------------------------------

    fn write_test_configs(dir: &Path) {
        std::fs::write(
            dir.join("app.json"),
            r#"{
                "logging": { "log_dir": "logs" },
                "ledger_dir": "data/ledger",
                "state_dir": "data/state"
            }"#,
        )
        .unwrap();

        std::fs::write(
            dir.join("trading.json"),
            r#"{
                "symbols": ["BTC/USDT"],
                "timeframe": "15m",
                "candle_limit": 100,
                "cycle_interval_seconds": 60,
                "sync_interval_seconds": 30,
                "mode": "aggressive",
                "noise_epsilon": "0.0005",
                "leverage": 5,
                "indicators": {
                    "sma_period": 20,
                    "ema_fast": 12,
                    "ema_slow": 26,
                    "rsi_period": 14,
                    "atr_period": 14,
                    "macd_signal": 9,
                    "stoch_period": 14,
                    "stoch_smoothing": 3,
                    "min_bars": 50
                }
            }"#,
        )
        .unwrap();

        std::fs::write(
            dir.join("risk.json"),
            r#"{
                "risk_percent": "1",
                "max_position_fraction": "0.2",
                "min_trade_amount": "0.00001",
                "floor_volatility": "0.000001",
                "min_volatility_ratio": "0.001",
                "amount_precision": 5,
                "cooldown_seconds": 300,
                "signal_exit": { "take_profit_pct": "1.5", "stop_loss_pct": "1" },
                "forced_exit": { "take_profit_pct": "2", "stop_loss_pct": "5" }
            }"#,
        )
        .unwrap();

        std::fs::write(
            dir.join("exchange.json"),
            r#"{
                "rest_url": "",
                "sandbox": true,
                "paper": true,
                "quote_asset": "USDT",
                "recv_window_ms": 60000,
                "paper_starting_balance": "1000",
                "paper_slippage_bps": 5
            }"#,
        )
        .unwrap();
    }

    /// Remove all bot-related env vars so tests don't interfere with each other.
    fn clean_bot_env() {
        for key in [
            "PULSE_PAPER",
            "PULSE_SANDBOX",
            "PULSE_REST_URL",
            "PULSE_SYMBOLS",
            "PULSE_TIMEFRAME",
            "PULSE_CYCLE_SECONDS",
            "PULSE_RISK_PERCENT",
            "PULSE_COOLDOWN_SECONDS",
        ] {
            std::env::remove_var(key);
        }
    }

    // -----------------------------------------------------------------------
    // Tests
    // -----------------------------------------------------------------------

    #[test]
    #[serial]
    fn test_load_test_configs() {
        clean_bot_env();
        let tmp = tempfile::tempdir().unwrap();
        write_test_configs(tmp.path());
        let config = load_config(tmp.path()).expect("test config should load");
        assert_eq!(config.trading.symbols, vec!["BTC/USDT"]);
        assert!(config.exchange.paper);
        assert_eq!(config.risk.risk_percent, dec!(1));
        clean_bot_env();
    }

    #[test]
    #[serial]
    fn test_missing_config_file_errors() {
        clean_bot_env();
        let tmp = tempfile::tempdir().unwrap();
        let err = load_config(tmp.path()).unwrap_err();
        assert!(
            err.to_string().contains("failed to read config file"),
            "expected file-not-found error, got: {err}"
        );
        clean_bot_env();
    }

    #[test]
    #[serial]
    fn test_env_override_symbols() {
        clean_bot_env();
        let tmp = tempfile::tempdir().unwrap();
        write_test_configs(tmp.path());

        std::env::set_var("PULSE_SYMBOLS", "ETH/USDT, SOL/USDT");
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.trading.symbols, vec!["ETH/USDT", "SOL/USDT"]);
        clean_bot_env();
    }

    #[test]
    #[serial]
    fn test_env_override_risk_percent() {
        clean_bot_env();
        let tmp = tempfile::tempdir().unwrap();
        write_test_configs(tmp.path());

        std::env::set_var("PULSE_RISK_PERCENT", "2.5");
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.risk.risk_percent, dec!(2.5));
        clean_bot_env();
    }

    #[test]
    #[serial]
    fn test_env_override_empty_string_ignored() {
        clean_bot_env();
        let tmp = tempfile::tempdir().unwrap();
        write_test_configs(tmp.path());

        std::env::set_var("PULSE_CYCLE_SECONDS", "");
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.trading.cycle_interval_seconds, 60);
        clean_bot_env();
    }

    #[test]
    #[serial]
    fn test_env_override_invalid_parse_ignored() {
        clean_bot_env();
        let tmp = tempfile::tempdir().unwrap();
        write_test_configs(tmp.path());

        std::env::set_var("PULSE_CYCLE_SECONDS", "not_a_number");
        let config = load_config(tmp.path()).unwrap();
        assert_eq!(config.trading.cycle_interval_seconds, 60);
        clean_bot_env();
    }

    #[test]
    #[serial]
    fn test_validation_rejects_slow_reconciler() {
        clean_bot_env();
        let tmp = tempfile::tempdir().unwrap();
        write_test_configs(tmp.path());

        // Reconciler slower than the decision cycle is rejected.
        std::env::set_var("PULSE_CYCLE_SECONDS", "10");
        let err = load_config(tmp.path()).unwrap_err();
        assert!(
            err.to_string().contains("sync_interval_seconds"),
            "expected interval ordering error, got: {err}"
        );
        clean_bot_env();
    }

    #[test]
    #[serial]
    fn test_validation_rejects_bad_symbol() {
        clean_bot_env();
        let tmp = tempfile::tempdir().unwrap();
        write_test_configs(tmp.path());

        std::env::set_var("PULSE_SYMBOLS", "BTCUSDT");
        let err = load_config(tmp.path()).unwrap_err();
        assert!(
            err.to_string().contains("BASE/QUOTE"),
            "expected symbol format error, got: {err}"
        );
        clean_bot_env();
    }
}
