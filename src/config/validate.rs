use anyhow::{bail, Result};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::types::BotConfig;

/// Validate invariants across the merged config that serde alone cannot
/// enforce. Called automatically by [`super::load_config`]; failures here are
/// fatal at startup.
pub fn validate_config(config: &BotConfig) -> Result<()> {
    let mut errors: Vec<String> = Vec::new();

    validate_trading_config(config, &mut errors);
    validate_risk_config(config, &mut errors);
    validate_exchange_config(config, &mut errors);

    if errors.is_empty() {
        Ok(())
    } else {
        let msg = format!(
            "Configuration validation failed ({} error{}):\n  - {}",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" },
            errors.join("\n  - ")
        );
        bail!("{msg}");
    }
}

// ---------------------------------------------------------------------------
// Trading config
// ---------------------------------------------------------------------------

fn validate_trading_config(config: &BotConfig, errors: &mut Vec<String>) {
    let trading = &config.trading;

    if trading.symbols.is_empty() {
        errors.push("trading: symbols list is empty".into());
    }

    for symbol in &trading.symbols {
        if let Err(e) = validate_symbol(symbol) {
            errors.push(format!("trading.symbols: {e}"));
        }
    }

    if trading.cycle_interval_seconds == 0 {
        errors.push("trading: cycle_interval_seconds must be > 0".into());
    }
    if trading.sync_interval_seconds == 0 {
        errors.push("trading: sync_interval_seconds must be > 0".into());
    }
    // The reconciler must run at least as often as the decision cycle.
    if trading.sync_interval_seconds > trading.cycle_interval_seconds {
        errors.push(format!(
            "trading: sync_interval_seconds ({}) must be <= cycle_interval_seconds ({})",
            trading.sync_interval_seconds, trading.cycle_interval_seconds
        ));
    }

    if trading.noise_epsilon < Decimal::ZERO {
        errors.push(format!(
            "trading: noise_epsilon ({}) must be >= 0",
            trading.noise_epsilon
        ));
    }

    if trading.leverage == 0 || trading.leverage > 125 {
        errors.push(format!(
            "trading: leverage ({}) must be in [1, 125]",
            trading.leverage
        ));
    }

    let ind = &trading.indicators;
    if ind.ema_fast >= ind.ema_slow {
        errors.push(format!(
            "trading.indicators: ema_fast ({}) must be < ema_slow ({})",
            ind.ema_fast, ind.ema_slow
        ));
    }

    // Longest lookback plus the crossover's previous-snapshot bar.
    let required = ind
        .sma_period
        .max(ind.ema_slow)
        .max(ind.rsi_period)
        .max(ind.atr_period)
        .max(ind.stoch_period)
        + 2;
    if ind.min_bars < required {
        errors.push(format!(
            "trading.indicators: min_bars ({}) must be >= longest lookback + 2 ({})",
            ind.min_bars, required
        ));
    }
    if (trading.candle_limit as usize) < ind.min_bars {
        errors.push(format!(
            "trading: candle_limit ({}) must be >= indicators.min_bars ({})",
            trading.candle_limit, ind.min_bars
        ));
    }
}

// ---------------------------------------------------------------------------
// Risk config
// ---------------------------------------------------------------------------

fn validate_risk_config(config: &BotConfig, errors: &mut Vec<String>) {
    let risk = &config.risk;

    if risk.risk_percent <= Decimal::ZERO || risk.risk_percent > dec!(100) {
        errors.push(format!(
            "risk: risk_percent ({}) must be in (0, 100]",
            risk.risk_percent
        ));
    }

    if risk.max_position_fraction <= Decimal::ZERO || risk.max_position_fraction > dec!(1) {
        errors.push(format!(
            "risk: max_position_fraction ({}) must be in (0, 1]",
            risk.max_position_fraction
        ));
    }

    if risk.min_trade_amount < Decimal::ZERO {
        errors.push(format!(
            "risk: min_trade_amount ({}) must be >= 0",
            risk.min_trade_amount
        ));
    }

    if risk.floor_volatility <= Decimal::ZERO {
        errors.push(format!(
            "risk: floor_volatility ({}) must be > 0",
            risk.floor_volatility
        ));
    }

    for (name, rules) in [("signal_exit", &risk.signal_exit), ("forced_exit", &risk.forced_exit)] {
        if rules.take_profit_pct <= Decimal::ZERO {
            errors.push(format!(
                "risk.{name}: take_profit_pct ({}) must be > 0",
                rules.take_profit_pct
            ));
        }
        if rules.stop_loss_pct <= Decimal::ZERO {
            errors.push(format!(
                "risk.{name}: stop_loss_pct ({}) must be > 0",
                rules.stop_loss_pct
            ));
        }
    }
}

// ---------------------------------------------------------------------------
// Exchange config
// ---------------------------------------------------------------------------

fn validate_exchange_config(config: &BotConfig, errors: &mut Vec<String>) {
    let exchange = &config.exchange;

    if !exchange.rest_url.is_empty() && !exchange.rest_url.starts_with("https://") {
        errors.push(format!(
            "exchange: rest_url ('{}') must use https",
            exchange.rest_url
        ));
    }

    if exchange.quote_asset.is_empty() {
        errors.push("exchange: quote_asset is empty".into());
    }

    if exchange.recv_window_ms == 0 || exchange.recv_window_ms > 60_000 {
        errors.push(format!(
            "exchange: recv_window_ms ({}) must be in [1, 60000]",
            exchange.recv_window_ms
        ));
    }

    if exchange.paper && exchange.paper_starting_balance <= Decimal::ZERO {
        errors.push(format!(
            "exchange: paper_starting_balance ({}) must be > 0 in paper mode",
            exchange.paper_starting_balance
        ));
    }

    if exchange.paper_slippage_bps > 500 {
        errors.push(format!(
            "exchange: paper_slippage_bps ({}) exceeds 500 (5%)",
            exchange.paper_slippage_bps
        ));
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Validate a unified symbol string: `BASE/QUOTE`, both legs non-empty
/// uppercase alphanumerics.
fn validate_symbol(symbol: &str) -> Result<(), String> {
    let Some((base, quote)) = symbol.split_once('/') else {
        return Err(format!("symbol '{symbol}' must be BASE/QUOTE"));
    };
    for leg in [base, quote] {
        if leg.is_empty() {
            return Err(format!("symbol '{symbol}' has an empty leg"));
        }
        if !leg.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) {
            return Err(format!(
                "symbol '{symbol}' must use uppercase alphanumeric legs"
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_symbol_valid() {
        assert!(validate_symbol("BTC/USDT").is_ok());
        assert!(validate_symbol("1000PEPE/USDT").is_ok());
    }

    #[test]
    fn test_validate_symbol_missing_slash() {
        let err = validate_symbol("BTCUSDT").unwrap_err();
        assert!(err.contains("BASE/QUOTE"));
    }

    #[test]
    fn test_validate_symbol_empty_leg() {
        assert!(validate_symbol("BTC/").is_err());
        assert!(validate_symbol("/USDT").is_err());
    }

    #[test]
    fn test_validate_symbol_lowercase_rejected() {
        let err = validate_symbol("btc/usdt").unwrap_err();
        assert!(err.contains("uppercase"));
    }
}
