//! Pure computation module for technical indicators.
//!
//! No I/O, no side effects. Takes OHLCV bar windows and returns indicator
//! values; identical input always yields identical output. All computations
//! use `Decimal` for precision.
//!
//! Two deliberate departures from textbook definitions, kept for parity with
//! the live strategy's established behavior:
//! - EMA is seeded with the first close of the window, not an SMA seed.
//! - RSI and ATR average over the *first* `n` changes/true-ranges of the
//!   window only, with no running Wilder smoothing.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::config::IndicatorParams;
use crate::errors::BotError;
use crate::types::{Bar, IndicatorSnapshot, MacdValue, StochValue};

// ---------------------------------------------------------------------------
// Moving averages
// ---------------------------------------------------------------------------

/// Simple Moving Average: arithmetic mean of the last `period` closes.
///
/// Returns the last close when the window is shorter than `period`.
pub fn sma(closes: &[Decimal], period: usize) -> Decimal {
    if period == 0 || closes.is_empty() {
        return Decimal::ZERO;
    }
    if closes.len() < period {
        return closes[closes.len() - 1];
    }
    let window = &closes[closes.len() - period..];
    window.iter().copied().sum::<Decimal>() / Decimal::from(period as u64)
}

/// Exponential Moving Average over the full window.
///
/// Seeded with the first close (not an SMA seed); multiplier
/// `k = 2 / (period + 1)`. Returns one value per input close, so the output
/// aligns index-for-index with the input.
pub fn ema(closes: &[Decimal], period: usize) -> Vec<Decimal> {
    if closes.is_empty() || period == 0 {
        return Vec::new();
    }

    let k = dec!(2) / Decimal::from(period as u64 + 1);
    let one_minus_k = dec!(1) - k;

    let mut result = Vec::with_capacity(closes.len());
    result.push(closes[0]);

    for &close in &closes[1..] {
        let prev = result[result.len() - 1];
        result.push(close * k + prev * one_minus_k);
    }

    result
}

// ---------------------------------------------------------------------------
// Oscillators
// ---------------------------------------------------------------------------

/// Relative Strength Index over the first `period` changes of the window.
///
/// `rs = avgGain / avgLoss`, `rsi = 100 - 100/(1+rs)`. Saturates instead of
/// erroring: zero average loss reads 100, a fully flat window reads 50.
/// Returns 50 when the window is shorter than `period + 1`.
pub fn rsi(closes: &[Decimal], period: usize) -> Decimal {
    if period == 0 || closes.len() < period + 1 {
        return dec!(50);
    }

    let period_d = Decimal::from(period as u64);

    let mut gains = Decimal::ZERO;
    let mut losses = Decimal::ZERO;
    for w in closes.windows(2).take(period) {
        let change = w[1] - w[0];
        if change > Decimal::ZERO {
            gains += change;
        } else {
            losses += -change;
        }
    }

    let avg_gain = gains / period_d;
    let avg_loss = losses / period_d;

    if avg_loss == Decimal::ZERO {
        if avg_gain == Decimal::ZERO {
            return dec!(50);
        }
        return dec!(100);
    }

    let rs = avg_gain / avg_loss;
    dec!(100) - dec!(100) / (dec!(1) + rs)
}

/// Average True Range: simple mean of the first `period` true ranges.
///
/// `TR = max(H-L, |H-prevC|, |L-prevC|)`. Returns zero when the window is
/// shorter than `period + 1`.
pub fn atr(bars: &[Bar], period: usize) -> Decimal {
    if period == 0 || bars.len() < period + 1 {
        return Decimal::ZERO;
    }

    let mut sum = Decimal::ZERO;
    for i in 1..=period {
        let hl = bars[i].high - bars[i].low;
        let hc = (bars[i].high - bars[i - 1].close).abs();
        let lc = (bars[i].low - bars[i - 1].close).abs();
        sum += hl.max(hc).max(lc);
    }

    sum / Decimal::from(period as u64)
}

/// Moving Average Convergence Divergence.
///
/// MACD line = fast EMA − slow EMA, elementwise over the full-window EMA
/// series; signal = `signal_period` EMA of that difference.
pub fn macd(closes: &[Decimal], fast: usize, slow: usize, signal_period: usize) -> MacdValue {
    let fast_ema = ema(closes, fast);
    let slow_ema = ema(closes, slow);

    if fast_ema.is_empty() || slow_ema.is_empty() {
        return MacdValue {
            macd: Decimal::ZERO,
            signal: Decimal::ZERO,
            histogram: Decimal::ZERO,
        };
    }

    // Both series align with the input, so the difference is elementwise.
    let diff: Vec<Decimal> = fast_ema
        .iter()
        .zip(slow_ema.iter())
        .map(|(f, s)| f - s)
        .collect();

    let signal_ema = ema(&diff, signal_period);

    let macd_line = diff[diff.len() - 1];
    let signal_line = signal_ema[signal_ema.len() - 1];

    MacdValue {
        macd: macd_line,
        signal: signal_line,
        histogram: macd_line - signal_line,
    }
}

/// Stochastic oscillator: %K over the last `period` bars, %D as a
/// `smoothing`-period mean of %K.
///
/// A flat high/low range saturates %K to 50.
pub fn stochastic(bars: &[Bar], period: usize, smoothing: usize) -> StochValue {
    if period == 0 || smoothing == 0 || bars.len() < period + smoothing - 1 {
        return StochValue {
            k: dec!(50),
            d: dec!(50),
        };
    }

    // %K for a window ending at index `end` (inclusive).
    let k_at = |end: usize| -> Decimal {
        let window = &bars[end + 1 - period..=end];
        let highest = window
            .iter()
            .map(|b| b.high)
            .fold(window[0].high, Decimal::max);
        let lowest = window
            .iter()
            .map(|b| b.low)
            .fold(window[0].low, Decimal::min);
        let range = highest - lowest;
        if range == Decimal::ZERO {
            return dec!(50);
        }
        (bars[end].close - lowest) / range * dec!(100)
    };

    let last = bars.len() - 1;
    let k = k_at(last);

    let mut d_sum = Decimal::ZERO;
    for end in last + 1 - smoothing..=last {
        d_sum += k_at(end);
    }
    let d = d_sum / Decimal::from(smoothing as u64);

    StochValue { k, d }
}

// ---------------------------------------------------------------------------
// Composite
// ---------------------------------------------------------------------------

/// Compute one snapshot from the full bar window.
fn snapshot(bars: &[Bar], params: &IndicatorParams) -> IndicatorSnapshot {
    let closes: Vec<Decimal> = bars.iter().map(|b| b.close).collect();
    let price = closes[closes.len() - 1];

    let ema_fast_vals = ema(&closes, params.ema_fast);
    let ema_slow_vals = ema(&closes, params.ema_slow);
    let atr_val = atr(bars, params.atr_period);

    let volatility_ratio = if price > Decimal::ZERO {
        atr_val / price
    } else {
        Decimal::ZERO
    };

    IndicatorSnapshot {
        price,
        sma20: sma(&closes, params.sma_period),
        ema_fast: ema_fast_vals[ema_fast_vals.len() - 1],
        ema_slow: ema_slow_vals[ema_slow_vals.len() - 1],
        rsi: rsi(&closes, params.rsi_period),
        atr: atr_val,
        macd: macd(&closes, params.ema_fast, params.ema_slow, params.macd_signal),
        stoch: stochastic(bars, params.stoch_period, params.stoch_smoothing),
        volatility_ratio,
    }
}

/// Compute the current and previous indicator snapshots from one bar window.
///
/// The previous snapshot is computed over the window minus its final bar, so
/// the classifier can detect true crossing events. Fails with
/// [`BotError::InsufficientData`] below `params.min_bars`.
pub fn compute_pair(
    bars: &[Bar],
    params: &IndicatorParams,
) -> Result<(IndicatorSnapshot, IndicatorSnapshot), BotError> {
    if bars.len() < params.min_bars {
        return Err(BotError::InsufficientData {
            have: bars.len(),
            need: params.min_bars,
        });
    }

    let current = snapshot(bars, params);
    let previous = snapshot(&bars[..bars.len() - 1], params);

    Ok((current, previous))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
