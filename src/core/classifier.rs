//! Signal classification from consecutive indicator snapshots.
//!
//! Pure function of `(current, previous, context)`; both rule sets share the
//! noise-band guard and emit exactly one [`Signal`] per call. The rule sets:
//!
//! - `conservative` — ordered threshold rules on EMA/SMA/RSI, spot-style
//!   `Buy`/`Sell` decisions, first match wins.
//! - `aggressive` — profit/loss exits against the recorded entry price,
//!   then strict EMA crossing events confirmed by MACD, stochastic, and a
//!   volatility floor for directional `Long`/`Short` entries.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::config::ExitRules;
use crate::types::{ClassifierMode, IndicatorSnapshot, PositionSide, Signal};

/// Caller-supplied position context for exit rules.
#[derive(Debug, Clone, Copy, Default)]
pub struct ClassifyContext {
    /// Base-asset quantity currently held.
    pub held_quantity: Decimal,
    /// Open position direction and entry price, when one exists.
    pub position: Option<(PositionSide, Decimal)>,
}

impl ClassifyContext {
    fn has_open_long(&self) -> bool {
        match self.position {
            Some((PositionSide::Long, _)) => true,
            Some((PositionSide::Short, _)) => false,
            None => self.held_quantity > Decimal::ZERO,
        }
    }
}

pub struct SignalClassifier {
    mode: ClassifierMode,
    /// EMA separation below which everything is noise.
    epsilon: Decimal,
    exit: ExitRules,
    /// ATR/price floor required for aggressive entries.
    min_volatility_ratio: Decimal,
}

impl SignalClassifier {
    pub fn new(
        mode: ClassifierMode,
        epsilon: Decimal,
        exit: ExitRules,
        min_volatility_ratio: Decimal,
    ) -> Self {
        Self {
            mode,
            epsilon,
            exit,
            min_volatility_ratio,
        }
    }

    /// Classify one snapshot pair into a trade signal.
    pub fn classify(
        &self,
        curr: &IndicatorSnapshot,
        prev: &IndicatorSnapshot,
        ctx: &ClassifyContext,
    ) -> Signal {
        // Noise band: a flat EMA spread means whipsaw territory, hold
        // unconditionally. Position safety is the reconciler's job.
        if (curr.ema_fast - curr.ema_slow).abs() < self.epsilon {
            return Signal::Hold;
        }

        match self.mode {
            ClassifierMode::Conservative => self.classify_conservative(curr, prev, ctx),
            ClassifierMode::Aggressive => self.classify_aggressive(curr, prev, ctx),
        }
    }

    // -- Conservative rules, in order, first match wins ---------------------

    fn classify_conservative(
        &self,
        curr: &IndicatorSnapshot,
        prev: &IndicatorSnapshot,
        ctx: &ClassifyContext,
    ) -> Signal {
        let golden = curr.ema_fast > curr.ema_slow;
        let death = curr.ema_fast < curr.ema_slow;

        // 1. Trend entry: golden cross ordering, price above SMA, RSI not
        //    overbought.
        if golden && curr.price > curr.sma20 && curr.rsi <= dec!(70) {
            return Signal::Buy;
        }

        // 2. Oversold bounce: RSI recovering from below 30 without a
        //    simultaneous death cross.
        if curr.rsi < dec!(30) && curr.rsi > prev.rsi && !death {
            return Signal::Buy;
        }

        // 3. Technical exit, only meaningful with an open long.
        if (death || curr.rsi > dec!(70)) && ctx.has_open_long() {
            return Signal::Sell;
        }

        Signal::Hold
    }

    // -- Aggressive rules ---------------------------------------------------

    fn classify_aggressive(
        &self,
        curr: &IndicatorSnapshot,
        prev: &IndicatorSnapshot,
        ctx: &ClassifyContext,
    ) -> Signal {
        // Profit/loss exits beat technical exits.
        if let Some((side, entry)) = ctx.position {
            if entry > Decimal::ZERO {
                let pct = match side {
                    PositionSide::Long => (curr.price - entry) / entry * dec!(100),
                    PositionSide::Short => (entry - curr.price) / entry * dec!(100),
                };
                if pct >= self.exit.take_profit_pct || pct <= -self.exit.stop_loss_pct {
                    return Signal::Sell;
                }
            }
        }

        // Entries require a true crossing event, not merely an ordering,
        // plus momentum agreement and enough volatility to be worth paying
        // the spread.
        let crossed_up = prev.ema_fast <= prev.ema_slow && curr.ema_fast > curr.ema_slow;
        let crossed_down = prev.ema_fast >= prev.ema_slow && curr.ema_fast < curr.ema_slow;
        let volatile = curr.volatility_ratio >= self.min_volatility_ratio;

        if crossed_up
            && curr.macd.histogram > Decimal::ZERO
            && curr.stoch.k > curr.stoch.d
            && volatile
        {
            return Signal::Long;
        }

        if crossed_down
            && curr.macd.histogram < Decimal::ZERO
            && curr.stoch.k < curr.stoch.d
            && volatile
        {
            return Signal::Short;
        }

        // Technical exit for a surviving long.
        if (curr.ema_fast < curr.ema_slow || curr.rsi > dec!(70)) && ctx.has_open_long() {
            return Signal::Sell;
        }

        Signal::Hold
    }
}
