use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::position::{PendingOrder, PositionRecord, PositionSide};
use crate::types::signal::Signal;

/// Risk bookkeeping persisted per symbol.
///
/// Mutated only after a confirmed exchange acknowledgment. `entry_price`
/// is meaningful only while `position_size > 0`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RiskState {
    /// Milliseconds since epoch of the last confirmed fill; 0 = never traded.
    pub last_trade_timestamp: i64,
    #[serde(with = "rust_decimal::serde::str")]
    pub position_size: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub entry_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub daily_profit_pct: Decimal,
    pub trades_today: u32,
    pub consecutive_losses: u32,
    /// UTC day (YYYY-MM-DD) the daily counters belong to.
    pub last_reset_day: String,
}

impl Default for RiskState {
    fn default() -> Self {
        Self {
            last_trade_timestamp: 0,
            position_size: Decimal::ZERO,
            entry_price: Decimal::ZERO,
            daily_profit_pct: Decimal::ZERO,
            trades_today: 0,
            consecutive_losses: 0,
            last_reset_day: String::new(),
        }
    }
}

impl RiskState {
    /// Reset daily counters when the UTC day has rolled over.
    pub fn roll_day(&mut self, now: DateTime<Utc>) {
        let today = now.format("%Y-%m-%d").to_string();
        if self.last_reset_day != today {
            self.daily_profit_pct = Decimal::ZERO;
            self.trades_today = 0;
            self.last_reset_day = today;
        }
    }

    /// Milliseconds remaining in the cooldown window, zero when clear.
    pub fn cooldown_remaining_ms(&self, now_ms: i64, cooldown_ms: i64) -> i64 {
        if self.last_trade_timestamp == 0 {
            return 0;
        }
        (self.last_trade_timestamp + cooldown_ms - now_ms).max(0)
    }
}

/// Per-symbol aggregate of risk bookkeeping plus the exchange-sourced
/// position and pending-order caches. Persisted write-replace after every
/// mutation; the on-disk layout is camelCase JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TradeState {
    /// Milliseconds since epoch of the last state mutation.
    pub time: i64,
    pub signal: Signal,
    #[serde(with = "rust_decimal::serde::str")]
    pub entry: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub size: Decimal,
    pub side: Option<PositionSide>,
    #[serde(with = "rust_decimal::serde::str")]
    pub last_price: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub pnl: Decimal,
    #[serde(with = "rust_decimal::serde::str")]
    pub pnl_pct: Decimal,
    pub pending_orders: Vec<PendingOrder>,
    pub risk: RiskState,
}

impl Default for TradeState {
    fn default() -> Self {
        Self {
            time: 0,
            signal: Signal::Hold,
            entry: Decimal::ZERO,
            size: Decimal::ZERO,
            side: None,
            last_price: Decimal::ZERO,
            pnl: Decimal::ZERO,
            pnl_pct: Decimal::ZERO,
            pending_orders: Vec::new(),
            risk: RiskState::default(),
        }
    }
}

impl TradeState {
    /// True when an open position or any pending order blocks a new entry.
    pub fn has_exposure(&self) -> bool {
        self.size > Decimal::ZERO || !self.pending_orders.is_empty()
    }

    /// Cached open position, when one exists.
    pub fn position(&self, symbol: &str) -> Option<PositionRecord> {
        if self.size <= Decimal::ZERO {
            return None;
        }
        let side = self.side?;
        Some(PositionRecord {
            symbol: symbol.to_string(),
            side,
            entry_price: self.entry,
            contracts: self.size,
            unrealized_pnl: self.pnl,
            unrealized_pnl_pct: self.pnl_pct,
        })
    }

    /// Record a confirmed entry fill.
    pub fn record_entry(
        &mut self,
        now_ms: i64,
        signal: Signal,
        side: PositionSide,
        entry: Decimal,
        size: Decimal,
    ) {
        self.time = now_ms;
        self.signal = signal;
        self.entry = entry;
        self.size = size;
        self.side = Some(side);
        self.last_price = entry;
        self.pnl = Decimal::ZERO;
        self.pnl_pct = Decimal::ZERO;
        self.risk.last_trade_timestamp = now_ms;
        self.risk.trades_today += 1;
        self.risk.entry_price = entry;
        self.risk.position_size = size;
    }

    /// Record a confirmed exit fill, attributing realized P&L.
    pub fn record_exit(&mut self, now_ms: i64, signal: Signal, realized_pnl_pct: Decimal) {
        self.time = now_ms;
        self.signal = signal;
        self.entry = Decimal::ZERO;
        self.size = Decimal::ZERO;
        self.side = None;
        self.pnl = Decimal::ZERO;
        self.pnl_pct = Decimal::ZERO;
        self.risk.last_trade_timestamp = now_ms;
        self.risk.trades_today += 1;
        self.risk.entry_price = Decimal::ZERO;
        self.risk.position_size = Decimal::ZERO;
        self.risk.daily_profit_pct += realized_pnl_pct;
        if realized_pnl_pct < Decimal::ZERO {
            self.risk.consecutive_losses += 1;
        } else {
            self.risk.consecutive_losses = 0;
        }
    }

    /// Replace the cached position from an exchange sync pass. Absence of
    /// a position clears the cache.
    pub fn apply_position(&mut self, now_ms: i64, position: Option<&PositionRecord>) {
        self.time = now_ms;
        match position {
            Some(p) => {
                self.entry = p.entry_price;
                self.size = p.contracts;
                self.side = Some(p.side);
                self.pnl = p.unrealized_pnl;
                self.pnl_pct = p.unrealized_pnl_pct;
            }
            None => {
                self.entry = Decimal::ZERO;
                self.size = Decimal::ZERO;
                self.side = None;
                self.pnl = Decimal::ZERO;
                self.pnl_pct = Decimal::ZERO;
            }
        }
    }
}
