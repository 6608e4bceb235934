//! Decision cycle orchestration.
//!
//! One timer-driven pass per cycle interval walks every symbol through
//! `Idle → Cooling → Fetching → Deciding → Sizing → Gating → Submitting →
//! Updating → Idle`. An in-flight guard prevents overlapping passes, a
//! backoff deadline stretches the next pass after the exchange goes away,
//! and risk state is mutated only after a confirmed order acknowledgment.
//! Shutdown is observed between cycles only, never between submission and
//! persistence.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::sync::Mutex as StdMutex;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{BotConfig, ExitRules, IndicatorParams};
use crate::core::classifier::{ClassifyContext, SignalClassifier};
use crate::core::indicators;
use crate::core::ledger::{LedgerEvent, LedgerRecord, TradeLedger};
use crate::core::reconciler::unrealized_pnl;
use crate::core::sizing::RiskSizer;
use crate::errors::BotError;
use crate::exchange::ExchangeGateway;
use crate::storage::StateStore;
use crate::types::{OrderKind, OrderSide, PositionSide, Signal, TradeState};

/// Phase of one decision cycle, used for structured logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Cooling,
    Fetching,
    Deciding,
    Sizing,
    Gating,
    Submitting,
    Updating,
}

impl CycleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Cooling => "cooling",
            Self::Fetching => "fetching",
            Self::Deciding => "deciding",
            Self::Sizing => "sizing",
            Self::Gating => "gating",
            Self::Submitting => "submitting",
            Self::Updating => "updating",
        }
    }
}

pub struct CycleController {
    gateway: Arc<dyn ExchangeGateway>,
    store: Arc<StateStore>,
    ledger: Arc<TradeLedger>,

    symbols: Vec<String>,
    timeframe: String,
    candle_limit: u32,
    cycle_interval: Duration,
    cooldown_ms: i64,
    leverage: u32,
    quote_asset: String,
    indicator_params: IndicatorParams,
    classifier: SignalClassifier,
    sizer: RiskSizer,
    /// Trigger thresholds for the companion stop / take-profit orders
    /// placed after a futures entry.
    companion_rules: ExitRules,

    in_flight: AtomicBool,
    backoff_until: StdMutex<Option<Instant>>,
    shutdown: CancellationToken,
}

impl CycleController {
    pub fn new(
        gateway: Arc<dyn ExchangeGateway>,
        store: Arc<StateStore>,
        ledger: Arc<TradeLedger>,
        config: &BotConfig,
        shutdown: CancellationToken,
    ) -> Self {
        let classifier = SignalClassifier::new(
            config.trading.mode,
            config.trading.noise_epsilon,
            config.risk.signal_exit,
            config.risk.min_volatility_ratio,
        );

        Self {
            gateway,
            store,
            ledger,
            symbols: config.trading.symbols.clone(),
            timeframe: config.trading.timeframe.clone(),
            candle_limit: config.trading.candle_limit,
            cycle_interval: Duration::from_secs(config.trading.cycle_interval_seconds),
            cooldown_ms: config.risk.cooldown_seconds as i64 * 1000,
            leverage: config.trading.leverage,
            quote_asset: config.exchange.quote_asset.clone(),
            indicator_params: config.trading.indicators,
            classifier,
            sizer: RiskSizer::new(&config.risk),
            companion_rules: config.risk.forced_exit,
            in_flight: AtomicBool::new(false),
            backoff_until: StdMutex::new(None),
            shutdown,
        }
    }

    pub async fn run(&self) {
        info!(
            symbols = ?self.symbols,
            interval_secs = self.cycle_interval.as_secs(),
            "cycle controller started"
        );

        let mut timer = tokio::time::interval(self.cycle_interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("cycle controller stopped");
                    return;
                }
                _ = timer.tick() => {
                    if self.in_backoff() {
                        debug!("backoff active, skipping cycle");
                        continue;
                    }
                    // Overlapping passes could double-submit orders.
                    if self.in_flight.swap(true, Ordering::SeqCst) {
                        warn!("previous cycle still in flight, skipping tick");
                        continue;
                    }
                    for symbol in &self.symbols {
                        if let Err(e) = self.run_cycle(symbol).await {
                            warn!(symbol = %symbol, error = %e, "cycle failed");
                        }
                    }
                    self.in_flight.store(false, Ordering::SeqCst);
                }
            }
        }
    }

    fn in_backoff(&self) -> bool {
        let guard = self.backoff_until.lock().unwrap_or_else(|e| e.into_inner());
        matches!(*guard, Some(deadline) if deadline > Instant::now())
    }

    fn apply_backoff(&self) {
        let mut guard = self.backoff_until.lock().unwrap_or_else(|e| e.into_inner());
        *guard = Some(Instant::now() + self.cycle_interval);
        warn!(
            extend_secs = self.cycle_interval.as_secs(),
            "exchange unavailable, extending next cycle"
        );
    }

    /// One full decision cycle for one symbol.
    async fn run_cycle(&self, symbol: &str) -> Result<(), BotError> {
        let Some(handle) = self.store.state(symbol) else {
            return Ok(());
        };

        // -- Cooling --------------------------------------------------------
        // The symbols share one pass, so a cooling symbol is skipped rather
        // than waited on; the next tick re-evaluates it.
        {
            let mut state = handle.lock().await;
            let now = Utc::now();
            state.risk.roll_day(now);
            let remaining = state
                .risk
                .cooldown_remaining_ms(now.timestamp_millis(), self.cooldown_ms);
            if remaining > 0 {
                debug!(
                    state = CycleState::Cooling.as_str(),
                    symbol = %symbol,
                    remaining_ms = remaining,
                    "cooldown active, skipping cycle"
                );
                return Ok(());
            }
        }

        // -- Fetching -------------------------------------------------------
        debug!(state = CycleState::Fetching.as_str(), symbol = %symbol, "fetching market data");

        let fetched = async {
            let bars = self
                .gateway
                .fetch_candles(symbol, &self.timeframe, self.candle_limit)
                .await?;
            let ticker = self.gateway.fetch_ticker(symbol).await?;
            let balance = self.gateway.fetch_balance().await?;
            Ok::<_, BotError>((bars, ticker, balance))
        }
        .await;

        let (bars, ticker, balance) = match fetched {
            Ok(data) => data,
            Err(e @ BotError::ExchangeUnavailable { .. }) => {
                self.apply_backoff();
                return Err(e);
            }
            Err(e) => return Err(e),
        };

        // -- Deciding -------------------------------------------------------
        let (curr, prev) = match indicators::compute_pair(&bars, &self.indicator_params) {
            Ok(pair) => pair,
            Err(BotError::InsufficientData { have, need }) => {
                warn!(symbol = %symbol, have, need, "insufficient data, skipping cycle");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let mut state = handle.lock().await;

        let ctx = ClassifyContext {
            held_quantity: state.size,
            position: state.side.map(|side| (side, state.entry)),
        };
        let signal = self.classifier.classify(&curr, &prev, &ctx);

        info!(
            state = CycleState::Deciding.as_str(),
            symbol = %symbol,
            signal = signal.as_str(),
            price = %curr.price,
            ema_fast = %curr.ema_fast,
            ema_slow = %curr.ema_slow,
            rsi = %curr.rsi,
            atr = %curr.atr,
            "decision"
        );

        if !signal.is_actionable() {
            return Ok(());
        }

        // -- Sizing ---------------------------------------------------------
        let is_entry = matches!(signal, Signal::Buy | Signal::Long | Signal::Short);
        let free = balance.free(&self.quote_asset);
        let portfolio = balance.total(&self.quote_asset);

        let qty = if is_entry {
            self.sizer
                .entry_quantity(portfolio, curr.atr, ticker.last, free)
        } else {
            self.sizer.exit_quantity(state.size, state.size)
        };

        debug!(
            state = CycleState::Sizing.as_str(),
            symbol = %symbol,
            qty = %qty,
            free = %free,
            portfolio = %portfolio,
            "sized"
        );

        // -- Gating ---------------------------------------------------------
        if qty <= Decimal::ZERO {
            info!(
                state = CycleState::Gating.as_str(),
                symbol = %symbol,
                signal = signal.as_str(),
                "no viable quantity, order suppressed"
            );
            return Ok(());
        }

        if is_entry && state.has_exposure() {
            info!(
                state = CycleState::Gating.as_str(),
                symbol = %symbol,
                size = %state.size,
                pending = state.pending_orders.len(),
                "existing exposure blocks new entry"
            );
            return Ok(());
        }

        if is_entry && qty * ticker.last > free {
            info!(
                state = CycleState::Gating.as_str(),
                symbol = %symbol,
                required = %(qty * ticker.last),
                available = %free,
                "insufficient balance, order suppressed"
            );
            return Ok(());
        }

        // -- Submitting -----------------------------------------------------
        let side = match signal {
            Signal::Buy | Signal::Long => OrderSide::Buy,
            Signal::Short => OrderSide::Sell,
            Signal::Sell => state
                .side
                .map(|s| s.closing_side())
                .unwrap_or(OrderSide::Sell),
            Signal::Hold => return Ok(()),
        };

        if is_entry {
            self.gateway.set_leverage(symbol, self.leverage).await?;
        }

        info!(
            state = CycleState::Submitting.as_str(),
            symbol = %symbol,
            side = side.as_str(),
            qty = %qty,
            "submitting market order"
        );

        let ack = match self.gateway.submit_market_order(symbol, side, qty).await {
            Ok(ack) => ack,
            Err(e) => {
                // Never retried blindly; the next cycle re-evaluates from a
                // fresh signal. No state mutation.
                warn!(symbol = %symbol, error = %e, "order failed, state unchanged");
                return Ok(());
            }
        };

        // -- Updating -------------------------------------------------------
        let now_ms = Utc::now().timestamp_millis();
        let event;

        if is_entry {
            let position_side = match signal {
                Signal::Short => PositionSide::Short,
                _ => PositionSide::Long,
            };
            state.record_entry(now_ms, signal, position_side, ticker.last, qty);
            event = LedgerEvent::Entry;

            info!(
                state = CycleState::Updating.as_str(),
                symbol = %symbol,
                order_id = %ack.id,
                entry = %ticker.last,
                size = %qty,
                "entry confirmed"
            );

            if matches!(signal, Signal::Long | Signal::Short) {
                self.place_companions(symbol, position_side, ticker.last, qty, &mut state)
                    .await;
            }
        } else {
            let realized_pct = state
                .side
                .map(|s| unrealized_pnl(s, state.entry, ticker.last, qty).1)
                .unwrap_or(Decimal::ZERO);
            state.record_exit(now_ms, signal, realized_pct);
            event = LedgerEvent::Exit;

            info!(
                state = CycleState::Updating.as_str(),
                symbol = %symbol,
                order_id = %ack.id,
                realized_pct = %realized_pct,
                "exit confirmed"
            );
        }

        if let Err(e) = self.store.persist(symbol, &state) {
            error!(symbol = %symbol, error = %e, "state persistence failed");
        }

        let balance_after = match self.gateway.fetch_balance().await {
            Ok(b) => b.free(&self.quote_asset),
            Err(_) => Decimal::ZERO,
        };

        if let Err(e) = self.ledger.append(LedgerRecord {
            timestamp: now_ms,
            symbol: symbol.to_string(),
            event,
            signal,
            quantity: qty,
            price: ticker.last,
            balance_before: free,
            balance_after,
            reason: format!("signal {}", signal.as_str()),
        }) {
            error!(symbol = %symbol, error = %e, "ledger append failed");
        }

        Ok(())
    }

    /// Place the protective stop and take-profit companions after a filled
    /// futures entry. Failures are logged only; the reconciler's forced exit
    /// covers an unprotected position.
    async fn place_companions(
        &self,
        symbol: &str,
        side: PositionSide,
        entry: Decimal,
        qty: Decimal,
        state: &mut TradeState,
    ) {
        let hundred = Decimal::ONE_HUNDRED;
        let (stop_trigger, tp_trigger) = match side {
            PositionSide::Long => (
                entry * (hundred - self.companion_rules.stop_loss_pct) / hundred,
                entry * (hundred + self.companion_rules.take_profit_pct) / hundred,
            ),
            PositionSide::Short => (
                entry * (hundred + self.companion_rules.stop_loss_pct) / hundred,
                entry * (hundred - self.companion_rules.take_profit_pct) / hundred,
            ),
        };
        let closing = side.closing_side();

        for (kind, trigger) in [(OrderKind::Stop, stop_trigger), (OrderKind::TakeProfit, tp_trigger)] {
            match self
                .gateway
                .submit_conditional_order(symbol, kind, closing, qty, trigger)
                .await
            {
                Ok(ack) => {
                    debug!(
                        symbol = %symbol,
                        kind = kind.as_str(),
                        trigger = %trigger,
                        order_id = %ack.id,
                        "companion order placed"
                    );
                    state.pending_orders.push(crate::types::PendingOrder {
                        id: ack.id,
                        order_type: kind.as_str().to_string(),
                        side: closing,
                        price: trigger,
                        amount: qty,
                        status: "open".to_string(),
                    });
                }
                Err(e) => {
                    warn!(symbol = %symbol, kind = kind.as_str(), error = %e, "companion order failed");
                }
            }
        }
    }
}
