//! Position/order reconciliation against exchange truth.
//!
//! Runs on its own timer, at least as often as the decision cycle. Each pass
//! wholesale-replaces the cached pending orders and position from the
//! exchange, recomputes unrealized excursion, and forces a market close when
//! the excursion crosses the configured thresholds. Any fetch or order
//! failure is logged and treated as "no change".

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ExitRules;
use crate::core::ledger::{LedgerEvent, LedgerRecord, TradeLedger};
use crate::exchange::ExchangeGateway;
use crate::storage::StateStore;
use crate::types::{PositionSide, Signal};

/// Unrealized P&L for a position: absolute quote amount and percent of
/// entry. Shorts invert the sign.
pub fn unrealized_pnl(
    side: PositionSide,
    entry: Decimal,
    last: Decimal,
    contracts: Decimal,
) -> (Decimal, Decimal) {
    if entry <= Decimal::ZERO {
        return (Decimal::ZERO, Decimal::ZERO);
    }
    let diff = match side {
        PositionSide::Long => last - entry,
        PositionSide::Short => entry - last,
    };
    (diff * contracts, diff / entry * dec!(100))
}

/// Forced-exit predicate: trigger exactly at the thresholds, inclusive.
pub fn exit_triggered(pct: Decimal, rules: &ExitRules) -> bool {
    pct >= rules.take_profit_pct || pct <= -rules.stop_loss_pct
}

pub struct Reconciler {
    gateway: Arc<dyn ExchangeGateway>,
    store: Arc<StateStore>,
    ledger: Arc<TradeLedger>,
    symbols: Vec<String>,
    sync_interval: Duration,
    exit_rules: ExitRules,
    quote_asset: String,
    shutdown: CancellationToken,
}

impl Reconciler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gateway: Arc<dyn ExchangeGateway>,
        store: Arc<StateStore>,
        ledger: Arc<TradeLedger>,
        symbols: Vec<String>,
        sync_interval: Duration,
        exit_rules: ExitRules,
        quote_asset: String,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            gateway,
            store,
            ledger,
            symbols,
            sync_interval,
            exit_rules,
            quote_asset,
            shutdown,
        }
    }

    pub async fn run(&self) {
        info!(
            interval_secs = self.sync_interval.as_secs(),
            tp = %self.exit_rules.take_profit_pct,
            sl = %self.exit_rules.stop_loss_pct,
            "reconciler started"
        );

        let mut timer = tokio::time::interval(self.sync_interval);
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    info!("reconciler stopped");
                    return;
                }
                _ = timer.tick() => {
                    for symbol in &self.symbols {
                        if let Err(e) = self.reconcile_symbol(symbol).await {
                            warn!(symbol = %symbol, error = %e, "reconcile pass failed, no change applied");
                        }
                    }
                }
            }
        }
    }

    /// One sync + enforce pass for one symbol, under the symbol's state lock
    /// so a concurrent decision cycle cannot interleave.
    async fn reconcile_symbol(&self, symbol: &str) -> anyhow::Result<()> {
        let Some(handle) = self.store.state(symbol) else {
            return Ok(());
        };
        let mut state = handle.lock().await;

        // Exchange state is authoritative: replace, never patch.
        let orders = self.gateway.fetch_open_orders(symbol).await?;
        let positions = self
            .gateway
            .fetch_open_positions(&[symbol.to_string()])
            .await?;
        let ticker = self.gateway.fetch_ticker(symbol).await?;

        let now_ms = Utc::now().timestamp_millis();
        state.pending_orders = orders;
        state.last_price = ticker.last;

        let mut position = positions.into_iter().next();
        if let Some(p) = position.as_mut() {
            let (pnl, pct) = unrealized_pnl(p.side, p.entry_price, ticker.last, p.contracts);
            p.unrealized_pnl = pnl;
            p.unrealized_pnl_pct = pct;
        }
        state.apply_position(now_ms, position.as_ref());

        debug!(
            symbol = %symbol,
            last = %ticker.last,
            size = %state.size,
            pnl_pct = %state.pnl_pct,
            pending = state.pending_orders.len(),
            "sync complete"
        );

        if let Some(p) = position {
            if exit_triggered(p.unrealized_pnl_pct, &self.exit_rules) {
                self.force_close(symbol, &mut state, &p).await;
            }
        }

        self.store.persist(symbol, &state)?;
        Ok(())
    }

    /// Submit a closing market order for the full held quantity. Only a
    /// confirmed acknowledgment mutates state; a rejection leaves the cached
    /// position for the next pass.
    async fn force_close(
        &self,
        symbol: &str,
        state: &mut crate::types::TradeState,
        position: &crate::types::PositionRecord,
    ) {
        let side = position.side.closing_side();
        let pct = position.unrealized_pnl_pct;

        info!(
            symbol = %symbol,
            side = side.as_str(),
            contracts = %position.contracts,
            pnl_pct = %pct,
            "excursion threshold crossed, forcing close"
        );

        let balance_before = match self.gateway.fetch_balance().await {
            Ok(b) => b.free(&self.quote_asset),
            Err(_) => Decimal::ZERO,
        };

        match self
            .gateway
            .submit_market_order(symbol, side, position.contracts)
            .await
        {
            Ok(ack) => {
                let now_ms = Utc::now().timestamp_millis();
                state.record_exit(now_ms, Signal::Sell, pct);

                let balance_after = match self.gateway.fetch_balance().await {
                    Ok(b) => b.free(&self.quote_asset),
                    Err(_) => Decimal::ZERO,
                };

                info!(symbol = %symbol, order_id = %ack.id, "forced close confirmed");

                if let Err(e) = self.ledger.append(LedgerRecord {
                    timestamp: now_ms,
                    symbol: symbol.to_string(),
                    event: LedgerEvent::ForcedExit,
                    signal: Signal::Sell,
                    quantity: position.contracts,
                    price: state.last_price,
                    balance_before,
                    balance_after,
                    reason: format!("excursion {pct}% crossed threshold"),
                }) {
                    error!(symbol = %symbol, error = %e, "ledger append failed");
                }
            }
            Err(e) => {
                // Unconfirmed call: assume nothing, next pass re-evaluates.
                warn!(symbol = %symbol, error = %e, "forced close rejected, position kept");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::testutil::MockGateway;
    use crate::types::{OrderSide, PendingOrder, PositionRecord};

    fn exit_rules() -> ExitRules {
        ExitRules {
            take_profit_pct: dec!(2),
            stop_loss_pct: dec!(5),
        }
    }

    // -- Pure helpers --------------------------------------------------------

    #[test]
    fn pnl_pct_long_and_short() {
        let (pnl, pct) = unrealized_pnl(PositionSide::Long, dec!(100), dec!(102), dec!(1));
        assert_eq!(pnl, dec!(2));
        assert_eq!(pct, dec!(2.00));

        let (pnl, pct) = unrealized_pnl(PositionSide::Short, dec!(100), dec!(102), dec!(1));
        assert_eq!(pnl, dec!(-2));
        assert_eq!(pct, dec!(-2.00));
    }

    #[test]
    fn pnl_zero_entry_is_zero() {
        let (pnl, pct) = unrealized_pnl(PositionSide::Long, Decimal::ZERO, dec!(102), dec!(1));
        assert_eq!(pnl, Decimal::ZERO);
        assert_eq!(pct, Decimal::ZERO);
    }

    #[test]
    fn exit_triggers_exactly_at_boundaries() {
        let rules = exit_rules();
        assert!(exit_triggered(dec!(2), &rules));
        assert!(exit_triggered(dec!(2.01), &rules));
        assert!(exit_triggered(dec!(-5), &rules));
        assert!(exit_triggered(dec!(-5.01), &rules));

        assert!(!exit_triggered(dec!(1.99), &rules));
        assert!(!exit_triggered(dec!(-4.99), &rules));
        assert!(!exit_triggered(Decimal::ZERO, &rules));
    }

    // -- Sync + enforce ------------------------------------------------------

    fn reconciler_with(
        gateway: Arc<MockGateway>,
        store: Arc<StateStore>,
        ledger_dir: &std::path::Path,
    ) -> Reconciler {
        Reconciler::new(
            gateway,
            store,
            Arc::new(TradeLedger::open(ledger_dir).unwrap()),
            vec!["BTC/USDT".to_string()],
            Duration::from_secs(30),
            exit_rules(),
            "USDT".to_string(),
            CancellationToken::new(),
        )
    }

    fn open_position(entry: Decimal, contracts: Decimal) -> PositionRecord {
        PositionRecord {
            symbol: "BTC/USDT".to_string(),
            side: PositionSide::Long,
            entry_price: entry,
            contracts,
            unrealized_pnl: Decimal::ZERO,
            unrealized_pnl_pct: Decimal::ZERO,
        }
    }

    #[tokio::test]
    async fn sync_replaces_orders_and_position() {
        let tmp = tempfile::tempdir().unwrap();
        let gateway = Arc::new(MockGateway::new());
        gateway.set_ticker(dec!(101));
        gateway.set_position(Some(open_position(dec!(100), dec!(0.5))));
        *gateway.open_orders.lock().unwrap() = vec![PendingOrder {
            id: "1".to_string(),
            order_type: "STOP_MARKET".to_string(),
            side: OrderSide::Sell,
            price: dec!(99),
            amount: dec!(0.5),
            status: "open".to_string(),
        }];

        let store = Arc::new(
            StateStore::open(&tmp.path().join("state"), &["BTC/USDT".to_string()]).unwrap(),
        );
        let reconciler = reconciler_with(gateway.clone(), store.clone(), &tmp.path().join("ledger"));

        reconciler.reconcile_symbol("BTC/USDT").await.unwrap();

        let handle = store.state("BTC/USDT").unwrap();
        let state = handle.lock().await;
        assert_eq!(state.pending_orders.len(), 1);
        assert_eq!(state.size, dec!(0.5));
        assert_eq!(state.entry, dec!(100));
        assert_eq!(state.pnl_pct, dec!(1.00));
        // +1% is inside the band, no close submitted.
        assert_eq!(gateway.market_order_count(), 0);
    }

    #[tokio::test]
    async fn position_absence_clears_cache() {
        let tmp = tempfile::tempdir().unwrap();
        let gateway = Arc::new(MockGateway::new());
        gateway.set_ticker(dec!(100));

        let store = Arc::new(
            StateStore::open(&tmp.path().join("state"), &["BTC/USDT".to_string()]).unwrap(),
        );
        {
            let handle = store.state("BTC/USDT").unwrap();
            let mut state = handle.lock().await;
            state.record_entry(1_000, Signal::Long, PositionSide::Long, dec!(100), dec!(0.5));
        }

        let reconciler = reconciler_with(gateway, store.clone(), &tmp.path().join("ledger"));
        reconciler.reconcile_symbol("BTC/USDT").await.unwrap();

        let handle = store.state("BTC/USDT").unwrap();
        let state = handle.lock().await;
        assert_eq!(state.size, Decimal::ZERO);
        assert_eq!(state.side, None);
    }

    #[tokio::test]
    async fn take_profit_excursion_forces_close() {
        let tmp = tempfile::tempdir().unwrap();
        let gateway = Arc::new(MockGateway::new());
        // Long from 100, last 102: exactly +2.00%, the inclusive boundary.
        gateway.set_ticker(dec!(102));
        gateway.set_position(Some(open_position(dec!(100), dec!(1))));
        gateway.set_balance("USDT", dec!(500), dec!(500));

        let store = Arc::new(
            StateStore::open(&tmp.path().join("state"), &["BTC/USDT".to_string()]).unwrap(),
        );
        let ledger_dir = tmp.path().join("ledger");
        let reconciler = reconciler_with(gateway.clone(), store.clone(), &ledger_dir);

        reconciler.reconcile_symbol("BTC/USDT").await.unwrap();

        let submitted = gateway.market_orders.lock().unwrap().clone();
        assert_eq!(submitted.len(), 1);
        assert_eq!(submitted[0].1, OrderSide::Sell);
        assert_eq!(submitted[0].2, dec!(1));

        let handle = store.state("BTC/USDT").unwrap();
        let state = handle.lock().await;
        assert_eq!(state.size, Decimal::ZERO);
        assert_eq!(state.risk.daily_profit_pct, dec!(2.00));

        let ledger = TradeLedger::open(&ledger_dir).unwrap();
        let records = ledger.read_day(Utc::now()).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].event, LedgerEvent::ForcedExit);
    }

    #[tokio::test]
    async fn stop_loss_excursion_forces_close_and_counts_loss() {
        let tmp = tempfile::tempdir().unwrap();
        let gateway = Arc::new(MockGateway::new());
        // Long from 100, last 95: exactly -5.00%.
        gateway.set_ticker(dec!(95));
        gateway.set_position(Some(open_position(dec!(100), dec!(0.5))));

        let store = Arc::new(
            StateStore::open(&tmp.path().join("state"), &["BTC/USDT".to_string()]).unwrap(),
        );
        let reconciler = reconciler_with(gateway.clone(), store.clone(), &tmp.path().join("ledger"));
        reconciler.reconcile_symbol("BTC/USDT").await.unwrap();

        assert_eq!(gateway.market_order_count(), 1);
        let handle = store.state("BTC/USDT").unwrap();
        let state = handle.lock().await;
        assert_eq!(state.risk.consecutive_losses, 1);
    }

    #[tokio::test]
    async fn rejected_close_keeps_position() {
        let tmp = tempfile::tempdir().unwrap();
        let gateway = Arc::new(MockGateway::new());
        gateway.set_ticker(dec!(110));
        gateway.set_position(Some(open_position(dec!(100), dec!(1))));
        gateway
            .reject_orders
            .store(true, std::sync::atomic::Ordering::SeqCst);

        let store = Arc::new(
            StateStore::open(&tmp.path().join("state"), &["BTC/USDT".to_string()]).unwrap(),
        );
        let reconciler = reconciler_with(gateway, store.clone(), &tmp.path().join("ledger"));
        reconciler.reconcile_symbol("BTC/USDT").await.unwrap();

        let handle = store.state("BTC/USDT").unwrap();
        let state = handle.lock().await;
        // Unconfirmed close: the cached position survives for the next pass.
        assert_eq!(state.size, dec!(1));
        assert_eq!(state.risk.consecutive_losses, 0);
    }

    #[tokio::test]
    async fn fetch_failure_leaves_state_untouched() {
        let tmp = tempfile::tempdir().unwrap();
        let gateway = Arc::new(MockGateway::new());
        gateway
            .fail_fetches
            .store(true, std::sync::atomic::Ordering::SeqCst);

        let store = Arc::new(
            StateStore::open(&tmp.path().join("state"), &["BTC/USDT".to_string()]).unwrap(),
        );
        {
            let handle = store.state("BTC/USDT").unwrap();
            let mut state = handle.lock().await;
            state.record_entry(1_000, Signal::Long, PositionSide::Long, dec!(100), dec!(0.5));
        }

        let reconciler = reconciler_with(gateway, store.clone(), &tmp.path().join("ledger"));
        assert!(reconciler.reconcile_symbol("BTC/USDT").await.is_err());

        let handle = store.state("BTC/USDT").unwrap();
        let state = handle.lock().await;
        assert_eq!(state.size, dec!(0.5));
    }
}
