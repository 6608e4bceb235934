pub mod binance;
pub mod credentials;
pub mod paper;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::errors::BotError;
use crate::types::{Balance, Bar, OrderAck, OrderKind, OrderSide, PendingOrder, PositionRecord, Ticker};

/// Exchange connectivity consumed by the decision and reconciliation loops.
///
/// All calls are safe to retry except [`submit_market_order`], which must
/// never be retried blindly; a failed submission ends the cycle and the next
/// cycle re-evaluates from a fresh signal.
///
/// [`submit_market_order`]: ExchangeGateway::submit_market_order
#[async_trait]
pub trait ExchangeGateway: Send + Sync {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: u32,
    ) -> Result<Vec<Bar>, BotError>;

    async fn fetch_balance(&self) -> Result<Balance, BotError>;

    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker, BotError>;

    async fn fetch_open_positions(
        &self,
        symbols: &[String],
    ) -> Result<Vec<PositionRecord>, BotError>;

    async fn fetch_open_orders(&self, symbol: &str) -> Result<Vec<PendingOrder>, BotError>;

    async fn submit_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        qty: Decimal,
    ) -> Result<OrderAck, BotError>;

    async fn submit_conditional_order(
        &self,
        symbol: &str,
        kind: OrderKind,
        side: OrderSide,
        qty: Decimal,
        trigger_price: Decimal,
    ) -> Result<OrderAck, BotError>;

    async fn set_leverage(&self, symbol: &str, multiplier: u32) -> Result<(), BotError>;
}

#[cfg(test)]
pub mod testutil {
    //! Scriptable in-memory gateway shared by the controller and reconciler
    //! tests.

    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct MockGateway {
        pub candles: Mutex<Vec<Bar>>,
        pub balance: Mutex<Balance>,
        pub ticker_price: Mutex<Decimal>,
        pub positions: Mutex<Vec<PositionRecord>>,
        pub open_orders: Mutex<Vec<PendingOrder>>,

        pub market_orders: Mutex<Vec<(String, OrderSide, Decimal)>>,
        pub conditional_orders: Mutex<Vec<(String, OrderKind, OrderSide, Decimal, Decimal)>>,
        pub leverage_calls: Mutex<Vec<(String, u32)>>,

        pub fail_fetches: AtomicBool,
        pub reject_orders: AtomicBool,
        next_order_id: AtomicU64,
    }

    impl MockGateway {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn set_candles(&self, bars: Vec<Bar>) {
            *self.candles.lock().unwrap() = bars;
        }

        pub fn set_balance(&self, asset: &str, free: Decimal, total: Decimal) {
            self.balance
                .lock()
                .unwrap()
                .assets
                .insert(asset.to_string(), crate::types::AssetBalance { free, total });
        }

        pub fn set_ticker(&self, price: Decimal) {
            *self.ticker_price.lock().unwrap() = price;
        }

        pub fn set_position(&self, position: Option<PositionRecord>) {
            *self.positions.lock().unwrap() = position.into_iter().collect();
        }

        pub fn market_order_count(&self) -> usize {
            self.market_orders.lock().unwrap().len()
        }

        fn guard_fetch(&self) -> Result<(), BotError> {
            if self.fail_fetches.load(Ordering::SeqCst) {
                return Err(BotError::ExchangeUnavailable {
                    name: "mock".to_string(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ExchangeGateway for MockGateway {
        async fn fetch_candles(
            &self,
            _symbol: &str,
            _timeframe: &str,
            limit: u32,
        ) -> Result<Vec<Bar>, BotError> {
            self.guard_fetch()?;
            let bars = self.candles.lock().unwrap().clone();
            let start = bars.len().saturating_sub(limit as usize);
            Ok(bars[start..].to_vec())
        }

        async fn fetch_balance(&self) -> Result<Balance, BotError> {
            self.guard_fetch()?;
            Ok(self.balance.lock().unwrap().clone())
        }

        async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker, BotError> {
            self.guard_fetch()?;
            Ok(Ticker {
                symbol: symbol.to_string(),
                last: *self.ticker_price.lock().unwrap(),
            })
        }

        async fn fetch_open_positions(
            &self,
            symbols: &[String],
        ) -> Result<Vec<PositionRecord>, BotError> {
            self.guard_fetch()?;
            Ok(self
                .positions
                .lock()
                .unwrap()
                .iter()
                .filter(|p| symbols.contains(&p.symbol))
                .cloned()
                .collect())
        }

        async fn fetch_open_orders(&self, _symbol: &str) -> Result<Vec<PendingOrder>, BotError> {
            self.guard_fetch()?;
            Ok(self.open_orders.lock().unwrap().clone())
        }

        async fn submit_market_order(
            &self,
            symbol: &str,
            side: OrderSide,
            qty: Decimal,
        ) -> Result<OrderAck, BotError> {
            if self.reject_orders.load(Ordering::SeqCst) {
                return Err(BotError::OrderRejected {
                    reason: "scripted rejection".to_string(),
                });
            }
            self.market_orders
                .lock()
                .unwrap()
                .push((symbol.to_string(), side, qty));
            let id = self.next_order_id.fetch_add(1, Ordering::SeqCst);
            Ok(OrderAck {
                id: format!("mock-{id}"),
            })
        }

        async fn submit_conditional_order(
            &self,
            symbol: &str,
            kind: OrderKind,
            side: OrderSide,
            qty: Decimal,
            trigger_price: Decimal,
        ) -> Result<OrderAck, BotError> {
            if self.reject_orders.load(Ordering::SeqCst) {
                return Err(BotError::OrderRejected {
                    reason: "scripted rejection".to_string(),
                });
            }
            self.conditional_orders
                .lock()
                .unwrap()
                .push((symbol.to_string(), kind, side, qty, trigger_price));
            let id = self.next_order_id.fetch_add(1, Ordering::SeqCst);
            Ok(OrderAck {
                id: format!("mock-cond-{id}"),
            })
        }

        async fn set_leverage(&self, symbol: &str, multiplier: u32) -> Result<(), BotError> {
            self.leverage_calls
                .lock()
                .unwrap()
                .push((symbol.to_string(), multiplier));
            Ok(())
        }
    }
}
