//! Simulated gateway for paper trading.
//!
//! Market data (candles, tickers) is delegated to a real gateway; balances,
//! positions, pending orders, and fills are simulated in-process. Market
//! orders fill at the live ticker adjusted by a configurable basis-point
//! slippage, against the taker.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::Mutex;
use tracing::info;

use crate::config::ExchangeConfig;
use crate::errors::BotError;
use crate::exchange::ExchangeGateway;
use crate::types::{
    AssetBalance, Balance, Bar, OrderAck, OrderKind, OrderSide, PendingOrder, PositionRecord,
    PositionSide, Ticker,
};

struct PaperBook {
    cash: Decimal,
    positions: HashMap<String, PositionRecord>,
    orders: HashMap<String, Vec<PendingOrder>>,
    next_order_id: u64,
}

pub struct PaperGateway {
    market: Arc<dyn ExchangeGateway>,
    quote_asset: String,
    slippage_bps: u32,
    book: Mutex<PaperBook>,
}

impl PaperGateway {
    pub fn new(market: Arc<dyn ExchangeGateway>, config: &ExchangeConfig) -> Self {
        Self {
            market,
            quote_asset: config.quote_asset.clone(),
            slippage_bps: config.paper_slippage_bps,
            book: Mutex::new(PaperBook {
                cash: config.paper_starting_balance,
                positions: HashMap::new(),
                orders: HashMap::new(),
                next_order_id: 1,
            }),
        }
    }

    /// Fill price for a taker order: buys pay up, sells receive less.
    fn fill_price(&self, last: Decimal, side: OrderSide) -> Decimal {
        let slip = Decimal::from(self.slippage_bps) / dec!(10000);
        match side {
            OrderSide::Buy => last * (Decimal::ONE + slip),
            OrderSide::Sell => last * (Decimal::ONE - slip),
        }
    }
}

#[async_trait]
impl ExchangeGateway for PaperGateway {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: u32,
    ) -> Result<Vec<Bar>, BotError> {
        self.market.fetch_candles(symbol, timeframe, limit).await
    }

    async fn fetch_balance(&self) -> Result<Balance, BotError> {
        let book = self.book.lock().await;
        let unrealized: Decimal = book.positions.values().map(|p| p.unrealized_pnl).sum();
        let mut balance = Balance::default();
        balance.assets.insert(
            self.quote_asset.clone(),
            AssetBalance {
                free: book.cash,
                total: book.cash + unrealized,
            },
        );
        Ok(balance)
    }

    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker, BotError> {
        self.market.fetch_ticker(symbol).await
    }

    async fn fetch_open_positions(
        &self,
        symbols: &[String],
    ) -> Result<Vec<PositionRecord>, BotError> {
        let mut book = self.book.lock().await;
        let mut out = Vec::new();
        for symbol in symbols {
            let Some(position) = book.positions.get(symbol).cloned() else {
                continue;
            };
            // Mark to market before reporting.
            let ticker = self.market.fetch_ticker(symbol).await?;
            let mut position = position;
            let diff = match position.side {
                PositionSide::Long => ticker.last - position.entry_price,
                PositionSide::Short => position.entry_price - ticker.last,
            };
            position.unrealized_pnl = diff * position.contracts;
            position.unrealized_pnl_pct = if position.entry_price > Decimal::ZERO {
                diff / position.entry_price * dec!(100)
            } else {
                Decimal::ZERO
            };
            book.positions.insert(symbol.clone(), position.clone());
            out.push(position);
        }
        Ok(out)
    }

    async fn fetch_open_orders(&self, symbol: &str) -> Result<Vec<PendingOrder>, BotError> {
        let book = self.book.lock().await;
        Ok(book.orders.get(symbol).cloned().unwrap_or_default())
    }

    async fn submit_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        qty: Decimal,
    ) -> Result<OrderAck, BotError> {
        if qty <= Decimal::ZERO {
            return Err(BotError::OrderRejected {
                reason: "non-positive quantity".to_string(),
            });
        }

        let ticker = self.market.fetch_ticker(symbol).await?;
        let fill = self.fill_price(ticker.last, side);

        let mut book = self.book.lock().await;
        let id = book.next_order_id;
        book.next_order_id += 1;

        match book.positions.get(symbol).cloned() {
            Some(position) if side == position.side.closing_side() => {
                let closed = qty.min(position.contracts);
                let diff = match position.side {
                    PositionSide::Long => fill - position.entry_price,
                    PositionSide::Short => position.entry_price - fill,
                };
                let realized = diff * closed;
                book.cash += realized;

                let remaining = position.contracts - closed;
                if remaining > Decimal::ZERO {
                    let mut position = position;
                    position.contracts = remaining;
                    book.positions.insert(symbol.to_string(), position);
                } else {
                    book.positions.remove(symbol);
                    book.orders.remove(symbol);
                }
                info!(
                    symbol = %symbol,
                    qty = %closed,
                    fill = %fill,
                    realized = %realized,
                    "paper close fill"
                );
            }
            Some(mut position) => {
                // Same-direction fill: average in.
                let total = position.contracts + qty;
                position.entry_price =
                    (position.entry_price * position.contracts + fill * qty) / total;
                position.contracts = total;
                book.positions.insert(symbol.to_string(), position);
                info!(symbol = %symbol, qty = %qty, fill = %fill, "paper add fill");
            }
            None => {
                let position_side = match side {
                    OrderSide::Buy => PositionSide::Long,
                    OrderSide::Sell => PositionSide::Short,
                };
                book.positions.insert(
                    symbol.to_string(),
                    PositionRecord {
                        symbol: symbol.to_string(),
                        side: position_side,
                        entry_price: fill,
                        contracts: qty,
                        unrealized_pnl: Decimal::ZERO,
                        unrealized_pnl_pct: Decimal::ZERO,
                    },
                );
                info!(
                    symbol = %symbol,
                    side = ?position_side,
                    qty = %qty,
                    fill = %fill,
                    "paper open fill"
                );
            }
        }

        Ok(OrderAck { id: id.to_string() })
    }

    async fn submit_conditional_order(
        &self,
        symbol: &str,
        kind: OrderKind,
        side: OrderSide,
        qty: Decimal,
        trigger_price: Decimal,
    ) -> Result<OrderAck, BotError> {
        let mut book = self.book.lock().await;
        let id = book.next_order_id;
        book.next_order_id += 1;
        book.orders
            .entry(symbol.to_string())
            .or_default()
            .push(PendingOrder {
                id: id.to_string(),
                order_type: kind.as_str().to_string(),
                side,
                price: trigger_price,
                amount: qty,
                status: "open".to_string(),
            });
        Ok(OrderAck { id: id.to_string() })
    }

    async fn set_leverage(&self, _symbol: &str, _multiplier: u32) -> Result<(), BotError> {
        Ok(())
    }
}
