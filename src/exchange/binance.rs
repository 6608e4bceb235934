//! Binance USD-M futures REST gateway.
//!
//! Public market data endpoints are plain GETs; account and order endpoints
//! are signed with an HMAC-SHA256 signature over the query string and an
//! `X-MBX-APIKEY` header. The sandbox flag routes everything to the futures
//! testnet.

use async_trait::async_trait;
use chrono::Utc;
use hmac::{Hmac, Mac};
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde_json::Value;
use sha2::Sha256;
use std::time::Duration;
use tracing::warn;

use crate::config::ExchangeConfig;
use crate::constants::{BINANCE_FUTURES_TESTNET_URL, BINANCE_FUTURES_URL};
use crate::errors::BotError;
use crate::exchange::credentials::ApiCredentials;
use crate::exchange::ExchangeGateway;
use crate::types::{
    Balance, Bar, OrderAck, OrderKind, OrderSide, PendingOrder, PositionRecord, PositionSide,
    Ticker,
};

type HmacSha256 = Hmac<Sha256>;

pub struct BinanceFuturesGateway {
    client: reqwest::Client,
    base_url: String,
    credentials: ApiCredentials,
    recv_window_ms: u64,
}

impl BinanceFuturesGateway {
    pub fn new(config: &ExchangeConfig, credentials: ApiCredentials) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();

        let base_url = if !config.rest_url.is_empty() {
            config.rest_url.clone()
        } else if config.sandbox {
            BINANCE_FUTURES_TESTNET_URL.to_string()
        } else {
            BINANCE_FUTURES_URL.to_string()
        };

        Self {
            client,
            base_url,
            credentials,
            recv_window_ms: config.recv_window_ms,
        }
    }

    // -- Request plumbing ---------------------------------------------------

    async fn public_get(&self, path: &str, params: &[(&str, &str)]) -> Result<Value, BotError> {
        let url = format!("{}{path}", self.base_url);
        let resp = self
            .client
            .get(&url)
            .query(params)
            .send()
            .await
            .map_err(|e| {
                warn!(url = %url, error = %e, "request failed");
                BotError::ExchangeUnavailable { name: url.clone() }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(url = %url, %status, body = %body, "HTTP error");
            return Err(BotError::ExchangeUnavailable { name: url });
        }

        resp.json::<Value>()
            .await
            .map_err(|_| BotError::ExchangeUnavailable { name: url })
    }

    /// Signed request against an account endpoint. `is_order` routes HTTP
    /// failures to `OrderRejected` instead of `ExchangeUnavailable`.
    async fn signed_request(
        &self,
        method: reqwest::Method,
        path: &str,
        params: &[(&str, String)],
        is_order: bool,
    ) -> Result<Value, BotError> {
        let mut query = params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&");
        if !query.is_empty() {
            query.push('&');
        }
        query.push_str(&format!(
            "recvWindow={}&timestamp={}",
            self.recv_window_ms,
            Utc::now().timestamp_millis()
        ));

        let signature = sign(&self.credentials.api_secret, &query);
        let url = format!("{}{path}?{query}&signature={signature}", self.base_url);

        let resp = self
            .client
            .request(method, &url)
            .header("X-MBX-APIKEY", &self.credentials.api_key)
            .send()
            .await
            .map_err(|e| {
                warn!(path = %path, error = %e, "signed request failed");
                BotError::ExchangeUnavailable {
                    name: path.to_string(),
                }
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(path = %path, %status, body = %body, "HTTP error");
            if is_order {
                return Err(BotError::OrderRejected {
                    reason: format!("{status}: {body}"),
                });
            }
            return Err(BotError::ExchangeUnavailable {
                name: path.to_string(),
            });
        }

        resp.json::<Value>()
            .await
            .map_err(|_| BotError::ExchangeUnavailable {
                name: path.to_string(),
            })
    }
}

#[async_trait]
impl ExchangeGateway for BinanceFuturesGateway {
    async fn fetch_candles(
        &self,
        symbol: &str,
        timeframe: &str,
        limit: u32,
    ) -> Result<Vec<Bar>, BotError> {
        let venue = venue_symbol(symbol);
        let limit_str = limit.to_string();
        let data = self
            .public_get(
                "/fapi/v1/klines",
                &[
                    ("symbol", venue.as_str()),
                    ("interval", timeframe),
                    ("limit", &limit_str),
                ],
            )
            .await?;
        Ok(parse_klines(&data))
    }

    async fn fetch_balance(&self) -> Result<Balance, BotError> {
        let data = self
            .signed_request(reqwest::Method::GET, "/fapi/v2/balance", &[], false)
            .await?;
        Ok(parse_balances(&data))
    }

    async fn fetch_ticker(&self, symbol: &str) -> Result<Ticker, BotError> {
        let venue = venue_symbol(symbol);
        let data = self
            .public_get("/fapi/v1/ticker/price", &[("symbol", venue.as_str())])
            .await?;
        Ok(Ticker {
            symbol: symbol.to_string(),
            last: parse_decimal(&data["price"]),
        })
    }

    async fn fetch_open_positions(
        &self,
        symbols: &[String],
    ) -> Result<Vec<PositionRecord>, BotError> {
        let data = self
            .signed_request(reqwest::Method::GET, "/fapi/v2/positionRisk", &[], false)
            .await?;
        Ok(parse_positions(&data, symbols))
    }

    async fn fetch_open_orders(&self, symbol: &str) -> Result<Vec<PendingOrder>, BotError> {
        let venue = venue_symbol(symbol);
        let data = self
            .signed_request(
                reqwest::Method::GET,
                "/fapi/v1/openOrders",
                &[("symbol", venue)],
                false,
            )
            .await?;
        Ok(parse_orders(&data))
    }

    async fn submit_market_order(
        &self,
        symbol: &str,
        side: OrderSide,
        qty: Decimal,
    ) -> Result<OrderAck, BotError> {
        let data = self
            .signed_request(
                reqwest::Method::POST,
                "/fapi/v1/order",
                &[
                    ("symbol", venue_symbol(symbol)),
                    ("side", venue_side(side).to_string()),
                    ("type", "MARKET".to_string()),
                    ("quantity", qty.to_string()),
                ],
                true,
            )
            .await?;
        Ok(OrderAck {
            id: data["orderId"].to_string(),
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
        let order_type = match kind {
            OrderKind::Stop => "STOP_MARKET",
            OrderKind::TakeProfit => "TAKE_PROFIT_MARKET",
        };
        let data = self
            .signed_request(
                reqwest::Method::POST,
                "/fapi/v1/order",
                &[
                    ("symbol", venue_symbol(symbol)),
                    ("side", venue_side(side).to_string()),
                    ("type", order_type.to_string()),
                    ("stopPrice", trigger_price.to_string()),
                    ("quantity", qty.to_string()),
                    ("reduceOnly", "true".to_string()),
                ],
                true,
            )
            .await?;
        Ok(OrderAck {
            id: data["orderId"].to_string(),
        })
    }

    async fn set_leverage(&self, symbol: &str, multiplier: u32) -> Result<(), BotError> {
        self.signed_request(
            reqwest::Method::POST,
            "/fapi/v1/leverage",
            &[
                ("symbol", venue_symbol(symbol)),
                ("leverage", multiplier.to_string()),
            ],
            false,
        )
        .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// `BTC/USDT` -> `BTCUSDT`.
fn venue_symbol(symbol: &str) -> String {
    symbol.replace('/', "")
}

fn venue_side(side: OrderSide) -> &'static str {
    match side {
        OrderSide::Buy => "BUY",
        OrderSide::Sell => "SELL",
    }
}

/// HMAC-SHA256 over the query string, hex-encoded.
fn sign(secret: &str, query: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(query.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

fn parse_decimal(v: &Value) -> Decimal {
    v.as_str()
        .and_then(|s| s.parse::<Decimal>().ok())
        .or_else(|| v.as_f64().and_then(Decimal::from_f64))
        .unwrap_or(Decimal::ZERO)
}

/// Klines response: `[[openTime, open, high, low, close, volume, …], …]`.
fn parse_klines(data: &Value) -> Vec<Bar> {
    let Some(arr) = data.as_array() else {
        return Vec::new();
    };
    let mut bars = Vec::with_capacity(arr.len());
    for k in arr {
        let items = match k.as_array() {
            Some(a) if a.len() >= 6 => a,
            _ => continue,
        };
        bars.push(Bar {
            timestamp: items[0].as_i64().unwrap_or(0),
            open: parse_decimal(&items[1]),
            high: parse_decimal(&items[2]),
            low: parse_decimal(&items[3]),
            close: parse_decimal(&items[4]),
            volume: parse_decimal(&items[5]),
        });
    }
    bars
}

/// Balance response: `[{asset, balance, availableBalance}, …]`.
fn parse_balances(data: &Value) -> Balance {
    let mut balance = Balance::default();
    if let Some(arr) = data.as_array() {
        for entry in arr {
            let Some(asset) = entry["asset"].as_str() else {
                continue;
            };
            balance.assets.insert(
                asset.to_string(),
                crate::types::AssetBalance {
                    free: parse_decimal(&entry["availableBalance"]),
                    total: parse_decimal(&entry["balance"]),
                },
            );
        }
    }
    balance
}

/// positionRisk response: `[{symbol, positionAmt, entryPrice,
/// unRealizedProfit, …}, …]`. The sign of `positionAmt` encodes the side;
/// zero-amount rows are flat symbols.
fn parse_positions(data: &Value, symbols: &[String]) -> Vec<PositionRecord> {
    let Some(arr) = data.as_array() else {
        return Vec::new();
    };
    let mut positions = Vec::new();
    for entry in arr {
        let Some(venue) = entry["symbol"].as_str() else {
            continue;
        };
        let Some(symbol) = symbols.iter().find(|s| venue_symbol(s) == venue) else {
            continue;
        };
        let amt = parse_decimal(&entry["positionAmt"]);
        if amt == Decimal::ZERO {
            continue;
        }
        let side = if amt > Decimal::ZERO {
            PositionSide::Long
        } else {
            PositionSide::Short
        };
        let entry_price = parse_decimal(&entry["entryPrice"]);
        positions.push(PositionRecord {
            symbol: symbol.clone(),
            side,
            entry_price,
            contracts: amt.abs(),
            unrealized_pnl: parse_decimal(&entry["unRealizedProfit"]),
            // Recomputed against the live ticker by the reconciler.
            unrealized_pnl_pct: Decimal::ZERO,
        });
    }
    positions
}

/// openOrders response: `[{orderId, type, side, stopPrice, price, origQty,
/// status}, …]`.
fn parse_orders(data: &Value) -> Vec<PendingOrder> {
    let Some(arr) = data.as_array() else {
        return Vec::new();
    };
    let mut orders = Vec::with_capacity(arr.len());
    for entry in arr {
        let side = match entry["side"].as_str() {
            Some("BUY") => OrderSide::Buy,
            Some("SELL") => OrderSide::Sell,
            _ => continue,
        };
        let stop_price = parse_decimal(&entry["stopPrice"]);
        let price = if stop_price > Decimal::ZERO {
            stop_price
        } else {
            parse_decimal(&entry["price"])
        };
        orders.push(PendingOrder {
            id: entry["orderId"].to_string(),
            order_type: entry["type"].as_str().unwrap_or_default().to_string(),
            side,
            price,
            amount: parse_decimal(&entry["origQty"]),
            status: entry["status"].as_str().unwrap_or_default().to_string(),
        });
    }
    orders
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn venue_symbol_strips_slash() {
        assert_eq!(venue_symbol("BTC/USDT"), "BTCUSDT");
        assert_eq!(venue_symbol("ETHUSDT"), "ETHUSDT");
    }

    #[test]
    fn signature_matches_published_example() {
        // Worked example from the Binance signed-endpoint documentation.
        let secret = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";
        let query = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";
        assert_eq!(
            sign(secret, query),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn parses_klines_array() {
        let data = json!([
            [1700000000000i64, "100.1", "101.5", "99.2", "100.9", "12.5", 0, "x", 0, "y", "z", "0"],
            [1700000060000i64, "100.9", "102.0", "100.5", "101.7", "8.1", 0, "x", 0, "y", "z", "0"]
        ]);
        let bars = parse_klines(&data);
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].open, dec!(100.1));
        assert_eq!(bars[0].close, dec!(100.9));
        assert_eq!(bars[1].high, dec!(102.0));
        assert_eq!(bars[1].volume, dec!(8.1));
    }

    #[test]
    fn parses_balances() {
        let data = json!([
            { "asset": "USDT", "balance": "1000.5", "availableBalance": "800.25" },
            { "asset": "BNB", "balance": "2", "availableBalance": "2" }
        ]);
        let balance = parse_balances(&data);
        assert_eq!(balance.free("USDT"), dec!(800.25));
        assert_eq!(balance.total("USDT"), dec!(1000.5));
        assert_eq!(balance.free("BTC"), Decimal::ZERO);
    }

    #[test]
    fn parses_positions_with_side_from_sign() {
        let symbols = vec!["BTC/USDT".to_string(), "ETH/USDT".to_string()];
        let data = json!([
            { "symbol": "BTCUSDT", "positionAmt": "0.5", "entryPrice": "50000", "unRealizedProfit": "25" },
            { "symbol": "ETHUSDT", "positionAmt": "-2", "entryPrice": "3000", "unRealizedProfit": "-10" },
            { "symbol": "SOLUSDT", "positionAmt": "1", "entryPrice": "150", "unRealizedProfit": "0" },
            { "symbol": "BNBUSDT", "positionAmt": "0", "entryPrice": "0", "unRealizedProfit": "0" }
        ]);
        let positions = parse_positions(&data, &symbols);
        assert_eq!(positions.len(), 2);
        assert_eq!(positions[0].symbol, "BTC/USDT");
        assert_eq!(positions[0].side, PositionSide::Long);
        assert_eq!(positions[0].contracts, dec!(0.5));
        assert_eq!(positions[1].side, PositionSide::Short);
        assert_eq!(positions[1].contracts, dec!(2));
    }

    #[test]
    fn parses_open_orders_preferring_stop_price() {
        let data = json!([
            {
                "orderId": 4201,
                "type": "STOP_MARKET",
                "side": "SELL",
                "price": "0",
                "stopPrice": "47500",
                "origQty": "0.5",
                "status": "NEW"
            }
        ]);
        let orders = parse_orders(&data);
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].price, dec!(47500));
        assert_eq!(orders[0].side, OrderSide::Sell);
        assert_eq!(orders[0].order_type, "STOP_MARKET");
    }
}
