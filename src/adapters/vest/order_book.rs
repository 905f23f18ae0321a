//! Vest order book data source
//!
//! Every `{symbol}@depth` push is a full book, so depth frames are routed
//! to the snapshot queue. Ticker pushes carry mark, index and the hourly
//! funding rate and feed the funding queue.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::adapters::shared::{MarketDataQueues, ReconnectConfig};
use crate::adapters::traits::OrderBookDataSource;
use crate::adapters::types::{
    current_time_ms, current_timestamp, next_funding_hour, ConnectionHealth, FundingInfo, FundingInfoUpdate,
    OrderBookMessage, OrderBookMessageKind,
};

use super::constants;
use super::rest::VestRest;
use super::stream::listen_with_reconnect;
use super::types::{parse_tickers, VestDepth, VestTicker, VestTrade};
use super::utils;
use super::web_utils;

pub struct VestOrderBookDataSource {
    rest: VestRest,
    trading_pairs: Vec<String>,
    health: ConnectionHealth,
    reconnect: ReconnectConfig,
}

impl VestOrderBookDataSource {
    pub fn new(rest: VestRest, trading_pairs: Vec<String>) -> Self {
        Self {
            rest,
            trading_pairs,
            health: ConnectionHealth::new(),
            reconnect: ReconnectConfig::default(),
        }
    }

    pub fn health(&self) -> &ConnectionHealth {
        &self.health
    }

    pub fn ws_url(&self) -> String {
        let config = self.rest.config();
        web_utils::ws_url_with_query(&config.ws_url, config.account_group)
    }
}

/// Venue symbol -> trading pair for the tracked pairs
pub fn tracked_symbols(trading_pairs: &[String]) -> HashMap<String, String> {
    trading_pairs
        .iter()
        .map(|pair| (utils::convert_to_exchange_trading_pair(pair), pair.clone()))
        .collect()
}

/// Depth and trades per symbol, then the shared tickers channel
pub fn subscription_channels(symbols: &HashMap<String, String>) -> Vec<String> {
    let mut names: Vec<&String> = symbols.keys().collect();
    names.sort();
    let mut channels: Vec<String> = names
        .into_iter()
        .flat_map(|symbol| [constants::depth_channel(symbol), constants::trades_channel(symbol)])
        .collect();
    channels.push(constants::WS_TICKERS_CHANNEL.to_string());
    channels
}

fn funding_update(ticker: &VestTicker, trading_pair: &str) -> FundingInfoUpdate {
    FundingInfoUpdate {
        trading_pair: trading_pair.to_string(),
        index_price: ticker.index_price(),
        mark_price: ticker.mark_price(),
        next_funding_utc_timestamp: Some(next_funding_hour(current_timestamp())),
        rate: ticker.funding_rate(),
    }
}

/// Route one `{"channel", "data"}` frame to the market data queues
pub fn dispatch_event(
    event: &Value,
    symbols: &HashMap<String, String>,
    queues: &MarketDataQueues,
) -> ExchangeResult<()> {
    let channel = event.get("channel").and_then(Value::as_str).unwrap_or_default();
    let data = event.get("data").cloned().unwrap_or(Value::Null);

    if channel == constants::WS_TICKERS_CHANNEL {
        for ticker in parse_tickers(&data) {
            if let Some(pair) = symbols.get(&ticker.symbol) {
                queues.push_funding(funding_update(&ticker, pair));
            }
        }
        return Ok(());
    }

    if let Some(symbol) = channel.strip_suffix(constants::WS_DEPTH_SUFFIX) {
        let Some(pair) = symbols.get(symbol) else {
            return Ok(());
        };
        let depth: VestDepth = serde_json::from_value(data)
            .map_err(|e| ExchangeError::InvalidResponse(format!("Bad depth frame: {}", e)))?;
        let (bids, asks) = depth.levels()?;
        let now = current_time_ms();
        queues.push(OrderBookMessage::book(
            OrderBookMessageKind::Snapshot,
            pair,
            now as i64,
            now as f64 / 1000.0,
            bids,
            asks,
        ));
        return Ok(());
    }

    if let Some(symbol) = channel.strip_suffix(constants::WS_TRADES_SUFFIX) {
        let Some(pair) = symbols.get(symbol) else {
            return Ok(());
        };
        let trades = match data {
            Value::Array(list) => list,
            single => vec![single],
        };
        for raw in trades {
            let trade: VestTrade = serde_json::from_value(raw)
                .map_err(|e| ExchangeError::InvalidResponse(format!("Bad trade frame: {}", e)))?;
            let timestamp = trade.time.unwrap_or_else(current_time_ms) as f64 / 1000.0;
            queues.push(OrderBookMessage::trade(pair, timestamp, trade.to_public_trade()?));
        }
        return Ok(());
    }

    tracing::debug!(exchange = "vest", channel = %channel, "Unhandled market data channel");
    Ok(())
}

#[async_trait]
impl OrderBookDataSource for VestOrderBookDataSource {
    async fn order_book_snapshot(&self, trading_pair: &str) -> ExchangeResult<OrderBookMessage> {
        let symbol = utils::convert_to_exchange_trading_pair(trading_pair);
        let depth: VestDepth = self
            .rest
            .get(
                constants::DEPTH_PATH_URL,
                &[
                    ("symbol", symbol),
                    ("limit", constants::ORDER_BOOK_DEPTH.to_string()),
                ],
            )
            .await?;
        let (bids, asks) = depth.levels()?;
        let now = current_time_ms();
        Ok(OrderBookMessage::book(
            OrderBookMessageKind::Snapshot,
            trading_pair,
            now as i64,
            now as f64 / 1000.0,
            bids,
            asks,
        ))
    }

    async fn get_funding_info(&self, trading_pair: &str) -> ExchangeResult<FundingInfo> {
        let symbol = utils::convert_to_exchange_trading_pair(trading_pair);
        let raw: Value = self
            .rest
            .get(constants::TICKER_LATEST_PATH_URL, &[("symbols", symbol.clone())])
            .await?;
        let ticker = parse_tickers(&raw)
            .into_iter()
            .find(|t| t.symbol == symbol)
            .ok_or_else(|| ExchangeError::InvalidResponse(format!("No ticker for {}", symbol)))?;

        let mark_price = ticker
            .mark_price()
            .ok_or_else(|| ExchangeError::InvalidResponse(format!("No mark price for {}", symbol)))?;
        Ok(FundingInfo {
            trading_pair: trading_pair.to_string(),
            index_price: ticker.index_price().unwrap_or(mark_price),
            mark_price,
            next_funding_utc_timestamp: next_funding_hour(current_timestamp()),
            rate: ticker.funding_rate().unwrap_or_default(),
        })
    }

    async fn listen_for_subscriptions(&self, queues: MarketDataQueues, cancel: CancellationToken) -> ExchangeResult<()> {
        let symbols = tracked_symbols(&self.trading_pairs);
        let url = self.ws_url();

        listen_with_reconnect(
            "vest order book",
            &url,
            &self.reconnect,
            &self.health,
            &cancel,
            || subscription_channels(&symbols),
            |event| {
                if let Err(e) = dispatch_event(&event, &symbols, &queues) {
                    tracing::warn!(exchange = "vest", error = %e, "Dropped market data event");
                }
            },
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::shared::market_data_channels;
    use crate::adapters::types::TradeType;
    use rust_decimal::Decimal;
    use serde_json::json;

    fn symbols() -> HashMap<String, String> {
        tracked_symbols(&["BTC-USDC".to_string()])
    }

    #[test]
    fn test_subscription_channels() {
        let channels = subscription_channels(&tracked_symbols(&["ETH-USDC".into(), "BTC-USDC".into()]));
        assert_eq!(
            channels,
            vec!["BTC-PERP@depth", "BTC-PERP@trades", "ETH-PERP@depth", "ETH-PERP@trades", "tickers"]
        );
    }

    #[tokio::test]
    async fn test_depth_goes_to_snapshot_queue() {
        let (queues, mut rx) = market_data_channels();
        let event = json!({
            "channel": "BTC-PERP@depth",
            "data": {"bids": [["50000", "1"]], "asks": [["50010", "2"]]}
        });
        dispatch_event(&event, &symbols(), &queues).unwrap();
        let msg = rx.snapshots.recv().await.unwrap();
        assert_eq!(msg.kind, OrderBookMessageKind::Snapshot);
        assert_eq!(msg.trading_pair, "BTC-USDC");
        assert_eq!(msg.best_bid(), Some(Decimal::new(50000, 0)));
        assert!(rx.diffs.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_trades_go_to_trade_queue() {
        let (queues, mut rx) = market_data_channels();
        let event = json!({
            "channel": "BTC-PERP@trades",
            "data": {"id": "t1", "price": "50001", "qty": "0.2", "time": 1700000000000u64}
        });
        dispatch_event(&event, &symbols(), &queues).unwrap();
        let msg = rx.trades.recv().await.unwrap();
        let trade = msg.trade.unwrap();
        assert_eq!(trade.trade_id, "t1");
        assert_eq!(trade.trade_type, TradeType::Buy);
        assert_eq!(msg.timestamp, 1_700_000_000.0);
    }

    #[tokio::test]
    async fn test_tickers_go_to_funding_queue() {
        let (queues, mut rx) = market_data_channels();
        let event = json!({
            "channel": "tickers",
            "data": [
                {"symbol": "BTC-PERP", "markPrice": "50000", "indexPrice": "49990", "oneHrFundingRate": "0.00001"},
                {"symbol": "ETH-PERP", "markPrice": "3000"}
            ]
        });
        dispatch_event(&event, &symbols(), &queues).unwrap();
        let update = rx.funding.recv().await.unwrap();
        assert_eq!(update.trading_pair, "BTC-USDC");
        assert_eq!(update.index_price, Some(Decimal::new(49990, 0)));
        assert_eq!(update.rate, Some(Decimal::new(1, 5)));
        assert!(update.next_funding_utc_timestamp.unwrap() % 3600 == 0);
        assert!(rx.funding.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_untracked_symbols_are_ignored() {
        let (queues, mut rx) = market_data_channels();
        let event = json!({"channel": "SOL-PERP@depth", "data": {"bids": [], "asks": []}});
        dispatch_event(&event, &symbols(), &queues).unwrap();
        assert!(rx.snapshots.try_recv().is_err());
        let bad = json!({"channel": "BTC-PERP@depth", "data": {"bids": [["x", "1"]]}});
        assert!(dispatch_event(&bad, &symbols(), &queues).is_err());
    }
}
