//! Nado order book data source
//!
//! Snapshots and funding come from REST; trades, depth diffs and funding
//! rate pushes come from the subscription websocket.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::adapters::shared::{MarketDataQueues, ReconnectConfig};
use crate::adapters::traits::OrderBookDataSource;
use crate::adapters::types::{
    current_timestamp, next_funding_hour, BookLevel, ConnectionHealth, FundingInfo, FundingInfoUpdate,
    OrderBookMessage, OrderBookMessageKind, PublicTrade, TradeType,
};

use super::connector::SharedMarkets;
use super::constants;
use super::rest::NadoRest;
use super::stream::listen_with_reconnect;
use super::types::{
    IndexerFundingRate, IndexerPerpPrices, MarketLiquidity, NadoBookDepthEvent, NadoFundingRateEvent,
    NadoMarket, NadoSubscribeMsg, NadoTradeEvent, X18,
};
use super::utils;

/// Streams subscribed for every tracked product
const PUBLIC_STREAMS: [&str; 3] = [
    constants::TRADE_EVENT_TYPE,
    constants::DIFF_EVENT_TYPE,
    constants::FUNDING_RATE_EVENT_TYPE,
];

pub struct NadoOrderBookDataSource {
    rest: NadoRest,
    markets: SharedMarkets,
    trading_pairs: Vec<String>,
    health: ConnectionHealth,
    reconnect: ReconnectConfig,
}

impl NadoOrderBookDataSource {
    pub fn new(rest: NadoRest, markets: SharedMarkets, trading_pairs: Vec<String>) -> Self {
        Self {
            rest,
            markets,
            trading_pairs,
            health: ConnectionHealth::new(),
            reconnect: ReconnectConfig::default(),
        }
    }

    pub fn health(&self) -> &ConnectionHealth {
        &self.health
    }

    async fn ensure_markets(&self) -> ExchangeResult<()> {
        if self.markets.read().await.is_empty() {
            let (markets, _) = self.rest.load_markets().await?;
            *self.markets.write().await = markets;
        }
        Ok(())
    }

    async fn product_id(&self, trading_pair: &str) -> ExchangeResult<u32> {
        self.ensure_markets().await?;
        let markets = self.markets.read().await;
        utils::trading_pair_to_product_id(trading_pair, &*markets, true).ok_or_else(|| {
            ExchangeError::InvalidInput(format!("No Nado product for trading pair {}", trading_pair))
        })
    }

    /// Product id to trading pair for the tracked pairs only
    async fn tracked_products(&self) -> ExchangeResult<HashMap<u32, String>> {
        self.ensure_markets().await?;
        Ok(tracked_products(&*self.markets.read().await, &self.trading_pairs))
    }
}

fn tracked_products(markets: &BTreeMap<u32, NadoMarket>, trading_pairs: &[String]) -> HashMap<u32, String> {
    markets
        .iter()
        .map(|(pid, market)| (*pid, market.trading_pair()))
        .filter(|(_, pair)| trading_pairs.iter().any(|p| p == pair))
        .collect()
}

fn decode_levels(levels: &[(X18, X18)]) -> ExchangeResult<Vec<BookLevel>> {
    levels
        .iter()
        .map(|(price, amount)| {
            Ok(BookLevel {
                price: price.decode()?,
                amount: amount.decode()?,
            })
        })
        .collect()
}

/// Nanosecond timestamp as an update id
fn update_id(timestamp: &X18) -> ExchangeResult<i64> {
    timestamp
        .raw()?
        .to_i64()
        .ok_or_else(|| ExchangeError::InvalidResponse(format!("timestamp out of range: {}", timestamp.0)))
}

fn seconds(timestamp: &X18) -> ExchangeResult<f64> {
    utils::convert_timestamp(&Value::String(timestamp.0.clone()))
}

/// Translate one websocket event and push it to its queue
///
/// Events for untracked products and acknowledgements are ignored.
pub fn dispatch_event(event: &Value, products: &HashMap<u32, String>, queues: &MarketDataQueues) -> ExchangeResult<()> {
    let Some(event_type) = event.get("type").and_then(Value::as_str) else {
        return Ok(());
    };
    let Some(trading_pair) = event
        .get("product_id")
        .and_then(Value::as_u64)
        .and_then(|pid| u32::try_from(pid).ok())
        .and_then(|pid| products.get(&pid))
    else {
        return Ok(());
    };

    match event_type {
        constants::TRADE_EVENT_TYPE => {
            let trade: NadoTradeEvent = serde_json::from_value(event.clone())
                .map_err(|e| ExchangeError::InvalidResponse(format!("Bad trade event: {}", e)))?;
            let timestamp = seconds(&trade.timestamp)?;
            queues.push(OrderBookMessage::trade(
                trading_pair,
                timestamp,
                PublicTrade {
                    trade_id: trade.timestamp.0.clone(),
                    trade_type: if trade.is_taker_buyer {
                        TradeType::Buy
                    } else {
                        TradeType::Sell
                    },
                    price: trade.price.decode()?,
                    amount: trade.taker_qty.decode()?.abs(),
                },
            ));
        }
        constants::DIFF_EVENT_TYPE => {
            let depth: NadoBookDepthEvent = serde_json::from_value(event.clone())
                .map_err(|e| ExchangeError::InvalidResponse(format!("Bad book_depth event: {}", e)))?;
            queues.push(OrderBookMessage::book(
                OrderBookMessageKind::Diff,
                trading_pair,
                update_id(&depth.max_timestamp)?,
                seconds(&depth.max_timestamp)?,
                decode_levels(&depth.bids)?,
                decode_levels(&depth.asks)?,
            ));
        }
        constants::FUNDING_RATE_EVENT_TYPE => {
            let funding: NadoFundingRateEvent = serde_json::from_value(event.clone())
                .map_err(|e| ExchangeError::InvalidResponse(format!("Bad funding_rate event: {}", e)))?;
            queues.push_funding(FundingInfoUpdate {
                trading_pair: trading_pair.clone(),
                rate: Some(funding.funding_rate_x18.decode()?),
                next_funding_utc_timestamp: Some(next_funding_hour(current_timestamp())),
                ..Default::default()
            });
        }
        _ => {}
    }
    Ok(())
}

pub fn subscription_messages(products: &HashMap<u32, String>) -> Vec<NadoSubscribeMsg> {
    let mut ids: Vec<u32> = products.keys().copied().collect();
    ids.sort_unstable();
    ids.into_iter()
        .flat_map(|pid| {
            PUBLIC_STREAMS
                .iter()
                .map(move |stream| NadoSubscribeMsg::public(stream, pid, crate::adapters::types::next_subscription_id()))
        })
        .collect()
}

#[async_trait]
impl OrderBookDataSource for NadoOrderBookDataSource {
    async fn order_book_snapshot(&self, trading_pair: &str) -> ExchangeResult<OrderBookMessage> {
        let product_id = self.product_id(trading_pair).await?;
        let liquidity: MarketLiquidity = self
            .rest
            .query(
                constants::MARKET_LIQUIDITY_REQUEST_TYPE,
                &[
                    ("product_id", product_id.to_string()),
                    ("depth", constants::ORDER_BOOK_DEPTH.to_string()),
                ],
            )
            .await?;

        Ok(OrderBookMessage::book(
            OrderBookMessageKind::Snapshot,
            trading_pair,
            update_id(&liquidity.timestamp)?,
            seconds(&liquidity.timestamp)?,
            decode_levels(&liquidity.bids)?,
            decode_levels(&liquidity.asks)?,
        ))
    }

    async fn get_funding_info(&self, trading_pair: &str) -> ExchangeResult<FundingInfo> {
        let product_id = self.product_id(trading_pair).await?;

        let funding: IndexerFundingRate = self
            .rest
            .indexer(&json!({"funding_rate": {"product_id": product_id}}))
            .await?;
        let mut prices: HashMap<String, IndexerPerpPrices> = self
            .rest
            .indexer(&json!({"perp_prices": {"product_ids": [product_id]}}))
            .await?;
        let price = prices.remove(&product_id.to_string()).ok_or_else(|| {
            ExchangeError::InvalidResponse(format!("perp_prices missing product {}", product_id))
        })?;

        let index_price = price.index_price_x18.decode()?;
        let mark_price = match &price.mark_price_x18 {
            Some(mark) => mark.decode()?,
            None => index_price,
        };

        Ok(FundingInfo {
            trading_pair: trading_pair.to_string(),
            index_price,
            mark_price,
            next_funding_utc_timestamp: next_funding_hour(current_timestamp()),
            rate: funding.funding_rate_x18.decode()?,
        })
    }

    async fn listen_for_subscriptions(&self, queues: MarketDataQueues, cancel: CancellationToken) -> ExchangeResult<()> {
        let products = self.tracked_products().await?;
        if products.is_empty() {
            tracing::warn!(exchange = "nado", pairs = ?self.trading_pairs, "No tracked Nado products to subscribe");
        }
        let url = self.rest.config().ws_subscribe_url.clone();

        listen_with_reconnect(
            "nado order book",
            &url,
            &self.reconnect,
            &self.health,
            &cancel,
            || subscription_messages(&products),
            |event| {
                if let Err(e) = dispatch_event(&event, &products, &queues) {
                    tracing::warn!(exchange = "nado", error = %e, "Dropped market data event");
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

    fn products() -> HashMap<u32, String> {
        HashMap::from([(2, "BTC-USDT0".to_string())])
    }

    #[test]
    fn test_subscription_messages_cover_every_stream() {
        let subs = subscription_messages(&products());
        let types: Vec<&str> = subs.iter().map(|s| s.stream.stream_type.as_str()).collect();
        assert_eq!(types, vec!["trade", "book_depth", "funding_rate"]);
        assert!(subs.iter().all(|s| s.stream.product_id == 2 && s.stream.subaccount.is_none()));
        assert!(subs[0].id < subs[1].id);
    }

    #[tokio::test]
    async fn test_dispatch_trade() {
        let (queues, mut rx) = market_data_channels();
        let event = json!({
            "type": "trade",
            "timestamp": "1700000000500000000",
            "product_id": 2,
            "price": "26383000000000000000000",
            "taker_qty": "-1500000000000000000",
            "maker_qty": "1500000000000000000",
            "is_taker_buyer": false
        });
        dispatch_event(&event, &products(), &queues).unwrap();
        let msg = rx.trades.recv().await.unwrap();
        let trade = msg.trade.unwrap();
        assert_eq!(msg.trading_pair, "BTC-USDT0");
        assert_eq!(trade.trade_type, TradeType::Sell);
        assert_eq!(trade.price.to_string(), "26383");
        assert_eq!(trade.amount.to_string(), "1.5");
        assert!((msg.timestamp - 1_700_000_000.5).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_dispatch_book_depth_as_diff() {
        let (queues, mut rx) = market_data_channels();
        let event = json!({
            "type": "book_depth",
            "min_timestamp": "1700000000000000000",
            "max_timestamp": "1700000001000000000",
            "last_max_timestamp": "1699999999000000000",
            "product_id": 2,
            "bids": [["26000000000000000000000", "2000000000000000000"]],
            "asks": [["26100000000000000000000", "0"]]
        });
        dispatch_event(&event, &products(), &queues).unwrap();
        let msg = rx.diffs.recv().await.unwrap();
        assert_eq!(msg.kind, OrderBookMessageKind::Diff);
        assert_eq!(msg.update_id, 1_700_000_001_000_000_000);
        assert_eq!(msg.bids[0].price.to_string(), "26000");
        assert_eq!(msg.bids[0].amount.to_string(), "2");
        assert!(msg.asks[0].amount.is_zero());
    }

    #[tokio::test]
    async fn test_dispatch_funding_rate() {
        let (queues, mut rx) = market_data_channels();
        let event = json!({
            "type": "funding_rate",
            "timestamp": "1700000000000000000",
            "product_id": 2,
            "funding_rate_x18": "100000000000000"
        });
        dispatch_event(&event, &products(), &queues).unwrap();
        let update = rx.funding.recv().await.unwrap();
        assert_eq!(update.rate.unwrap().to_string(), "0.0001");
        assert!(update.next_funding_utc_timestamp.unwrap() % 3600 == 0);
    }

    #[tokio::test]
    async fn test_dispatch_ignores_other_products_and_acks() {
        let (queues, mut rx) = market_data_channels();
        dispatch_event(&json!({"type": "trade", "product_id": 99}), &products(), &queues).unwrap();
        dispatch_event(&json!({"result": null, "id": 1}), &products(), &queues).unwrap();
        assert!(rx.trades.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_dispatch_ignores_product_id_beyond_u32() {
        let (queues, mut rx) = market_data_channels();
        // low 32 bits equal the tracked product 2
        let event = json!({
            "type": "funding_rate",
            "timestamp": "1700000000000000000",
            "product_id": (1u64 << 32) + 2,
            "funding_rate_x18": "100000000000000"
        });
        dispatch_event(&event, &products(), &queues).unwrap();
        assert!(rx.funding.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_source_reads_shared_markets() {
        use crate::adapters::nado::signing::{TEST_ADDRESS, TEST_PRIVATE_KEY};
        use crate::adapters::nado::NadoConfig;

        let markets = SharedMarkets::default();
        markets.write().await.insert(2, NadoMarket::new(2, "BTC-PERP"));
        markets.write().await.insert(4, NadoMarket::new(4, "ETH-PERP"));
        let rest = NadoRest::new(NadoConfig::new(TEST_ADDRESS, TEST_PRIVATE_KEY, true));
        let source = NadoOrderBookDataSource::new(rest, markets, vec!["BTC-USDT0".to_string()]);

        assert_eq!(source.product_id("ETH-USDT0").await.unwrap(), 4);
        let tracked = source.tracked_products().await.unwrap();
        assert_eq!(tracked, HashMap::from([(2, "BTC-USDT0".to_string())]));
    }

    #[test]
    fn test_tracked_products_filters_pairs() {
        let mut markets = BTreeMap::new();
        markets.insert(2, NadoMarket::new(2, "BTC-PERP"));
        markets.insert(4, NadoMarket::new(4, "ETH-PERP"));
        let tracked = tracked_products(&markets, &["ETH-USDT0".to_string()]);
        assert_eq!(tracked.len(), 1);
        assert_eq!(tracked.get(&4).map(String::as_str), Some("ETH-USDT0"));
    }
}
