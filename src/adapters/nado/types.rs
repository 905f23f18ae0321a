//! Nado wire types
//!
//! Gateway, indexer and websocket payloads. Fixed-point fields are kept as
//! [`X18`] and decoded on use; the gateway sends them as strings but some
//! indexer fields arrive as bare numbers.

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::adapters::errors::{ExchangeError, ExchangeResult};

use super::constants;
use super::utils;

// =============================================================================
// Fixed-point leaf
// =============================================================================

/// A raw x18 integer, string or number on the wire
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct X18(pub String);

impl<'de> Deserialize<'de> for X18 {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(s) => Ok(X18(s)),
            Value::Number(n) => Ok(X18(n.to_string())),
            other => Err(serde::de::Error::custom(format!("expected x18 string or number, got {}", other))),
        }
    }
}

impl X18 {
    pub fn new(raw: impl Into<String>) -> Self {
        X18(raw.into())
    }

    /// Decoded human value (`raw / 10^18`)
    pub fn decode(&self) -> ExchangeResult<Decimal> {
        utils::from_x18_str(&self.0, None)
    }

    /// Raw integer value without scaling
    pub fn raw(&self) -> ExchangeResult<Decimal> {
        utils::parse_decimal(&self.0)
    }
}

/// Integer that may arrive as a string ("12") or a number (12)
fn int_from_any<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    match Value::deserialize(deserializer)? {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| serde::de::Error::custom(format!("not an i64: {}", n))),
        Value::String(s) => s.parse().map_err(serde::de::Error::custom),
        other => Err(serde::de::Error::custom(format!("expected integer, got {}", other))),
    }
}

// =============================================================================
// Gateway envelope
// =============================================================================

/// `{"status": "success"|"failure", "data": ..., "error": ..., "error_code": ...}`
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayResponse<T> {
    pub status: String,
    pub data: Option<T>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub error_code: Option<i64>,
}

impl<T> GatewayResponse<T> {
    pub fn is_success(&self) -> bool {
        self.status == "success"
    }

    /// Payload of a successful response
    ///
    /// Known gateway error codes (rate limit, geo blocks) surface as `Io`.
    pub fn into_data(self, what: &str) -> ExchangeResult<T> {
        if let Some(code) = self.error_code {
            if let Some(name) = constants::error_name(code) {
                return Err(ExchangeError::Io(format!("{} failed with {} ({})", what, name, code)));
            }
        }
        match (self.is_success(), self.data) {
            (true, Some(data)) => Ok(data),
            _ => Err(ExchangeError::InvalidResponse(format!(
                "{} failed: {}",
                what,
                self.error.unwrap_or_else(|| self.status.clone())
            ))),
        }
    }
}

// =============================================================================
// Products and symbols
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BookInfo {
    #[serde(default)]
    pub size_increment: X18,
    #[serde(default)]
    pub price_increment_x18: X18,
    #[serde(default)]
    pub min_size: X18,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RiskInfo {
    #[serde(default)]
    pub price_x18: Option<X18>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PerpProduct {
    pub product_id: u32,
    #[serde(default)]
    pub oracle_price_x18: Option<X18>,
    #[serde(default)]
    pub risk: Option<RiskInfo>,
    #[serde(default)]
    pub book_info: Option<BookInfo>,
}

impl PerpProduct {
    /// Oracle price, falling back to the risk engine price
    pub fn mark_price(&self) -> ExchangeResult<Decimal> {
        match (&self.oracle_price_x18, self.risk.as_ref().and_then(|r| r.price_x18.as_ref())) {
            (Some(p), _) | (None, Some(p)) => p.decode(),
            (None, None) => Ok(Decimal::ZERO),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AllProductsData {
    #[serde(default)]
    pub perp_products: Vec<PerpProduct>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SymbolEntry {
    pub product_id: u32,
    pub symbol: String,
    #[serde(default)]
    pub market: Option<String>,
}

/// One tradable perp market, joined from `all_products` and `/symbols`
#[derive(Debug, Clone, PartialEq)]
pub struct NadoMarket {
    pub product_id: u32,
    pub symbol: String,
    /// "BASE/QUOTE"
    pub market: String,
    /// Per-product verifying contract used to sign orders
    pub contract: String,
    pub size_increment: X18,
    pub price_increment_x18: X18,
    pub min_size: X18,
}

impl NadoMarket {
    pub fn new(product_id: u32, symbol: &str) -> Self {
        Self {
            product_id,
            symbol: symbol.to_string(),
            market: utils::symbol_to_market(symbol),
            contract: utils::generate_order_verifying_contract(product_id),
            size_increment: X18::default(),
            price_increment_x18: X18::default(),
            min_size: X18::default(),
        }
    }

    pub fn from_product(product: &PerpProduct, symbol: &SymbolEntry) -> Self {
        let mut market = Self::new(product.product_id, &symbol.symbol);
        if let Some(m) = &symbol.market {
            market.market = m.clone();
        }
        if let Some(book) = &product.book_info {
            market.size_increment = book.size_increment.clone();
            market.price_increment_x18 = book.price_increment_x18.clone();
            market.min_size = book.min_size.clone();
        }
        market
    }

    pub fn trading_pair(&self) -> String {
        utils::market_to_trading_pair(&self.market)
    }
}

// =============================================================================
// Account
// =============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BalanceAmount {
    #[serde(default)]
    pub amount: X18,
    #[serde(default)]
    pub v_quote_balance: Option<X18>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ProductBalance {
    pub product_id: u32,
    #[serde(default)]
    pub balance: BalanceAmount,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubaccountInfo {
    #[serde(default)]
    pub spot_balances: Vec<ProductBalance>,
    #[serde(default)]
    pub perp_balances: Vec<ProductBalance>,
    #[serde(default)]
    pub perp_products: Vec<PerpProduct>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MaxWithdrawable {
    pub max_withdrawable: X18,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FeeRates {
    #[serde(default)]
    pub taker_fee_rates_x18: Vec<X18>,
    #[serde(default)]
    pub maker_fee_rates_x18: Vec<X18>,
}

// =============================================================================
// Market data queries
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct MarketPrice {
    pub bid_x18: X18,
    pub ask_x18: X18,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MarketLiquidity {
    #[serde(default)]
    pub bids: Vec<(X18, X18)>,
    #[serde(default)]
    pub asks: Vec<(X18, X18)>,
    pub timestamp: X18,
}

/// Live sequencer view of one order
#[derive(Debug, Clone, Deserialize)]
pub struct GatewayOrder {
    pub amount: X18,
    pub unfilled_amount: X18,
    #[serde(default)]
    pub digest: Option<String>,
}

// =============================================================================
// Indexer
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct MatchOrder {
    #[serde(rename = "priceX18")]
    pub price_x18: X18,
    #[serde(default)]
    pub amount: X18,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexerMatch {
    pub digest: String,
    #[serde(deserialize_with = "int_from_any")]
    pub submission_idx: i64,
    #[serde(default)]
    pub fee: X18,
    #[serde(default)]
    pub base_filled: X18,
    pub order: MatchOrder,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexerTx {
    #[serde(deserialize_with = "int_from_any")]
    pub submission_idx: i64,
    #[serde(deserialize_with = "int_from_any")]
    pub timestamp: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndexerMatches {
    #[serde(default)]
    pub matches: Option<Vec<IndexerMatch>>,
    #[serde(default)]
    pub txs: Vec<IndexerTx>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexerOrder {
    pub digest: String,
    pub amount: X18,
    pub base_filled: X18,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndexerOrders {
    #[serde(default)]
    pub orders: Vec<IndexerOrder>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexerFundingRate {
    #[serde(default)]
    pub funding_rate_x18: X18,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct IndexerPerpPrices {
    #[serde(default)]
    pub index_price_x18: X18,
    #[serde(default)]
    pub mark_price_x18: Option<X18>,
}

// =============================================================================
// WebSocket: outgoing
// =============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct NadoStreamDef {
    #[serde(rename = "type")]
    pub stream_type: String,
    pub product_id: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subaccount: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NadoSubscribeMsg {
    pub method: String,
    pub stream: NadoStreamDef,
    pub id: u64,
}

impl NadoSubscribeMsg {
    pub fn public(stream_type: &str, product_id: u32, id: u64) -> Self {
        Self {
            method: constants::WS_SUBSCRIBE_METHOD.to_string(),
            stream: NadoStreamDef {
                stream_type: stream_type.to_string(),
                product_id,
                subaccount: None,
            },
            id,
        }
    }

    pub fn private(stream_type: &str, product_id: u32, subaccount: &str, id: u64) -> Self {
        let mut msg = Self::public(stream_type, product_id, id);
        msg.stream.subaccount = Some(subaccount.to_string());
        msg
    }
}

// =============================================================================
// WebSocket: incoming
// =============================================================================

/// `{"type":"trade","timestamp":"..","product_id":2,"price":"..","taker_qty":"..","is_taker_buyer":true}`
#[derive(Debug, Clone, Deserialize)]
pub struct NadoTradeEvent {
    pub timestamp: X18,
    pub product_id: u32,
    pub price: X18,
    #[serde(default)]
    pub taker_qty: X18,
    #[serde(default)]
    pub is_taker_buyer: bool,
}

/// `{"type":"book_depth","max_timestamp":"..","product_id":2,"bids":[[p,q]],"asks":[..]}`
#[derive(Debug, Clone, Deserialize)]
pub struct NadoBookDepthEvent {
    pub product_id: u32,
    #[serde(default)]
    pub min_timestamp: Option<X18>,
    pub max_timestamp: X18,
    #[serde(default)]
    pub bids: Vec<(X18, X18)>,
    #[serde(default)]
    pub asks: Vec<(X18, X18)>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NadoFundingRateEvent {
    pub product_id: u32,
    #[serde(default)]
    pub funding_rate_x18: X18,
}

/// Private fill event for the subscribed subaccount
#[derive(Debug, Clone, Deserialize)]
pub struct NadoFillEvent {
    pub timestamp: X18,
    pub product_id: u32,
    pub order_digest: String,
    pub filled_qty: X18,
    pub remaining_qty: X18,
    pub price: X18,
    #[serde(default)]
    pub is_taker: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_x18_accepts_string_and_number() {
        let from_str: X18 = serde_json::from_value(json!("2292000000000000000")).unwrap();
        let from_num: X18 = serde_json::from_value(json!(2292000000000000000u64)).unwrap();
        assert_eq!(from_str, from_num);
        assert_eq!(from_str.decode().unwrap().to_string(), "2.292");
        assert!(serde_json::from_value::<X18>(json!(true)).is_err());
    }

    #[test]
    fn test_subscribe_serialization() {
        let msg = NadoSubscribeMsg::public("book_depth", 2, 1);
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"method\":\"subscribe\""));
        assert!(json.contains("\"type\":\"book_depth\""));
        assert!(json.contains("\"product_id\":2"));
        assert!(!json.contains("subaccount"));

        let msg = NadoSubscribeMsg::private("fill", 2, "0xabc", 7);
        let value = serde_json::to_value(&msg).unwrap();
        assert_eq!(value["stream"]["subaccount"], "0xabc");
        assert_eq!(value["id"], 7);
    }

    #[test]
    fn test_book_depth_event_parsing() {
        let raw = json!({
            "type": "book_depth",
            "min_timestamp": "1676151190656903000",
            "max_timestamp": "1676151190656903001",
            "product_id": 2,
            "bids": [["86129000000000000000000", "1219100000000000000"]],
            "asks": [["86200000000000000000000", "0"]]
        });
        let evt: NadoBookDepthEvent = serde_json::from_value(raw).unwrap();
        assert_eq!(evt.product_id, 2);
        assert_eq!(evt.bids[0].0.decode().unwrap().to_string(), "86129");
        assert_eq!(evt.asks[0].1.decode().unwrap(), Decimal::ZERO);
    }

    #[test]
    fn test_gateway_error_codes() {
        let resp: GatewayResponse<SubaccountInfo> = serde_json::from_value(json!({
            "status": "failure", "error": "blocked", "error_code": 1002
        }))
        .unwrap();
        assert!(matches!(resp.into_data("subaccount_info"), Err(ExchangeError::Io(_))));

        let resp: GatewayResponse<SubaccountInfo> =
            serde_json::from_value(json!({"status": "failure", "error": "nope"})).unwrap();
        assert!(matches!(
            resp.into_data("subaccount_info"),
            Err(ExchangeError::InvalidResponse(_))
        ));
    }

    #[test]
    fn test_market_from_product() {
        let product: PerpProduct = serde_json::from_value(json!({
            "product_id": 2,
            "oracle_price_x18": "30000000000000000000000",
            "book_info": {
                "size_increment": "1000000000000000",
                "price_increment_x18": "1000000000000000000",
                "min_size": "10000000000000000"
            }
        }))
        .unwrap();
        let symbol = SymbolEntry { product_id: 2, symbol: "BTC-PERP".into(), market: None };
        let market = NadoMarket::from_product(&product, &symbol);
        assert_eq!(market.trading_pair(), "BTC-USDT0");
        assert_eq!(market.contract, "0x0000000000000000000000000000000000000002");
        assert_eq!(market.size_increment.decode().unwrap().to_string(), "0.001");
        assert_eq!(product.mark_price().unwrap().to_string(), "30000");
    }

    #[test]
    fn test_indexer_match_parsing() {
        let raw = json!({
            "matches": [{
                "digest": "0xabc",
                "submission_idx": "42",
                "fee": "1000000000000000",
                "base_filled": "-500000000000000000",
                "order": {"priceX18": "30000000000000000000000", "amount": "-1000000000000000000"}
            }],
            "txs": [{"submission_idx": 42, "timestamp": "1700000000"}]
        });
        let parsed: IndexerMatches = serde_json::from_value(raw).unwrap();
        let m = &parsed.matches.unwrap()[0];
        assert_eq!(m.submission_idx, 42);
        assert_eq!(parsed.txs[0].timestamp, 1_700_000_000);
    }
}
