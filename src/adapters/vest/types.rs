//! Vest Types
//!
//! REST and websocket payloads. Vest sends decimals as strings, but a few
//! fields (and mocks) use bare numbers, so lookups go through
//! [`decimal_field`] rather than fixed structs where the shape varies.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;

use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::adapters::types::{BookLevel, PublicTrade, TradeType};

// =============================================================================
// Field helpers
// =============================================================================

/// Decimal from a string or number value
pub fn as_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::String(s) => s.trim().parse().ok(),
        Value::Number(n) => n.to_string().parse().ok(),
        _ => None,
    }
}

/// Look up a dotted path (`"LOT_SIZE.minQty"`) inside `value`
///
/// A leading segment naming a filter type also matches a `filters` array
/// entry with that `filterType`.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = match value.get(first) {
        Some(found) => found,
        None => value
            .get("filters")?
            .as_array()?
            .iter()
            .find(|f| f.get("filterType").and_then(Value::as_str) == Some(first))?,
    };
    for segment in segments {
        current = current.get(segment)?;
    }
    Some(current)
}

/// First of `paths` that holds a decimal
pub fn decimal_field(value: &Value, paths: &[&str]) -> Option<Decimal> {
    paths.iter().find_map(|path| lookup(value, path).and_then(as_decimal))
}

pub fn str_field<'a>(value: &'a Value, paths: &[&str]) -> Option<&'a str> {
    paths.iter().find_map(|path| lookup(value, path).and_then(Value::as_str))
}

/// Integer milliseconds from a string or number
pub fn ms_field(value: &Value, paths: &[&str]) -> Option<u64> {
    paths.iter().find_map(|path| match lookup(value, path)? {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().map(|f| f as u64)),
        Value::String(s) => s.parse().ok(),
        _ => None,
    })
}

/// `{"code": ..., "msg": ...}` error bodies come back with HTTP 200 at times
pub fn api_error(value: &Value) -> Option<String> {
    let code = value.get("code")?;
    if code.is_null() {
        return None;
    }
    let msg = value.get("msg").and_then(Value::as_str).unwrap_or_default();
    Some(format!("{} {}", code, msg).trim().to_string())
}

// =============================================================================
// Auth responses
// =============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub msg: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListenKeyResponse {
    #[serde(default)]
    pub listen_key: Option<String>,
    #[serde(default)]
    pub code: Option<i64>,
    #[serde(default)]
    pub msg: Option<String>,
}

// =============================================================================
// Market data
// =============================================================================

/// `/depth` response and `{symbol}@depth` payload; always a full book
#[derive(Debug, Clone, Deserialize)]
pub struct VestDepth {
    #[serde(default)]
    pub bids: Vec<[String; 2]>,
    #[serde(default)]
    pub asks: Vec<[String; 2]>,
}

fn parse_levels(side: &str, levels: &[[String; 2]]) -> ExchangeResult<Vec<BookLevel>> {
    levels
        .iter()
        .map(|[price, qty]| {
            let price = price
                .parse()
                .map_err(|e| ExchangeError::InvalidResponse(format!("Invalid {} price '{}': {}", side, price, e)))?;
            let amount = qty
                .parse()
                .map_err(|e| ExchangeError::InvalidResponse(format!("Invalid {} quantity '{}': {}", side, qty, e)))?;
            Ok(BookLevel { price, amount })
        })
        .collect()
}

impl VestDepth {
    /// Bids best-first (descending), asks best-first (ascending)
    pub fn levels(&self) -> ExchangeResult<(Vec<BookLevel>, Vec<BookLevel>)> {
        let mut bids = parse_levels("bid", &self.bids)?;
        let mut asks = parse_levels("ask", &self.asks)?;
        bids.sort_by(|a, b| b.price.cmp(&a.price));
        asks.sort_by(|a, b| a.price.cmp(&b.price));
        Ok((bids, asks))
    }
}

/// `{symbol}@trades` payload
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VestTrade {
    #[serde(default)]
    pub id: Option<Value>,
    pub price: String,
    pub qty: String,
    #[serde(default)]
    pub time: Option<u64>,
    #[serde(default)]
    pub is_buyer_maker: Option<bool>,
}

impl VestTrade {
    pub fn to_public_trade(&self) -> ExchangeResult<PublicTrade> {
        let price = self
            .price
            .parse()
            .map_err(|e| ExchangeError::InvalidResponse(format!("Invalid trade price '{}': {}", self.price, e)))?;
        let amount = self
            .qty
            .parse()
            .map_err(|e| ExchangeError::InvalidResponse(format!("Invalid trade qty '{}': {}", self.qty, e)))?;
        let trade_id = match &self.id {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => self.time.unwrap_or_default().to_string(),
        };
        Ok(PublicTrade {
            trade_id,
            trade_type: if self.is_buyer_maker == Some(true) {
                TradeType::Sell
            } else {
                TradeType::Buy
            },
            price,
            amount,
        })
    }
}

/// `/ticker/latest` entry and `tickers` channel element
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VestTicker {
    pub symbol: String,
    #[serde(default)]
    pub last_price: Option<String>,
    #[serde(default)]
    pub mark_price: Option<String>,
    #[serde(default)]
    pub index_price: Option<String>,
    #[serde(default)]
    pub one_hr_funding_rate: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

fn opt_decimal(raw: &Option<String>) -> Option<Decimal> {
    raw.as_deref().and_then(|s| s.parse().ok())
}

impl VestTicker {
    pub fn last_price(&self) -> Option<Decimal> {
        opt_decimal(&self.last_price)
    }

    pub fn mark_price(&self) -> Option<Decimal> {
        opt_decimal(&self.mark_price)
    }

    pub fn index_price(&self) -> Option<Decimal> {
        opt_decimal(&self.index_price)
    }

    pub fn funding_rate(&self) -> Option<Decimal> {
        opt_decimal(&self.one_hr_funding_rate)
    }

    /// Last trade price, mark price when no trade is reported
    pub fn reference_price(&self) -> Option<Decimal> {
        self.last_price().or_else(|| self.mark_price())
    }
}

/// `{"tickers": [...]}`; a bare array is accepted too
pub fn parse_tickers(value: &Value) -> Vec<VestTicker> {
    let list: &[Value] = match value {
        Value::Array(list) => list.as_slice(),
        other => match other.get("tickers").and_then(Value::as_array) {
            Some(list) => list.as_slice(),
            None => &[],
        },
    };
    list.iter()
        .filter_map(|entry| match serde_json::from_value::<VestTicker>(entry.clone()) {
            Ok(ticker) => Some(ticker),
            Err(e) => {
                tracing::debug!(exchange = "vest", entry = %entry, error = %e, "Skipping ticker entry");
                None
            }
        })
        .collect()
}

// =============================================================================
// WebSocket envelope
// =============================================================================

/// Classified inbound websocket frame
#[derive(Debug, Clone, PartialEq)]
pub enum VestWsMessage {
    Pong,
    /// Reply to SUBSCRIBE/UNSUBSCRIBE
    Ack { id: Option<u64> },
    /// `{"channel": ..., "data": ...}`
    Channel { channel: String, data: Value },
    Other(Value),
}

impl VestWsMessage {
    pub fn classify(value: Value) -> Self {
        if value.get("data").and_then(Value::as_str) == Some("PONG") {
            return Self::Pong;
        }
        if let Some(channel) = value.get("channel").and_then(Value::as_str) {
            let channel = channel.to_string();
            let data = value.get("data").cloned().unwrap_or(Value::Null);
            return Self::Channel { channel, data };
        }
        if value.get("result").is_some() {
            return Self::Ack {
                id: value.get("id").and_then(Value::as_u64),
            };
        }
        Self::Other(value)
    }
}
