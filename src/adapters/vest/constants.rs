//! Vest Constants
//!
//! Endpoints, channels, enums and the rate limit table for Vest perpetuals.

use std::time::Duration;

use rust_decimal::Decimal;

use crate::adapters::types::OrderState;

pub const EXCHANGE_NAME: &str = "vest_perpetual";
pub const DEFAULT_DOMAIN: &str = EXCHANGE_NAME;
pub const TESTNET_DOMAIN: &str = "vest_perpetual_testnet";
pub const BROKER_ID: &str = "HBOT";

/// Slippage applied to market order limit prices (5%)
pub fn market_order_slippage() -> Decimal {
    Decimal::new(5, 2)
}

pub const HEARTBEAT_TIME_INTERVAL: Duration = Duration::from_secs(30);
/// Listen keys expire after an hour; renew well before that
pub const LISTEN_KEY_RENEW_INTERVAL: Duration = Duration::from_secs(45 * 60);
pub const ORDER_BOOK_DEPTH: u32 = 100;
pub const RECV_WINDOW_MS: u64 = 60_000;
pub const DEFAULT_COLLATERAL: &str = "USDC";

// =============================================================================
// URLs
// =============================================================================

pub const REST_URL_PROD: &str = "https://server-prod.hz.vestmarkets.com/v2";
pub const REST_URL_DEV: &str = "https://server-dev.hz.vestmarkets.com/v2";
pub const WSS_URL_PROD: &str = "wss://ws-prod.hz.vestmarkets.com/ws-api";
pub const WSS_URL_DEV: &str = "wss://ws-dev.hz.vestmarkets.com/ws-api";

pub const VERIFYING_CONTRACT_PROD: &str = "0x919386306C47b2Fe1036e3B4F7C40D22D2461a23";
pub const VERIFYING_CONTRACT_DEV: &str = "0x8E4D87AEf4AC4D5415C35A12319013e34223825B";

/// REST base for a domain name; unknown names fall back to production
pub fn rest_base_url(domain: &str) -> &'static str {
    match domain {
        TESTNET_DOMAIN | "testnet" => REST_URL_DEV,
        _ => REST_URL_PROD,
    }
}

pub fn wss_base_url(domain: &str) -> &'static str {
    match domain {
        TESTNET_DOMAIN | "testnet" => WSS_URL_DEV,
        _ => WSS_URL_PROD,
    }
}

pub fn verifying_contract(domain: &str) -> &'static str {
    match domain {
        TESTNET_DOMAIN | "testnet" => VERIFYING_CONTRACT_DEV,
        _ => VERIFYING_CONTRACT_PROD,
    }
}

// =============================================================================
// REST paths
// =============================================================================

pub const REGISTER_PATH_URL: &str = "/register";
pub const EXCHANGE_INFO_PATH_URL: &str = "/exchangeInfo";
pub const DEPTH_PATH_URL: &str = "/depth";
pub const TICKER_LATEST_PATH_URL: &str = "/ticker/latest";
pub const TICKER_24HR_PATH_URL: &str = "/ticker/24hr";
pub const FUNDING_HISTORY_PATH_URL: &str = "/funding/history";
pub const KLINES_PATH_URL: &str = "/klines";
pub const ACCOUNT_PATH_URL: &str = "/account";
pub const ACCOUNT_NONCE_PATH_URL: &str = "/account/nonce";
pub const ACCOUNT_LEVERAGE_PATH_URL: &str = "/account/leverage";
pub const ORDERS_PATH_URL: &str = "/orders";
pub const ORDERS_CANCEL_PATH_URL: &str = "/orders/cancel";
pub const LP_PATH_URL: &str = "/lp";
pub const LP_QUERY_PATH_URL: &str = "/lp/query";
pub const TRANSFER_WITHDRAW_PATH_URL: &str = "/transfer/withdraw";
pub const TRANSFER_PATH_URL: &str = "/transfer";
pub const LISTEN_KEY_PATH_URL: &str = "/account/listenKey";

// =============================================================================
// WebSocket
// =============================================================================

pub const WS_TICKERS_CHANNEL: &str = "tickers";
pub const WS_ACCOUNT_PRIVATE_CHANNEL: &str = "account_private";
pub const WS_DEPTH_SUFFIX: &str = "@depth";
pub const WS_TRADES_SUFFIX: &str = "@trades";

pub fn depth_channel(symbol: &str) -> String {
    format!("{}{}", symbol, WS_DEPTH_SUFFIX)
}

pub fn trades_channel(symbol: &str) -> String {
    format!("{}{}", symbol, WS_TRADES_SUFFIX)
}

pub fn kline_channel(symbol: &str, interval: &str) -> String {
    format!("{}@kline_{}", symbol, interval)
}

pub const WS_EVENT_ORDER: &str = "ORDER";
pub const WS_EVENT_LP: &str = "LP";
pub const WS_EVENT_TRANSFER: &str = "TRANSFER";

// =============================================================================
// Enums
// =============================================================================

pub const ORDER_TYPE_MARKET: &str = "MARKET";
pub const ORDER_TYPE_LIMIT: &str = "LIMIT";
pub const ORDER_TYPE_STOP_LOSS: &str = "STOP_LOSS";
pub const ORDER_TYPE_TAKE_PROFIT: &str = "TAKE_PROFIT";
pub const ORDER_TYPE_LIQUIDATION: &str = "LIQUIDATION";

pub const ORDER_STATUS_NEW: &str = "NEW";
pub const ORDER_STATUS_PARTIALLY_FILLED: &str = "PARTIALLY_FILLED";
pub const ORDER_STATUS_FILLED: &str = "FILLED";
pub const ORDER_STATUS_CANCELLED: &str = "CANCELLED";
pub const ORDER_STATUS_REJECTED: &str = "REJECTED";

pub const TIME_IN_FORCE_GTC: &str = "GTC";
pub const TIME_IN_FORCE_FOK: &str = "FOK";

pub const SYMBOL_STATUS_TRADING: &str = "TRADING";
pub const SYMBOL_STATUS_HALT: &str = "HALT";

/// Venue order status to local state, case-insensitive
pub fn order_state(status: &str) -> Option<OrderState> {
    match status.to_uppercase().as_str() {
        "NEW" | "PENDING" | "OPEN" => Some(OrderState::Open),
        "PARTIALLY_FILLED" => Some(OrderState::PartiallyFilled),
        "FILLED" => Some(OrderState::Filled),
        "CANCELLED" | "CANCELED" => Some(OrderState::Canceled),
        "REJECTED" | "FAILED" => Some(OrderState::Failed),
        _ => None,
    }
}

pub const ORDER_NOT_EXIST_MESSAGE: &str = "order";
pub const UNKNOWN_ORDER_MESSAGE: &str = "Order not found";

// =============================================================================
// Rate limits
// =============================================================================

pub const REST_GLOBAL_LIMIT_ID: &str = "vest_rest_global_limit";
pub const REST_GLOBAL_LIMIT: u32 = 1200;
pub const RATE_LIMIT_INTERVAL_SECS: u64 = 60;

/// Route weight against the global limit
pub const ENDPOINT_WEIGHTS: &[(&str, u32)] = &[
    (EXCHANGE_INFO_PATH_URL, 10),
    (TICKER_LATEST_PATH_URL, 10),
    (TICKER_24HR_PATH_URL, 10),
    (FUNDING_HISTORY_PATH_URL, 10),
    (KLINES_PATH_URL, 10),
    (ACCOUNT_PATH_URL, 20),
    (ACCOUNT_NONCE_PATH_URL, 20),
    (ACCOUNT_LEVERAGE_PATH_URL, 20),
    (ORDERS_PATH_URL, 10),
    (DEPTH_PATH_URL, 10),
    (LP_PATH_URL, 20),
    (TRANSFER_WITHDRAW_PATH_URL, 50),
    (TRANSFER_PATH_URL, 20),
    (LISTEN_KEY_PATH_URL, 20),
    (REGISTER_PATH_URL, 100),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateLimit {
    pub limit_id: String,
    pub limit: u32,
    pub interval_secs: u64,
    /// (linked limit id, weight)
    pub linked: Option<(String, u32)>,
}

/// Global limit followed by one linked limit per route
pub fn rate_limits() -> Vec<RateLimit> {
    let mut limits = vec![RateLimit {
        limit_id: REST_GLOBAL_LIMIT_ID.to_string(),
        limit: REST_GLOBAL_LIMIT,
        interval_secs: RATE_LIMIT_INTERVAL_SECS,
        linked: None,
    }];
    limits.extend(ENDPOINT_WEIGHTS.iter().map(|(path, weight)| RateLimit {
        limit_id: path.to_string(),
        limit: (REST_GLOBAL_LIMIT / weight).max(1),
        interval_secs: RATE_LIMIT_INTERVAL_SECS,
        linked: Some((REST_GLOBAL_LIMIT_ID.to_string(), *weight)),
    }));
    limits
}
