//! Nado venue constants
//!
//! Endpoints, request types, stream names and the rate-limit table. The
//! rate limits are descriptive only; nothing in the crate throttles on them.

use std::time::Duration;

use rust_decimal::Decimal;

use crate::adapters::types::OrderState;

pub const EXCHANGE_NAME: &str = "nado";
pub const DEFAULT_DOMAIN: &str = "nado";
pub const TESTNET_DOMAIN: &str = "nado_testnet";

/// Digests are 32 bytes hex with prefix
pub const MAX_ORDER_ID_LEN: usize = 66;
pub const HEARTBEAT_TIME_INTERVAL: Duration = Duration::from_secs(30);
pub const ORDER_BOOK_DEPTH: u32 = 100;
pub const VERSION: &str = "0.0.1";
pub const EIP712_DOMAIN_NAME: &str = "Nado";
pub const QUOTE: &str = "USDT0";
pub const HBOT_BROKER_ID: &str = "";

/// Subaccount name "default" as 12 bytes of hex
pub const DEFAULT_SUBACCOUNT_HEX: &str = "64656661756c740000000000";

// =============================================================================
// Domain-dependent endpoints
// =============================================================================

/// Static description of one Nado deployment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NadoDomain {
    pub name: &'static str,
    pub connector_name: &'static str,
    pub rest_url: &'static str,
    pub ws_url: &'static str,
    pub ws_subscribe_url: &'static str,
    pub archive_url: &'static str,
    pub endpoint_contract: &'static str,
    pub chain_id: u64,
}

pub const MAINNET: NadoDomain = NadoDomain {
    name: DEFAULT_DOMAIN,
    connector_name: "nado_perpetual",
    rest_url: "https://gateway.prod.nado.xyz/v1",
    ws_url: "wss://gateway.prod.nado.xyz/v1/ws",
    ws_subscribe_url: "wss://gateway.prod.nado.xyz/v1/subscribe",
    archive_url: "https://archive.prod.nado.xyz/v1",
    endpoint_contract: "0x05ec92d78ed421f3d3ada77ffde167106565974e",
    chain_id: 57073,
};

pub const TESTNET: NadoDomain = NadoDomain {
    name: TESTNET_DOMAIN,
    connector_name: "nado_perpetual_testnet",
    rest_url: "https://gateway.test.nado.xyz/v1",
    ws_url: "wss://gateway.test.nado.xyz/v1/ws",
    ws_subscribe_url: "wss://gateway.test.nado.xyz/v1/subscribe",
    archive_url: "https://archive.test.nado.xyz/v1",
    endpoint_contract: "0x698d87105274292b5673367dec81874ce3633ac2",
    chain_id: 763373,
};

pub fn domain(testnet: bool) -> NadoDomain {
    if testnet {
        TESTNET
    } else {
        MAINNET
    }
}

// =============================================================================
// REST paths, execute methods and query types
// =============================================================================

pub const POST_PATH_URL: &str = "/execute";
pub const QUERY_PATH_URL: &str = "/query";
pub const INDEXER_PATH_URL: &str = "/indexer";
pub const SYMBOLS_PATH_URL: &str = "/symbols";

pub const PLACE_ORDER_METHOD: &str = "place_order";
pub const PLACE_ORDER_METHOD_NO_LEVERAGE: &str = "place_order_no_leverage";
pub const CANCEL_ORDERS_METHOD: &str = "cancel_orders";
pub const CANCEL_ALL_METHOD: &str = "cancel_product_orders";

pub const STATUS_REQUEST_TYPE: &str = "status";
pub const ORDER_REQUEST_TYPE: &str = "order";
pub const SUBACCOUNT_INFO_REQUEST_TYPE: &str = "subaccount_info";
pub const MARKET_LIQUIDITY_REQUEST_TYPE: &str = "market_liquidity";
pub const ALL_PRODUCTS_REQUEST_TYPE: &str = "all_products";
pub const MARKET_PRICE_REQUEST_TYPE: &str = "market_price";
pub const FEE_RATES_REQUEST_TYPE: &str = "fee_rates";
pub const CONTRACTS_REQUEST_TYPE: &str = "contracts";
pub const SUBACCOUNT_ORDERS_REQUEST_TYPE: &str = "subaccount_orders";
pub const MAX_WITHDRAWABLE_REQUEST_TYPE: &str = "max_withdrawable";

// =============================================================================
// WebSocket streams
// =============================================================================

pub const WS_SUBSCRIBE_METHOD: &str = "subscribe";
pub const TOB_TOPIC_EVENT_TYPE: &str = "best_bid_offer";
pub const POSITION_CHANGE_EVENT_TYPE: &str = "position_change";
pub const SNAPSHOT_EVENT_TYPE: &str = "market_liquidity";
pub const TRADE_EVENT_TYPE: &str = "trade";
pub const DIFF_EVENT_TYPE: &str = "book_depth";
pub const FILL_EVENT_TYPE: &str = "fill";
pub const FUNDING_RATE_EVENT_TYPE: &str = "funding_rate";

// =============================================================================
// Orders
// =============================================================================

pub const SIDE_BUY: &str = "BUY";
pub const SIDE_SELL: &str = "SELL";

pub const TIME_IN_FORCE_GTC: &str = "GTC";
pub const TIME_IN_FORCE_IOC: &str = "IOC";
pub const TIME_IN_FORCE_FOK: &str = "FOK";
pub const TIME_IN_FORCE_POSTONLY: &str = "POSTONLY";

/// Appendix encoding of a time-in-force name; unknown names encode as GTC
pub fn time_in_force_code(tif: &str) -> u128 {
    match tif {
        TIME_IN_FORCE_GTC => 0,
        TIME_IN_FORCE_IOC => 1,
        TIME_IN_FORCE_FOK => 2,
        TIME_IN_FORCE_POSTONLY => 3,
        _ => 0,
    }
}

pub fn order_state(status: &str) -> Option<OrderState> {
    match status {
        "PendingNew" => Some(OrderState::PendingCreate),
        "New" => Some(OrderState::Open),
        "Filled" => Some(OrderState::Filled),
        "PartiallyFilled" => Some(OrderState::PartiallyFilled),
        "Canceled" => Some(OrderState::Canceled),
        "Rejected" => Some(OrderState::Failed),
        _ => None,
    }
}

/// Cancel rejected because the sequencer has no such order
pub const ORDER_NOT_FOUND_ERROR_CODE: i64 = 2020;

// =============================================================================
// Fees
// =============================================================================

pub fn default_maker_fee() -> Decimal {
    Decimal::ZERO
}

pub fn default_taker_fee() -> Decimal {
    Decimal::new(2, 4)
}

// =============================================================================
// Rate limits
// =============================================================================

pub const ALL_ENDPOINTS_LIMIT: &str = "All";

/// One rate-limit bucket; `linked` names the pool the call also counts against
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimit {
    pub limit_id: &'static str,
    pub limit: u32,
    pub interval_secs: u32,
    pub weight: u32,
    pub linked: Option<&'static str>,
}

const fn linked(limit_id: &'static str, limit: u32, interval_secs: u32, weight: u32) -> RateLimit {
    RateLimit {
        limit_id,
        limit,
        interval_secs,
        weight,
        linked: Some(ALL_ENDPOINTS_LIMIT),
    }
}

pub const RATE_LIMITS: &[RateLimit] = &[
    RateLimit {
        limit_id: ALL_ENDPOINTS_LIMIT,
        limit: 600,
        interval_secs: 10,
        weight: 1,
        linked: None,
    },
    linked(INDEXER_PATH_URL, 60, 1, 1),
    linked(STATUS_REQUEST_TYPE, 60, 1, 1),
    linked(ORDER_REQUEST_TYPE, 60, 1, 1),
    linked(SUBACCOUNT_INFO_REQUEST_TYPE, 60, 10, 10),
    linked(MARKET_LIQUIDITY_REQUEST_TYPE, 60, 1, 1),
    linked(ALL_PRODUCTS_REQUEST_TYPE, 12, 1, 5),
    linked(MARKET_PRICE_REQUEST_TYPE, 60, 1, 1),
    linked(FEE_RATES_REQUEST_TYPE, 30, 1, 2),
    linked(CONTRACTS_REQUEST_TYPE, 60, 1, 1),
    linked(SUBACCOUNT_ORDERS_REQUEST_TYPE, 30, 1, 2),
    linked(MAX_WITHDRAWABLE_REQUEST_TYPE, 120, 10, 5),
    linked(PLACE_ORDER_METHOD, 10, 1, 1),
    linked(PLACE_ORDER_METHOD_NO_LEVERAGE, 5, 10, 1),
    linked(CANCEL_ORDERS_METHOD, 600, 1, 1),
    linked(CANCEL_ALL_METHOD, 2, 1, 1),
];

pub fn rate_limit(limit_id: &str) -> Option<&'static RateLimit> {
    RATE_LIMITS.iter().find(|r| r.limit_id == limit_id)
}

// =============================================================================
// Gateway error codes
// =============================================================================

pub fn error_name(code: i64) -> Option<&'static str> {
    match code {
        1000 => Some("RateLimit"),
        1001 => Some("BlacklistedAddress"),
        1002 => Some("BlockedLocation"),
        1003 => Some("BlockedSubdivision"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domains() {
        assert_eq!(domain(false).chain_id, 57073);
        assert_eq!(domain(true).chain_id, 763373);
        assert_eq!(domain(true).connector_name, "nado_perpetual_testnet");
        assert!(MAINNET.ws_subscribe_url.ends_with("/v1/subscribe"));
    }

    #[test]
    fn test_rate_limit_table() {
        let sub = rate_limit(SUBACCOUNT_INFO_REQUEST_TYPE).unwrap();
        assert_eq!((sub.limit, sub.interval_secs, sub.weight), (60, 10, 10));
        assert_eq!(sub.linked, Some(ALL_ENDPOINTS_LIMIT));
        assert!(rate_limit(ALL_ENDPOINTS_LIMIT).unwrap().linked.is_none());
        assert_eq!(RATE_LIMITS.len(), 16);
    }

    #[test]
    fn test_order_state_map() {
        assert_eq!(order_state("New"), Some(OrderState::Open));
        assert_eq!(order_state("Rejected"), Some(OrderState::Failed));
        assert_eq!(order_state("unknown"), None);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(error_name(1002), Some("BlockedLocation"));
        assert_eq!(error_name(2020), None);
        assert_eq!(default_taker_fee().to_string(), "0.0002");
    }
}
