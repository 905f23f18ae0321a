//! Core data types shared by all connectors
//!
//! Orders, fills, positions, trading rules and order book messages are
//! expressed here once; each venue module translates its wire payloads
//! into these types.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;

// =============================================================================
// Shared Subscription ID Counter
// =============================================================================

/// Global atomic counter for unique subscription IDs across all connectors
static GLOBAL_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

/// Get next unique subscription ID (shared across all connectors)
pub fn next_subscription_id() -> u64 {
    GLOBAL_SUBSCRIPTION_ID.fetch_add(1, Ordering::SeqCst)
}

// =============================================================================
// Clock helpers
// =============================================================================

/// Current Unix time in milliseconds
pub fn current_time_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Current Unix time in fractional seconds
pub fn current_timestamp() -> f64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}

/// Unix seconds of the next whole hour after `timestamp`
pub fn next_funding_hour(timestamp: f64) -> i64 {
    let secs = timestamp.max(0.0) as i64;
    (secs / 3600 + 1) * 3600
}

/// Build a client order id `{prefix}-{uuid}` capped at `max_len` characters
pub fn new_client_order_id(prefix: &str, max_len: usize) -> String {
    let mut id = format!("{}-{}", prefix, uuid::Uuid::new_v4().simple());
    id.truncate(max_len);
    id
}

// =============================================================================
// HTTP Client Constants
// =============================================================================

/// HTTP request timeout (seconds)
const HTTP_TIMEOUT_SECS: u64 = 10;
/// HTTP connection timeout (milliseconds)
const HTTP_CONNECT_TIMEOUT_MS: u64 = 3000;
/// Max idle connections per host in connection pool
const HTTP_POOL_MAX_IDLE: usize = 5;
/// How long idle connections stay in the pool (seconds)
const HTTP_POOL_IDLE_TIMEOUT_SECS: u64 = 60;
/// TCP keepalive interval (seconds)
const HTTP_TCP_KEEPALIVE_SECS: u64 = 30;

/// Create a pooled HTTP client for REST calls
pub fn create_http_client(exchange_name: &str) -> reqwest::Client {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
        .pool_max_idle_per_host(HTTP_POOL_MAX_IDLE)
        .pool_idle_timeout(Duration::from_secs(HTTP_POOL_IDLE_TIMEOUT_SECS))
        .tcp_keepalive(Duration::from_secs(HTTP_TCP_KEEPALIVE_SECS))
        .connect_timeout(Duration::from_millis(HTTP_CONNECT_TIMEOUT_MS))
        .tcp_nodelay(true)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new());
    tracing::info!(
        phase = "init",
        exchange = %exchange_name,
        timeout_s = HTTP_TIMEOUT_SECS,
        connect_timeout_ms = HTTP_CONNECT_TIMEOUT_MS,
        pool_max_idle = HTTP_POOL_MAX_IDLE,
        pool_idle_timeout_s = HTTP_POOL_IDLE_TIMEOUT_SECS,
        tcp_keepalive_s = HTTP_TCP_KEEPALIVE_SECS,
        "HTTP client configured"
    );
    client
}

// =============================================================================
// Connection Health Types
// =============================================================================

/// Connection state for WebSocket health monitoring
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum ConnectionState {
    Connected,
    #[default]
    Disconnected,
    Reconnecting,
}

/// Shared connection health state for a streaming data source
///
/// The reader loop updates `last_data` on every inbound frame and clears
/// `reader_alive` when it exits; clones share the same atomics.
#[derive(Debug)]
pub struct ConnectionHealth {
    pub state: Arc<RwLock<ConnectionState>>,
    /// Timestamp of last pong received (Unix ms)
    pub last_pong: Arc<AtomicU64>,
    /// Timestamp of last data received (Unix ms)
    pub last_data: Arc<AtomicU64>,
    pub reader_alive: Arc<AtomicBool>,
}

impl ConnectionHealth {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            last_pong: Arc::new(AtomicU64::new(0)),
            last_data: Arc::new(AtomicU64::new(0)),
            reader_alive: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Clone the Arc references for sharing with other tasks
    pub fn clone_refs(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            last_pong: Arc::clone(&self.last_pong),
            last_data: Arc::clone(&self.last_data),
            reader_alive: Arc::clone(&self.reader_alive),
        }
    }

    /// Record that a frame arrived
    pub fn touch(&self) {
        self.last_data.store(current_time_ms(), Ordering::Relaxed);
    }

    pub async fn set_state(&self, state: ConnectionState) {
        *self.state.write().await = state;
    }
}

impl Default for ConnectionHealth {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for ConnectionHealth {
    fn clone(&self) -> Self {
        self.clone_refs()
    }
}

// =============================================================================
// Order Enums
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit,
    LimitMaker,
}

impl OrderType {
    pub fn is_limit_type(&self) -> bool {
        matches!(self, OrderType::Limit | OrderType::LimitMaker)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TradeType {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionAction {
    Open,
    Close,
    Nil,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionMode {
    OneWay,
    Hedge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
    Both,
}

/// Lifecycle state of a tracked order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OrderState {
    PendingCreate,
    Open,
    PartiallyFilled,
    Filled,
    PendingCancel,
    Canceled,
    Failed,
    Completed,
}

impl OrderState {
    /// Terminal states never transition again
    pub fn is_done(&self) -> bool {
        matches!(
            self,
            OrderState::Filled | OrderState::Canceled | OrderState::Failed | OrderState::Completed
        )
    }
}

// =============================================================================
// Fees
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenAmount {
    pub token: String,
    pub amount: Decimal,
}

/// Fee charged on a fill, added to the cost of the trade
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TradeFee {
    pub percent: Decimal,
    pub percent_token: Option<String>,
    pub flat_fees: Vec<TokenAmount>,
}

impl TradeFee {
    pub fn from_percent(percent: Decimal, percent_token: Option<String>) -> Self {
        Self {
            percent,
            percent_token,
            flat_fees: Vec::new(),
        }
    }

    pub fn flat(token: &str, amount: Decimal) -> Self {
        Self {
            percent: Decimal::ZERO,
            percent_token: Some(token.to_string()),
            flat_fees: vec![TokenAmount {
                token: token.to_string(),
                amount,
            }],
        }
    }

    /// Fee amount in `token` for a fill worth `quote_amount`
    pub fn fee_amount_in(&self, token: &str, quote_amount: Decimal) -> Decimal {
        let flat: Decimal = self
            .flat_fees
            .iter()
            .filter(|f| f.token == token)
            .map(|f| f.amount)
            .sum();
        flat + quote_amount * self.percent
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeFeeSchema {
    pub maker_percent_fee_decimal: Decimal,
    pub taker_percent_fee_decimal: Decimal,
    pub buy_percent_fee_deducted_from_returns: bool,
}

// =============================================================================
// Orders and Fills
// =============================================================================

/// Parameters for a new order
#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub client_order_id: String,
    pub trading_pair: String,
    pub amount: Decimal,
    pub trade_type: TradeType,
    pub order_type: OrderType,
    pub price: Decimal,
    pub position_action: PositionAction,
}

/// Venue acknowledgement of a placed order
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedOrder {
    pub exchange_order_id: String,
    pub timestamp: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderUpdate {
    pub client_order_id: String,
    pub exchange_order_id: Option<String>,
    pub trading_pair: String,
    pub update_timestamp: f64,
    pub new_state: OrderState,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeUpdate {
    pub trade_id: String,
    pub client_order_id: String,
    pub exchange_order_id: String,
    pub trading_pair: String,
    pub fill_timestamp: f64,
    pub fill_price: Decimal,
    pub fill_base_amount: Decimal,
    pub fill_quote_amount: Decimal,
    pub fee: TradeFee,
}

/// Locally tracked order
#[derive(Debug, Clone, PartialEq)]
pub struct InFlightOrder {
    pub client_order_id: String,
    pub exchange_order_id: Option<String>,
    pub trading_pair: String,
    pub order_type: OrderType,
    pub trade_type: TradeType,
    pub price: Decimal,
    pub amount: Decimal,
    pub position: PositionAction,
    pub creation_timestamp: f64,
    pub current_state: OrderState,
    pub executed_amount_base: Decimal,
    pub executed_amount_quote: Decimal,
    pub order_fills: HashMap<String, TradeUpdate>,
}

impl InFlightOrder {
    pub fn from_request(request: &OrderRequest, creation_timestamp: f64) -> Self {
        Self {
            client_order_id: request.client_order_id.clone(),
            exchange_order_id: None,
            trading_pair: request.trading_pair.clone(),
            order_type: request.order_type,
            trade_type: request.trade_type,
            price: request.price,
            amount: request.amount,
            position: request.position_action,
            creation_timestamp,
            current_state: OrderState::PendingCreate,
            executed_amount_base: Decimal::ZERO,
            executed_amount_quote: Decimal::ZERO,
            order_fills: HashMap::new(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.current_state.is_done()
    }

    pub fn base_asset(&self) -> &str {
        split_trading_pair(&self.trading_pair).0
    }

    pub fn quote_asset(&self) -> &str {
        split_trading_pair(&self.trading_pair).1
    }
}

/// Split `BASE-QUOTE` into its halves; a pair without a dash has an empty quote
pub fn split_trading_pair(trading_pair: &str) -> (&str, &str) {
    trading_pair.split_once('-').unwrap_or((trading_pair, ""))
}

// =============================================================================
// Account and Market Data
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Balance {
    pub total: Decimal,
    pub available: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub trading_pair: String,
    pub position_side: PositionSide,
    pub unrealized_pnl: Decimal,
    pub entry_price: Decimal,
    /// Signed amount, negative for shorts
    pub amount: Decimal,
    pub leverage: Decimal,
}

/// Venue limits for one trading pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingRule {
    pub trading_pair: String,
    pub min_order_size: Decimal,
    pub max_order_size: Decimal,
    pub min_price_increment: Decimal,
    pub min_base_amount_increment: Decimal,
    pub min_quote_amount_increment: Decimal,
    pub min_notional_size: Decimal,
    pub supports_limit_orders: bool,
    pub supports_market_orders: bool,
    pub buy_order_collateral_token: Option<String>,
    pub sell_order_collateral_token: Option<String>,
}

impl TradingRule {
    /// Rule with permissive defaults, to be narrowed by the venue parser
    pub fn new(trading_pair: &str) -> Self {
        let smallest = Decimal::new(1, 18);
        Self {
            trading_pair: trading_pair.to_string(),
            min_order_size: Decimal::ZERO,
            max_order_size: Decimal::MAX,
            min_price_increment: smallest,
            min_base_amount_increment: smallest,
            min_quote_amount_increment: smallest,
            min_notional_size: Decimal::ZERO,
            supports_limit_orders: true,
            supports_market_orders: true,
            buy_order_collateral_token: None,
            sell_order_collateral_token: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundingInfo {
    pub trading_pair: String,
    pub index_price: Decimal,
    pub mark_price: Decimal,
    pub next_funding_utc_timestamp: i64,
    pub rate: Decimal,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FundingInfoUpdate {
    pub trading_pair: String,
    pub index_price: Option<Decimal>,
    pub mark_price: Option<Decimal>,
    pub next_funding_utc_timestamp: Option<i64>,
    pub rate: Option<Decimal>,
}

/// Last funding payment as (timestamp, rate, amount)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FundingPayment {
    pub timestamp: f64,
    pub funding_rate: Decimal,
    pub payment: Decimal,
}

impl FundingPayment {
    /// Marker used when the venue does not expose funding payments
    pub fn unavailable() -> Self {
        Self {
            timestamp: 0.0,
            funding_rate: Decimal::NEGATIVE_ONE,
            payment: Decimal::NEGATIVE_ONE,
        }
    }
}

// =============================================================================
// Order Book Messages
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BookLevel {
    pub price: Decimal,
    pub amount: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderBookMessageKind {
    Snapshot,
    Diff,
    Trade,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublicTrade {
    pub trade_id: String,
    pub trade_type: TradeType,
    pub price: Decimal,
    pub amount: Decimal,
}

/// Book snapshot, diff or public trade for one pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBookMessage {
    pub kind: OrderBookMessageKind,
    pub trading_pair: String,
    pub update_id: i64,
    /// Unix seconds
    pub timestamp: f64,
    pub bids: Vec<BookLevel>,
    pub asks: Vec<BookLevel>,
    pub trade: Option<PublicTrade>,
}

impl OrderBookMessage {
    pub fn book(
        kind: OrderBookMessageKind,
        trading_pair: &str,
        update_id: i64,
        timestamp: f64,
        bids: Vec<BookLevel>,
        asks: Vec<BookLevel>,
    ) -> Self {
        Self {
            kind,
            trading_pair: trading_pair.to_string(),
            update_id,
            timestamp,
            bids,
            asks,
            trade: None,
        }
    }

    pub fn trade(trading_pair: &str, timestamp: f64, trade: PublicTrade) -> Self {
        Self {
            kind: OrderBookMessageKind::Trade,
            trading_pair: trading_pair.to_string(),
            update_id: (timestamp * 1000.0) as i64,
            timestamp,
            bids: Vec::new(),
            asks: Vec::new(),
            trade: Some(trade),
        }
    }

    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.iter().map(|l| l.price).max()
    }

    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.iter().map(|l| l.price).min()
    }
}

/// Output of user stream event processing
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectorEvent {
    Order(OrderUpdate),
    Trade(TradeUpdate),
    AccountRefreshed,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn test_order_state_is_done() {
        assert!(OrderState::Filled.is_done());
        assert!(OrderState::Canceled.is_done());
        assert!(OrderState::Failed.is_done());
        assert!(OrderState::Completed.is_done());
        assert!(!OrderState::Open.is_done());
        assert!(!OrderState::PartiallyFilled.is_done());
        assert!(!OrderState::PendingCreate.is_done());
    }

    #[test]
    fn test_split_trading_pair() {
        assert_eq!(split_trading_pair("BTC-USDT0"), ("BTC", "USDT0"));
        assert_eq!(split_trading_pair("BTCPERP"), ("BTCPERP", ""));
    }

    #[test]
    fn test_next_funding_hour() {
        assert_eq!(next_funding_hour(1_700_000_000.5), 1_700_002_800);
        assert_eq!(next_funding_hour(3600.0), 7200);
    }

    #[test]
    fn test_client_order_id_truncated() {
        let id = new_client_order_id("HBOT", 12);
        assert_eq!(id.len(), 12);
        assert!(id.starts_with("HBOT-"));
    }

    #[test]
    fn test_trade_fee_amount() {
        let fee = TradeFee::flat("USDC", d("0.1"));
        assert_eq!(fee.fee_amount_in("USDC", d("1000")), d("0.1"));

        let fee = TradeFee::from_percent(d("0.0002"), None);
        assert_eq!(fee.fee_amount_in("USDC", d("1000")), d("0.2"));
    }

    #[test]
    fn test_in_flight_order_assets() {
        let request = OrderRequest {
            client_order_id: "c1".into(),
            trading_pair: "ETH-USDT0".into(),
            amount: d("1.5"),
            trade_type: TradeType::Buy,
            order_type: OrderType::Limit,
            price: d("2000"),
            position_action: PositionAction::Open,
        };
        let order = InFlightOrder::from_request(&request, 1.0);
        assert_eq!(order.base_asset(), "ETH");
        assert_eq!(order.quote_asset(), "USDT0");
        assert_eq!(order.current_state, OrderState::PendingCreate);
    }

    #[test]
    fn test_book_message_best_prices() {
        let msg = OrderBookMessage::book(
            OrderBookMessageKind::Snapshot,
            "BTC-USDT0",
            1,
            1.0,
            vec![
                BookLevel { price: d("100"), amount: d("1") },
                BookLevel { price: d("101"), amount: d("1") },
            ],
            vec![BookLevel { price: d("102"), amount: d("2") }],
        );
        assert_eq!(msg.best_bid(), Some(d("101")));
        assert_eq!(msg.best_ask(), Some(d("102")));
    }

    #[test]
    fn test_connection_health_clone_shares_atomics() {
        let health = ConnectionHealth::new();
        let cloned = health.clone_refs();
        health.reader_alive.store(true, Ordering::Relaxed);
        assert!(cloned.reader_alive.load(Ordering::Relaxed));
        cloned.touch();
        assert!(health.last_data.load(Ordering::Relaxed) > 0);
    }

    #[tokio::test]
    async fn test_connection_state_transitions() {
        let health = ConnectionHealth::new();
        assert_eq!(*health.state.read().await, ConnectionState::Disconnected);
        health.set_state(ConnectionState::Connected).await;
        assert_eq!(*health.state.read().await, ConnectionState::Connected);
    }

    #[test]
    fn test_funding_payment_unavailable() {
        let p = FundingPayment::unavailable();
        assert_eq!(p.timestamp, 0.0);
        assert_eq!(p.funding_rate, Decimal::NEGATIVE_ONE);
        assert_eq!(p.payment, Decimal::NEGATIVE_ONE);
    }
}
