//! Connector trait definitions
//!
//! `PerpetualConnector` is the order/account surface of a venue.
//! `OrderBookDataSource` and `UserStreamDataSource` are the two streaming
//! halves that feed it market data and private events.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::adapters::errors::ExchangeResult;
use crate::adapters::shared::MarketDataQueues;
use crate::adapters::tracker::OrderTracker;
use crate::adapters::types::{
    Balance, ConnectorEvent, FundingInfo, FundingPayment, InFlightOrder, OrderBookMessage,
    OrderRequest, OrderType, OrderUpdate, PlacedOrder, Position, PositionMode, TradeFee,
    TradeType, TradeUpdate, TradingRule,
};

/// Order placement, account polling and user event handling for one venue
///
/// Methods that refresh state (`update_*`) write into the connector's own
/// maps, which are read back through the accessor methods.
#[async_trait]
pub trait PerpetualConnector: Send + Sync {
    /// Connector name, e.g. "nado_perpetual"
    fn name(&self) -> &'static str;

    fn trading_pairs(&self) -> &[String];

    fn supported_order_types(&self) -> Vec<OrderType>;

    fn supported_position_modes(&self) -> Vec<PositionMode>;

    /// Load market metadata, trading rules and fees
    async fn start_network(&mut self) -> ExchangeResult<()>;

    /// Submit an order and start tracking it
    ///
    /// The order is tracked as PendingCreate before submission; on success it
    /// carries the venue id and moves to Open, on rejection it moves to Failed.
    async fn place_order(&mut self, request: OrderRequest) -> ExchangeResult<PlacedOrder>;

    /// Cancel a tracked order; `Ok(false)` when the venue refused
    async fn cancel_order(&mut self, client_order_id: &str) -> ExchangeResult<bool>;

    async fn update_trading_rules(&mut self) -> ExchangeResult<()>;

    async fn update_trading_fees(&mut self) -> ExchangeResult<()>;

    async fn update_balances(&mut self) -> ExchangeResult<()>;

    async fn update_positions(&mut self) -> ExchangeResult<()>;

    async fn request_order_status(&self, order: &InFlightOrder) -> ExchangeResult<OrderUpdate>;

    async fn all_trade_updates_for_order(
        &self,
        order: &InFlightOrder,
    ) -> ExchangeResult<Vec<TradeUpdate>>;

    /// Translate one raw user stream event and apply it to the tracker
    async fn process_user_event(
        &mut self,
        event: &serde_json::Value,
    ) -> ExchangeResult<Vec<ConnectorEvent>>;

    fn get_fee(
        &self,
        trading_pair: &str,
        order_type: OrderType,
        trade_type: TradeType,
        amount: Decimal,
        price: Decimal,
        is_maker: Option<bool>,
    ) -> TradeFee;

    async fn get_last_traded_prices(
        &self,
        trading_pairs: &[String],
    ) -> ExchangeResult<HashMap<String, Decimal>>;

    async fn set_position_mode(&mut self, mode: PositionMode) -> ExchangeResult<()>;

    async fn set_leverage(&mut self, trading_pair: &str, leverage: u32) -> ExchangeResult<()>;

    async fn fetch_last_fee_payment(&self, trading_pair: &str) -> ExchangeResult<FundingPayment>;

    fn trading_rules(&self) -> &HashMap<String, TradingRule>;

    fn balances(&self) -> &HashMap<String, Balance>;

    fn positions(&self) -> &HashMap<String, Position>;

    fn order_tracker(&self) -> &OrderTracker;
}

/// Public market data: REST snapshots plus a streaming subscription loop
#[async_trait]
pub trait OrderBookDataSource: Send + Sync {
    async fn order_book_snapshot(&self, trading_pair: &str) -> ExchangeResult<OrderBookMessage>;

    async fn get_funding_info(&self, trading_pair: &str) -> ExchangeResult<FundingInfo>;

    /// Stream trades, diffs and funding updates until `cancel` fires
    ///
    /// Connection errors are logged and followed by a reconnect; the method
    /// only returns once cancelled.
    async fn listen_for_subscriptions(
        &self,
        queues: MarketDataQueues,
        cancel: CancellationToken,
    ) -> ExchangeResult<()>;
}

/// Private account event stream
#[async_trait]
pub trait UserStreamDataSource: Send + Sync {
    /// Forward raw events to `output` until `cancel` fires
    async fn listen_for_user_stream(
        &self,
        output: mpsc::UnboundedSender<serde_json::Value>,
        cancel: CancellationToken,
    ) -> ExchangeResult<()>;
}
