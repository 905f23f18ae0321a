//! Connector factory for runtime venue selection
//!
//! Builds connectors from `ConnectorConfig` entries. Uses enum dispatch
//! (no `Box<dyn>`) for the connector itself; the two stream halves are
//! handed out as trait objects so they can move into their own tasks.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::adapters::errors::ExchangeResult;
use crate::adapters::nado::{NadoConfig, NadoConnector, NadoOrderBookDataSource, NadoUserStreamDataSource};
use crate::adapters::tracker::OrderTracker;
use crate::adapters::traits::{OrderBookDataSource, PerpetualConnector, UserStreamDataSource};
use crate::adapters::types::{
    Balance, ConnectorEvent, FundingPayment, InFlightOrder, OrderRequest, OrderType, OrderUpdate, PlacedOrder,
    Position, PositionMode, TradeFee, TradeType, TradeUpdate, TradingRule,
};
use crate::adapters::vest::{VestConfig, VestConnector, VestOrderBookDataSource, VestUserStreamDataSource};
use crate::config::{ConnectorConfig, Venue};

// =============================================================================
// AnyConnector: enum-based dispatch for runtime venue selection
// =============================================================================

pub enum AnyConnector {
    Nado(NadoConnector),
    Vest(VestConnector),
}

macro_rules! delegate {
    ($self:expr, $method:ident ( $($arg:expr),* )) => {
        match $self {
            AnyConnector::Nado(c) => c.$method($($arg),*),
            AnyConnector::Vest(c) => c.$method($($arg),*),
        }
    };
    (await $self:expr, $method:ident ( $($arg:expr),* )) => {
        match $self {
            AnyConnector::Nado(c) => c.$method($($arg),*).await,
            AnyConnector::Vest(c) => c.$method($($arg),*).await,
        }
    };
}

#[async_trait]
impl PerpetualConnector for AnyConnector {
    fn name(&self) -> &'static str {
        delegate!(self, name())
    }

    fn trading_pairs(&self) -> &[String] {
        delegate!(self, trading_pairs())
    }

    fn supported_order_types(&self) -> Vec<OrderType> {
        delegate!(self, supported_order_types())
    }

    fn supported_position_modes(&self) -> Vec<PositionMode> {
        delegate!(self, supported_position_modes())
    }

    async fn start_network(&mut self) -> ExchangeResult<()> {
        delegate!(await self, start_network())
    }

    async fn place_order(&mut self, request: OrderRequest) -> ExchangeResult<PlacedOrder> {
        delegate!(await self, place_order(request))
    }

    async fn cancel_order(&mut self, client_order_id: &str) -> ExchangeResult<bool> {
        delegate!(await self, cancel_order(client_order_id))
    }

    async fn update_trading_rules(&mut self) -> ExchangeResult<()> {
        delegate!(await self, update_trading_rules())
    }

    async fn update_trading_fees(&mut self) -> ExchangeResult<()> {
        delegate!(await self, update_trading_fees())
    }

    async fn update_balances(&mut self) -> ExchangeResult<()> {
        delegate!(await self, update_balances())
    }

    async fn update_positions(&mut self) -> ExchangeResult<()> {
        delegate!(await self, update_positions())
    }

    async fn request_order_status(&self, order: &InFlightOrder) -> ExchangeResult<OrderUpdate> {
        delegate!(await self, request_order_status(order))
    }

    async fn all_trade_updates_for_order(&self, order: &InFlightOrder) -> ExchangeResult<Vec<TradeUpdate>> {
        delegate!(await self, all_trade_updates_for_order(order))
    }

    async fn process_user_event(&mut self, event: &serde_json::Value) -> ExchangeResult<Vec<ConnectorEvent>> {
        delegate!(await self, process_user_event(event))
    }

    fn get_fee(
        &self,
        trading_pair: &str,
        order_type: OrderType,
        trade_type: TradeType,
        amount: Decimal,
        price: Decimal,
        is_maker: Option<bool>,
    ) -> TradeFee {
        delegate!(self, get_fee(trading_pair, order_type, trade_type, amount, price, is_maker))
    }

    async fn get_last_traded_prices(&self, trading_pairs: &[String]) -> ExchangeResult<HashMap<String, Decimal>> {
        delegate!(await self, get_last_traded_prices(trading_pairs))
    }

    async fn set_position_mode(&mut self, mode: PositionMode) -> ExchangeResult<()> {
        delegate!(await self, set_position_mode(mode))
    }

    async fn set_leverage(&mut self, trading_pair: &str, leverage: u32) -> ExchangeResult<()> {
        delegate!(await self, set_leverage(trading_pair, leverage))
    }

    async fn fetch_last_fee_payment(&self, trading_pair: &str) -> ExchangeResult<FundingPayment> {
        delegate!(await self, fetch_last_fee_payment(trading_pair))
    }

    fn trading_rules(&self) -> &HashMap<String, TradingRule> {
        delegate!(self, trading_rules())
    }

    fn balances(&self) -> &HashMap<String, Balance> {
        delegate!(self, balances())
    }

    fn positions(&self) -> &HashMap<String, Position> {
        delegate!(self, positions())
    }

    fn order_tracker(&self) -> &OrderTracker {
        delegate!(self, order_tracker())
    }
}

impl AnyConnector {
    /// Public and private stream sources sharing this connector's clients
    ///
    /// Nado streams read the market map loaded by `start_network`, so call
    /// this after the network is started.
    pub fn data_sources(&self) -> (Arc<dyn OrderBookDataSource>, Arc<dyn UserStreamDataSource>) {
        match self {
            AnyConnector::Nado(c) => {
                let pairs = c.trading_pairs().to_vec();
                (
                    Arc::new(NadoOrderBookDataSource::new(c.rest().clone(), c.shared_markets(), pairs.clone())),
                    Arc::new(NadoUserStreamDataSource::new(
                        c.rest().clone(),
                        c.shared_markets(),
                        pairs,
                        c.auth().sender(),
                    )),
                )
            }
            AnyConnector::Vest(c) => (
                Arc::new(VestOrderBookDataSource::new(c.rest().clone(), c.trading_pairs().to_vec())),
                Arc::new(VestUserStreamDataSource::new(c.rest().clone())),
            ),
        }
    }
}

// =============================================================================
// Factory Functions
// =============================================================================

/// Create a connector with credentials from the environment
///
/// The connector is created but NOT started; call `start_network()` after.
pub fn create_connector(config: &ConnectorConfig) -> ExchangeResult<AnyConnector> {
    let pairs = config.trading_pairs.clone();
    match config.venue {
        Venue::Nado => Ok(AnyConnector::Nado(NadoConnector::new(NadoConfig::from_env()?, pairs)?)),
        Venue::Vest => Ok(AnyConnector::Vest(VestConnector::new(VestConfig::from_env()?, pairs)?)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::nado::signing::{TEST_ADDRESS, TEST_PRIVATE_KEY};
    use crate::adapters::vest::config::TEST_SIGNING_KEY;

    #[test]
    fn test_dispatch_reaches_each_venue() {
        let nado = NadoConnector::new(
            NadoConfig::new(TEST_ADDRESS, TEST_PRIVATE_KEY, true),
            vec!["BTC-USDT0".into()],
        )
        .unwrap();
        let vest = VestConnector::new(
            VestConfig::new(Some("jwt".into()), TEST_SIGNING_KEY, 0, true),
            vec!["BTC-USDC".into()],
        )
        .unwrap();

        let nado = AnyConnector::Nado(nado);
        let vest = AnyConnector::Vest(vest);
        assert_eq!(nado.name(), "nado_perpetual_testnet");
        assert_eq!(vest.name(), "vest_perpetual_testnet");
        assert_eq!(vest.trading_pairs(), ["BTC-USDC".to_string()]);
        assert!(nado.order_tracker().is_empty());

        let (_book, _user) = vest.data_sources();
        let (_book, _user) = nado.data_sources();
    }
}
