//! Nado perpetual connector
//!
//! Orders are EIP-712 signed and posted to `/execute`; their digest is the
//! exchange order id. Account state comes from `subaccount_info`, fills and
//! historical orders from the archive indexer.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use ethers::core::types::I256;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use tokio::sync::RwLock;

use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::adapters::tracker::OrderTracker;
use crate::adapters::traits::PerpetualConnector;
use crate::adapters::types::{
    current_timestamp, Balance, ConnectorEvent, FundingPayment, InFlightOrder, OrderRequest,
    OrderState, OrderType, OrderUpdate, PlacedOrder, Position, PositionAction, PositionMode,
    PositionSide, TradeFee, TradeType, TradeUpdate, TradingRule,
};

use super::config::NadoConfig;
use super::constants::{self, QUOTE};
use super::eip712::{Cancellation, Order};
use super::rest::NadoRest;
use super::signing::NadoAuth;
use super::types::{
    FeeRates, GatewayOrder, GatewayResponse, IndexerMatches, IndexerOrders, MarketPrice,
    MaxWithdrawable, NadoFillEvent, NadoMarket, SubaccountInfo, SymbolEntry,
};
use super::utils;

/// Market info shared between the connector and its data sources
pub type SharedMarkets = Arc<RwLock<BTreeMap<u32, NadoMarket>>>;

/// Maker and taker rate for one pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairFees {
    pub maker: Decimal,
    pub taker: Decimal,
}

impl Default for PairFees {
    fn default() -> Self {
        Self {
            maker: constants::default_maker_fee(),
            taker: constants::default_taker_fee(),
        }
    }
}

pub struct NadoConnector {
    rest: NadoRest,
    auth: NadoAuth,
    trading_pairs: Vec<String>,
    markets: SharedMarkets,
    symbols: Vec<SymbolEntry>,
    trading_rules: HashMap<String, TradingRule>,
    trading_fees: HashMap<String, PairFees>,
    balances: HashMap<String, Balance>,
    positions: HashMap<String, Position>,
    order_tracker: OrderTracker,
}

impl NadoConnector {
    pub fn new(config: NadoConfig, trading_pairs: Vec<String>) -> ExchangeResult<Self> {
        let auth = NadoAuth::new(&config.address, &config.private_key)?;
        tracing::info!(
            phase = "init",
            exchange = "nado",
            testnet = config.testnet,
            sender = %auth.sender(),
            pairs = ?trading_pairs,
            "Nado connector created"
        );
        Ok(Self {
            rest: NadoRest::new(config),
            auth,
            trading_pairs,
            markets: Arc::new(RwLock::new(BTreeMap::new())),
            symbols: Vec::new(),
            trading_rules: HashMap::new(),
            trading_fees: HashMap::new(),
            balances: HashMap::new(),
            positions: HashMap::new(),
            order_tracker: OrderTracker::new(),
        })
    }

    pub fn config(&self) -> &NadoConfig {
        self.rest.config()
    }

    pub fn rest(&self) -> &NadoRest {
        &self.rest
    }

    pub fn auth(&self) -> &NadoAuth {
        &self.auth
    }

    pub fn shared_markets(&self) -> SharedMarkets {
        Arc::clone(&self.markets)
    }

    pub fn trading_fees(&self) -> &HashMap<String, PairFees> {
        &self.trading_fees
    }

    // =========================================================================
    // Market info
    // =========================================================================

    /// Fetch products and symbols and replace the cached market map
    pub async fn build_exchange_market_info(&mut self) -> ExchangeResult<()> {
        let (markets, symbols) = self.rest.load_markets().await?;
        *self.markets.write().await = markets;
        self.symbols = symbols;
        Ok(())
    }

    async fn ensure_markets(&mut self) -> ExchangeResult<()> {
        if self.markets.read().await.is_empty() {
            self.build_exchange_market_info().await?;
        }
        Ok(())
    }

    async fn product_id(&self, trading_pair: &str) -> ExchangeResult<u32> {
        let markets = self.markets.read().await;
        utils::trading_pair_to_product_id(trading_pair, &markets, false).ok_or_else(|| {
            ExchangeError::InvalidInput(format!("No Nado product for trading pair {}", trading_pair))
        })
    }

    fn trading_rule(&self, trading_pair: &str) -> ExchangeResult<&TradingRule> {
        self.trading_rules.get(trading_pair).ok_or_else(|| {
            ExchangeError::InvalidInput(format!("No trading rule for {}", trading_pair))
        })
    }

    fn parse_trading_rule(market: &NadoMarket) -> ExchangeResult<TradingRule> {
        let mut rule = TradingRule::new(&market.trading_pair());
        let min_base_increment = market.size_increment.decode()?;
        rule.min_order_size = min_base_increment;
        rule.min_base_amount_increment = min_base_increment;
        rule.min_price_increment = market.price_increment_x18.decode()?;
        rule.min_notional_size = market.min_size.decode()?;
        rule.buy_order_collateral_token = Some(QUOTE.to_string());
        rule.sell_order_collateral_token = Some(QUOTE.to_string());
        Ok(rule)
    }

    // =========================================================================
    // Account queries
    // =========================================================================

    async fn get_account(&self) -> ExchangeResult<SubaccountInfo> {
        self.rest
            .query(
                constants::SUBACCOUNT_INFO_REQUEST_TYPE,
                &[("subaccount", self.auth.sender().to_string())],
            )
            .await
            .map_err(|e| match e {
                ExchangeError::Io(_) => e,
                other => ExchangeError::Io(format!(
                    "Unable to get account info for sender address {}: {}",
                    self.auth.sender(),
                    other
                )),
            })
    }

    /// Withdrawable quote balance keyed by product id; empty on any failure
    async fn get_account_max_withdrawable(&self) -> HashMap<u32, Decimal> {
        let params = [
            ("product_id", "0".to_string()),
            ("sender", self.auth.sender().to_string()),
            ("spot_leverage", "false".to_string()),
        ];
        let mut available = HashMap::new();
        match self
            .rest
            .query::<MaxWithdrawable>(constants::MAX_WITHDRAWABLE_REQUEST_TYPE, &params)
            .await
            .and_then(|data| data.max_withdrawable.decode())
        {
            Ok(amount) => {
                available.insert(0, amount);
            }
            Err(e) => tracing::debug!(exchange = "nado", error = %e, "max_withdrawable unavailable"),
        }
        available
    }

    async fn get_fee_rates(&self) -> ExchangeResult<FeeRates> {
        self.rest
            .query(
                constants::FEE_RATES_REQUEST_TYPE,
                &[("sender", self.auth.sender().to_string())],
            )
            .await
    }

    fn fee_rate(&self, trading_pair: &str, is_taker: bool) -> Decimal {
        let fees = self.trading_fees.get(trading_pair).copied().unwrap_or_default();
        if is_taker {
            fees.taker
        } else {
            fees.maker
        }
    }

    // =========================================================================
    // User stream
    // =========================================================================

    fn process_fill_event(&mut self, event: &Value) -> ExchangeResult<Vec<ConnectorEvent>> {
        let fill: NadoFillEvent = serde_json::from_value(event.clone())
            .map_err(|e| ExchangeError::InvalidResponse(format!("Bad fill event: {} - {}", e, event)))?;

        let Some(tracked) = self.order_tracker.find_by_exchange_id(&fill.order_digest).cloned() else {
            tracing::debug!(exchange = "nado", digest = %fill.order_digest, "Fill for untracked order");
            return Ok(Vec::new());
        };

        let remaining = fill.remaining_qty.decode()?;
        let new_state = if remaining > Decimal::ZERO {
            OrderState::PartiallyFilled
        } else {
            OrderState::Filled
        };

        let amount = fill.filled_qty.decode()?.abs();
        let price = fill.price.decode()?;
        let timestamp = utils::convert_timestamp(&Value::String(fill.timestamp.0.clone()))?;
        let fee = TradeFee::from_percent(
            self.fee_rate(&tracked.trading_pair, fill.is_taker),
            Some(QUOTE.to_string()),
        );

        let trade = TradeUpdate {
            trade_id: fill.timestamp.0.clone(),
            client_order_id: tracked.client_order_id.clone(),
            exchange_order_id: fill.order_digest.clone(),
            trading_pair: tracked.trading_pair.clone(),
            fill_timestamp: timestamp,
            fill_price: price,
            fill_base_amount: amount,
            fill_quote_amount: amount * price,
            fee,
        };
        let update = OrderUpdate {
            client_order_id: tracked.client_order_id.clone(),
            exchange_order_id: Some(fill.order_digest.clone()),
            trading_pair: tracked.trading_pair.clone(),
            update_timestamp: timestamp,
            new_state,
        };

        self.order_tracker.process_trade_update(&trade);
        self.order_tracker.process_order_update(&update);
        Ok(vec![ConnectorEvent::Trade(trade), ConnectorEvent::Order(update)])
    }

    /// Sign and post a place_order execute, returning the order digest
    async fn submit_order(&self, request: &OrderRequest) -> ExchangeResult<String> {
        let rule = self.trading_rule(&request.trading_pair)?.clone();
        let product_id = self.product_id(&request.trading_pair).await?;

        let signed_amount = match request.trade_type {
            TradeType::Buy => request.amount,
            TradeType::Sell => -request.amount,
        };
        let amount_x18 = utils::to_x18_integer(signed_amount, Some(rule.min_base_amount_increment));
        let price_x18 = utils::to_x18_integer(request.price, Some(rule.min_price_increment));

        let time_in_force = if request.order_type == OrderType::LimitMaker {
            constants::TIME_IN_FORCE_POSTONLY
        } else {
            constants::TIME_IN_FORCE_GTC
        };
        let now = current_timestamp();
        let expiration = utils::generate_expiration(now, utils::DEFAULT_EXPIRY_SECONDS);
        let appendix = utils::build_order_appendix(
            time_in_force,
            1,
            request.position_action == PositionAction::Close,
        );
        let nonce = utils::generate_nonce(now, utils::DEFAULT_NONCE_EXPIRY_MS);
        let contract = utils::generate_order_verifying_contract(product_id);

        let order = Order {
            sender: self.auth.sender_bytes()?,
            price_x18: x18_integer(price_x18)?,
            amount: x18_integer(amount_x18)?,
            expiration: expiration
                .parse()
                .map_err(|e| ExchangeError::InvalidInput(format!("bad expiration: {}", e)))?,
            nonce,
            appendix,
        };
        let (signature, digest) = self.auth.sign_payload(&order, &contract, self.config().chain_id())?;

        let body = json!({
            "place_order": {
                "product_id": product_id,
                "order": {
                    "sender": self.auth.sender(),
                    "priceX18": price_x18.to_string(),
                    "amount": amount_x18.to_string(),
                    "expiration": expiration,
                    "nonce": nonce.to_string(),
                    "appendix": appendix.to_string(),
                },
                "signature": signature,
            }
        });

        let response = self.rest.execute(constants::PLACE_ORDER_METHOD, &body).await?;
        if response.get("status").and_then(Value::as_str) == Some("failure") {
            return Err(ExchangeError::OrderRejected(format!(
                "Failed to create order {}",
                response
            )));
        }
        Ok(digest)
    }

    async fn last_price_from_matches(&self, product_id: u32) -> ExchangeResult<Option<Decimal>> {
        let matches: IndexerMatches = self
            .rest
            .indexer(&json!({"matches": {"product_ids": [product_id], "limit": 5}}))
            .await?;
        match matches.matches.as_deref().and_then(|m| m.first()) {
            Some(latest) => Ok(Some(latest.order.price_x18.decode()?)),
            None => Ok(None),
        }
    }

    async fn mid_price(&self, trading_pair: &str, product_id: u32) -> ExchangeResult<Decimal> {
        let price: MarketPrice = self
            .rest
            .query(
                constants::MARKET_PRICE_REQUEST_TYPE,
                &[("product_id", product_id.to_string())],
            )
            .await?;
        let mid = (price.bid_x18.decode()? + price.ask_x18.decode()?) / Decimal::TWO;
        Ok(match self.trading_rules.get(trading_pair) {
            Some(rule) => utils::quantize(mid, rule.min_price_increment),
            None => mid,
        })
    }
}

fn x18_integer(value: I256) -> ExchangeResult<i128> {
    i128::try_from(value).map_err(|_| ExchangeError::InvalidInput(format!("{} does not fit in int128", value)))
}

#[async_trait]
impl PerpetualConnector for NadoConnector {
    fn name(&self) -> &'static str {
        self.config().connector_name()
    }

    fn trading_pairs(&self) -> &[String] {
        &self.trading_pairs
    }

    fn supported_order_types(&self) -> Vec<OrderType> {
        vec![OrderType::Market, OrderType::Limit, OrderType::LimitMaker]
    }

    fn supported_position_modes(&self) -> Vec<PositionMode> {
        vec![PositionMode::OneWay]
    }

    async fn start_network(&mut self) -> ExchangeResult<()> {
        self.build_exchange_market_info().await?;
        self.update_trading_rules().await?;
        self.update_trading_fees().await?;
        tracing::info!(
            exchange = "nado",
            rules = self.trading_rules.len(),
            "Nado network started"
        );
        Ok(())
    }

    async fn place_order(&mut self, request: OrderRequest) -> ExchangeResult<PlacedOrder> {
        self.order_tracker
            .start_tracking(InFlightOrder::from_request(&request, current_timestamp()));

        let result = self.submit_order(&request).await;

        let now = current_timestamp();
        match result {
            Ok(digest) => {
                self.order_tracker.process_order_update(&OrderUpdate {
                    client_order_id: request.client_order_id.clone(),
                    exchange_order_id: Some(digest.clone()),
                    trading_pair: request.trading_pair.clone(),
                    update_timestamp: now,
                    new_state: OrderState::Open,
                });
                tracing::info!(
                    exchange = "nado",
                    order_id = %request.client_order_id,
                    digest = %digest,
                    trading_pair = %request.trading_pair,
                    "Order placed"
                );
                if let Err(e) = self.update_balances().await {
                    tracing::warn!(exchange = "nado", error = %e, "Balance refresh after order failed");
                }
                Ok(PlacedOrder {
                    exchange_order_id: digest,
                    timestamp: now,
                })
            }
            Err(e) => {
                tracing::error!(exchange = "nado", order_id = %request.client_order_id, error = %e, "Order failed");
                self.order_tracker.process_order_update(&OrderUpdate {
                    client_order_id: request.client_order_id.clone(),
                    exchange_order_id: None,
                    trading_pair: request.trading_pair.clone(),
                    update_timestamp: now,
                    new_state: OrderState::Failed,
                });
                Err(e)
            }
        }
    }

    async fn cancel_order(&mut self, client_order_id: &str) -> ExchangeResult<bool> {
        let tracked = self
            .order_tracker
            .get(client_order_id)
            .cloned()
            .ok_or_else(|| ExchangeError::InvalidInput(format!("Unknown order {}", client_order_id)))?;

        let product_id = self.product_id(&tracked.trading_pair).await?;
        let order_id = tracked
            .exchange_order_id
            .clone()
            .unwrap_or_else(|| tracked.client_order_id.clone());
        let nonce = utils::generate_nonce(current_timestamp(), utils::DEFAULT_NONCE_EXPIRY_MS);

        let cancel = Cancellation {
            sender: self.auth.sender_bytes()?,
            product_ids: vec![product_id],
            digests: vec![utils::hex_to_bytes32(&order_id)?],
            nonce,
        };
        let (signature, _) = self.auth.sign_payload(
            &cancel,
            self.config().endpoint_contract(),
            self.config().chain_id(),
        )?;

        let body = json!({
            "cancel_orders": {
                "tx": {
                    "sender": self.auth.sender(),
                    "productIds": [product_id],
                    "digests": [order_id],
                    "nonce": nonce.to_string(),
                },
                "signature": signature,
            }
        });

        let response = self.rest.execute(constants::CANCEL_ORDERS_METHOD, &body).await?;
        if let Err(e) = self.update_balances().await {
            tracing::warn!(exchange = "nado", error = %e, "Balance refresh after cancel failed");
        }

        let status = response.get("status").and_then(Value::as_str);
        let canceled = match status {
            Some("success") => true,
            Some("failure")
                if response.get("error_code").and_then(Value::as_i64)
                    == Some(constants::ORDER_NOT_FOUND_ERROR_CODE) =>
            {
                tracing::warn!(
                    exchange = "nado",
                    order_id = %order_id,
                    "Marked order canceled as the exchange holds no record"
                );
                true
            }
            _ => false,
        };

        if canceled {
            self.order_tracker.process_order_update(&OrderUpdate {
                client_order_id: tracked.client_order_id.clone(),
                exchange_order_id: tracked.exchange_order_id.clone(),
                trading_pair: tracked.trading_pair.clone(),
                update_timestamp: current_timestamp(),
                new_state: OrderState::Canceled,
            });
        } else {
            tracing::warn!(exchange = "nado", order_id = %order_id, response = %response, "Cancel refused");
        }
        Ok(canceled)
    }

    async fn update_trading_rules(&mut self) -> ExchangeResult<()> {
        self.ensure_markets().await?;
        let markets = self.markets.read().await;
        let mut rules = HashMap::new();
        for (product_id, market) in markets.iter() {
            if *product_id == 0 {
                continue;
            }
            match Self::parse_trading_rule(market) {
                Ok(rule) => {
                    rules.insert(rule.trading_pair.clone(), rule);
                }
                Err(e) => tracing::error!(
                    exchange = "nado",
                    symbol = %market.symbol,
                    error = %e,
                    "Error parsing the trading pair rule. Skipping."
                ),
            }
        }
        drop(markets);
        self.trading_rules = rules;
        Ok(())
    }

    async fn update_trading_fees(&mut self) -> ExchangeResult<()> {
        let rates = match self.get_fee_rates().await {
            Ok(rates) => Some(rates),
            Err(e) => {
                tracing::warn!(exchange = "nado", error = %e, "Fee rates unavailable, using defaults");
                None
            }
        };

        for pair in self.trading_pairs.clone() {
            let fees = match (&rates, self.product_id(&pair).await) {
                (Some(rates), Ok(pid)) => {
                    let idx = pid as usize;
                    match (rates.maker_fee_rates_x18.get(idx), rates.taker_fee_rates_x18.get(idx)) {
                        (Some(maker), Some(taker)) => match (maker.decode(), taker.decode()) {
                            (Ok(maker), Ok(taker)) => PairFees { maker, taker },
                            _ => PairFees::default(),
                        },
                        _ => PairFees::default(),
                    }
                }
                _ => PairFees::default(),
            };
            self.trading_fees.insert(pair, fees);
        }
        Ok(())
    }

    async fn update_balances(&mut self) -> ExchangeResult<()> {
        self.ensure_markets().await?;
        let account = self.get_account().await?;
        let available = self.get_account_max_withdrawable().await;
        if self.symbols.is_empty() {
            self.symbols = self.rest.symbols().await?;
        }
        let mut symbol_map: HashMap<u32, String> =
            self.symbols.iter().map(|s| (s.product_id, s.symbol.clone())).collect();
        symbol_map.entry(0).or_insert_with(|| QUOTE.to_string());

        let mut balances = HashMap::new();
        for spot in &account.spot_balances {
            let Some(asset) = symbol_map.get(&spot.product_id) else {
                continue;
            };
            match spot.balance.amount.decode() {
                Ok(total) => {
                    let free = available.get(&spot.product_id).copied().unwrap_or(total);
                    balances.insert(asset.clone(), Balance { total, available: free });
                }
                Err(e) => tracing::warn!(exchange = "nado", product_id = spot.product_id, error = %e, "Balance error"),
            }
        }
        self.balances = balances;
        Ok(())
    }

    async fn update_positions(&mut self) -> ExchangeResult<()> {
        self.ensure_markets().await?;
        let account = self.get_account().await?;
        let markets = self.markets.read().await;
        let products: HashMap<u32, _> = account.perp_products.iter().map(|p| (p.product_id, p)).collect();

        let mut positions = HashMap::new();
        for perp in &account.perp_balances {
            let Some(market) = markets.get(&perp.product_id) else {
                continue;
            };
            let parsed = (|| -> ExchangeResult<Option<Position>> {
                let amount = perp.balance.amount.decode()?;
                if amount.is_zero() {
                    return Ok(None);
                }
                let v_quote = match &perp.balance.v_quote_balance {
                    Some(v) => v.decode()?,
                    None => Decimal::ZERO,
                };
                let mark = match products.get(&perp.product_id) {
                    Some(product) => product.mark_price()?,
                    None => Decimal::ZERO,
                };
                Ok(Some(Position {
                    trading_pair: market.trading_pair(),
                    position_side: if amount > Decimal::ZERO {
                        PositionSide::Long
                    } else {
                        PositionSide::Short
                    },
                    unrealized_pnl: amount * mark + v_quote,
                    entry_price: (v_quote / amount).abs(),
                    amount,
                    leverage: Decimal::ONE,
                }))
            })();
            match parsed {
                Ok(Some(position)) => {
                    positions.insert(position.trading_pair.clone(), position);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(
                    exchange = "nado",
                    product_id = perp.product_id,
                    error = %e,
                    "Failed to update perp position"
                ),
            }
        }
        drop(markets);
        self.positions = positions;
        Ok(())
    }

    async fn request_order_status(&self, order: &InFlightOrder) -> ExchangeResult<OrderUpdate> {
        let digest = order.exchange_order_id.clone().unwrap_or_default();
        let product_id = self.product_id(&order.trading_pair).await?;

        let live = match self
            .rest
            .query_raw::<GatewayResponse<GatewayOrder>>(
                constants::ORDER_REQUEST_TYPE,
                &[("product_id", product_id.to_string()), ("digest", digest.clone())],
            )
            .await
        {
            Ok(resp) if resp.is_success() => resp.data,
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(exchange = "nado", error = %e, "Error requesting order from Nado sequencer");
                None
            }
        };

        // (amount, unfilled) in base units, plus whether the sequencer still holds the order
        let (amounts, is_live) = match live {
            Some(data) => (Some((data.amount.decode()?, data.unfilled_amount.decode()?)), true),
            None => {
                let body = json!({
                    "orders": {"digests": [digest], "subaccounts": [self.auth.sender()]}
                });
                let indexed = match self.rest.indexer::<IndexerOrders>(&body).await {
                    Ok(indexed) => indexed.orders.into_iter().next(),
                    Err(e) => {
                        tracing::warn!(exchange = "nado", error = %e, "Error requesting order from Nado indexer");
                        None
                    }
                };
                let amounts = match indexed {
                    Some(o) => {
                        let amount = o.amount.decode()?;
                        Some((amount, amount - o.base_filled.decode()?))
                    }
                    None => None,
                };
                (amounts, false)
            }
        };

        let new_state = match amounts {
            None => OrderState::Canceled,
            Some((amount, unfilled)) => {
                let filled = (amount - unfilled).abs();
                if unfilled.is_zero() {
                    if is_live {
                        OrderState::Filled
                    } else {
                        OrderState::Completed
                    }
                } else if !is_live {
                    OrderState::Canceled
                } else if filled.is_zero() {
                    OrderState::Open
                } else {
                    OrderState::PartiallyFilled
                }
            }
        };

        Ok(OrderUpdate {
            client_order_id: order.client_order_id.clone(),
            exchange_order_id: order.exchange_order_id.clone(),
            trading_pair: order.trading_pair.clone(),
            update_timestamp: current_timestamp(),
            new_state,
        })
    }

    async fn all_trade_updates_for_order(&self, order: &InFlightOrder) -> ExchangeResult<Vec<TradeUpdate>> {
        let Some(exchange_order_id) = order.exchange_order_id.as_deref() else {
            return Ok(Vec::new());
        };
        let product_id = self.product_id(&order.trading_pair).await?;

        let response: IndexerMatches = self
            .rest
            .indexer(&json!({
                "matches": {"product_ids": [product_id], "subaccounts": [self.auth.sender()]}
            }))
            .await?;

        let mut updates = Vec::new();
        for fill in response.matches.unwrap_or_default() {
            if fill.digest != exchange_order_id {
                continue;
            }
            let price = fill.order.price_x18.decode()?;
            let base = fill.base_filled.decode()?.abs();
            let timestamp = response
                .txs
                .iter()
                .find(|tx| tx.submission_idx == fill.submission_idx)
                .map(|tx| tx.timestamp as f64)
                .unwrap_or_else(current_timestamp);

            updates.push(TradeUpdate {
                trade_id: fill.submission_idx.to_string(),
                client_order_id: order.client_order_id.clone(),
                exchange_order_id: fill.digest.clone(),
                trading_pair: order.trading_pair.clone(),
                fill_timestamp: timestamp,
                fill_price: price,
                fill_base_amount: base,
                fill_quote_amount: price * base,
                fee: TradeFee::flat(QUOTE, fill.fee.decode()?),
            });
        }
        Ok(updates)
    }

    async fn process_user_event(&mut self, event: &Value) -> ExchangeResult<Vec<ConnectorEvent>> {
        match event.get("type").and_then(Value::as_str) {
            Some(constants::FILL_EVENT_TYPE) => self.process_fill_event(event),
            Some(constants::POSITION_CHANGE_EVENT_TYPE) => {
                self.update_balances().await?;
                self.update_positions().await?;
                Ok(vec![ConnectorEvent::AccountRefreshed])
            }
            _ => Ok(Vec::new()),
        }
    }

    fn get_fee(
        &self,
        trading_pair: &str,
        _order_type: OrderType,
        _trade_type: TradeType,
        _amount: Decimal,
        _price: Decimal,
        is_maker: Option<bool>,
    ) -> TradeFee {
        let is_taker = !is_maker.unwrap_or(false);
        TradeFee::from_percent(self.fee_rate(trading_pair, is_taker), Some(QUOTE.to_string()))
    }

    async fn get_last_traded_prices(&self, trading_pairs: &[String]) -> ExchangeResult<HashMap<String, Decimal>> {
        let mut prices = HashMap::new();
        for pair in trading_pairs {
            let product_id = self.product_id(pair).await?;
            let price = match self.last_price_from_matches(product_id).await {
                Ok(Some(price)) => price,
                Ok(None) => self.mid_price(pair, product_id).await?,
                Err(e) => {
                    tracing::warn!(
                        exchange = "nado",
                        trading_pair = %pair,
                        error = %e,
                        "Failed to get last traded price, using mid price instead"
                    );
                    self.mid_price(pair, product_id).await?
                }
            };
            prices.insert(pair.clone(), price);
        }
        Ok(prices)
    }

    async fn set_position_mode(&mut self, mode: PositionMode) -> ExchangeResult<()> {
        match mode {
            PositionMode::OneWay => Ok(()),
            PositionMode::Hedge => Err(ExchangeError::Unsupported(
                "Nado perpetual supports only the ONEWAY position mode.".into(),
            )),
        }
    }

    async fn set_leverage(&mut self, _trading_pair: &str, _leverage: u32) -> ExchangeResult<()> {
        Err(ExchangeError::Unsupported(
            "Nado does not expose leverage controls via API.".into(),
        ))
    }

    async fn fetch_last_fee_payment(&self, _trading_pair: &str) -> ExchangeResult<FundingPayment> {
        Ok(FundingPayment::unavailable())
    }

    fn trading_rules(&self) -> &HashMap<String, TradingRule> {
        &self.trading_rules
    }

    fn balances(&self) -> &HashMap<String, Balance> {
        &self.balances
    }

    fn positions(&self) -> &HashMap<String, Position> {
        &self.positions
    }

    fn order_tracker(&self) -> &OrderTracker {
        &self.order_tracker
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::nado::signing::{TEST_ADDRESS, TEST_PRIVATE_KEY};
    use crate::adapters::nado::types::X18;

    fn connector() -> NadoConnector {
        let config = NadoConfig::new(TEST_ADDRESS, TEST_PRIVATE_KEY, true);
        NadoConnector::new(config, vec!["BTC-USDT0".into()]).unwrap()
    }

    #[test]
    fn test_connector_basics() {
        let c = connector();
        assert_eq!(c.name(), "nado_perpetual_testnet");
        assert_eq!(c.supported_position_modes(), vec![PositionMode::OneWay]);
        assert_eq!(c.supported_order_types().len(), 3);
    }

    #[test]
    fn test_parse_trading_rule() {
        let mut market = NadoMarket::new(2, "BTC-PERP");
        market.size_increment = X18::new("1000000000000000");
        market.price_increment_x18 = X18::new("1000000000000000000");
        market.min_size = X18::new("10000000000000000");
        let rule = NadoConnector::parse_trading_rule(&market).unwrap();
        assert_eq!(rule.trading_pair, "BTC-USDT0");
        assert_eq!(rule.min_order_size.to_string(), "0.001");
        assert_eq!(rule.min_base_amount_increment.to_string(), "0.001");
        assert_eq!(rule.min_price_increment.to_string(), "1");
        assert_eq!(rule.min_notional_size.to_string(), "0.01");
        assert_eq!(rule.buy_order_collateral_token.as_deref(), Some("USDT0"));
    }

    #[test]
    fn test_fee_defaults() {
        let c = connector();
        let fee = c.get_fee("BTC-USDT0", OrderType::Limit, TradeType::Buy, Decimal::ONE, Decimal::ONE, Some(true));
        assert_eq!(fee.percent, Decimal::ZERO);
        let fee = c.get_fee("BTC-USDT0", OrderType::Market, TradeType::Buy, Decimal::ONE, Decimal::ONE, None);
        assert_eq!(fee.percent.to_string(), "0.0002");
        assert_eq!(fee.percent_token.as_deref(), Some("USDT0"));
    }

    #[tokio::test]
    async fn test_modes_and_funding() {
        let mut c = connector();
        assert!(c.set_position_mode(PositionMode::OneWay).await.is_ok());
        assert!(matches!(
            c.set_position_mode(PositionMode::Hedge).await,
            Err(ExchangeError::Unsupported(_))
        ));
        assert!(matches!(c.set_leverage("BTC-USDT0", 5).await, Err(ExchangeError::Unsupported(_))));
        let payment = c.fetch_last_fee_payment("BTC-USDT0").await.unwrap();
        assert_eq!(payment, FundingPayment::unavailable());
    }

    #[test]
    fn test_x18_integer_bounds() {
        assert_eq!(x18_integer(I256::from(-5)).unwrap(), -5);
        assert_eq!(
            x18_integer(I256::from_dec_str("26383000000000000000000").unwrap()).unwrap(),
            26_383_000_000_000_000_000_000
        );
        let too_big = I256::from(i128::MAX) + I256::from(1);
        assert!(matches!(x18_integer(too_big), Err(ExchangeError::InvalidInput(_))));
    }
}
