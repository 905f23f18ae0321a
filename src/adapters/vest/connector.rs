//! Vest perpetual connector
//!
//! Orders and cancels are signed POSTs; the `id` of the order response is
//! the exchange order id. Balances and positions come from `/account`.
//! Fills only arrive over the `account_private` stream.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::adapters::tracker::OrderTracker;
use crate::adapters::traits::PerpetualConnector;
use crate::adapters::types::{
    current_time_ms, current_timestamp, split_trading_pair, Balance, ConnectorEvent, FundingPayment,
    InFlightOrder, OrderRequest, OrderState, OrderType, OrderUpdate, PlacedOrder, Position, PositionAction,
    PositionMode, PositionSide, TradeFee, TradeFeeSchema, TradeType, TradeUpdate, TradingRule,
};

use super::config::VestConfig;
use super::constants;
use super::rest::VestRest;
use super::types::{api_error, decimal_field, ms_field, parse_tickers, str_field, VestTicker};
use super::utils;

pub struct VestConnector {
    rest: VestRest,
    trading_pairs: Vec<String>,
    /// trading pair -> venue symbol
    symbol_map: HashMap<String, String>,
    price_precision: HashMap<String, u32>,
    trading_rules: HashMap<String, TradingRule>,
    trading_fees: HashMap<String, TradeFeeSchema>,
    balances: HashMap<String, Balance>,
    positions: HashMap<String, Position>,
    order_tracker: OrderTracker,
}

impl VestConnector {
    pub fn new(config: VestConfig, trading_pairs: Vec<String>) -> ExchangeResult<Self> {
        tracing::info!(
            phase = "init",
            exchange = "vest",
            testnet = config.testnet,
            account_group = config.account_group,
            pairs = ?trading_pairs,
            "Vest connector created"
        );
        let symbol_map = trading_pairs
            .iter()
            .map(|pair| (pair.clone(), utils::convert_to_exchange_trading_pair(pair)))
            .collect();
        Ok(Self {
            rest: VestRest::new(config)?,
            trading_pairs,
            symbol_map,
            price_precision: HashMap::new(),
            trading_rules: HashMap::new(),
            trading_fees: HashMap::new(),
            balances: HashMap::new(),
            positions: HashMap::new(),
            order_tracker: OrderTracker::new(),
        })
    }

    pub fn config(&self) -> &VestConfig {
        self.rest.config()
    }

    pub fn rest(&self) -> &VestRest {
        &self.rest
    }

    pub fn exchange_symbol(&self, trading_pair: &str) -> String {
        self.symbol_map
            .get(trading_pair)
            .cloned()
            .unwrap_or_else(|| utils::convert_to_exchange_trading_pair(trading_pair))
    }

    // =========================================================================
    // Trading rules
    // =========================================================================

    /// One `/exchangeInfo` symbol; `Ok(None)` when it is not trading
    pub fn parse_trading_rule(info: &Value) -> ExchangeResult<Option<(String, TradingRule, u32)>> {
        let symbol = info
            .get("symbol")
            .and_then(Value::as_str)
            .ok_or_else(|| ExchangeError::InvalidResponse(format!("Symbol entry without name: {}", info)))?;
        let status = info
            .get("status")
            .and_then(Value::as_str)
            .unwrap_or(constants::SYMBOL_STATUS_TRADING);
        if !status.eq_ignore_ascii_case(constants::SYMBOL_STATUS_TRADING) {
            return Ok(None);
        }

        let trading_pair = utils::convert_from_exchange_trading_pair(symbol);
        let min_qty = decimal_field(info, &["minQty", "minOrderSize", "LOT_SIZE.minQty"]).unwrap_or(Decimal::new(1, 4));
        let max_qty = decimal_field(info, &["maxQty", "LOT_SIZE.maxQty"]).unwrap_or(Decimal::new(1_000_000, 0));
        let step = decimal_field(info, &["stepSize"])
            .or_else(|| step_from_places(info, &["quantityPrecision", "sizeDecimals"]))
            .or_else(|| decimal_field(info, &["LOT_SIZE.stepSize"]))
            .unwrap_or(min_qty);
        let tick = decimal_field(info, &["tickSize", "priceTickSize", "PRICE_FILTER.tickSize"])
            .unwrap_or(Decimal::new(1, 4));
        let min_notional = decimal_field(info, &["minNotional", "NOTIONAL.minNotional"]).unwrap_or(Decimal::ZERO);
        let price_precision = info
            .get("pricePrecision")
            .and_then(Value::as_u64)
            .map(|p| p.min(28) as u32)
            .unwrap_or(18);

        let order_types: Vec<&str> = info
            .get("orderTypes")
            .and_then(Value::as_array)
            .map(|list| list.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        let supports = |kind: &str| order_types.is_empty() || order_types.contains(&kind);

        let collateral = str_field(info, &["quoteAsset"])
            .map(String::from)
            .unwrap_or_else(|| split_trading_pair(&trading_pair).1.to_string());

        let mut rule = TradingRule::new(&trading_pair);
        rule.min_order_size = min_qty;
        rule.max_order_size = max_qty;
        rule.min_price_increment = tick;
        rule.min_base_amount_increment = step;
        rule.min_quote_amount_increment = if step > Decimal::ZERO { tick * step } else { tick };
        rule.min_notional_size = min_notional;
        rule.supports_limit_orders = supports(constants::ORDER_TYPE_LIMIT);
        rule.supports_market_orders = supports(constants::ORDER_TYPE_MARKET);
        rule.buy_order_collateral_token = Some(collateral.clone());
        rule.sell_order_collateral_token = Some(collateral);

        Ok(Some((trading_pair, rule, price_precision)))
    }

    fn fee_schema(&self, trading_pair: &str) -> TradeFeeSchema {
        self.trading_fees
            .get(trading_pair)
            .cloned()
            .unwrap_or_else(utils::default_fees)
    }

    // =========================================================================
    // Account
    // =========================================================================

    async fn get_account(&self) -> ExchangeResult<Value> {
        self.rest
            .get_private(constants::ACCOUNT_PATH_URL, &[("time", current_time_ms().to_string())])
            .await
    }

    /// `balances[]` when present, otherwise the root collateral fields
    pub fn parse_balances(account: &Value) -> HashMap<String, Balance> {
        let mut balances = HashMap::new();

        if let Some(list) = account.get("balances").and_then(Value::as_array).filter(|l| !l.is_empty()) {
            for entry in list {
                let Some(asset) = entry.get("asset").and_then(Value::as_str) else {
                    continue;
                };
                let total = decimal_field(entry, &["total"]).unwrap_or(Decimal::ZERO);
                let locked = decimal_field(entry, &["locked"]).unwrap_or(Decimal::ZERO);
                balances.insert(
                    asset.to_string(),
                    Balance {
                        total,
                        available: total - locked,
                    },
                );
            }
            return balances;
        }

        let available = decimal_field(account, &["withdrawable", "collateral"]);
        let total = decimal_field(account, &["total", "balance"]);
        if let Some(available) = available.or(total) {
            let asset = str_field(account, &["asset"]).unwrap_or(constants::DEFAULT_COLLATERAL);
            balances.insert(
                asset.to_string(),
                Balance {
                    total: total.unwrap_or(available),
                    available,
                },
            );
        }
        balances
    }

    /// Non-zero positions for tracked pairs; shorts carry a negative amount
    pub fn parse_positions(account: &Value, trading_pairs: &[String]) -> HashMap<String, Position> {
        let mut positions = HashMap::new();
        let Some(list) = account.get("positions").and_then(Value::as_array) else {
            return positions;
        };

        for entry in list {
            let Some(symbol) = entry.get("symbol").and_then(Value::as_str) else {
                continue;
            };
            let trading_pair = utils::convert_from_exchange_trading_pair(symbol);
            if !trading_pairs.is_empty() && !trading_pairs.contains(&trading_pair) {
                continue;
            }
            let size = decimal_field(entry, &["size"]).unwrap_or(Decimal::ZERO);
            if size.is_zero() {
                continue;
            }
            let is_long = entry.get("isLong").and_then(Value::as_bool).unwrap_or(true);
            let (position_side, amount) = if is_long {
                (PositionSide::Long, size.abs())
            } else {
                (PositionSide::Short, -size.abs())
            };

            positions.insert(
                trading_pair.clone(),
                Position {
                    trading_pair,
                    position_side,
                    unrealized_pnl: decimal_field(entry, &["unrealizedPnl"]).unwrap_or(Decimal::ZERO),
                    entry_price: decimal_field(entry, &["entryPrice"]).unwrap_or(Decimal::ZERO),
                    amount,
                    leverage: Self::leverage_for(account, symbol),
                },
            );
        }
        positions
    }

    /// `leverages` as a list of `{symbol, value}` or a map keyed by symbol
    fn leverage_for(account: &Value, symbol: &str) -> Decimal {
        let entry = match account.get("leverages") {
            Some(Value::Array(list)) => list
                .iter()
                .find(|l| l.get("symbol").and_then(Value::as_str) == Some(symbol)),
            Some(Value::Object(map)) => map.get(symbol),
            _ => None,
        };
        entry
            .and_then(|e| decimal_field(e, &["value"]))
            .unwrap_or(Decimal::ONE)
    }

    // =========================================================================
    // Orders
    // =========================================================================

    async fn reference_price(&self, symbol: &str) -> ExchangeResult<Decimal> {
        let raw: Value = self
            .rest
            .get(constants::TICKER_LATEST_PATH_URL, &[("symbols", symbol.to_string())])
            .await?;
        parse_tickers(&raw)
            .iter()
            .find(|t| t.symbol == symbol)
            .and_then(VestTicker::reference_price)
            .ok_or_else(|| ExchangeError::InvalidResponse(format!("No price for {}", symbol)))
    }

    /// Size floored to the step; rejected when nothing tradable is left
    fn format_size(&self, request: &OrderRequest) -> ExchangeResult<String> {
        let rule = self.trading_rules.get(&request.trading_pair);
        let step = rule.map(|r| r.min_base_amount_increment).unwrap_or(Decimal::ZERO);
        let min_size = rule.map(|r| r.min_order_size).unwrap_or(Decimal::ZERO);

        let size = quantize(request.amount, step);
        if size <= Decimal::ZERO || size < min_size {
            return Err(ExchangeError::InvalidInput(format!(
                "Order size {} for {} is {} at step {}, below the minimum {}",
                request.amount, request.trading_pair, size, step, min_size
            )));
        }
        Ok(size.normalize().to_string())
    }

    fn format_price(&self, trading_pair: &str, price: Decimal) -> String {
        let tick = self
            .trading_rules
            .get(trading_pair)
            .map(|r| r.min_price_increment)
            .unwrap_or(Decimal::ZERO);
        let precision = self.price_precision.get(trading_pair).copied().unwrap_or(18);
        quantize(price, tick).round_dp(precision).normalize().to_string()
    }

    /// Limit price for the order; market orders get the slippage-adjusted reference
    async fn limit_price(&self, request: &OrderRequest, symbol: &str) -> ExchangeResult<Decimal> {
        if request.order_type != OrderType::Market {
            return Ok(request.price);
        }
        let base = if request.price > Decimal::ZERO {
            request.price
        } else {
            self.reference_price(symbol).await?
        };
        let slippage = constants::market_order_slippage();
        Ok(match request.trade_type {
            TradeType::Buy => base * (Decimal::ONE + slippage),
            TradeType::Sell => base * (Decimal::ONE - slippage),
        })
    }

    pub fn order_body(
        &self,
        request: &OrderRequest,
        symbol: &str,
        limit_price: Decimal,
        time: u64,
    ) -> ExchangeResult<Value> {
        let order_type = match request.order_type {
            OrderType::Market => constants::ORDER_TYPE_MARKET,
            OrderType::Limit | OrderType::LimitMaker => constants::ORDER_TYPE_LIMIT,
        };
        Ok(json!({
            "order": {
                "time": time,
                "nonce": time,
                "symbol": symbol,
                "isBuy": request.trade_type == TradeType::Buy,
                "size": self.format_size(request)?,
                "orderType": order_type,
                "limitPrice": self.format_price(&request.trading_pair, limit_price),
                "reduceOnly": request.position_action == PositionAction::Close,
            },
            "recvWindow": constants::RECV_WINDOW_MS
        }))
    }

    async fn submit_order(&self, request: &OrderRequest) -> ExchangeResult<String> {
        let symbol = self.exchange_symbol(&request.trading_pair);
        let limit_price = self.limit_price(request, &symbol).await?;
        let body = self.order_body(request, &symbol, limit_price, current_time_ms())?;

        let response = self.rest.post(constants::ORDERS_PATH_URL, body).await?;
        if let Some(err) = api_error(&response) {
            return Err(ExchangeError::OrderRejected(err));
        }
        match response.get("id") {
            Some(Value::String(id)) => Ok(id.clone()),
            Some(Value::Number(id)) => Ok(id.to_string()),
            _ => Err(ExchangeError::InvalidResponse(format!("Order response without id: {}", response))),
        }
    }

    /// `account_private` ORDER event: state update plus a fill when one happened
    fn process_order_event(&mut self, args: &Value) -> ExchangeResult<Vec<ConnectorEvent>> {
        let exchange_order_id = match args.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => return Err(ExchangeError::InvalidResponse(format!("ORDER event without id: {}", args))),
        };
        let Some(tracked) = self.order_tracker.find_by_exchange_id(&exchange_order_id).cloned() else {
            tracing::debug!(exchange = "vest", order_id = %exchange_order_id, "Event for untracked order");
            return Ok(Vec::new());
        };

        let mut events = Vec::new();
        let post_time = ms_field(args, &["postTime"]).unwrap_or_default();

        let filled = decimal_field(args, &["lastFilledSize"]).unwrap_or(Decimal::ZERO);
        if filled > Decimal::ZERO {
            let price = decimal_field(args, &["lastFilledPrice"]).unwrap_or(Decimal::ZERO);
            let fee = decimal_field(args, &["fees"]).unwrap_or(Decimal::ZERO);
            let nonce = args.get("nonce").map(|n| match n {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            });
            let fill_time = ms_field(args, &["lastFilledTime"]).unwrap_or(post_time);

            let trade = TradeUpdate {
                trade_id: format!("{}-{}", exchange_order_id, nonce.unwrap_or_else(|| "0".to_string())),
                client_order_id: tracked.client_order_id.clone(),
                exchange_order_id: exchange_order_id.clone(),
                trading_pair: tracked.trading_pair.clone(),
                fill_timestamp: fill_time as f64 / 1000.0,
                fill_price: price,
                fill_base_amount: filled,
                fill_quote_amount: filled * price,
                fee: TradeFee::flat(tracked.quote_asset(), fee),
            };
            if self.order_tracker.process_trade_update(&trade) {
                events.push(ConnectorEvent::Trade(trade));
            }
        }

        let status = args.get("status").and_then(Value::as_str).unwrap_or_default();
        match constants::order_state(status) {
            Some(new_state) => {
                let update = OrderUpdate {
                    client_order_id: tracked.client_order_id.clone(),
                    exchange_order_id: Some(exchange_order_id),
                    trading_pair: tracked.trading_pair.clone(),
                    update_timestamp: post_time as f64 / 1000.0,
                    new_state,
                };
                self.order_tracker.process_order_update(&update);
                events.push(ConnectorEvent::Order(update));
            }
            None => tracing::warn!(exchange = "vest", status = %status, "Unknown order status"),
        }
        Ok(events)
    }
}

/// Step for a decimal-place count: 3 -> 0.001
fn step_from_places(info: &Value, paths: &[&str]) -> Option<Decimal> {
    let places = decimal_field(info, paths)?;
    if places.is_sign_negative() || !places.fract().is_zero() || places > Decimal::from(Decimal::MAX_SCALE) {
        return None;
    }
    places.to_u32().map(|places| Decimal::new(1, places))
}

/// Round `value` down to a multiple of `step`; a zero step leaves it unchanged
pub fn quantize(value: Decimal, step: Decimal) -> Decimal {
    if step <= Decimal::ZERO {
        return value;
    }
    (value / step).floor() * step
}

#[async_trait]
impl PerpetualConnector for VestConnector {
    fn name(&self) -> &'static str {
        if self.config().testnet {
            constants::TESTNET_DOMAIN
        } else {
            constants::EXCHANGE_NAME
        }
    }

    fn trading_pairs(&self) -> &[String] {
        &self.trading_pairs
    }

    fn supported_order_types(&self) -> Vec<OrderType> {
        vec![OrderType::Limit, OrderType::Market, OrderType::LimitMaker]
    }

    fn supported_position_modes(&self) -> Vec<PositionMode> {
        vec![PositionMode::OneWay]
    }

    async fn start_network(&mut self) -> ExchangeResult<()> {
        if self.rest.auth().api_key().is_none() {
            self.rest.register().await?;
        }
        self.update_trading_rules().await?;
        self.update_trading_fees().await?;
        tracing::info!(exchange = "vest", rules = self.trading_rules.len(), "Vest network started");
        Ok(())
    }

    async fn place_order(&mut self, request: OrderRequest) -> ExchangeResult<PlacedOrder> {
        self.order_tracker
            .start_tracking(InFlightOrder::from_request(&request, current_timestamp()));

        let result = self.submit_order(&request).await;

        let now = current_timestamp();
        match result {
            Ok(exchange_order_id) => {
                self.order_tracker.process_order_update(&OrderUpdate {
                    client_order_id: request.client_order_id.clone(),
                    exchange_order_id: Some(exchange_order_id.clone()),
                    trading_pair: request.trading_pair.clone(),
                    update_timestamp: now,
                    new_state: OrderState::Open,
                });
                tracing::info!(
                    exchange = "vest",
                    order_id = %request.client_order_id,
                    exchange_order_id = %exchange_order_id,
                    trading_pair = %request.trading_pair,
                    "Order placed"
                );
                Ok(PlacedOrder {
                    exchange_order_id,
                    timestamp: now,
                })
            }
            Err(e) => {
                tracing::error!(exchange = "vest", order_id = %request.client_order_id, error = %e, "Order failed");
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
        let Some(order_id) = tracked.exchange_order_id.clone() else {
            tracing::warn!(exchange = "vest", order_id = %client_order_id, "Cancel before exchange id is known");
            return Ok(false);
        };

        let time = current_time_ms();
        let body = json!({
            "order": {"time": time, "nonce": time, "id": order_id},
            "recvWindow": constants::RECV_WINDOW_MS
        });

        let canceled = match self.rest.post(constants::ORDERS_CANCEL_PATH_URL, body).await {
            Ok(response) => match api_error(&response) {
                Some(err) => {
                    tracing::warn!(exchange = "vest", order_id = %order_id, error = %err, "Cancel refused");
                    false
                }
                None => true,
            },
            Err(e) => {
                tracing::error!(exchange = "vest", order_id = %order_id, error = %e, "Cancel request failed");
                false
            }
        };

        if canceled {
            self.order_tracker.process_order_update(&OrderUpdate {
                client_order_id: tracked.client_order_id.clone(),
                exchange_order_id: Some(order_id),
                trading_pair: tracked.trading_pair.clone(),
                update_timestamp: current_timestamp(),
                new_state: OrderState::Canceled,
            });
        }
        Ok(canceled)
    }

    async fn update_trading_rules(&mut self) -> ExchangeResult<()> {
        let info: Value = self.rest.get(constants::EXCHANGE_INFO_PATH_URL, &[]).await?;
        let symbols = match &info {
            Value::Array(list) => list.clone(),
            other => other
                .get("symbols")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
        };

        let mut rules = HashMap::new();
        for entry in &symbols {
            match Self::parse_trading_rule(entry) {
                Ok(Some((pair, rule, precision))) => {
                    if let Some(symbol) = entry.get("symbol").and_then(Value::as_str) {
                        self.symbol_map.insert(pair.clone(), symbol.to_string());
                    }
                    if !self.trading_pairs.is_empty() && !self.trading_pairs.contains(&pair) {
                        continue;
                    }
                    self.price_precision.insert(pair.clone(), precision);
                    rules.insert(pair, rule);
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(exchange = "vest", entry = %entry, error = %e, "Error parsing trading rule, skipping");
                }
            }
        }
        tracing::info!(exchange = "vest", count = rules.len(), "Trading rules updated");
        self.trading_rules = rules;
        Ok(())
    }

    async fn update_trading_fees(&mut self) -> ExchangeResult<()> {
        for pair in &self.trading_pairs {
            self.trading_fees.insert(pair.clone(), utils::default_fees());
        }
        Ok(())
    }

    async fn update_balances(&mut self) -> ExchangeResult<()> {
        let account = self.get_account().await?;
        self.balances = Self::parse_balances(&account);
        tracing::debug!(exchange = "vest", assets = self.balances.len(), "Balances updated");
        Ok(())
    }

    async fn update_positions(&mut self) -> ExchangeResult<()> {
        let account = self.get_account().await?;
        self.positions = Self::parse_positions(&account, &self.trading_pairs);
        tracing::debug!(exchange = "vest", positions = self.positions.len(), "Positions updated");
        Ok(())
    }

    async fn request_order_status(&self, order: &InFlightOrder) -> ExchangeResult<OrderUpdate> {
        let mut update = OrderUpdate {
            client_order_id: order.client_order_id.clone(),
            exchange_order_id: order.exchange_order_id.clone(),
            trading_pair: order.trading_pair.clone(),
            update_timestamp: current_timestamp(),
            new_state: order.current_state,
        };
        let Some(order_id) = order.exchange_order_id.clone() else {
            return Ok(update);
        };

        let response = self
            .rest
            .get_private(
                constants::ORDERS_PATH_URL,
                &[("id", order_id.clone()), ("time", current_time_ms().to_string())],
            )
            .await?;
        let entry = match &response {
            Value::Array(list) => list.iter().find(|o| match o.get("id") {
                Some(Value::String(id)) => *id == order_id,
                Some(other) => other.to_string() == order_id,
                None => false,
            }),
            other if other.get("status").is_some() => Some(other),
            _ => None,
        };

        match entry.and_then(|e| e.get("status")).and_then(Value::as_str) {
            Some(status) => match constants::order_state(status) {
                Some(state) => update.new_state = state,
                None => tracing::warn!(exchange = "vest", status = %status, "Unknown order status"),
            },
            None => tracing::debug!(exchange = "vest", order_id = %order_id, "Order not found, keeping state"),
        }
        Ok(update)
    }

    async fn all_trade_updates_for_order(&self, _order: &InFlightOrder) -> ExchangeResult<Vec<TradeUpdate>> {
        // fills are only reported on the private stream
        Ok(Vec::new())
    }

    async fn process_user_event(&mut self, event: &Value) -> ExchangeResult<Vec<ConnectorEvent>> {
        if event.get("channel").and_then(Value::as_str) != Some(constants::WS_ACCOUNT_PRIVATE_CHANNEL) {
            return Ok(Vec::new());
        }
        let data = event.get("data").cloned().unwrap_or(Value::Null);
        let args = data.get("args").cloned().unwrap_or(Value::Null);

        match data.get("event").and_then(Value::as_str) {
            Some(constants::WS_EVENT_ORDER) => self.process_order_event(&args),
            Some(constants::WS_EVENT_LP) | Some(constants::WS_EVENT_TRANSFER) => {
                self.update_balances().await?;
                Ok(vec![ConnectorEvent::AccountRefreshed])
            }
            _ => Ok(Vec::new()),
        }
    }

    fn get_fee(
        &self,
        trading_pair: &str,
        order_type: OrderType,
        _trade_type: TradeType,
        _amount: Decimal,
        _price: Decimal,
        is_maker: Option<bool>,
    ) -> TradeFee {
        let is_maker = is_maker.unwrap_or(false) || order_type == OrderType::LimitMaker;
        let schema = self.fee_schema(trading_pair);
        let rate = if is_maker {
            schema.maker_percent_fee_decimal
        } else {
            schema.taker_percent_fee_decimal
        };
        let quote = split_trading_pair(trading_pair).1;
        TradeFee::from_percent(rate, Some(quote.to_string()))
    }

    async fn get_last_traded_prices(&self, trading_pairs: &[String]) -> ExchangeResult<HashMap<String, Decimal>> {
        let raw: Value = self.rest.get(constants::TICKER_LATEST_PATH_URL, &[]).await?;
        let wanted: HashMap<String, &String> = trading_pairs
            .iter()
            .map(|pair| (self.exchange_symbol(pair), pair))
            .collect();

        Ok(parse_tickers(&raw)
            .iter()
            .filter_map(|ticker| {
                let pair = wanted.get(&ticker.symbol)?;
                Some(((*pair).clone(), ticker.reference_price()?))
            })
            .collect())
    }

    async fn set_position_mode(&mut self, mode: PositionMode) -> ExchangeResult<()> {
        match mode {
            PositionMode::OneWay => Ok(()),
            PositionMode::Hedge => Err(ExchangeError::Unsupported(
                "Vest Perpetual supports only the one-way position mode".into(),
            )),
        }
    }

    async fn set_leverage(&mut self, trading_pair: &str, leverage: u32) -> ExchangeResult<()> {
        if leverage < 1 {
            return Err(ExchangeError::InvalidInput(
                "Leverage must be greater than or equal to 1".into(),
            ));
        }
        tracing::info!(exchange = "vest", trading_pair = %trading_pair, leverage, "Leverage accepted");
        Ok(())
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
