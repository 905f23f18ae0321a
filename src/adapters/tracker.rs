//! In-flight order bookkeeping
//!
//! Connectors register every order they submit here and feed it the
//! order/trade updates they parse from REST polls and user streams.

use std::collections::HashMap;

use crate::adapters::types::{InFlightOrder, OrderState, OrderUpdate, TradeUpdate};

/// Client-side registry of submitted orders keyed by client order id
#[derive(Debug, Default, Clone)]
pub struct OrderTracker {
    orders: HashMap<String, InFlightOrder>,
}

impl OrderTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start_tracking(&mut self, order: InFlightOrder) {
        tracing::debug!(
            client_order_id = %order.client_order_id,
            trading_pair = %order.trading_pair,
            "Tracking order"
        );
        self.orders.insert(order.client_order_id.clone(), order);
    }

    pub fn stop_tracking(&mut self, client_order_id: &str) -> Option<InFlightOrder> {
        self.orders.remove(client_order_id)
    }

    pub fn get(&self, client_order_id: &str) -> Option<&InFlightOrder> {
        self.orders.get(client_order_id)
    }

    pub fn find_by_exchange_id(&self, exchange_order_id: &str) -> Option<&InFlightOrder> {
        self.orders
            .values()
            .find(|o| o.exchange_order_id.as_deref() == Some(exchange_order_id))
    }

    pub fn active_orders(&self) -> Vec<&InFlightOrder> {
        self.orders.values().filter(|o| !o.is_done()).collect()
    }

    pub fn len(&self) -> usize {
        self.orders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty()
    }

    /// Apply a state change; returns false when the update was ignored
    pub fn process_order_update(&mut self, update: &OrderUpdate) -> bool {
        let Some(order) = self.orders.get_mut(&update.client_order_id) else {
            tracing::debug!(client_order_id = %update.client_order_id, "Order update for untracked order ignored");
            return false;
        };
        if order.is_done() {
            return false;
        }
        if order.exchange_order_id.is_none() {
            order.exchange_order_id = update.exchange_order_id.clone();
        }
        // PendingCreate/PendingCancel are transient; everything else only moves forward.
        if update.new_state == OrderState::PendingCreate && order.current_state != OrderState::PendingCreate {
            return false;
        }
        order.current_state = update.new_state;
        tracing::debug!(
            client_order_id = %update.client_order_id,
            state = ?update.new_state,
            "Order state updated"
        );
        true
    }

    /// Record a fill; duplicate trade ids are ignored
    pub fn process_trade_update(&mut self, trade: &TradeUpdate) -> bool {
        let Some(order) = self.orders.get_mut(&trade.client_order_id) else {
            return false;
        };
        if order.order_fills.contains_key(&trade.trade_id) {
            return false;
        }
        order.executed_amount_base += trade.fill_base_amount;
        order.executed_amount_quote += trade.fill_quote_amount;
        order.order_fills.insert(trade.trade_id.clone(), trade.clone());
        if !order.is_done() && order.executed_amount_base < order.amount {
            order.current_state = OrderState::PartiallyFilled;
        }
        true
    }
}
