//! Connector manager: runs every configured connector
//!
//! One Tokio task per connector. Each task starts the network, spawns the
//! order book and user streams, then logs market data and feeds raw user
//! events through the connector until the shared token is cancelled.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::adapters::factory::{create_connector, AnyConnector};
use crate::adapters::shared::{market_data_channels, MarketDataReceivers};
use crate::adapters::traits::{OrderBookDataSource, PerpetualConnector, UserStreamDataSource};
use crate::adapters::types::ConnectorEvent;
use crate::config::{AppConfig, ConnectorConfig};

pub struct ConnectorManager {
    connectors: Vec<ConnectorConfig>,
    cancel: CancellationToken,
}

impl ConnectorManager {
    pub fn new(config: &AppConfig, cancel: CancellationToken) -> Self {
        Self {
            connectors: config.connectors.clone(),
            cancel,
        }
    }

    /// Launch every connector; returns connector id -> task handle
    pub fn start_all(&self) -> HashMap<String, JoinHandle<()>> {
        let mut handles = HashMap::new();

        for connector in &self.connectors {
            let cfg = connector.clone();
            let cancel = self.cancel.clone();
            let handle = tokio::spawn(async move {
                Self::run_connector(cfg, cancel).await;
            });
            handles.insert(connector.id.clone(), handle);
        }

        info!(
            connectors = ?self.connectors.iter().map(|c| c.id.as_str()).collect::<Vec<_>>(),
            "All connectors launched"
        );
        handles
    }

    async fn run_connector(cfg: ConnectorConfig, cancel: CancellationToken) {
        let id = cfg.id.clone();
        info!(connector = %id, venue = %cfg.venue, "Starting connector");

        let mut connector = match create_connector(&cfg) {
            Ok(c) => c,
            Err(e) => {
                error!(connector = %id, error = %e, "Failed to create connector");
                return;
            }
        };

        let started = tokio::select! {
            _ = cancel.cancelled() => return,
            r = connector.start_network() => r,
        };
        if let Err(e) = started {
            error!(connector = %id, error = %e, "Failed to start network");
            return;
        }
        info!(
            connector = %id,
            rules = connector.trading_rules().len(),
            balances = connector.balances().len(),
            "Network started"
        );

        let (order_book, user_stream) = connector.data_sources();
        let mut streams = Vec::new();

        let (queues, receivers) = market_data_channels();
        if cfg.order_book {
            streams.push(spawn_order_book(&id, order_book, queues, cancel.clone()));
        } else {
            drop(queues);
        }

        let (user_tx, user_rx) = mpsc::unbounded_channel();
        if cfg.user_stream {
            streams.push(spawn_user_stream(&id, user_stream, user_tx, cancel.clone()));
        } else {
            drop(user_tx);
        }

        consume(&id, &mut connector, receivers, user_rx, &cancel).await;

        for stream in streams {
            if let Err(e) = stream.await {
                warn!(connector = %id, error = %e, "Stream task aborted");
            }
        }
        info!(connector = %id, "Connector stopped");
    }
}

fn spawn_order_book(
    id: &str,
    source: Arc<dyn OrderBookDataSource>,
    queues: crate::adapters::shared::MarketDataQueues,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let id = id.to_string();
    tokio::spawn(async move {
        if let Err(e) = source.listen_for_subscriptions(queues, cancel).await {
            error!(connector = %id, error = %e, "Order book stream failed");
        }
    })
}

fn spawn_user_stream(
    id: &str,
    source: Arc<dyn UserStreamDataSource>,
    output: mpsc::UnboundedSender<serde_json::Value>,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    let id = id.to_string();
    tokio::spawn(async move {
        if let Err(e) = source.listen_for_user_stream(output, cancel).await {
            error!(connector = %id, error = %e, "User stream failed");
        }
    })
}

/// Drain the queues until cancelled or every sender is gone
async fn consume(
    id: &str,
    connector: &mut AnyConnector,
    mut market: MarketDataReceivers,
    mut user: mpsc::UnboundedReceiver<serde_json::Value>,
    cancel: &CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            Some(msg) = market.snapshots.recv() => {
                info!(
                    connector = %id,
                    trading_pair = %msg.trading_pair,
                    best_bid = ?msg.best_bid(),
                    best_ask = ?msg.best_ask(),
                    "Order book snapshot"
                );
            }
            Some(msg) = market.diffs.recv() => {
                debug!(
                    connector = %id,
                    trading_pair = %msg.trading_pair,
                    update_id = msg.update_id,
                    bids = msg.bids.len(),
                    asks = msg.asks.len(),
                    "Order book diff"
                );
            }
            Some(msg) = market.trades.recv() => {
                if let Some(trade) = &msg.trade {
                    info!(
                        connector = %id,
                        trading_pair = %msg.trading_pair,
                        side = ?trade.trade_type,
                        price = %trade.price,
                        amount = %trade.amount,
                        "Public trade"
                    );
                }
            }
            Some(update) = market.funding.recv() => {
                info!(
                    connector = %id,
                    trading_pair = %update.trading_pair,
                    mark_price = ?update.mark_price,
                    rate = ?update.rate,
                    "Funding update"
                );
            }
            Some(event) = user.recv() => {
                handle_user_event(id, connector, &event).await;
            }
            else => break,
        }
    }
}

async fn handle_user_event(id: &str, connector: &mut AnyConnector, event: &serde_json::Value) {
    match connector.process_user_event(event).await {
        Ok(events) => {
            for event in events {
                match event {
                    ConnectorEvent::Order(update) => info!(
                        connector = %id,
                        order_id = %update.client_order_id,
                        state = ?update.new_state,
                        "Order update"
                    ),
                    ConnectorEvent::Trade(fill) => info!(
                        connector = %id,
                        order_id = %fill.client_order_id,
                        trade_id = %fill.trade_id,
                        price = %fill.fill_price,
                        amount = %fill.fill_base_amount,
                        "Fill"
                    ),
                    ConnectorEvent::AccountRefreshed => debug!(connector = %id, "Account refreshed"),
                }
            }
        }
        Err(e) => warn!(connector = %id, error = %e, event = %event, "Failed to process user event"),
    }
}
