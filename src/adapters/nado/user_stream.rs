//! Nado user stream: `fill` and `position_change` for the subaccount

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::adapters::errors::ExchangeResult;
use crate::adapters::shared::ReconnectConfig;
use crate::adapters::traits::UserStreamDataSource;
use crate::adapters::types::{next_subscription_id, ConnectionHealth};

use super::connector::SharedMarkets;
use super::constants;
use super::rest::NadoRest;
use super::stream::listen_with_reconnect;
use super::types::{NadoMarket, NadoSubscribeMsg};

const PRIVATE_STREAMS: [&str; 2] = [constants::FILL_EVENT_TYPE, constants::POSITION_CHANGE_EVENT_TYPE];

pub struct NadoUserStreamDataSource {
    rest: NadoRest,
    markets: SharedMarkets,
    trading_pairs: Vec<String>,
    sender: String,
    health: ConnectionHealth,
    reconnect: ReconnectConfig,
}

impl NadoUserStreamDataSource {
    pub fn new(rest: NadoRest, markets: SharedMarkets, trading_pairs: Vec<String>, sender: &str) -> Self {
        Self {
            rest,
            markets,
            trading_pairs,
            sender: sender.to_string(),
            health: ConnectionHealth::new(),
            reconnect: ReconnectConfig::default(),
        }
    }

    pub fn health(&self) -> &ConnectionHealth {
        &self.health
    }
}

/// Private subscriptions for every tracked product
pub fn subscription_messages(
    markets: &BTreeMap<u32, NadoMarket>,
    trading_pairs: &[String],
    sender: &str,
) -> Vec<NadoSubscribeMsg> {
    markets
        .values()
        .filter(|m| trading_pairs.contains(&m.trading_pair()))
        .flat_map(|m| {
            PRIVATE_STREAMS
                .iter()
                .map(move |stream| NadoSubscribeMsg::private(stream, m.product_id, sender, next_subscription_id()))
        })
        .collect()
}

fn is_account_event(event: &Value) -> bool {
    matches!(
        event.get("type").and_then(Value::as_str),
        Some(constants::FILL_EVENT_TYPE) | Some(constants::POSITION_CHANGE_EVENT_TYPE)
    )
}

#[async_trait]
impl UserStreamDataSource for NadoUserStreamDataSource {
    async fn listen_for_user_stream(
        &self,
        output: mpsc::UnboundedSender<Value>,
        cancel: CancellationToken,
    ) -> ExchangeResult<()> {
        if self.markets.read().await.is_empty() {
            let (markets, _) = self.rest.load_markets().await?;
            *self.markets.write().await = markets;
        }
        let subscriptions = subscription_messages(&*self.markets.read().await, &self.trading_pairs, &self.sender);
        let url = self.rest.config().ws_subscribe_url.clone();

        listen_with_reconnect(
            "nado user stream",
            &url,
            &self.reconnect,
            &self.health,
            &cancel,
            || subscriptions.clone(),
            |event| {
                if is_account_event(&event) && output.send(event).is_err() {
                    tracing::debug!(exchange = "nado", "User event consumer dropped");
                }
            },
        )
        .await
    }
}
