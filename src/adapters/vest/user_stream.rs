//! Vest user stream
//!
//! Each session obtains a fresh listen key, connects with it and subscribes
//! to `account_private`. A renewal task extends the key every 45 minutes;
//! when renewal fails the session is torn down and a new key is fetched.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::adapters::errors::ExchangeResult;
use crate::adapters::shared::{connect_split, retry_with_backoff, ReconnectConfig};
use crate::adapters::traits::UserStreamDataSource;
use crate::adapters::types::{ConnectionHealth, ConnectionState};

use super::constants;
use super::rest::VestRest;
use super::stream::{run_session, SessionEnd, RECONNECT_PAUSE};
use super::web_utils;

pub struct VestUserStreamDataSource {
    rest: VestRest,
    health: ConnectionHealth,
    reconnect: ReconnectConfig,
    renew_interval: Duration,
}

impl VestUserStreamDataSource {
    pub fn new(rest: VestRest) -> Self {
        Self {
            rest,
            health: ConnectionHealth::new(),
            reconnect: ReconnectConfig::default(),
            renew_interval: constants::LISTEN_KEY_RENEW_INTERVAL,
        }
    }

    pub fn health(&self) -> &ConnectionHealth {
        &self.health
    }

    pub fn private_url(&self, listen_key: &str) -> String {
        let config = self.rest.config();
        format!(
            "{}&listenKey={}",
            web_utils::ws_url_with_query(&config.ws_url, config.account_group),
            listen_key
        )
    }
}

pub fn is_account_event(event: &Value) -> bool {
    event.get("channel").and_then(Value::as_str) == Some(constants::WS_ACCOUNT_PRIVATE_CHANNEL)
}

/// Extend the listen key every `interval` until `session` ends
///
/// A failed renewal cancels `session` so the caller reconnects with a new key.
pub async fn renew_listen_key(rest: VestRest, interval: Duration, session: CancellationToken) {
    let mut ticker = tokio::time::interval(interval);
    // first tick fires immediately; the key was just created
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = session.cancelled() => break,
            _ = ticker.tick() => {}
        }
        if let Err(e) = rest.renew_listen_key().await {
            tracing::error!(exchange = "vest", error = %e, "Listen key renewal failed, restarting user stream");
            session.cancel();
            break;
        }
    }
    tracing::debug!(exchange = "vest", "Listen key renewal task ended");
}

#[async_trait]
impl UserStreamDataSource for VestUserStreamDataSource {
    async fn listen_for_user_stream(
        &self,
        output: mpsc::UnboundedSender<Value>,
        cancel: CancellationToken,
    ) -> ExchangeResult<()> {
        let channels = vec![constants::WS_ACCOUNT_PRIVATE_CHANNEL.to_string()];
        let this = self;

        while !cancel.is_cancelled() {
            self.health.set_state(ConnectionState::Reconnecting).await;

            let connected = tokio::select! {
                _ = cancel.cancelled() => break,
                r = retry_with_backoff(&self.reconnect, "vest user stream", || async move {
                    let listen_key = this.rest.listen_key().await?;
                    connect_split(&this.private_url(&listen_key)).await
                }) => r,
            };

            match connected {
                Ok((writer, reader)) => {
                    tracing::info!(exchange = "vest", stream = "user", "Connected");
                    let session = cancel.child_token();
                    let renewal = tokio::spawn(renew_listen_key(
                        self.rest.clone(),
                        self.renew_interval,
                        session.clone(),
                    ));

                    let end = run_session(writer, reader, &channels, &self.health, &session, |event| {
                        if is_account_event(&event) && output.send(event).is_err() {
                            tracing::debug!(exchange = "vest", "User event consumer dropped");
                        }
                    })
                    .await;

                    session.cancel();
                    if let Err(e) = renewal.await {
                        tracing::warn!(exchange = "vest", error = %e, "Listen key renewal task aborted");
                    }

                    match end {
                        SessionEnd::Cancelled if cancel.is_cancelled() => break,
                        SessionEnd::Cancelled => {
                            tracing::warn!(exchange = "vest", "User stream session ended by listen key renewal")
                        }
                        SessionEnd::Dropped(e) => {
                            tracing::warn!(exchange = "vest", error = %e, "User stream dropped, reconnecting")
                        }
                    }
                }
                Err(e) => tracing::error!(exchange = "vest", error = %e, "Unable to open user stream"),
            }

            self.health.set_state(ConnectionState::Disconnected).await;
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(RECONNECT_PAUSE) => {}
            }
        }

        self.health.set_state(ConnectionState::Disconnected).await;
        tracing::info!(exchange = "vest", stream = "user", "Listener stopped");
        Ok(())
    }
}
