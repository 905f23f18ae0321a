//! Nado subscription websocket session
//!
//! Both data sources open `/v1/subscribe`, send one subscribe frame per
//! stream and then read JSON events until the connection drops. The
//! reconnect loop around a session lives here too.

use std::sync::atomic::Ordering;
use std::time::Duration;

use futures_util::SinkExt;
use serde_json::Value;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::adapters::shared::{
    connect_split, next_inbound, retry_with_backoff, Inbound, PingSchedule, ReconnectConfig, WsReader,
    WsWriter,
};
use crate::adapters::types::{current_time_ms, ConnectionHealth, ConnectionState};

use super::constants::HEARTBEAT_TIME_INTERVAL;
use super::types::NadoSubscribeMsg;

/// Pause between a dropped session and the next connect attempt
const RECONNECT_PAUSE: Duration = Duration::from_secs(5);

/// How a session ended
#[derive(Debug)]
pub enum SessionEnd {
    Cancelled,
    Dropped(ExchangeError),
}

/// Send every subscription, then read until cancelled or disconnected
///
/// Each JSON text frame is handed to `on_event`. Pings go out on the
/// timeout-then-ping schedule.
pub async fn run_session<F>(
    mut writer: WsWriter,
    mut reader: WsReader,
    subscriptions: &[NadoSubscribeMsg],
    health: &ConnectionHealth,
    cancel: &CancellationToken,
    mut on_event: F,
) -> SessionEnd
where
    F: FnMut(Value),
{
    let mut schedule = PingSchedule::new(HEARTBEAT_TIME_INTERVAL);

    for sub in subscriptions {
        let payload = match serde_json::to_string(sub) {
            Ok(p) => p,
            Err(e) => return SessionEnd::Dropped(ExchangeError::InvalidInput(e.to_string())),
        };
        tracing::debug!(exchange = "nado", stream = %sub.stream.stream_type, product_id = sub.stream.product_id, "Subscribing");
        if let Err(e) = writer.send(Message::Text(payload)).await {
            return SessionEnd::Dropped(ExchangeError::WebSocket(Box::new(e)));
        }
        schedule.mark_sent();
    }

    health.set_state(ConnectionState::Connected).await;
    health.reader_alive.store(true, Ordering::Relaxed);
    health.touch();

    let end = loop {
        let inbound = tokio::select! {
            _ = cancel.cancelled() => break SessionEnd::Cancelled,
            inbound = next_inbound(&mut reader, &schedule) => inbound,
        };

        match inbound {
            Ok(Inbound::PingDue) => {
                if let Err(e) = writer.send(Message::Ping(Vec::new())).await {
                    break SessionEnd::Dropped(ExchangeError::WebSocket(Box::new(e)));
                }
                schedule.mark_sent();
            }
            Ok(Inbound::Message(msg)) => {
                health.touch();
                match msg {
                    Message::Text(text) => match serde_json::from_str::<Value>(&text) {
                        Ok(value) => on_event(value),
                        Err(e) => tracing::warn!(exchange = "nado", error = %e, message = %text, "Unparseable WS message"),
                    },
                    Message::Pong(_) => {
                        health.last_pong.store(current_time_ms(), Ordering::Relaxed);
                    }
                    Message::Close(_) => {
                        break SessionEnd::Dropped(ExchangeError::ConnectionFailed("closed by server".into()));
                    }
                    _ => {}
                }
            }
            Err(e) => break SessionEnd::Dropped(e),
        }
    };

    health.reader_alive.store(false, Ordering::Relaxed);
    end
}

/// Connect, run a session and reconnect until `cancel` fires
///
/// `subscriptions` is rebuilt before every connect so new markets are picked up.
pub async fn listen_with_reconnect<S, F>(
    name: &str,
    url: &str,
    reconnect: &ReconnectConfig,
    health: &ConnectionHealth,
    cancel: &CancellationToken,
    mut subscriptions: S,
    mut on_event: F,
) -> ExchangeResult<()>
where
    S: FnMut() -> Vec<NadoSubscribeMsg>,
    F: FnMut(Value),
{
    while !cancel.is_cancelled() {
        health.set_state(ConnectionState::Reconnecting).await;

        let connected = tokio::select! {
            _ = cancel.cancelled() => break,
            r = retry_with_backoff(reconnect, name, || connect_split(url)) => r,
        };

        match connected {
            Ok((writer, reader)) => {
                tracing::info!(exchange = "nado", stream = %name, url = %url, "Connected");
                let subs = subscriptions();
                match run_session(writer, reader, &subs, health, cancel, &mut on_event).await {
                    SessionEnd::Cancelled => break,
                    SessionEnd::Dropped(e) => {
                        tracing::warn!(exchange = "nado", stream = %name, error = %e, "Session dropped, reconnecting")
                    }
                }
            }
            Err(e) => tracing::error!(exchange = "nado", stream = %name, error = %e, "Unable to connect"),
        }

        health.set_state(ConnectionState::Disconnected).await;
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(RECONNECT_PAUSE) => {}
        }
    }

    health.set_state(ConnectionState::Disconnected).await;
    tracing::info!(exchange = "nado", stream = %name, "Listener stopped");
    Ok(())
}
