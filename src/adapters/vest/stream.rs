//! Vest websocket session
//!
//! One SUBSCRIBE frame listing every channel, then JSON frames until the
//! connection drops. Vest expects an application-level `PING` request
//! rather than websocket ping frames and answers `{"data":"PONG"}`.

use std::sync::atomic::Ordering;
use std::time::Duration;

use futures_util::SinkExt;
use serde_json::{json, Value};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::adapters::shared::{
    connect_split, next_inbound, retry_with_backoff, Inbound, PingSchedule, ReconnectConfig, WsReader,
    WsWriter,
};
use crate::adapters::types::{current_time_ms, next_subscription_id, ConnectionHealth, ConnectionState};

use super::constants::HEARTBEAT_TIME_INTERVAL;
use super::types::VestWsMessage;

pub const RECONNECT_PAUSE: Duration = Duration::from_secs(5);

pub fn subscribe_message(channels: &[String]) -> Value {
    json!({
        "method": "SUBSCRIBE",
        "params": channels,
        "id": next_subscription_id()
    })
}

pub fn ping_message() -> Value {
    json!({"method": "PING", "params": [], "id": 0})
}

#[derive(Debug)]
pub enum SessionEnd {
    Cancelled,
    Dropped(ExchangeError),
}

/// Subscribe to `channels`, then hand every channel frame to `on_event`
pub async fn run_session<F>(
    mut writer: WsWriter,
    mut reader: WsReader,
    channels: &[String],
    health: &ConnectionHealth,
    cancel: &CancellationToken,
    mut on_event: F,
) -> SessionEnd
where
    F: FnMut(Value),
{
    let mut schedule = PingSchedule::new(HEARTBEAT_TIME_INTERVAL);

    if !channels.is_empty() {
        let subscribe = subscribe_message(channels);
        tracing::debug!(exchange = "vest", channels = ?channels, "Subscribing");
        if let Err(e) = writer.send(Message::Text(subscribe.to_string())).await {
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
                if let Err(e) = writer.send(Message::Text(ping_message().to_string())).await {
                    break SessionEnd::Dropped(ExchangeError::WebSocket(Box::new(e)));
                }
                tracing::trace!(exchange = "vest", "PING sent");
                schedule.mark_sent();
            }
            Ok(Inbound::Message(msg)) => {
                health.touch();
                match msg {
                    Message::Text(text) => match serde_json::from_str::<Value>(&text) {
                        Ok(value) => match VestWsMessage::classify(value) {
                            VestWsMessage::Pong => {
                                health.last_pong.store(current_time_ms(), Ordering::Relaxed);
                            }
                            VestWsMessage::Ack { id } => {
                                tracing::debug!(exchange = "vest", id = ?id, "Subscription confirmed");
                            }
                            VestWsMessage::Channel { channel, data } => {
                                on_event(json!({"channel": channel, "data": data}));
                            }
                            VestWsMessage::Other(value) => {
                                tracing::debug!(exchange = "vest", message = %value, "Unrouted WS message");
                            }
                        },
                        Err(e) => tracing::warn!(exchange = "vest", error = %e, message = %text, "Unparseable WS message"),
                    },
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

/// Public stream loop: connect to `url`, run a session, reconnect until cancelled
pub async fn listen_with_reconnect<S, F>(
    name: &str,
    url: &str,
    reconnect: &ReconnectConfig,
    health: &ConnectionHealth,
    cancel: &CancellationToken,
    mut channels: S,
    mut on_event: F,
) -> ExchangeResult<()>
where
    S: FnMut() -> Vec<String>,
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
                tracing::info!(exchange = "vest", stream = %name, "Connected");
                let subs = channels();
                match run_session(writer, reader, &subs, health, cancel, &mut on_event).await {
                    SessionEnd::Cancelled => break,
                    SessionEnd::Dropped(e) => {
                        tracing::warn!(exchange = "vest", stream = %name, error = %e, "Session dropped, reconnecting")
                    }
                }
            }
            Err(e) => tracing::error!(exchange = "vest", stream = %name, error = %e, "Unable to connect"),
        }

        health.set_state(ConnectionState::Disconnected).await;
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(RECONNECT_PAUSE) => {}
        }
    }

    health.set_state(ConnectionState::Disconnected).await;
    tracing::info!(exchange = "vest", stream = %name, "Listener stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frames() {
        let sub = subscribe_message(&["BTC-PERP@depth".to_string(), "tickers".to_string()]);
        assert_eq!(sub["method"], "SUBSCRIBE");
        assert_eq!(sub["params"][1], "tickers");
        assert!(sub["id"].as_u64().unwrap() > 0);

        let ping = ping_message();
        assert_eq!(ping, json!({"method": "PING", "params": [], "id": 0}));
    }

    #[tokio::test]
    async fn test_cancelled_listener_stops() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let health = ConnectionHealth::new();
        let result = listen_with_reconnect(
            "vest_test",
            "ws://127.0.0.1:1",
            &ReconnectConfig::default(),
            &health,
            &cancel,
            Vec::new,
            |_| {},
        )
        .await;
        assert!(result.is_ok());
        assert_eq!(*health.state.read().await, ConnectionState::Disconnected);
    }
}
