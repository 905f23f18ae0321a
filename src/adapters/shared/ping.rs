//! Timeout-then-ping keep-alive
//!
//! A listener waits for the next inbound frame for at most the time left
//! until the ping interval elapses since the last outbound frame. When that
//! wait times out the caller sends a ping and calls [`PingSchedule::mark_sent`].

use std::time::Duration;

use futures_util::{Stream, StreamExt};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

use crate::adapters::errors::{ExchangeError, ExchangeResult};

/// Tracks the last outbound frame and the keep-alive interval
#[derive(Debug, Clone)]
pub struct PingSchedule {
    interval: Duration,
    last_sent: Instant,
}

impl PingSchedule {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_sent: Instant::now(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Time left before a ping is due
    pub fn remaining(&self) -> Duration {
        self.interval.saturating_sub(self.last_sent.elapsed())
    }

    /// Reset the timer after any outbound frame (ping or subscription)
    pub fn mark_sent(&mut self) {
        self.last_sent = Instant::now();
    }
}

/// Outcome of one wait on the inbound stream
#[derive(Debug)]
pub enum Inbound {
    Message(Message),
    PingDue,
}

/// Wait for the next frame or report that a ping is due
///
/// A zero remaining interval still polls the stream once, so frames that are
/// already buffered are delivered before the ping.
pub async fn next_inbound<R>(reader: &mut R, schedule: &PingSchedule) -> ExchangeResult<Inbound>
where
    R: Stream<Item = Result<Message, WsError>> + Unpin,
{
    match tokio::time::timeout(schedule.remaining(), reader.next()).await {
        Err(_elapsed) => Ok(Inbound::PingDue),
        Ok(Some(Ok(msg))) => Ok(Inbound::Message(msg)),
        Ok(Some(Err(e))) => Err(ExchangeError::WebSocket(Box::new(e))),
        Ok(None) => Err(ExchangeError::ConnectionFailed("websocket stream ended".into())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;

    #[tokio::test]
    async fn test_ping_due_when_stream_is_silent() {
        let schedule = PingSchedule::new(Duration::from_millis(20));
        let mut reader = stream::pending::<Result<Message, WsError>>();
        let start = std::time::Instant::now();
        let inbound = next_inbound(&mut reader, &schedule).await.unwrap();
        assert!(matches!(inbound, Inbound::PingDue));
        assert!(start.elapsed() >= Duration::from_millis(15));
    }

    #[tokio::test]
    async fn test_buffered_message_beats_expired_timer() {
        let schedule = PingSchedule::new(Duration::ZERO);
        let mut reader = stream::iter(vec![Ok(Message::Text("hello".to_string()))]);
        match next_inbound(&mut reader, &schedule).await.unwrap() {
            Inbound::Message(Message::Text(t)) => assert_eq!(t, "hello"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_stream_end_is_an_error() {
        let schedule = PingSchedule::new(Duration::from_secs(5));
        let mut reader = stream::iter(Vec::<Result<Message, WsError>>::new());
        let err = next_inbound(&mut reader, &schedule).await.unwrap_err();
        assert!(matches!(err, ExchangeError::ConnectionFailed(_)));
    }

    #[tokio::test]
    async fn test_mark_sent_resets_remaining() {
        let mut schedule = PingSchedule::new(Duration::from_millis(50));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(schedule.remaining() <= Duration::from_millis(20));
        schedule.mark_sent();
        assert!(schedule.remaining() > Duration::from_millis(40));
    }
}
