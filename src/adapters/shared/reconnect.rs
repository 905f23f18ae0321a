//! Retry with exponential backoff
//!
//! Used for websocket (re)connects, listen key acquisition and venue
//! registration. Jitter keeps parallel listeners from reconnecting in lockstep.

use std::time::Duration;

use crate::adapters::errors::{ExchangeError, ExchangeResult};

/// Configuration for retry attempts
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Maximum number of attempts
    pub max_attempts: u32,
    /// Initial delay in milliseconds (doubles each attempt)
    pub initial_delay_ms: u64,
    /// Maximum delay cap in milliseconds
    pub max_delay_ms: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 5000,
        }
    }
}

impl ReconnectConfig {
    /// Capped exponential delay for `attempt` (0-based), without jitter
    pub fn base_delay_ms(&self, attempt: u32) -> u64 {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        std::cmp::min(self.initial_delay_ms.saturating_mul(factor), self.max_delay_ms)
    }

    /// Delay for `attempt` plus 0-199ms of jitter
    pub fn delay(&self, attempt: u32) -> Duration {
        let jitter = rand::random::<u64>() % 200;
        Duration::from_millis(self.base_delay_ms(attempt) + jitter)
    }
}

/// Run `op` until it succeeds or `max_attempts` is exhausted
///
/// The first attempt runs immediately; later attempts wait
/// `min(initial * 2^n, max) + jitter`. Returns the last error on exhaustion.
pub async fn retry_with_backoff<T, F, Fut>(
    config: &ReconnectConfig,
    what: &str,
    mut op: F,
) -> ExchangeResult<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = ExchangeResult<T>>,
{
    let mut last_error: Option<ExchangeError> = None;

    for attempt in 0..config.max_attempts {
        if attempt > 0 {
            let delay = config.delay(attempt - 1);
            tracing::info!(
                target_name = %what,
                attempt = attempt + 1,
                max_attempts = config.max_attempts,
                delay_ms = delay.as_millis() as u64,
                "Retrying"
            );
            tokio::time::sleep(delay).await;
        }

        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                tracing::warn!(target_name = %what, attempt = attempt + 1, error = %e, "Attempt failed");
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or_else(|| {
        ExchangeError::ConnectionFailed(format!("{}: no attempts were made", what))
    }))
}
