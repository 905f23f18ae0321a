//! REST response handling shared by the connectors

use serde::de::DeserializeOwned;

use crate::adapters::errors::{ExchangeError, ExchangeResult};

/// Read a response body and parse it as JSON
///
/// Non-2xx statuses become `InvalidResponse` carrying the body; transport
/// errors while reading convert through `From<reqwest::Error>`.
pub async fn read_json<T: DeserializeOwned>(
    response: reqwest::Response,
    exchange: &str,
    what: &str,
) -> ExchangeResult<T> {
    let status = response.status();
    let body = response.text().await?;

    tracing::debug!(exchange = %exchange, request = %what, status = %status, body = %body, "REST response");

    if !status.is_success() {
        return Err(ExchangeError::InvalidResponse(format!(
            "{} failed ({} {}): {}",
            what,
            status.as_u16(),
            status,
            body
        )));
    }

    serde_json::from_str(&body).map_err(|e| {
        ExchangeError::InvalidResponse(format!("Failed to parse {}: {} - body: {}", what, e, body))
    })
}
