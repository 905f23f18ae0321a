//! Exchange adapter error types
//!
//! All connector errors are wrapped in ExchangeError enum
//! which implements thiserror for consistent error handling.

use thiserror::Error;

/// Exchange-specific error types for connector operations
#[derive(Error, Debug)]
pub enum ExchangeError {
    /// Connection to exchange failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Subscription to a websocket channel failed
    #[error("Subscription failed for {symbol}: {reason}")]
    SubscriptionFailed { symbol: String, reason: String },

    /// Network operation timed out
    #[error("Network timeout after {0}ms")]
    NetworkTimeout(u64),

    /// Invalid or unexpected response from exchange
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// WebSocket protocol error (boxed to reduce enum size)
    #[error("WebSocket error: {0}")]
    WebSocket(Box<tokio_tungstenite::tungstenite::Error>),

    /// Credentials could not be parsed or a payload could not be signed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// The venue answered with a business failure
    #[error("Order rejected: {0}")]
    OrderRejected(String),

    /// Malformed local input (addresses, hex, decimals, payload leaves)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Transport failure or account-level error code reported by the venue
    #[error("IO error: {0}")]
    Io(String),

    /// Operation not offered by the venue
    #[error("Unsupported: {0}")]
    Unsupported(String),
}

impl From<reqwest::Error> for ExchangeError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            return ExchangeError::NetworkTimeout(0);
        }
        ExchangeError::Io(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ExchangeError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        ExchangeError::WebSocket(Box::new(e))
    }
}

/// Result type alias for exchange operations
pub type ExchangeResult<T> = std::result::Result<T, ExchangeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_failed_display() {
        let err = ExchangeError::ConnectionFailed("timeout".to_string());
        assert_eq!(err.to_string(), "Connection failed: timeout");
    }

    #[test]
    fn test_subscription_failed_display() {
        let err = ExchangeError::SubscriptionFailed {
            symbol: "BTC-PERP@depth".to_string(),
            reason: "symbol not found".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Subscription failed for BTC-PERP@depth: symbol not found"
        );
    }

    #[test]
    fn test_order_rejected_display() {
        let err = ExchangeError::OrderRejected("insufficient margin".to_string());
        assert_eq!(err.to_string(), "Order rejected: insufficient margin");
    }

    #[test]
    fn test_invalid_input_display() {
        let err = ExchangeError::InvalidInput("bool leaf".to_string());
        assert_eq!(err.to_string(), "Invalid input: bool leaf");
    }

    #[test]
    fn test_websocket_error_from_tungstenite() {
        let err: ExchangeError = tokio_tungstenite::tungstenite::Error::ConnectionClosed.into();
        assert!(matches!(err, ExchangeError::WebSocket(_)));
        assert!(err.to_string().starts_with("WebSocket error"));
    }
}
