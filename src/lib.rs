//! Perpetual futures exchange connectors
//!
//! - Nado: EIP-712 signed orders over the gateway API
//! - Vest: ECDSA signed actions behind a registered API key
//!
//! Each venue provides a `PerpetualConnector` plus order book and user
//! stream data sources that push into Tokio queues.

pub mod adapters;
pub mod config;
pub mod error;

pub use error::AppError;
