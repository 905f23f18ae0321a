//! Shared helpers for exchange connectors
//!
//! WebSocket connection management, retry with backoff, the keep-alive
//! schedule and the market data queues used by every data source.

pub mod channels;
pub mod http;
pub mod ping;
pub mod reconnect;
pub mod websocket;

pub use channels::{market_data_channels, MarketDataQueues, MarketDataReceivers};
pub use http::read_json;
pub use ping::{next_inbound, Inbound, PingSchedule};
pub use reconnect::{retry_with_backoff, ReconnectConfig};
pub use websocket::{connect_split, connect_tls, WsReader, WsWriter};
