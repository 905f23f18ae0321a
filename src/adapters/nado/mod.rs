//! Nado perpetual connector
//!
//! - `connector`: orders, balances and positions over the gateway REST API
//! - `order_book`: snapshots, funding and public websocket streams
//! - `user_stream`: fills and position changes for the subaccount
pub mod config;
pub mod connector;
pub mod constants;
pub mod eip712;
pub mod order_book;
pub mod rest;
pub mod signing;
pub mod stream;
pub mod types;
pub mod user_stream;
pub mod utils;

pub use config::NadoConfig;
pub use connector::NadoConnector;
pub use order_book::NadoOrderBookDataSource;
pub use user_stream::NadoUserStreamDataSource;
