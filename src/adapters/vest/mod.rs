//! Vest perpetual connector
//!
//! Requests are routed to the account group's server through the
//! `xrestservermm` header. Private POSTs carry an ECDSA signature of the
//! ABI-encoded action; the API key comes from registering the signing key
//! with a proof signed by the primary wallet.
//!
//! - `connector`: orders, balances, positions and leverage
//! - `order_book`: depth snapshots, trades and ticker funding
//! - `user_stream`: `account_private` events behind a renewable listen key
pub mod config;
pub mod connector;
pub mod constants;
pub mod order_book;
pub mod rest;
pub mod signing;
pub mod stream;
pub mod types;
pub mod user_stream;
pub mod utils;
pub mod web_utils;

pub use config::VestConfig;
pub use connector::VestConnector;
pub use order_book::VestOrderBookDataSource;
pub use user_stream::VestUserStreamDataSource;
