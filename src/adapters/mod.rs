//! Perpetual futures connectors
//!
//! Core abstractions (`traits`, `types`, `tracker`), shared transport
//! plumbing, and one module per venue.

pub mod errors;
pub mod factory;
pub mod manager;
pub mod nado;
pub mod shared;
pub mod tracker;
pub mod traits;
pub mod types;
pub mod vest;

pub use errors::{ExchangeError, ExchangeResult};
pub use factory::{create_connector, AnyConnector};
pub use manager::ConnectorManager;
pub use nado::{NadoConfig, NadoConnector};
pub use tracker::OrderTracker;
pub use traits::{OrderBookDataSource, PerpetualConnector, UserStreamDataSource};
pub use vest::{VestConfig, VestConnector};
