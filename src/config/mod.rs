//! Runner configuration and logging
//!
//! - Configuration types (`AppConfig`, `ConnectorConfig`)
//! - YAML loading (`load_config`)
//! - Logging setup (`init_logging`)

mod loader;
pub mod logging;
mod types;

pub use types::{AppConfig, ConnectorConfig, Venue};

pub use loader::{config_path, load_config, load_config_from_str, CONFIG_PATH_ENV, DEFAULT_CONFIG_PATH};

pub use logging::init_logging;
