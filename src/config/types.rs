//! Runner configuration types
//!
//! `config.yaml` lists the connectors to start. Credentials never live in
//! this file; each connector reads them from its own env vars.

use serde::{Deserialize, Serialize};

use crate::error::AppError;

// ============================================================================
// Enums
// ============================================================================

/// Supported venues
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Venue {
    Nado,
    Vest,
}

impl std::fmt::Display for Venue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Venue::Nado => write!(f, "nado"),
            Venue::Vest => write!(f, "vest"),
        }
    }
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// One connector instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorConfig {
    /// Unique identifier used in log fields (e.g., "nado_main")
    pub id: String,
    pub venue: Venue,
    /// Trading pairs in `BASE-QUOTE` form
    pub trading_pairs: Vec<String>,
    /// Start the public order book stream
    #[serde(default = "default_true")]
    pub order_book: bool,
    /// Start the private user stream
    #[serde(default = "default_true")]
    pub user_stream: bool,
}

fn default_true() -> bool {
    true
}

impl ConnectorConfig {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.id.trim().is_empty() {
            return Err(AppError::Config("Connector ID cannot be empty".to_string()));
        }

        if self.trading_pairs.is_empty() {
            return Err(AppError::Config(format!(
                "Connector '{}': trading_pairs cannot be empty",
                self.id
            )));
        }

        if let Some(bad) = self
            .trading_pairs
            .iter()
            .find(|pair| pair.split_once('-').map_or(true, |(b, q)| b.is_empty() || q.is_empty()))
        {
            return Err(AppError::Config(format!(
                "Connector '{}': trading pair '{}' must look like BASE-QUOTE",
                self.id, bad
            )));
        }

        Ok(())
    }
}

/// Root runner configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub connectors: Vec<ConnectorConfig>,
}

impl AppConfig {
    /// Validate all configuration rules
    pub fn validate(&self) -> Result<(), AppError> {
        if self.connectors.is_empty() {
            return Err(AppError::Config(
                "Configuration must contain at least one connector".to_string(),
            ));
        }

        let mut seen_ids = std::collections::HashSet::new();
        for connector in &self.connectors {
            if !seen_ids.insert(&connector.id) {
                return Err(AppError::Config(format!(
                    "Duplicate connector ID: '{}'",
                    connector.id
                )));
            }
        }

        for connector in &self.connectors {
            connector.validate()?;
        }

        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
