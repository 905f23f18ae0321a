//! Nado Configuration
//!
//! Credentials come from the environment; endpoints follow the selected
//! domain and can be pointed elsewhere (e.g. a local mock server).

use crate::adapters::errors::{ExchangeError, ExchangeResult};

use super::constants::{self, NadoDomain};

/// Configuration for a Nado perpetual connection
#[derive(Clone)]
pub struct NadoConfig {
    /// Ink wallet address owning the subaccount
    pub address: String,
    /// Private key (hex, with or without 0x) that signs executes
    pub private_key: String,
    pub testnet: bool,
    /// Gateway base, e.g. https://gateway.prod.nado.xyz/v1
    pub rest_url: String,
    /// Archive indexer base, e.g. https://archive.prod.nado.xyz/v1
    pub archive_url: String,
    /// Subscription websocket for market and account streams
    pub ws_subscribe_url: String,
}

impl std::fmt::Debug for NadoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NadoConfig")
            .field("address", &self.address)
            .field("testnet", &self.testnet)
            .field("rest_url", &self.rest_url)
            .field("archive_url", &self.archive_url)
            .field("ws_subscribe_url", &self.ws_subscribe_url)
            .finish_non_exhaustive()
    }
}

impl NadoConfig {
    pub fn new(address: &str, private_key: &str, testnet: bool) -> Self {
        let domain = constants::domain(testnet);
        Self {
            address: address.to_string(),
            private_key: private_key.to_string(),
            testnet,
            rest_url: domain.rest_url.to_string(),
            archive_url: domain.archive_url.to_string(),
            ws_subscribe_url: domain.ws_subscribe_url.to_string(),
        }
    }

    /// Create configuration from environment variables
    ///
    /// `NADO_ADDRESS` and `NADO_PRIVATE_KEY` are required; `NADO_TESTNET`
    /// (`true`/`1`) selects the test deployment. `NADO_REST_URL`,
    /// `NADO_ARCHIVE_URL` and `NADO_WS_URL` override the endpoints.
    pub fn from_env() -> ExchangeResult<Self> {
        let address = required_env("NADO_ADDRESS")?;
        let private_key = required_env("NADO_PRIVATE_KEY")?;
        let testnet = std::env::var("NADO_TESTNET")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let mut config = Self::new(&address, &private_key, testnet);
        if let Ok(url) = std::env::var("NADO_REST_URL") {
            config.rest_url = url;
        }
        if let Ok(url) = std::env::var("NADO_ARCHIVE_URL") {
            config.archive_url = url;
        }
        if let Ok(url) = std::env::var("NADO_WS_URL") {
            config.ws_subscribe_url = url;
        }
        Ok(config)
    }

    /// Point every endpoint at `base` (REST and archive share it)
    pub fn with_base_url(mut self, base: &str) -> Self {
        self.rest_url = base.to_string();
        self.archive_url = base.to_string();
        self
    }

    pub fn domain(&self) -> NadoDomain {
        constants::domain(self.testnet)
    }

    pub fn connector_name(&self) -> &'static str {
        self.domain().connector_name
    }

    pub fn chain_id(&self) -> u64 {
        self.domain().chain_id
    }

    /// Contract that verifies cancellations
    pub fn endpoint_contract(&self) -> &'static str {
        self.domain().endpoint_contract
    }

    pub fn rest_url(&self, path: &str) -> String {
        format!("{}{}", self.rest_url, path)
    }

    pub fn indexer_url(&self) -> String {
        format!("{}{}", self.archive_url, constants::INDEXER_PATH_URL)
    }
}

fn required_env(name: &str) -> ExchangeResult<String> {
    let value = std::env::var(name)
        .map_err(|_| ExchangeError::AuthenticationFailed(format!("{} not set", name)))?;
    if value.is_empty() {
        return Err(ExchangeError::AuthenticationFailed(format!("{} is empty", name)));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_domain_urls() {
        let config = NadoConfig::new("0xabc", "key", false);
        assert_eq!(config.rest_url("/query"), "https://gateway.prod.nado.xyz/v1/query");
        assert_eq!(config.indexer_url(), "https://archive.prod.nado.xyz/v1/indexer");
        assert_eq!(config.chain_id(), 57073);

        let config = NadoConfig::new("0xabc", "key", true);
        assert!(config.ws_subscribe_url.contains("gateway.test"));
        assert_eq!(config.connector_name(), "nado_perpetual_testnet");
        assert_eq!(config.endpoint_contract(), "0x698d87105274292b5673367dec81874ce3633ac2");
    }

    #[test]
    fn test_debug_hides_key() {
        let config = NadoConfig::new("0xabc", "supersecret", false);
        assert!(!format!("{:?}", config).contains("supersecret"));
    }

    #[test]
    #[serial]
    fn test_from_env() {
        std::env::set_var("NADO_ADDRESS", "0x2162Db26939B9EAF0C5404217774d166056d31B5");
        std::env::set_var("NADO_PRIVATE_KEY", "5500eb16");
        std::env::set_var("NADO_TESTNET", "true");
        std::env::set_var("NADO_REST_URL", "http://127.0.0.1:9999");
        let config = NadoConfig::from_env().unwrap();
        assert!(config.testnet);
        assert_eq!(config.rest_url, "http://127.0.0.1:9999");
        assert!(config.archive_url.contains("archive.test"));

        std::env::remove_var("NADO_REST_URL");
        std::env::remove_var("NADO_TESTNET");
        std::env::remove_var("NADO_PRIVATE_KEY");
        assert!(NadoConfig::from_env().is_err());
        std::env::remove_var("NADO_ADDRESS");
    }
}
