//! Vest Configuration
//!
//! Configuration for Vest exchange connection including environment loading.

use crate::adapters::errors::{ExchangeError, ExchangeResult};

use super::constants;

// =============================================================================
// Test Constants (Hardhat/Foundry well-known keys - PUBLIC, DO NOT USE IN PROD)
// =============================================================================

/// Hardhat account #1 private key (well-known, public test key)
#[cfg(test)]
pub const TEST_PRIMARY_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

/// Hardhat account #2 private key (well-known, public test key)
#[cfg(test)]
pub const TEST_SIGNING_KEY: &str = "0x5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a";

/// Hardhat account #1 address
#[cfg(test)]
pub const TEST_PRIMARY_ADDR: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";

// =============================================================================
// Configuration
// =============================================================================

/// Configuration for Vest exchange connection
#[derive(Clone)]
pub struct VestConfig {
    /// API key (JWT from `/register`); registered on start when absent
    pub api_key: Option<String>,
    /// Delegate key that signs orders, cancels, LP and withdrawals
    pub signing_key: String,
    /// Account group for server routing (0-9)
    pub account_group: u8,
    /// Primary account address (holds balances), needed for registration
    pub primary_addr: Option<String>,
    /// Primary private key, signs the registration proof
    pub primary_key: Option<String>,
    pub testnet: bool,
    pub rest_url: String,
    /// Websocket base, without the routing query
    pub ws_url: String,
}

impl std::fmt::Debug for VestConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VestConfig")
            .field("api_key_set", &self.api_key.is_some())
            .field("account_group", &self.account_group)
            .field("primary_addr", &self.primary_addr)
            .field("testnet", &self.testnet)
            .field("rest_url", &self.rest_url)
            .field("ws_url", &self.ws_url)
            .finish_non_exhaustive()
    }
}

impl VestConfig {
    pub fn new(api_key: Option<String>, signing_key: &str, account_group: u8, testnet: bool) -> Self {
        let domain = if testnet {
            constants::TESTNET_DOMAIN
        } else {
            constants::DEFAULT_DOMAIN
        };
        Self {
            api_key,
            signing_key: signing_key.to_string(),
            account_group,
            primary_addr: None,
            primary_key: None,
            testnet,
            rest_url: constants::rest_base_url(domain).to_string(),
            ws_url: constants::wss_base_url(domain).to_string(),
        }
    }

    /// Create configuration from environment variables
    ///
    /// `VEST_SIGNING_KEY` is always required. Without `VEST_API_KEY`, both
    /// `VEST_PRIMARY_ADDR` and `VEST_PRIMARY_KEY` must be set so the signing
    /// key can be registered. `VEST_REST_URL`/`VEST_WS_URL` override endpoints.
    pub fn from_env() -> ExchangeResult<Self> {
        let signing_key = required_env("VEST_SIGNING_KEY")?;
        let api_key = optional_env("VEST_API_KEY");
        let account_group: u8 = std::env::var("VEST_ACCOUNT_GROUP")
            .unwrap_or_else(|_| "0".to_string())
            .parse()
            .unwrap_or(0);
        let testnet = std::env::var("VEST_TESTNET")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        let mut config = Self::new(api_key, &signing_key, account_group, testnet);
        config.primary_addr = optional_env("VEST_PRIMARY_ADDR");
        config.primary_key = optional_env("VEST_PRIMARY_KEY");

        if config.api_key.is_none() && (config.primary_addr.is_none() || config.primary_key.is_none()) {
            return Err(ExchangeError::AuthenticationFailed(
                "VEST_API_KEY not set and VEST_PRIMARY_ADDR/VEST_PRIMARY_KEY missing for registration".into(),
            ));
        }

        if let Some(url) = optional_env("VEST_REST_URL") {
            config.rest_url = url;
        }
        if let Some(url) = optional_env("VEST_WS_URL") {
            config.ws_url = url;
        }
        Ok(config)
    }

    /// Point REST calls at `base` (e.g. a local mock server)
    pub fn with_base_url(mut self, base: &str) -> Self {
        self.rest_url = base.to_string();
        self
    }

    pub fn with_primary(mut self, address: &str, key: &str) -> Self {
        self.primary_addr = Some(address.to_string());
        self.primary_key = Some(key.to_string());
        self
    }

    pub fn domain(&self) -> &'static str {
        if self.testnet {
            constants::TESTNET_DOMAIN
        } else {
            constants::DEFAULT_DOMAIN
        }
    }

    pub fn rest_url(&self, path: &str) -> String {
        format!("{}{}", self.rest_url, path)
    }

    /// Get verifying contract address for EIP-712
    pub fn verifying_contract(&self) -> &'static str {
        constants::verifying_contract(self.domain())
    }
}

fn required_env(name: &str) -> ExchangeResult<String> {
    optional_env(name).ok_or_else(|| ExchangeError::AuthenticationFailed(format!("{} not set", name)))
}

fn optional_env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}
