//! Vest REST client
//!
//! Attaches the routing and API key headers to every call, signs private
//! POST bodies, and owns registration and listen key management.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::adapters::shared::{read_json, retry_with_backoff, ReconnectConfig};
use crate::adapters::types::create_http_client;

use super::config::VestConfig;
use super::constants;
use super::signing::{expiry_7_days_ms, VestAuth};
use super::types::{api_error, ListenKeyResponse, RegisterResponse};

#[derive(Clone)]
pub struct VestRest {
    http: reqwest::Client,
    config: Arc<VestConfig>,
    auth: VestAuth,
}

impl VestRest {
    pub fn new(config: VestConfig) -> ExchangeResult<Self> {
        let auth = VestAuth::from_config(&config)?;
        Ok(Self {
            http: create_http_client(constants::EXCHANGE_NAME),
            config: Arc::new(config),
            auth,
        })
    }

    pub fn config(&self) -> &VestConfig {
        &self.config
    }

    pub fn auth(&self) -> &VestAuth {
        &self.auth
    }

    fn with_headers(&self, mut request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        for (name, value) in self.auth.rest_headers() {
            request = request.header(name, value);
        }
        request
    }

    fn require_api_key(&self) -> ExchangeResult<()> {
        match self.auth.api_key() {
            Some(_) => Ok(()),
            None => Err(ExchangeError::AuthenticationFailed("Vest API key not registered".into())),
        }
    }

    /// Public GET
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> ExchangeResult<T> {
        let url = self.config.rest_url(path);
        tracing::debug!(exchange = "vest", "GET {}", url);
        let response = self.with_headers(self.http.get(&url)).query(query).send().await?;
        read_json(response, constants::EXCHANGE_NAME, path).await
    }

    /// Authenticated GET; `{"code": ...}` bodies become errors
    pub async fn get_private(&self, path: &str, query: &[(&str, String)]) -> ExchangeResult<Value> {
        self.require_api_key()?;
        let value: Value = self.get(path, query).await?;
        match api_error(&value) {
            Some(err) => Err(ExchangeError::InvalidResponse(format!("{} failed: {}", path, err))),
            None => Ok(value),
        }
    }

    /// Authenticated POST; bodies for signed routes get their `signature`
    pub async fn post(&self, path: &str, mut body: Value) -> ExchangeResult<Value> {
        self.require_api_key()?;
        self.auth.sign_request_body(path, &mut body)?;

        let url = self.config.rest_url(path);
        tracing::debug!(exchange = "vest", "POST {}", url);
        let response = self.with_headers(self.http.post(&url)).json(&body).send().await?;
        read_json(response, constants::EXCHANGE_NAME, path).await
    }

    // =========================================================================
    // Registration
    // =========================================================================

    /// Register the signing key and install the returned API key
    pub async fn register(&self) -> ExchangeResult<String> {
        let (primary_addr, primary_key) = match (&self.config.primary_addr, &self.config.primary_key) {
            (Some(addr), Some(key)) => (addr.clone(), key.clone()),
            _ => {
                return Err(ExchangeError::AuthenticationFailed(
                    "Primary address and key are required to register".into(),
                ));
            }
        };

        let api_key = retry_with_backoff(&ReconnectConfig::default(), "vest register", || {
            self.try_register(&primary_addr, &primary_key)
        })
        .await?;

        self.auth.set_api_key(api_key.clone());
        tracing::info!(exchange = "vest", signer = %self.auth.signer_address(), "Signing key registered");
        Ok(api_key)
    }

    async fn try_register(&self, primary_addr: &str, primary_key: &str) -> ExchangeResult<String> {
        let proof = self.auth.registration_proof(
            primary_addr,
            primary_key,
            self.config.verifying_contract(),
            expiry_7_days_ms(),
        )?;

        let url = self.config.rest_url(constants::REGISTER_PATH_URL);
        let response = self
            .with_headers(self.http.post(&url))
            .json(&proof.to_body())
            .send()
            .await?;
        let result: RegisterResponse = read_json(response, constants::EXCHANGE_NAME, constants::REGISTER_PATH_URL).await?;

        if let Some(code) = result.code {
            return Err(ExchangeError::AuthenticationFailed(format!(
                "Registration error {}: {}",
                code,
                result.msg.unwrap_or_default()
            )));
        }
        result
            .api_key
            .ok_or_else(|| ExchangeError::InvalidResponse("No apiKey in register response".into()))
    }

    // =========================================================================
    // Listen key
    // =========================================================================

    pub async fn listen_key(&self) -> ExchangeResult<String> {
        self.require_api_key()?;
        let url = self.config.rest_url(constants::LISTEN_KEY_PATH_URL);
        let response = self.with_headers(self.http.post(&url)).send().await?;
        let result: ListenKeyResponse =
            read_json(response, constants::EXCHANGE_NAME, constants::LISTEN_KEY_PATH_URL).await?;

        if let Some(code) = result.code {
            return Err(ExchangeError::AuthenticationFailed(format!(
                "ListenKey error {}: {}",
                code,
                result.msg.unwrap_or_default()
            )));
        }
        result
            .listen_key
            .ok_or_else(|| ExchangeError::InvalidResponse("No listenKey in response".into()))
    }

    /// Extend the current listen key by another hour
    pub async fn renew_listen_key(&self) -> ExchangeResult<()> {
        self.require_api_key()?;
        let url = self.config.rest_url(constants::LISTEN_KEY_PATH_URL);
        let response = self.with_headers(self.http.put(&url)).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(ExchangeError::AuthenticationFailed(format!(
                "ListenKey renewal failed ({}): {}",
                status, text
            )));
        }
        tracing::info!(exchange = "vest", "Listen key extended");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::vest::config::{TEST_PRIMARY_ADDR, TEST_PRIMARY_KEY, TEST_SIGNING_KEY};
    use mockito::Matcher;

    fn rest(server: &mockito::Server, api_key: Option<&str>) -> VestRest {
        let config = VestConfig::new(api_key.map(String::from), TEST_SIGNING_KEY, 1, true)
            .with_primary(TEST_PRIMARY_ADDR, TEST_PRIMARY_KEY)
            .with_base_url(&server.url());
        VestRest::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_register_installs_api_key() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/register")
            .match_header("xrestservermm", "restserver1")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "primaryAddr": TEST_PRIMARY_ADDR.to_lowercase(),
                "networkType": 0
            })))
            .with_status(200)
            .with_body(r#"{"apiKey":"fresh-key"}"#)
            .create_async()
            .await;

        let client = rest(&server, None);
        assert_eq!(client.register().await.unwrap(), "fresh-key");
        assert_eq!(client.auth().api_key().as_deref(), Some("fresh-key"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_private_calls_need_api_key() {
        let server = mockito::Server::new_async().await;
        let client = rest(&server, None);
        let err = client.listen_key().await.unwrap_err();
        assert!(matches!(err, ExchangeError::AuthenticationFailed(_)));
    }

    #[tokio::test]
    async fn test_listen_key_and_headers() {
        let mut server = mockito::Server::new_async().await;
        let create = server
            .mock("POST", "/account/listenKey")
            .match_header("X-API-KEY", "jwt")
            .with_body(r#"{"listenKey":"lk-1"}"#)
            .create_async()
            .await;
        let renew = server
            .mock("PUT", "/account/listenKey")
            .match_header("X-API-KEY", "jwt")
            .with_body("{}")
            .create_async()
            .await;

        let client = rest(&server, Some("jwt"));
        assert_eq!(client.listen_key().await.unwrap(), "lk-1");
        client.renew_listen_key().await.unwrap();
        create.assert_async().await;
        renew.assert_async().await;
    }

    #[tokio::test]
    async fn test_private_get_surfaces_error_code() {
        let mut server = mockito::Server::new_async().await;
        let _m = server
            .mock("GET", "/account")
            .match_query(Matcher::Any)
            .with_body(r#"{"code":1003,"msg":"expired"}"#)
            .create_async()
            .await;

        let client = rest(&server, Some("jwt"));
        let err = client.get_private("/account", &[("time", "1".into())]).await.unwrap_err();
        assert!(err.to_string().contains("expired"));
    }
}
