//! Nado REST client
//!
//! Thin wrapper over the gateway (`/query`, `/execute`, `/symbols`) and the
//! archive indexer. Shared by the connector and the order book data source.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::adapters::errors::{ExchangeError, ExchangeResult};
use crate::adapters::shared::read_json;
use crate::adapters::types::create_http_client;

use super::config::NadoConfig;
use super::constants;
use super::types::{AllProductsData, GatewayResponse, NadoMarket, SymbolEntry};

#[derive(Clone)]
pub struct NadoRest {
    http: reqwest::Client,
    config: Arc<NadoConfig>,
}

impl NadoRest {
    pub fn new(config: NadoConfig) -> Self {
        Self {
            http: create_http_client(constants::EXCHANGE_NAME),
            config: Arc::new(config),
        }
    }

    pub fn config(&self) -> &NadoConfig {
        &self.config
    }

    /// GET `/query` with `type=...` and extra parameters, raw JSON
    pub async fn query_raw<T: DeserializeOwned>(
        &self,
        request_type: &str,
        params: &[(&str, String)],
    ) -> ExchangeResult<T> {
        let url = self.config.rest_url(constants::QUERY_PATH_URL);
        let mut query: Vec<(&str, String)> = vec![("type", request_type.to_string())];
        query.extend(params.iter().cloned());

        tracing::debug!(exchange = "nado", request = %request_type, "GET {}", url);
        let response = self.http.get(&url).query(&query).send().await?;
        read_json(response, constants::EXCHANGE_NAME, request_type).await
    }

    /// GET `/query` and unwrap the `data` of a successful response
    pub async fn query<T: DeserializeOwned>(
        &self,
        request_type: &str,
        params: &[(&str, String)],
    ) -> ExchangeResult<T> {
        let response: GatewayResponse<T> = self.query_raw(request_type, params).await?;
        response.into_data(request_type)
    }

    /// POST a signed execute to `/execute`; the raw response is returned
    /// so callers can inspect `status` and `error_code`
    pub async fn execute(&self, method: &str, body: &Value) -> ExchangeResult<Value> {
        let url = self.config.rest_url(constants::POST_PATH_URL);
        tracing::debug!(exchange = "nado", method = %method, "POST {}", url);
        let response = self.http.post(&url).json(body).send().await?;
        read_json(response, constants::EXCHANGE_NAME, method).await
    }

    /// POST a query to the archive indexer
    pub async fn indexer<T: DeserializeOwned>(&self, body: &Value) -> ExchangeResult<T> {
        let url = self.config.indexer_url();
        tracing::debug!(exchange = "nado", "POST {} body={}", url, body);
        let response = self.http.post(&url).json(body).send().await?;
        read_json(response, constants::EXCHANGE_NAME, constants::INDEXER_PATH_URL).await
    }

    /// GET `/symbols`; an object carrying `status` is an error reply
    pub async fn symbols(&self) -> ExchangeResult<Vec<SymbolEntry>> {
        let url = self.config.rest_url(constants::SYMBOLS_PATH_URL);
        let response = self.http.get(&url).send().await?;
        let raw: Value = read_json(response, constants::EXCHANGE_NAME, constants::SYMBOLS_PATH_URL).await?;

        let entries = match raw {
            Value::Object(ref map) if map.contains_key("status") => {
                return Err(ExchangeError::Io(format!("Unable to get Nado symbols: {}", raw)));
            }
            Value::Object(mut map) => match map.remove("symbols") {
                Some(Value::Object(by_name)) => by_name.into_iter().map(|(_, v)| v).collect(),
                Some(Value::Array(list)) => list,
                _ => Vec::new(),
            },
            Value::Array(list) => list,
            other => {
                return Err(ExchangeError::InvalidResponse(format!("Unexpected symbols payload: {}", other)));
            }
        };

        Ok(entries
            .into_iter()
            .filter_map(|entry| match serde_json::from_value::<SymbolEntry>(entry.clone()) {
                Ok(symbol) => Some(symbol),
                Err(e) => {
                    tracing::warn!(exchange = "nado", entry = %entry, error = %e, "Skipping symbol entry");
                    None
                }
            })
            .collect())
    }

    /// Join `all_products` perp products with `/symbols` by product id
    pub async fn load_markets(&self) -> ExchangeResult<(BTreeMap<u32, NadoMarket>, Vec<SymbolEntry>)> {
        let products: AllProductsData = self.query(constants::ALL_PRODUCTS_REQUEST_TYPE, &[]).await?;
        let symbols = self.symbols().await?;

        let markets = products
            .perp_products
            .iter()
            .filter_map(|product| {
                symbols
                    .iter()
                    .find(|s| s.product_id == product.product_id)
                    .map(|symbol| (product.product_id, NadoMarket::from_product(product, symbol)))
            })
            .collect::<BTreeMap<_, _>>();

        tracing::info!(exchange = "nado", markets = markets.len(), "Loaded market info");
        Ok((markets, symbols))
    }
}
