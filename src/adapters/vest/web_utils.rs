//! Vest URL builders and market info validation

use serde_json::Value;

use super::constants;

pub fn rest_url(path: &str, domain: &str) -> String {
    format!("{}{}", constants::rest_base_url(domain), path)
}

/// Public websocket URL routed to the account group's server
pub fn public_ws_url(domain: &str, account_group: u8) -> String {
    ws_url_with_query(constants::wss_base_url(domain), account_group)
}

pub fn private_ws_url(listen_key: &str, domain: &str, account_group: u8) -> String {
    format!("{}&listenKey={}", public_ws_url(domain, account_group), listen_key)
}

/// Append the version and server routing query to any websocket base
pub fn ws_url_with_query(base: &str, account_group: u8) -> String {
    format!(
        "{}?version=1.0&xwebsocketserver=restserver{g}&websocketserver=restserver{g}",
        base,
        g = account_group
    )
}

/// A market is valid when its upper-cased `status` is `TRADING`
pub fn is_exchange_information_valid(market_info: &Value) -> bool {
    market_info
        .get("status")
        .and_then(Value::as_str)
        .map(|s| s.to_uppercase() == constants::SYMBOL_STATUS_TRADING)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_rest_urls() {
        assert_eq!(
            rest_url("/exchangeInfo", constants::DEFAULT_DOMAIN),
            "https://server-prod.hz.vestmarkets.com/v2/exchangeInfo"
        );
        assert_eq!(
            rest_url("/account", constants::TESTNET_DOMAIN),
            "https://server-dev.hz.vestmarkets.com/v2/account"
        );
    }

    #[test]
    fn test_ws_urls() {
        assert_eq!(
            public_ws_url(constants::DEFAULT_DOMAIN, 3),
            "wss://ws-prod.hz.vestmarkets.com/ws-api?version=1.0&xwebsocketserver=restserver3&websocketserver=restserver3"
        );
        let private = private_ws_url("abc", constants::TESTNET_DOMAIN, 0);
        assert!(private.starts_with("wss://ws-dev.hz.vestmarkets.com/ws-api?version=1.0"));
        assert!(private.ends_with("&listenKey=abc"));
    }

    #[test]
    fn test_exchange_information_validity() {
        assert!(is_exchange_information_valid(&json!({"status": "TRADING"})));
        assert!(is_exchange_information_valid(&json!({"status": "trading"})));
        assert!(!is_exchange_information_valid(&json!({"status": "HALT"})));
        assert!(!is_exchange_information_valid(&json!({"symbol": "BTC-PERP"})));
    }
}
