//! Vest connector against a mock REST server
//!
//! Covers signing key registration, trading rules, signed order placement,
//! `account_private` ORDER events, status polling and cancellation.

use mockito::{Matcher, Mock, ServerGuard};
use rust_decimal::Decimal;
use serde_json::json;

use perp_connectors::adapters::types::{
    ConnectorEvent, OrderRequest, OrderState, OrderType, PositionAction, PositionSide, TradeType,
};
use perp_connectors::adapters::vest::{VestConfig, VestConnector};
use perp_connectors::adapters::PerpetualConnector;

/// Hardhat accounts #1 (primary) and #2 (signing), well-known public test keys
const PRIMARY_ADDR: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";
const PRIMARY_KEY: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";
const SIGNING_KEY: &str = "0x5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a";

async fn mock_exchange_info(server: &mut ServerGuard) -> Mock {
    server
        .mock("GET", "/exchangeInfo")
        .with_status(200)
        .with_body(
            json!({"symbols": [
                {
                    "symbol": "BTC-PERP",
                    "status": "TRADING",
                    "stepSize": "0.001",
                    "tickSize": "0.1",
                    "minQty": "0.001",
                    "pricePrecision": 1
                },
                {"symbol": "DOGE-PERP", "status": "HALT"}
            ]})
            .to_string(),
        )
        .create_async()
        .await
}

fn connector(server: &ServerGuard, api_key: Option<&str>) -> VestConnector {
    let config = VestConfig::new(api_key.map(String::from), SIGNING_KEY, 1, true)
        .with_primary(PRIMARY_ADDR, PRIMARY_KEY)
        .with_base_url(&server.url());
    VestConnector::new(config, vec!["BTC-USDC".to_string()]).unwrap()
}

fn limit_sell(client_order_id: &str) -> OrderRequest {
    OrderRequest {
        client_order_id: client_order_id.to_string(),
        trading_pair: "BTC-USDC".to_string(),
        amount: Decimal::new(12345, 4),
        trade_type: TradeType::Sell,
        order_type: OrderType::Limit,
        price: Decimal::new(6000012, 2),
        position_action: PositionAction::Open,
    }
}

#[tokio::test]
async fn test_start_network_registers_and_loads_rules() {
    let mut server = mockito::Server::new_async().await;
    let register = server
        .mock("POST", "/register")
        .with_status(200)
        .with_body(r#"{"apiKey":"registered-key"}"#)
        .create_async()
        .await;
    let _info = mock_exchange_info(&mut server).await;

    let mut c = connector(&server, None);
    c.start_network().await.unwrap();
    register.assert_async().await;

    assert_eq!(c.rest().auth().api_key().as_deref(), Some("registered-key"));
    assert_eq!(c.trading_rules().len(), 1);
    let rule = &c.trading_rules()["BTC-USDC"];
    assert_eq!(rule.min_base_amount_increment, Decimal::new(1, 3));
    assert_eq!(rule.min_price_increment, Decimal::new(1, 1));
    assert_eq!(c.exchange_symbol("BTC-USDC"), "BTC-PERP");
}

#[tokio::test]
async fn test_place_order_is_signed_and_quantized() {
    let mut server = mockito::Server::new_async().await;
    let _info = mock_exchange_info(&mut server).await;
    let orders = server
        .mock("POST", "/orders")
        .match_header("X-API-KEY", "jwt")
        .match_header("xrestservermm", "restserver1")
        .match_body(Matcher::AllOf(vec![
            Matcher::PartialJson(json!({
                "order": {
                    "symbol": "BTC-PERP",
                    "isBuy": false,
                    "size": "1.234",
                    "orderType": "LIMIT",
                    "limitPrice": "60000.1",
                    "reduceOnly": false
                },
                "recvWindow": 60000
            })),
            Matcher::Regex(r#""signature":"0x[0-9a-f]{130}""#.into()),
        ]))
        .with_status(200)
        .with_body(r#"{"id":"0xorder1"}"#)
        .create_async()
        .await;

    let mut c = connector(&server, Some("jwt"));
    c.start_network().await.unwrap();

    let placed = c.place_order(limit_sell("vest-1")).await.unwrap();
    orders.assert_async().await;
    assert_eq!(placed.exchange_order_id, "0xorder1");
    assert_eq!(c.order_tracker().get("vest-1").unwrap().current_state, OrderState::Open);
}

#[tokio::test]
async fn test_order_events_fill_then_complete() {
    let mut server = mockito::Server::new_async().await;
    let _info = mock_exchange_info(&mut server).await;
    let _orders = server
        .mock("POST", "/orders")
        .with_status(200)
        .with_body(r#"{"id":"0xorder2"}"#)
        .create_async()
        .await;

    let mut c = connector(&server, Some("jwt"));
    c.start_network().await.unwrap();
    c.place_order(limit_sell("vest-2")).await.unwrap();

    let partial = json!({
        "channel": "account_private",
        "data": {"event": "ORDER", "args": {
            "id": "0xorder2",
            "status": "PARTIALLY_FILLED",
            "lastFilledSize": "1",
            "lastFilledPrice": "60000",
            "fees": "1.5",
            "nonce": 1,
            "postTime": 1700000000000u64
        }}
    });
    let events = c.process_user_event(&partial).await.unwrap();
    assert_eq!(events.len(), 2);
    match &events[0] {
        ConnectorEvent::Trade(trade) => {
            assert_eq!(trade.trade_id, "0xorder2-1");
            assert_eq!(trade.fill_quote_amount, Decimal::from(60_000));
            assert_eq!(trade.fee.flat_fees[0].token, "USDC");
            assert_eq!(trade.fee.flat_fees[0].amount, Decimal::new(15, 1));
        }
        other => panic!("expected trade, got {:?}", other),
    }
    assert_eq!(
        c.order_tracker().get("vest-2").unwrap().current_state,
        OrderState::PartiallyFilled
    );

    let filled = json!({
        "channel": "account_private",
        "data": {"event": "ORDER", "args": {
            "id": "0xorder2",
            "status": "FILLED",
            "lastFilledSize": "0.234",
            "lastFilledPrice": "60000",
            "fees": "0.35",
            "nonce": 2,
            "postTime": 1700000001000u64
        }}
    });
    c.process_user_event(&filled).await.unwrap();
    let tracked = c.order_tracker().get("vest-2").unwrap();
    assert_eq!(tracked.current_state, OrderState::Filled);
    assert_eq!(tracked.executed_amount_base, Decimal::new(1234, 3));

    let other_channel = json!({"channel": "tickers", "data": []});
    assert!(c.process_user_event(&other_channel).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_status_and_cancel() {
    let mut server = mockito::Server::new_async().await;
    let _info = mock_exchange_info(&mut server).await;
    let _orders = server
        .mock("POST", "/orders")
        .with_status(200)
        .with_body(r#"{"id":"0xorder3"}"#)
        .create_async()
        .await;
    let _status = server
        .mock("GET", "/orders")
        .match_query(Matcher::UrlEncoded("id".into(), "0xorder3".into()))
        .with_status(200)
        .with_body(r#"[{"id":"0xorder3","status":"NEW"}]"#)
        .create_async()
        .await;
    let cancel = server
        .mock("POST", "/orders/cancel")
        .match_body(Matcher::PartialJson(json!({"order": {"id": "0xorder3"}})))
        .with_status(200)
        .with_body(r#"{"id":"0xorder3"}"#)
        .create_async()
        .await;

    let mut c = connector(&server, Some("jwt"));
    c.start_network().await.unwrap();
    c.place_order(limit_sell("vest-3")).await.unwrap();

    let tracked = c.order_tracker().get("vest-3").unwrap().clone();
    let update = c.request_order_status(&tracked).await.unwrap();
    assert_eq!(update.new_state, OrderState::Open);

    assert!(c.cancel_order("vest-3").await.unwrap());
    cancel.assert_async().await;
    assert_eq!(c.order_tracker().get("vest-3").unwrap().current_state, OrderState::Canceled);
}

#[tokio::test]
async fn test_balances_and_positions() {
    let mut server = mockito::Server::new_async().await;
    let _account = server
        .mock("GET", "/account")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(
            json!({
                "balances": [{"asset": "USDC", "total": "1000", "locked": "250"}],
                "positions": [
                    {"symbol": "BTC-PERP", "isLong": false, "size": "0.5", "entryPrice": "61000", "unrealizedPnl": "-12.5"},
                    {"symbol": "ETH-PERP", "isLong": true, "size": "2"}
                ],
                "leverages": [{"symbol": "BTC-PERP", "value": 10}]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let mut c = connector(&server, Some("jwt"));
    c.update_balances().await.unwrap();
    c.update_positions().await.unwrap();

    let usdc = &c.balances()["USDC"];
    assert_eq!(usdc.total, Decimal::from(1000));
    assert_eq!(usdc.available, Decimal::from(750));

    assert_eq!(c.positions().len(), 1);
    let btc = &c.positions()["BTC-USDC"];
    assert_eq!(btc.position_side, PositionSide::Short);
    assert_eq!(btc.amount, Decimal::new(-5, 1));
    assert_eq!(btc.leverage, Decimal::from(10));
}
