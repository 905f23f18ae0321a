//! Nado connector against a mock gateway
//!
//! Drives market loading, order placement, fills from the user stream and
//! cancellation through `PerpetualConnector`, with every endpoint served by
//! a local mockito server.

use mockito::{Matcher, Mock, ServerGuard};
use rust_decimal::Decimal;
use serde_json::json;

use perp_connectors::adapters::nado::{NadoConfig, NadoConnector};
use perp_connectors::adapters::types::{
    new_client_order_id, ConnectorEvent, OrderRequest, OrderState, OrderType, PositionAction, TradeType,
};
use perp_connectors::adapters::{ExchangeError, PerpetualConnector};

/// Hardhat account #0 (well-known, public test key)
const PRIVATE_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
const ADDRESS: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";

async fn query_mock(server: &mut ServerGuard, request_type: &str, data: serde_json::Value) -> Mock {
    server
        .mock("GET", "/query")
        .match_query(Matcher::UrlEncoded("type".into(), request_type.into()))
        .with_status(200)
        .with_body(json!({"status": "success", "data": data}).to_string())
        .create_async()
        .await
}

/// Products, symbols and fee rates for a single BTC perp (product 2)
async fn mock_markets(server: &mut ServerGuard) -> Vec<Mock> {
    let mut fee_maker = vec!["0"; 3];
    let mut fee_taker = vec!["0"; 3];
    fee_maker[2] = "100000000000000";
    fee_taker[2] = "400000000000000";

    vec![
        query_mock(
            server,
            "all_products",
            json!({
                "perp_products": [{
                    "product_id": 2,
                    "oracle_price_x18": "50000000000000000000000",
                    "book_info": {
                        "size_increment": "1000000000000000",
                        "price_increment_x18": "1000000000000000000",
                        "min_size": "10000000000000000000"
                    }
                }]
            }),
        )
        .await,
        server
            .mock("GET", "/symbols")
            .with_status(200)
            .with_body(
                json!({"symbols": {
                    "USDT0": {"product_id": 0, "symbol": "USDT0"},
                    "BTC-PERP": {"product_id": 2, "symbol": "BTC-PERP"}
                }})
                .to_string(),
            )
            .create_async()
            .await,
        query_mock(
            server,
            "fee_rates",
            json!({"maker_fee_rates_x18": fee_maker, "taker_fee_rates_x18": fee_taker}),
        )
        .await,
    ]
}

async fn mock_account(server: &mut ServerGuard) -> Vec<Mock> {
    vec![
        query_mock(
            server,
            "subaccount_info",
            json!({
                "spot_balances": [{"product_id": 0, "balance": {"amount": "1500000000000000000000"}}],
                "perp_balances": [{
                    "product_id": 2,
                    "balance": {
                        "amount": "-20000000000000000",
                        "v_quote_balance": "1000000000000000000000"
                    }
                }],
                "perp_products": [{"product_id": 2, "oracle_price_x18": "49000000000000000000000"}]
            }),
        )
        .await,
        query_mock(server, "max_withdrawable", json!({"max_withdrawable": "1200000000000000000000"})).await,
    ]
}

fn connector(server: &ServerGuard) -> NadoConnector {
    let config = NadoConfig::new(ADDRESS, PRIVATE_KEY, true).with_base_url(&server.url());
    NadoConnector::new(config, vec!["BTC-USDT0".to_string()]).unwrap()
}

fn limit_buy(client_order_id: &str) -> OrderRequest {
    OrderRequest {
        client_order_id: client_order_id.to_string(),
        trading_pair: "BTC-USDT0".to_string(),
        amount: Decimal::new(1, 2),
        trade_type: TradeType::Buy,
        order_type: OrderType::Limit,
        price: Decimal::from(50_000),
        position_action: PositionAction::Open,
    }
}

#[tokio::test]
async fn test_start_network_loads_rules_and_fees() {
    let mut server = mockito::Server::new_async().await;
    let _markets = mock_markets(&mut server).await;

    let mut c = connector(&server);
    c.start_network().await.unwrap();

    let rule = &c.trading_rules()["BTC-USDT0"];
    assert_eq!(rule.min_base_amount_increment, Decimal::new(1, 3));
    assert_eq!(rule.min_price_increment, Decimal::ONE);
    assert_eq!(rule.min_notional_size, Decimal::from(10));

    let maker = c.get_fee("BTC-USDT0", OrderType::Limit, TradeType::Buy, Decimal::ONE, Decimal::ONE, Some(true));
    let taker = c.get_fee("BTC-USDT0", OrderType::Market, TradeType::Buy, Decimal::ONE, Decimal::ONE, Some(false));
    assert_eq!(maker.percent, Decimal::new(1, 4));
    assert_eq!(taker.percent, Decimal::new(4, 4));
}

#[tokio::test]
async fn test_balances_and_positions() {
    let mut server = mockito::Server::new_async().await;
    let _markets = mock_markets(&mut server).await;
    let _account = mock_account(&mut server).await;

    let mut c = connector(&server);
    c.start_network().await.unwrap();
    c.update_balances().await.unwrap();
    c.update_positions().await.unwrap();

    let usdt = &c.balances()["USDT0"];
    assert_eq!(usdt.total, Decimal::from(1500));
    assert_eq!(usdt.available, Decimal::from(1200));

    let position = &c.positions()["BTC-USDT0"];
    assert_eq!(position.amount, Decimal::new(-2, 2));
    assert_eq!(position.entry_price, Decimal::from(50_000));
    // -0.02 * 49000 + 1000
    assert_eq!(position.unrealized_pnl, Decimal::from(20));
}

#[tokio::test]
async fn test_place_fill_and_cancel() {
    let mut server = mockito::Server::new_async().await;
    let _markets = mock_markets(&mut server).await;
    let _account = mock_account(&mut server).await;
    let place = server
        .mock("POST", "/execute")
        .match_body(Matcher::PartialJson(json!({
            "place_order": {"product_id": 2, "order": {"amount": "10000000000000000"}}
        })))
        .with_status(200)
        .with_body(r#"{"status":"success"}"#)
        .create_async()
        .await;

    let mut c = connector(&server);
    c.start_network().await.unwrap();

    let id = new_client_order_id("x-nado", 32);
    let placed = c.place_order(limit_buy(&id)).await.unwrap();
    place.assert_async().await;
    assert!(placed.exchange_order_id.starts_with("0x"));
    assert_eq!(c.order_tracker().get(&id).unwrap().current_state, OrderState::Open);

    let fill = json!({
        "type": "fill",
        "timestamp": "1700000000000000000",
        "product_id": 2,
        "order_digest": placed.exchange_order_id,
        "filled_qty": "10000000000000000",
        "remaining_qty": "0",
        "price": "50000000000000000000000",
        "is_taker": true
    });
    let events = c.process_user_event(&fill).await.unwrap();
    assert_eq!(events.len(), 2);
    match &events[0] {
        ConnectorEvent::Trade(trade) => {
            assert_eq!(trade.fill_base_amount, Decimal::new(1, 2));
            assert_eq!(trade.fill_quote_amount, Decimal::from(500));
            assert_eq!(trade.fee.percent, Decimal::new(4, 4));
        }
        other => panic!("expected trade, got {:?}", other),
    }
    let tracked = c.order_tracker().get(&id).unwrap();
    assert_eq!(tracked.current_state, OrderState::Filled);
    assert_eq!(tracked.executed_amount_base, Decimal::new(1, 2));

    // a replayed fill is deduplicated by trade id
    c.process_user_event(&fill).await.unwrap();
    assert_eq!(c.order_tracker().get(&id).unwrap().executed_amount_base, Decimal::new(1, 2));
}

#[tokio::test]
async fn test_rejected_order_is_failed() {
    let mut server = mockito::Server::new_async().await;
    let _markets = mock_markets(&mut server).await;
    let _reject = server
        .mock("POST", "/execute")
        .with_status(200)
        .with_body(r#"{"status":"failure","error":"insufficient margin","error_code":2006}"#)
        .create_async()
        .await;

    let mut c = connector(&server);
    c.start_network().await.unwrap();

    let err = c.place_order(limit_buy("x-nado-rejected")).await.unwrap_err();
    assert!(matches!(err, ExchangeError::OrderRejected(_)));
    assert_eq!(
        c.order_tracker().get("x-nado-rejected").unwrap().current_state,
        OrderState::Failed
    );
}

#[tokio::test]
async fn test_cancel_of_unknown_order_counts_as_canceled() {
    let mut server = mockito::Server::new_async().await;
    let _markets = mock_markets(&mut server).await;
    let _account = mock_account(&mut server).await;
    let _place = server
        .mock("POST", "/execute")
        .match_body(Matcher::Regex("place_order".into()))
        .with_status(200)
        .with_body(r#"{"status":"success"}"#)
        .create_async()
        .await;
    let cancel = server
        .mock("POST", "/execute")
        .match_body(Matcher::Regex("cancel_orders".into()))
        .with_status(200)
        .with_body(r#"{"status":"failure","error":"Order not found","error_code":2020}"#)
        .create_async()
        .await;

    let mut c = connector(&server);
    c.start_network().await.unwrap();
    c.place_order(limit_buy("x-nado-cancel")).await.unwrap();

    assert!(c.cancel_order("x-nado-cancel").await.unwrap());
    cancel.assert_async().await;
    assert_eq!(
        c.order_tracker().get("x-nado-cancel").unwrap().current_state,
        OrderState::Canceled
    );
}
