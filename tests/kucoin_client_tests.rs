// Integration tests for the KuCoin REST client against a mock server

mod common;

use common::create_test_keys;
use mockito::Matcher;
use serde_json::json;
use tick_bots::clients::{ExchangeGateway, KucoinClient};
use tick_bots::core::types::{OrderSide, OrderStatus, OrderType};
use tick_bots::TradingError;

fn client(server: &mockito::ServerGuard) -> KucoinClient {
    KucoinClient::new(&create_test_keys())
        .expect("Failed to build client")
        .with_base_url(server.url())
}

async fn mock_symbol(server: &mut mockito::ServerGuard) -> mockito::Mock {
    server
        .mock("GET", "/api/v2/symbols/BTC-USDT")
        .with_status(200)
        .with_body(
            json!({
                "code": "200000",
                "data": {
                    "symbol": "BTC-USDT",
                    "baseIncrement": "0.00000001",
                    "priceIncrement": "0.1",
                    "baseMinSize": "0.00001"
                }
            })
            .to_string(),
        )
        .create_async()
        .await
}

#[test]
fn test_passphrase_is_required() {
    let mut keys = create_test_keys();
    keys.password = None;
    assert!(matches!(KucoinClient::new(&keys), Err(TradingError::ConfigMissing(_))));
}

#[tokio::test]
async fn test_ticker_and_best_bid_ask() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", Matcher::Regex("^/api/v1/market/orderbook/level1".to_string()))
        .match_query(Matcher::UrlEncoded("symbol".into(), "BTC-USDT".into()))
        .with_status(200)
        .with_body(
            json!({
                "code": "200000",
                "data": {"price": "30000.5", "bestBid": "30000.1", "bestAsk": "30000.9", "size": "0.1"}
            })
            .to_string(),
        )
        .expect(2)
        .create_async()
        .await;

    let client = client(&server);
    let ticker = client.fetch_ticker("BTC/USDT").await.unwrap();
    assert_eq!(ticker.last, 30000.5);

    let book = client.fetch_best_bid_ask("BTC/USDT").await.unwrap();
    assert_eq!(book.bid, 30000.1);
    assert_eq!(book.ask, 30000.9);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_balance_is_signed_and_sums_trade_accounts() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("GET", "/api/v1/accounts")
        .match_header("KC-API-KEY", "test-key")
        .match_header("KC-API-KEY-VERSION", "2")
        .match_header("KC-API-SIGN", Matcher::Any)
        .match_header("KC-API-TIMESTAMP", Matcher::Regex("^[0-9]{13}$".to_string()))
        .match_header("KC-API-PASSPHRASE", Matcher::Any)
        .with_status(200)
        .with_body(
            json!({
                "code": "200000",
                "data": [
                    {"currency": "BTC", "type": "trade", "balance": "0.5", "available": "0.4", "holds": "0.1"},
                    {"currency": "USDT", "type": "trade", "balance": "1200", "available": "1200", "holds": "0"},
                    {"currency": "USDT", "type": "main", "balance": "999", "available": "999", "holds": "0"}
                ]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let balance = client(&server).fetch_balance().await.unwrap();
    assert_eq!(balance.total("BTC"), 0.5);
    assert_eq!(balance.total("USDT"), 1200.0);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_fetch_order_status() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/v1/orders/abc")
        .with_status(200)
        .with_body(
            json!({
                "code": "200000",
                "data": {
                    "id": "abc", "symbol": "BTC-USDT", "type": "limit", "side": "buy",
                    "price": "29000", "size": "0.5", "dealSize": "0.5",
                    "isActive": false, "cancelExist": false
                }
            })
            .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("GET", "/api/v1/orders/gone")
        .with_status(404)
        .with_body(json!({"code": "400100", "msg": "order not exist."}).to_string())
        .create_async()
        .await;

    let client = client(&server);
    let order = client.fetch_order("abc", "BTC/USDT").await.unwrap();
    assert_eq!(order.status, OrderStatus::Closed);
    assert_eq!(order.side, OrderSide::Buy);
    assert_eq!(order.filled, 0.5);
    assert_eq!(order.symbol, "BTC/USDT");

    let err = client.fetch_order("gone", "BTC/USDT").await.unwrap_err();
    assert!(matches!(err, TradingError::OrderNotFound(ref id) if id == "gone"));
}

#[tokio::test]
async fn test_cancel_missing_order() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("DELETE", "/api/v1/orders/done")
        .with_status(400)
        .with_body(json!({"code": "400100", "msg": "order_not_exist_or_not_allow_to_cancel"}).to_string())
        .create_async()
        .await;
    server
        .mock("DELETE", "/api/v1/orders/live")
        .with_status(200)
        .with_body(json!({"code": "200000", "data": {"cancelledOrderIds": ["live"]}}).to_string())
        .create_async()
        .await;

    let client = client(&server);
    assert!(client.cancel_order("live", "BTC/USDT").await.is_ok());
    let err = client.cancel_order("done", "BTC/USDT").await.unwrap_err();
    assert!(matches!(err, TradingError::OrderNotFound(ref id) if id == "done"));
}

#[tokio::test]
async fn test_create_order_applies_increments() {
    let mut server = mockito::Server::new_async().await;
    let symbol = mock_symbol(&mut server).await;
    let create = server
        .mock("POST", "/api/v1/orders")
        .match_body(Matcher::PartialJson(json!({
            "side": "buy",
            "symbol": "BTC-USDT",
            "type": "limit",
            "size": "0.00344827",
            "price": "29000.0"
        })))
        .with_status(200)
        .with_body(json!({"code": "200000", "data": {"orderId": "new-1"}}).to_string())
        .expect(2)
        .create_async()
        .await;

    let client = client(&server);
    let order = client
        .create_order("BTC/USDT", OrderType::Limit, OrderSide::Buy, 100.0 / 29000.0, 29000.0)
        .await
        .unwrap();
    assert_eq!(order.id, "new-1");
    assert_eq!(order.status, OrderStatus::Open);
    assert_eq!(order.amount, 0.00344827);

    // symbol rules are cached after the first order
    client
        .create_order("BTC/USDT", OrderType::Limit, OrderSide::Buy, 100.0 / 29000.0, 29000.0)
        .await
        .unwrap();
    symbol.assert_async().await;
    create.assert_async().await;
}

#[tokio::test]
async fn test_create_order_below_min_size() {
    let mut server = mockito::Server::new_async().await;
    mock_symbol(&mut server).await;

    let err = client(&server)
        .create_order("BTC/USDT", OrderType::Limit, OrderSide::Buy, 0.000001, 29000.0)
        .await
        .unwrap_err();
    assert!(matches!(err, TradingError::OrderRejected(_)));
}

#[tokio::test]
async fn test_create_order_insufficient_funds() {
    let mut server = mockito::Server::new_async().await;
    mock_symbol(&mut server).await;
    server
        .mock("POST", "/api/v1/orders")
        .with_status(200)
        .with_body(json!({"code": "200004", "msg": "Balance insufficient!"}).to_string())
        .create_async()
        .await;

    let err = client(&server)
        .create_order("BTC/USDT", OrderType::Limit, OrderSide::Sell, 1.0, 29000.0)
        .await
        .unwrap_err();
    assert!(matches!(err, TradingError::InsufficientFunds(_)));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn test_open_orders() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", Matcher::Regex("^/api/v1/orders".to_string()))
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("status".into(), "active".into()),
            Matcher::UrlEncoded("symbol".into(), "ETH-USDT".into()),
        ]))
        .with_status(200)
        .with_body(
            json!({
                "code": "200000",
                "data": {
                    "currentPage": 1,
                    "items": [
                        {"id": "o1", "symbol": "ETH-USDT", "type": "limit", "side": "sell",
                         "price": "2100", "size": "0.1", "dealSize": "0", "isActive": true},
                        {"id": "o2", "symbol": "ETH-USDT", "type": "limit", "side": "buy",
                         "price": "1900", "size": "0.2", "dealSize": "0.05", "isActive": true}
                    ]
                }
            })
            .to_string(),
        )
        .create_async()
        .await;

    let orders = client(&server).fetch_open_orders("ETH/USDT").await.unwrap();
    assert_eq!(orders.len(), 2);
    assert!(orders.iter().all(|o| o.status == OrderStatus::Open));
    assert_eq!(orders[1].filled, 0.05);
    assert_eq!(orders[0].price, 2100.0);
}

#[tokio::test]
async fn test_rate_limit_is_retryable() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/v1/accounts")
        .with_status(429)
        .with_body(json!({"code": "429000", "msg": "Too Many Requests"}).to_string())
        .create_async()
        .await;

    let err = client(&server).fetch_balance().await.unwrap_err();
    assert!(matches!(err, TradingError::ApiRateLimit(_)));
    assert!(!err.is_fatal());
}
