//! Integration tests for `WbClient` against a `wiremock` server.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sewmart_channels::wb::{StockUpdate, WbClient};
use sewmart_channels::{ChannelError, ClientConfig};

fn test_client(server: &MockServer) -> WbClient {
    let config = ClientConfig {
        api_base: server.uri(),
        timeout_secs: 5,
        user_agent: "sewmart-test/0.1".to_string(),
        max_retries: 0,
        backoff_base_ms: 0,
    };
    WbClient::new(config, "wb-token").expect("client builds")
}

#[tokio::test]
async fn list_new_orders_sends_token_and_parses_orders() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/orders/new"))
        .and(header("authorization", "wb-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "orders": [
                {
                    "id": 9001,
                    "rid": "r-1",
                    "article": "BOBBIN-CASE-15",
                    "createdAt": "2026-03-01T08:30:00Z",
                    "convertedPrice": 45_900,
                    "warehouseId": 55
                }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let orders = client.list_new_orders().await.expect("orders listed");

    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].id, 9001);
    assert_eq!(orders[0].article, "BOBBIN-CASE-15");
}

#[tokio::test]
async fn get_statuses_skips_the_call_for_no_ids() {
    let server = MockServer::start().await;
    let client = test_client(&server);

    let statuses = client.get_statuses(&[]).await.expect("empty ok");

    assert!(statuses.is_empty());
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn get_statuses_parses_both_tracks() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/v3/orders/status"))
        .and(body_partial_json(json!({"orders": [9001, 9002]})))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "orders": [
                {"id": 9001, "supplierStatus": "confirm", "wbStatus": "waiting"},
                {"id": 9002, "supplierStatus": "complete", "wbStatus": "sold"}
            ]
        })))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let statuses = client
        .get_statuses(&[9001, 9002])
        .await
        .expect("statuses fetched");

    assert_eq!(statuses.len(), 2);
    assert_eq!(statuses[0].supplier_status, "confirm");
    assert_eq!(statuses[1].wb_status, "sold");
}

#[tokio::test]
async fn cancel_order_patches_the_order() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/api/v3/orders/9001/cancel"))
        .and(header("authorization", "wb-token"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let result = client.cancel_order(9001).await;

    assert!(result.is_ok(), "expected Ok, got: {result:?}");
}

#[tokio::test]
async fn update_stocks_accepts_204_and_skips_empty_batches() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/api/v3/stocks/55"))
        .and(body_partial_json(json!({
            "stocks": [{"sku": "2000123456789", "amount": 7}]
        })))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);

    client
        .update_stocks(
            55,
            &[StockUpdate {
                sku: "2000123456789".to_string(),
                amount: 7,
            }],
        )
        .await
        .expect("stocks updated");

    // An empty batch must not produce a request.
    client.update_stocks(55, &[]).await.expect("empty batch ok");
    assert_eq!(server.received_requests().await.unwrap().len(), 1);
}

#[tokio::test]
async fn unauthorized_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/v3/orders/new"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let config = ClientConfig {
        api_base: server.uri(),
        timeout_secs: 5,
        user_agent: "sewmart-test/0.1".to_string(),
        max_retries: 3,
        backoff_base_ms: 0,
    };
    let client = WbClient::new(config, "stale-token").expect("client builds");
    let result = client.list_new_orders().await;

    assert!(
        matches!(result, Err(ChannelError::Unauthorized { .. })),
        "expected Unauthorized, got: {result:?}"
    );
}
