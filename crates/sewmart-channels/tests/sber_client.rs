//! Integration tests for `SberClient` against a `wiremock` server.

use serde_json::json;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sewmart_channels::sber::{ItemLine, SberClient};
use sewmart_channels::{ChannelError, ClientConfig};
use sewmart_core::OrderStatus;

fn test_client(server: &MockServer) -> SberClient {
    let config = ClientConfig {
        api_base: server.uri(),
        timeout_secs: 5,
        user_agent: "sewmart-test/0.1".to_string(),
        max_retries: 0,
        backoff_base_ms: 0,
    };
    SberClient::new(config, "sber-token").expect("client builds")
}

fn success_body() -> serde_json::Value {
    json!({"data": {"success": 1}, "meta": {}})
}

#[tokio::test]
async fn confirm_sends_token_and_item_lines_in_envelope() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/market/v1/orderService/order/confirm"))
        .and(body_partial_json(json!({
            "data": {
                "token": "sber-token",
                "shipments": [{
                    "shipmentId": "SBM-777",
                    "items": [{"itemIndex": 1, "quantity": 2}]
                }]
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(&success_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let result = client
        .confirm(
            "SBM-777",
            &[ItemLine {
                item_index: 1,
                quantity: 2,
            }],
        )
        .await;

    assert!(result.is_ok(), "expected Ok, got: {result:?}");
}

#[tokio::test]
async fn packing_attaches_order_code() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/market/v1/orderService/order/packing"))
        .and(body_partial_json(json!({
            "data": {
                "shipments": [{"shipmentId": "SBM-777", "orderCode": "SW-1042"}]
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(&success_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let result = client.packing("SBM-777", "SW-1042").await;

    assert!(result.is_ok(), "expected Ok, got: {result:?}");
}

#[tokio::test]
async fn reject_sends_out_of_stock_reason() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/market/v1/orderService/order/reject"))
        .and(body_partial_json(json!({
            "data": {
                "shipments": [{"shipmentId": "SBM-778", "reason": {"type": "OUT_OF_STOCK"}}]
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(&success_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let result = client.reject("SBM-778").await;

    assert!(result.is_ok(), "expected Ok, got: {result:?}");
}

#[tokio::test]
async fn application_level_failure_becomes_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/market/v1/orderService/order/shipping"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "data": {"success": 0, "error": {"message": "shipment already closed"}},
            "meta": {}
        })))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let result = client.shipping("SBM-779").await;

    match result {
        Err(ChannelError::Api(message)) => {
            assert_eq!(message, "shipment already closed");
        }
        other => panic!("expected Api error, got: {other:?}"),
    }
}

#[tokio::test]
async fn push_status_routes_to_the_matching_action() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/market/v1/orderService/order/shipping"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&success_body()))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let result = client
        .push_status("SBM-780", "SW-1043", OrderStatus::Shipped, &[])
        .await;

    assert!(result.is_ok(), "expected Ok, got: {result:?}");
}

#[tokio::test]
async fn push_status_rejects_states_without_an_action() {
    let server = MockServer::start().await;
    let client = test_client(&server);

    let result = client
        .push_status("SBM-781", "SW-1044", OrderStatus::Delivered, &[])
        .await;

    assert!(
        matches!(result, Err(ChannelError::Unpushable { channel: "sber", .. })),
        "expected Unpushable, got: {result:?}"
    );
    assert!(server.received_requests().await.unwrap().is_empty());
}
