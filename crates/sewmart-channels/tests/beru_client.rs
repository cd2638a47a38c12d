//! Integration tests for `BeruClient::update_order_status`.
//!
//! Uses `wiremock` to stand up a local HTTP server for each test so no
//! real network traffic is made.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sewmart_channels::beru::BeruClient;
use sewmart_channels::{ChannelError, ClientConfig};
use sewmart_core::OrderStatus;

fn test_config(server: &MockServer) -> ClientConfig {
    ClientConfig {
        api_base: server.uri(),
        timeout_secs: 5,
        user_agent: "sewmart-test/0.1".to_string(),
        max_retries: 0,
        backoff_base_ms: 0,
    }
}

fn test_client(server: &MockServer) -> BeruClient {
    BeruClient::new(test_config(server), "token-123", "9955").expect("client builds")
}

#[tokio::test]
async fn update_order_status_puts_mapped_status_with_bearer_token() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/campaigns/9955/orders/1234/status"))
        .and(header("authorization", "Bearer token-123"))
        .and(body_partial_json(json!({
            "order": {"status": "PROCESSING", "substatus": "READY_TO_SHIP"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({"order": {"id": 1234}})))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let result = client.update_order_status(1234, OrderStatus::Assembled).await;

    assert!(result.is_ok(), "expected Ok, got: {result:?}");
}

#[tokio::test]
async fn update_order_status_rejects_statuses_without_a_mapping() {
    let server = MockServer::start().await;
    let client = test_client(&server);

    let result = client.update_order_status(1234, OrderStatus::Delivered).await;

    assert!(
        matches!(result, Err(ChannelError::Unpushable { channel: "beru", .. })),
        "expected Unpushable, got: {result:?}"
    );
    // Nothing must be sent for an unmappable status.
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn update_order_status_propagates_unauthorized() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/campaigns/9955/orders/1234/status"))
        .respond_with(ResponseTemplate::new(403))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let result = client.update_order_status(1234, OrderStatus::Confirmed).await;

    assert!(
        matches!(result, Err(ChannelError::Unauthorized { .. })),
        "expected Unauthorized, got: {result:?}"
    );
}

#[tokio::test]
async fn update_order_status_retries_503_and_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("PUT"))
        .and(path("/campaigns/9955/orders/1234/status"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("PUT"))
        .and(path("/campaigns/9955/orders/1234/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({"order": {"id": 1234}})))
        .mount(&server)
        .await;

    let config = ClientConfig {
        max_retries: 1,
        ..test_config(&server)
    };
    let client = BeruClient::new(config, "token-123", "9955").expect("client builds");
    let result = client.update_order_status(1234, OrderStatus::Cancelled).await;

    assert!(result.is_ok(), "expected Ok after retry, got: {result:?}");
}
