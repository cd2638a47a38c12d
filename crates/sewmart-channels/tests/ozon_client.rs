//! Integration tests for `OzonClient` against a `wiremock` server.

use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sewmart_channels::ozon::{OzonClient, ShipLine, StockUpdate};
use sewmart_channels::{ChannelError, ClientConfig};

fn test_client(server: &MockServer) -> OzonClient {
    let config = ClientConfig {
        api_base: server.uri(),
        timeout_secs: 5,
        user_agent: "sewmart-test/0.1".to_string(),
        max_retries: 0,
        backoff_base_ms: 0,
    };
    OzonClient::new(config, "client-42", "key-secret").expect("client builds")
}

fn posting_json(number: &str, status: &str) -> serde_json::Value {
    json!({
        "posting_number": number,
        "status": status,
        "order_id": 555,
        "products": [
            {"offer_id": "THREAD-RED-40", "quantity": 2, "price": "129.00"}
        ]
    })
}

#[tokio::test]
async fn list_unfulfilled_sends_credentials_and_parses_postings() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v3/posting/fbs/unfulfilled/list"))
        .and(header("Client-Id", "client-42"))
        .and(header("Api-Key", "key-secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "result": {
                "postings": [posting_json("111-1", "awaiting_packaging")],
                "count": 1
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let result = client
        .list_unfulfilled("2026-03-01T00:00:00Z", "2026-03-08T00:00:00Z")
        .await;

    assert!(result.is_ok(), "expected Ok, got: {result:?}");
    let postings = result.unwrap();
    assert_eq!(postings.len(), 1);
    assert_eq!(postings[0].posting_number, "111-1");
    assert_eq!(postings[0].products[0].offer_id, "THREAD-RED-40");
}

#[tokio::test]
async fn get_posting_parses_single_result() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v3/posting/fbs/get"))
        .and(body_partial_json(json!({"posting_number": "111-2"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "result": posting_json("111-2", "awaiting_deliver")
        })))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let posting = client.get_posting("111-2").await.expect("posting fetched");

    assert_eq!(posting.status, "awaiting_deliver");
    assert_eq!(posting.order_id, Some(555));
}

#[tokio::test]
async fn ship_posting_succeeds_when_number_is_acknowledged() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v3/posting/fbs/ship"))
        .and(body_partial_json(json!({
            "posting_number": "111-3",
            "packages": [{"products": [{"product_id": 777, "quantity": 1}]}]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({"result": ["111-3"]})))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let result = client
        .ship_posting(
            "111-3",
            vec![ShipLine {
                product_id: 777,
                quantity: 1,
            }],
        )
        .await;

    assert!(result.is_ok(), "expected Ok, got: {result:?}");
}

#[tokio::test]
async fn ship_posting_errors_when_number_is_missing_from_answer() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v3/posting/fbs/ship"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({"result": []})))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let result = client
        .ship_posting(
            "111-4",
            vec![ShipLine {
                product_id: 777,
                quantity: 1,
            }],
        )
        .await;

    assert!(
        matches!(result, Err(ChannelError::Api(_))),
        "expected Api error, got: {result:?}"
    );
}

#[tokio::test]
async fn import_stocks_returns_only_rejected_skus() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v1/product/import/stocks"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "result": [
                {"offer_id": "THREAD-RED-40", "updated": true, "errors": []},
                {"offer_id": "GONE-SKU", "updated": false, "errors": [
                    {"code": "NOT_FOUND", "message": "unknown offer"}
                ]}
            ]
        })))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let rejected = client
        .import_stocks(&[
            StockUpdate {
                offer_id: "THREAD-RED-40".to_string(),
                stock: 10,
            },
            StockUpdate {
                offer_id: "GONE-SKU".to_string(),
                stock: 3,
            },
        ])
        .await
        .expect("stocks uploaded");

    assert_eq!(rejected.len(), 1);
    assert_eq!(rejected[0].offer_id, "GONE-SKU");
    assert_eq!(rejected[0].errors[0].code.as_deref(), Some("NOT_FOUND"));
}

#[tokio::test]
async fn rate_limit_propagates_retry_after() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/v3/posting/fbs/get"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "30"))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let result = client.get_posting("111-5").await;

    match result {
        Err(ChannelError::RateLimited { retry_after_secs }) => {
            assert_eq!(retry_after_secs, 30);
        }
        other => panic!("expected RateLimited, got: {other:?}"),
    }
}
