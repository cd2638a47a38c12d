//! Integration tests for `DeliveryClient` against a `wiremock` server.

use rust_decimal::Decimal;
use serde_json::json;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sewmart_delivery::{
    DeliveryClient, DeliveryError, DraftOrderRequest, Parcel, PricingRequest,
};

fn test_client(server: &MockServer) -> DeliveryClient {
    // Zero back-off keeps retry tests fast.
    DeliveryClient::new(server.uri(), "oauth-token", 5, 2, 0).expect("client builds")
}

fn pricing_request() -> PricingRequest {
    PricingRequest {
        source_station: "station-1".to_string(),
        address: "Moscow, Arbat 1".to_string(),
        parcel: Parcel {
            weight: Decimal::new(12, 1),
            length: 30,
            width: 20,
            height: 15,
        },
        assessed_cost: Decimal::new(2_249_100, 2),
    }
}

#[tokio::test]
async fn get_pricing_sorts_options_cheapest_first() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/pricing-calculator"))
        .and(header("authorization", "Bearer oauth-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "options": [
                {"tariff": "express", "cost": "990.00", "delivery_days": 1},
                {"tariff": "courier", "cost": "349.00", "delivery_days": 2}
            ]
        })))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let options = client
        .get_pricing(&pricing_request())
        .await
        .expect("pricing quoted");

    assert_eq!(options.len(), 2);
    assert_eq!(options[0].tariff, "courier");
    assert_eq!(options[0].cost, Decimal::new(34_900, 2));
}

#[tokio::test]
async fn get_pricing_retries_503_and_succeeds() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/pricing-calculator"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/pricing-calculator"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({
            "options": [{"tariff": "courier", "cost": "349.00", "delivery_days": 2}]
        })))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let options = client
        .get_pricing(&pricing_request())
        .await
        .expect("quoted after retry");

    assert_eq!(options[0].tariff, "courier");
}

#[tokio::test]
async fn empty_option_list_is_no_options() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/pricing-calculator"))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({"options": []})))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let result = client.get_pricing(&pricing_request()).await;

    assert!(
        matches!(result, Err(DeliveryError::NoOptions)),
        "expected NoOptions, got: {result:?}"
    );
}

#[tokio::test]
async fn create_draft_order_returns_carrier_order_id() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/orders"))
        .and(body_partial_json(json!({
            "external_id": "SW-1042",
            "tariff": "courier"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(&json!({"order_id": "YD-5501"})))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server);
    let request = DraftOrderRequest {
        external_id: "SW-1042".to_string(),
        source_station: "station-1".to_string(),
        address: "Moscow, Arbat 1".to_string(),
        recipient_name: "Anna Petrova".to_string(),
        recipient_phone: "+79990001122".to_string(),
        parcel: Parcel {
            weight: Decimal::new(12, 1),
            length: 30,
            width: 20,
            height: 15,
        },
        assessed_cost: Decimal::new(2_249_100, 2),
        tariff: "courier".to_string(),
    };
    let order_id = client
        .create_draft_order(&request)
        .await
        .expect("draft created");

    assert_eq!(order_id, "YD-5501");
}

#[tokio::test]
async fn expired_token_becomes_unauthorized() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/pricing-calculator"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = test_client(&server);
    let result = client.get_pricing(&pricing_request()).await;

    assert!(
        matches!(result, Err(DeliveryError::Unauthorized { .. })),
        "expected Unauthorized, got: {result:?}"
    );
}
