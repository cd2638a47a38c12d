//! Beru (Yandex Market FBS) adapter.
//!
//! Beru is push-driven: the marketplace calls our webhook endpoints
//! (`/beru/cart`, `/beru/order/accept`, `/beru/order/status`,
//! `/beru/stocks`) and we answer synchronously. The only outbound call
//! is the status update PUT. The wire types for both directions live
//! here; the server crate mounts the endpoints.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sewmart_core::OrderStatus;

use crate::error::ChannelError;
use crate::http::read_json;
use crate::retry::retry_with_backoff;
use crate::ClientConfig;

// ---------------------------------------------------------------------------
// Wire types — inbound webhooks
// ---------------------------------------------------------------------------

/// `POST /beru/cart` — the marketplace asks whether we can fulfil a cart.
#[derive(Debug, Clone, Deserialize)]
pub struct CartRequest {
    pub cart: Cart,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Cart {
    #[serde(default)]
    pub currency: Option<String>,
    pub items: Vec<CartItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CartItem {
    /// Our sku, as listed in the feed.
    #[serde(rename = "offerId")]
    pub offer_id: String,
    #[serde(default, rename = "offerName")]
    pub offer_name: Option<String>,
    pub count: u32,
    #[serde(default, rename = "feedId")]
    pub feed_id: Option<i64>,
}

/// Our synchronous answer to a cart request.
#[derive(Debug, Clone, Serialize)]
pub struct CartResponse {
    pub cart: CartResponseBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartResponseBody {
    pub items: Vec<CartResponseItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CartResponseItem {
    #[serde(rename = "offerId")]
    pub offer_id: String,
    /// Units we can actually deliver; 0 declines the line.
    pub count: u32,
    pub price: Decimal,
    pub delivery: bool,
    #[serde(skip_serializing_if = "Option::is_none", rename = "feedId")]
    pub feed_id: Option<i64>,
}

/// `POST /beru/order/accept` — a new marketplace order offered to the shop.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderAcceptRequest {
    pub order: InboundOrder,
}

/// `POST /beru/order/status` — the marketplace reports a status change.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderStatusRequest {
    pub order: InboundOrder,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InboundOrder {
    pub id: i64,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub substatus: Option<String>,
    #[serde(default)]
    pub items: Vec<InboundOrderItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct InboundOrderItem {
    #[serde(rename = "offerId")]
    pub offer_id: String,
    #[serde(default, rename = "offerName")]
    pub offer_name: Option<String>,
    pub count: u32,
    #[serde(default)]
    pub price: Option<Decimal>,
}

/// Answer to an order-accept webhook.
#[derive(Debug, Clone, Serialize)]
pub struct OrderAcceptResponse {
    pub order: OrderAcceptDecision,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderAcceptDecision {
    pub accepted: bool,
    /// Our order id, echoed back so later webhooks can reference it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
}

/// `POST /beru/stocks` — warehouse stock request for a list of skus.
#[derive(Debug, Clone, Deserialize)]
pub struct StocksRequest {
    #[serde(rename = "warehouseId")]
    pub warehouse_id: i64,
    pub skus: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StocksResponse {
    pub skus: Vec<SkuStock>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SkuStock {
    pub sku: String,
    #[serde(rename = "warehouseId")]
    pub warehouse_id: i64,
    pub items: Vec<StockItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StockItem {
    /// Always `"FIT"`: sellable stock.
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub count: u32,
    #[serde(rename = "updatedAt")]
    pub updated_at: String,
}

impl SkuStock {
    /// Convenience constructor for the common single-item FIT answer.
    #[must_use]
    pub fn fit(sku: String, warehouse_id: i64, count: u32, updated_at: String) -> Self {
        Self {
            sku,
            warehouse_id,
            items: vec![StockItem {
                kind: "FIT",
                count,
                updated_at,
            }],
        }
    }
}

// ---------------------------------------------------------------------------
// Status vocabulary
// ---------------------------------------------------------------------------

/// Maps a Beru (status, substatus) pair onto the internal status.
///
/// # Errors
///
/// Returns [`ChannelError::UnknownVendorStatus`] for statuses outside
/// the published vocabulary.
pub fn map_inbound_status(
    status: &str,
    substatus: Option<&str>,
) -> Result<OrderStatus, ChannelError> {
    match status {
        "UNPAID" | "RESERVED" => Ok(OrderStatus::New),
        "PROCESSING" => match substatus {
            Some("READY_TO_SHIP") => Ok(OrderStatus::Assembled),
            // STARTED and anything else in PROCESSING means we are
            // committed to fulfil.
            _ => Ok(OrderStatus::Confirmed),
        },
        "DELIVERY" | "PICKUP" => Ok(OrderStatus::Shipped),
        "DELIVERED" => Ok(OrderStatus::Delivered),
        "CANCELLED" => Ok(OrderStatus::Cancelled),
        other => Err(ChannelError::UnknownVendorStatus {
            channel: "beru",
            status: other.to_string(),
        }),
    }
}

/// Maps an internal status onto the (status, substatus) pair we may PUT
/// back to the marketplace. `None` means the state is not ours to
/// report (the carrier or the marketplace itself owns it).
#[must_use]
pub fn map_outbound_status(status: OrderStatus) -> Option<(&'static str, Option<&'static str>)> {
    match status {
        OrderStatus::Confirmed | OrderStatus::Assembling => Some(("PROCESSING", Some("STARTED"))),
        OrderStatus::Assembled => Some(("PROCESSING", Some("READY_TO_SHIP"))),
        OrderStatus::Cancelled => Some(("CANCELLED", Some("SHOP_FAILED"))),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Client — outbound status push
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
struct StatusUpdateBody {
    order: StatusUpdateOrder,
}

#[derive(Debug, Clone, Serialize)]
struct StatusUpdateOrder {
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    substatus: Option<&'static str>,
}

/// HTTP client for the Beru partner API.
pub struct BeruClient {
    http: reqwest::Client,
    config: ClientConfig,
    token: String,
    campaign_id: String,
}

impl BeruClient {
    /// Builds a client for one campaign.
    ///
    /// # Errors
    ///
    /// Returns [`ChannelError::Http`] if the underlying HTTP client
    /// cannot be constructed.
    pub fn new(
        config: ClientConfig,
        token: impl Into<String>,
        campaign_id: impl Into<String>,
    ) -> Result<Self, ChannelError> {
        let http = config.build_http()?;
        Ok(Self {
            http,
            config,
            token: token.into(),
            campaign_id: campaign_id.into(),
        })
    }

    /// Pushes an internal status change to the marketplace, retrying
    /// transient failures.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::Unpushable`] when the status has no Beru
    ///   representation (nothing is sent).
    /// - Any transport/API error after retries are exhausted.
    pub async fn update_order_status(
        &self,
        marketplace_order_id: i64,
        status: OrderStatus,
    ) -> Result<(), ChannelError> {
        let Some((beru_status, substatus)) = map_outbound_status(status) else {
            return Err(ChannelError::Unpushable {
                channel: "beru",
                status,
            });
        };

        let url = format!(
            "{}/campaigns/{}/orders/{}/status",
            self.config.api_base, self.campaign_id, marketplace_order_id
        );
        let body = StatusUpdateBody {
            order: StatusUpdateOrder {
                status: beru_status,
                substatus,
            },
        };

        retry_with_backoff(self.config.max_retries, self.config.backoff_base_ms, || {
            let url = url.clone();
            let body = &body;
            async move {
                let response = self
                    .http
                    .put(&url)
                    .bearer_auth(&self.token)
                    .json(body)
                    .send()
                    .await?;
                let _ack: serde_json::Value = read_json(response, "beru status update").await?;
                Ok(())
            }
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn processing_started_maps_to_confirmed() {
        let status = map_inbound_status("PROCESSING", Some("STARTED")).expect("known status");
        assert_eq!(status, OrderStatus::Confirmed);
    }

    #[test]
    fn processing_ready_to_ship_maps_to_assembled() {
        let status = map_inbound_status("PROCESSING", Some("READY_TO_SHIP")).expect("known status");
        assert_eq!(status, OrderStatus::Assembled);
    }

    #[test]
    fn processing_without_substatus_maps_to_confirmed() {
        let status = map_inbound_status("PROCESSING", None).expect("known status");
        assert_eq!(status, OrderStatus::Confirmed);
    }

    #[test]
    fn delivery_and_pickup_both_map_to_shipped() {
        assert_eq!(
            map_inbound_status("DELIVERY", None).expect("known"),
            OrderStatus::Shipped
        );
        assert_eq!(
            map_inbound_status("PICKUP", None).expect("known"),
            OrderStatus::Shipped
        );
    }

    #[test]
    fn unpaid_is_a_new_order() {
        assert_eq!(
            map_inbound_status("UNPAID", None).expect("known"),
            OrderStatus::New
        );
    }

    #[test]
    fn unknown_vendor_status_is_an_error() {
        let err = map_inbound_status("TELEPORTED", None).expect_err("unknown");
        assert!(matches!(
            err,
            ChannelError::UnknownVendorStatus { channel: "beru", .. }
        ));
    }

    #[test]
    fn outbound_mapping_is_partial() {
        assert_eq!(
            map_outbound_status(OrderStatus::Assembled),
            Some(("PROCESSING", Some("READY_TO_SHIP")))
        );
        assert_eq!(
            map_outbound_status(OrderStatus::Cancelled),
            Some(("CANCELLED", Some("SHOP_FAILED")))
        );
        // Delivery states belong to the carrier.
        assert_eq!(map_outbound_status(OrderStatus::Shipped), None);
        assert_eq!(map_outbound_status(OrderStatus::Delivered), None);
    }

    #[test]
    fn cart_request_parses_marketplace_payload() {
        let payload = serde_json::json!({
            "cart": {
                "currency": "RUR",
                "items": [
                    {"offerId": "JANOME-500E", "offerName": "Janome 500E", "count": 1, "feedId": 12},
                    {"offerId": "NEEDLES-10", "count": 3}
                ]
            }
        });
        let request: CartRequest = serde_json::from_value(payload).expect("parses");
        assert_eq!(request.cart.items.len(), 2);
        assert_eq!(request.cart.items[0].offer_id, "JANOME-500E");
        assert_eq!(request.cart.items[1].count, 3);
        assert!(request.cart.items[1].feed_id.is_none());
    }

    #[test]
    fn stock_response_serializes_fit_items() {
        let response = StocksResponse {
            skus: vec![SkuStock::fit(
                "JANOME-500E".to_string(),
                777,
                4,
                "2026-03-01T12:00:00Z".to_string(),
            )],
        };
        let json = serde_json::to_value(&response).expect("serializes");
        assert_eq!(json["skus"][0]["items"][0]["type"], "FIT");
        assert_eq!(json["skus"][0]["items"][0]["count"], 4);
        assert_eq!(json["skus"][0]["warehouseId"], 777);
    }
}
