//! SberMegaMarket order service adapter.
//!
//! Mixed model: the marketplace pushes new-order and cancellation
//! webhooks to us, and we drive the fulfilment workflow through the
//! `orderService` RPC endpoints (confirm, packing, shipping, reject).
//! Every request and webhook uses the same `{data: {...}, meta: {}}`
//! envelope, with the API token carried inside `data`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sewmart_core::OrderStatus;

use crate::error::ChannelError;
use crate::http::read_json;
use crate::retry::retry_with_backoff;
use crate::ClientConfig;

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
    #[serde(default = "serde_json::Map::new")]
    pub meta: serde_json::Map<String, serde_json::Value>,
}

impl<T> Envelope<T> {
    #[must_use]
    pub fn new(data: T) -> Self {
        Self {
            data,
            meta: serde_json::Map::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Wire types — inbound webhooks
// ---------------------------------------------------------------------------

/// `POST /sber/order/new` — a shipment offered to the shop.
pub type OrderNewRequest = Envelope<OrderNewData>;

#[derive(Debug, Clone, Deserialize)]
pub struct OrderNewData {
    #[serde(default)]
    pub token: Option<String>,
    pub shipments: Vec<Shipment>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shipment {
    pub shipment_id: String,
    #[serde(default)]
    pub order_code: Option<String>,
    #[serde(default)]
    pub shipment_date: Option<String>,
    pub items: Vec<ShipmentItem>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShipmentItem {
    pub item_index: i32,
    /// Seller sku.
    pub offer_id: String,
    #[serde(default)]
    pub goods_id: Option<String>,
    pub quantity: u32,
    #[serde(default)]
    pub price: Option<Decimal>,
}

/// `POST /sber/order/cancel` — the marketplace cancels a shipment.
pub type OrderCancelRequest = Envelope<OrderCancelData>;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderCancelData {
    #[serde(default)]
    pub token: Option<String>,
    pub shipments: Vec<CancelledShipment>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelledShipment {
    pub shipment_id: String,
    #[serde(default)]
    pub reason: Option<String>,
}

/// Synchronous webhook answer: `{"data": {"success": 1}, "meta": {}}`.
#[must_use]
pub fn webhook_ack() -> Envelope<serde_json::Value> {
    Envelope::new(serde_json::json!({ "success": 1 }))
}

// ---------------------------------------------------------------------------
// Wire types — outbound orderService calls
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ShipmentAction<'a> {
    token: &'a str,
    shipments: Vec<ActionShipment<'a>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ActionShipment<'a> {
    shipment_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    order_code: Option<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    items: Vec<ActionItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<RejectReason>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ActionItem {
    item_index: i32,
    quantity: u32,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RejectReason {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Debug, Deserialize)]
struct ActionResult {
    #[serde(default)]
    success: i32,
    #[serde(default)]
    error: Option<ActionError>,
}

#[derive(Debug, Deserialize)]
struct ActionError {
    #[serde(default)]
    message: Option<String>,
}

/// One confirmed/packed line, referencing the item index from the
/// original shipment.
#[derive(Debug, Clone)]
pub struct ItemLine {
    pub item_index: i32,
    pub quantity: u32,
}

// ---------------------------------------------------------------------------
// Status vocabulary
// ---------------------------------------------------------------------------

/// Maps an internal status onto the `orderService` action to call.
/// `None` means the state has no SberMegaMarket action.
#[must_use]
pub fn map_outbound_action(status: OrderStatus) -> Option<&'static str> {
    match status {
        OrderStatus::Confirmed => Some("confirm"),
        OrderStatus::Assembled => Some("packing"),
        OrderStatus::Shipped => Some("shipping"),
        OrderStatus::Cancelled => Some("reject"),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client for the SberMegaMarket order service.
pub struct SberClient {
    http: reqwest::Client,
    config: ClientConfig,
    token: String,
}

impl SberClient {
    /// # Errors
    ///
    /// Returns [`ChannelError::Http`] if the underlying HTTP client
    /// cannot be constructed.
    pub fn new(config: ClientConfig, token: impl Into<String>) -> Result<Self, ChannelError> {
        let http = config.build_http()?;
        Ok(Self {
            http,
            config,
            token: token.into(),
        })
    }

    async fn call(
        &self,
        action: &str,
        shipment: ActionShipment<'_>,
    ) -> Result<(), ChannelError> {
        let url = format!(
            "{}/api/market/v1/orderService/order/{action}",
            self.config.api_base
        );
        let body = Envelope::new(ShipmentAction {
            token: &self.token,
            shipments: vec![shipment],
        });
        let result: Envelope<ActionResult> =
            retry_with_backoff(self.config.max_retries, self.config.backoff_base_ms, || {
                let url = url.clone();
                let body = &body;
                async move {
                    let response = self.http.post(&url).json(body).send().await?;
                    read_json(response, "sber order service").await
                }
            })
            .await?;
        if result.data.success == 1 {
            Ok(())
        } else {
            let message = result
                .data
                .error
                .and_then(|e| e.message)
                .unwrap_or_else(|| "unspecified order service failure".to_string());
            Err(ChannelError::Api(message))
        }
    }

    /// Confirms the listed items of a shipment. Items left out are
    /// implicitly declined by the marketplace.
    ///
    /// # Errors
    ///
    /// Any transport/API error after retries are exhausted.
    pub async fn confirm(&self, shipment_id: &str, items: &[ItemLine]) -> Result<(), ChannelError> {
        self.call(
            "confirm",
            ActionShipment {
                shipment_id,
                order_code: None,
                items: items
                    .iter()
                    .map(|l| ActionItem {
                        item_index: l.item_index,
                        quantity: l.quantity,
                    })
                    .collect(),
                reason: None,
            },
        )
        .await
    }

    /// Reports the shipment as packed, attaching our order code as the
    /// box identifier.
    ///
    /// # Errors
    ///
    /// Any transport/API error after retries are exhausted.
    pub async fn packing(&self, shipment_id: &str, order_code: &str) -> Result<(), ChannelError> {
        self.call(
            "packing",
            ActionShipment {
                shipment_id,
                order_code: Some(order_code),
                items: Vec::new(),
                reason: None,
            },
        )
        .await
    }

    /// Reports the shipment as handed over to the carrier.
    ///
    /// # Errors
    ///
    /// Any transport/API error after retries are exhausted.
    pub async fn shipping(&self, shipment_id: &str) -> Result<(), ChannelError> {
        self.call(
            "shipping",
            ActionShipment {
                shipment_id,
                order_code: None,
                items: Vec::new(),
                reason: None,
            },
        )
        .await
    }

    /// Rejects the whole shipment as out of stock.
    ///
    /// # Errors
    ///
    /// Any transport/API error after retries are exhausted.
    pub async fn reject(&self, shipment_id: &str) -> Result<(), ChannelError> {
        self.call(
            "reject",
            ActionShipment {
                shipment_id,
                order_code: None,
                items: Vec::new(),
                reason: Some(RejectReason {
                    kind: "OUT_OF_STOCK",
                }),
            },
        )
        .await
    }

    /// Dispatches the `orderService` action matching an internal status
    /// change.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::Unpushable`] when the status has no
    ///   SberMegaMarket action.
    /// - Any transport/API error after retries are exhausted.
    pub async fn push_status(
        &self,
        shipment_id: &str,
        order_code: &str,
        status: OrderStatus,
        items: &[ItemLine],
    ) -> Result<(), ChannelError> {
        match map_outbound_action(status) {
            Some("confirm") => self.confirm(shipment_id, items).await,
            Some("packing") => self.packing(shipment_id, order_code).await,
            Some("shipping") => self.shipping(shipment_id).await,
            Some("reject") => self.reject(shipment_id).await,
            _ => Err(ChannelError::Unpushable {
                channel: "sber",
                status,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outbound_actions_cover_the_fulfilment_workflow() {
        assert_eq!(map_outbound_action(OrderStatus::Confirmed), Some("confirm"));
        assert_eq!(map_outbound_action(OrderStatus::Assembled), Some("packing"));
        assert_eq!(map_outbound_action(OrderStatus::Shipped), Some("shipping"));
        assert_eq!(map_outbound_action(OrderStatus::Cancelled), Some("reject"));
        assert_eq!(map_outbound_action(OrderStatus::New), None);
        assert_eq!(map_outbound_action(OrderStatus::Delivered), None);
    }

    #[test]
    fn new_order_webhook_parses_envelope() {
        let payload = serde_json::json!({
            "data": {
                "token": "secret",
                "shipments": [{
                    "shipmentId": "SBM-777",
                    "orderCode": null,
                    "shipmentDate": "2026-03-02",
                    "items": [
                        {"itemIndex": 1, "offerId": "OVERLOCK-B44", "goodsId": "g-1", "quantity": 1, "price": "18990.00"}
                    ]
                }]
            },
            "meta": {}
        });
        let request: OrderNewRequest = serde_json::from_value(payload).expect("parses");
        assert_eq!(request.data.shipments[0].shipment_id, "SBM-777");
        assert_eq!(request.data.shipments[0].items[0].offer_id, "OVERLOCK-B44");
    }

    #[test]
    fn webhook_ack_serializes_success_envelope() {
        let json = serde_json::to_value(webhook_ack()).expect("serializes");
        assert_eq!(json["data"]["success"], 1);
        assert!(json["meta"].as_object().is_some_and(serde_json::Map::is_empty));
    }

    #[test]
    fn cancel_webhook_parses_reason() {
        let payload = serde_json::json!({
            "data": {
                "shipments": [{"shipmentId": "SBM-778", "reason": "CUSTOMER_REFUSED"}]
            },
            "meta": {}
        });
        let request: OrderCancelRequest = serde_json::from_value(payload).expect("parses");
        assert_eq!(
            request.data.shipments[0].reason.as_deref(),
            Some("CUSTOMER_REFUSED")
        );
    }
}
