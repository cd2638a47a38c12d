//! Ozon Seller API (FBS) adapter.
//!
//! Ozon is pull-driven: a scheduled job lists unfulfilled postings,
//! reconciles them with local orders, pushes `ship` when an order is
//! assembled, and uploads stock counts. All calls are authenticated
//! with the `Client-Id` / `Api-Key` header pair.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sewmart_core::OrderStatus;

use crate::error::ChannelError;
use crate::http::read_json;
use crate::retry::retry_with_backoff;
use crate::ClientConfig;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
pub struct Posting {
    pub posting_number: String,
    pub status: String,
    #[serde(default)]
    pub order_id: Option<i64>,
    #[serde(default)]
    pub in_process_at: Option<String>,
    #[serde(default)]
    pub shipment_date: Option<String>,
    #[serde(default)]
    pub products: Vec<PostingProduct>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PostingProduct {
    /// Seller sku as registered in the Ozon catalogue.
    pub offer_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub quantity: u32,
    #[serde(default)]
    pub price: Option<Decimal>,
}

#[derive(Debug, Serialize)]
struct UnfulfilledListRequest {
    dir: &'static str,
    filter: UnfulfilledFilter,
    limit: u32,
    offset: u32,
}

#[derive(Debug, Serialize)]
struct UnfulfilledFilter {
    cutoff_from: String,
    cutoff_to: String,
}

#[derive(Debug, Deserialize)]
struct UnfulfilledListResponse {
    result: UnfulfilledListResult,
}

#[derive(Debug, Deserialize)]
struct UnfulfilledListResult {
    #[serde(default)]
    postings: Vec<Posting>,
}

#[derive(Debug, Serialize)]
struct PostingGetRequest<'a> {
    posting_number: &'a str,
}

#[derive(Debug, Deserialize)]
struct PostingGetResponse {
    result: Posting,
}

#[derive(Debug, Serialize)]
struct ShipRequest<'a> {
    posting_number: &'a str,
    packages: Vec<ShipPackage>,
}

#[derive(Debug, Serialize)]
struct ShipPackage {
    products: Vec<ShipProduct>,
}

#[derive(Debug, Serialize)]
struct ShipProduct {
    product_id: i64,
    quantity: u32,
}

/// One line of a `ship` call: Ozon's numeric product id plus the count
/// going into the single package.
#[derive(Debug, Clone)]
pub struct ShipLine {
    pub product_id: i64,
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
struct ShipResponse {
    #[serde(default)]
    result: Vec<String>,
}

/// One stock figure for `/v1/product/import/stocks`.
#[derive(Debug, Clone, Serialize)]
pub struct StockUpdate {
    pub offer_id: String,
    pub stock: u32,
}

#[derive(Debug, Serialize)]
struct ImportStocksRequest<'a> {
    stocks: &'a [StockUpdate],
}

#[derive(Debug, Deserialize)]
struct ImportStocksResponse {
    #[serde(default)]
    result: Vec<ImportStockResult>,
}

#[derive(Debug, Deserialize)]
pub struct ImportStockResult {
    pub offer_id: String,
    pub updated: bool,
    #[serde(default)]
    pub errors: Vec<ImportStockError>,
}

#[derive(Debug, Deserialize)]
pub struct ImportStockError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

// ---------------------------------------------------------------------------
// Status vocabulary
// ---------------------------------------------------------------------------

/// Maps an Ozon posting status onto the internal status.
///
/// # Errors
///
/// Returns [`ChannelError::UnknownVendorStatus`] for statuses outside
/// the published vocabulary.
pub fn map_inbound_status(status: &str) -> Result<OrderStatus, ChannelError> {
    match status {
        "awaiting_registration" | "acceptance_in_progress" | "awaiting_approve"
        | "awaiting_packaging" => Ok(OrderStatus::Confirmed),
        "awaiting_deliver" => Ok(OrderStatus::Assembled),
        "delivering" | "driver_pickup" => Ok(OrderStatus::Shipped),
        "delivered" => Ok(OrderStatus::Delivered),
        "cancelled" | "not_accepted" => Ok(OrderStatus::Cancelled),
        other => Err(ChannelError::UnknownVendorStatus {
            channel: "ozon",
            status: other.to_string(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client for the Ozon Seller API.
pub struct OzonClient {
    http: reqwest::Client,
    config: ClientConfig,
    client_id: String,
    api_key: String,
}

impl OzonClient {
    /// # Errors
    ///
    /// Returns [`ChannelError::Http`] if the underlying HTTP client
    /// cannot be constructed.
    pub fn new(
        config: ClientConfig,
        client_id: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Result<Self, ChannelError> {
        let http = config.build_http()?;
        Ok(Self {
            http,
            config,
            client_id: client_id.into(),
            api_key: api_key.into(),
        })
    }

    async fn post_json<T, B>(&self, path: &str, body: &B, context: &str) -> Result<T, ChannelError>
    where
        T: serde::de::DeserializeOwned,
        B: Serialize + Sync,
    {
        let url = format!("{}{path}", self.config.api_base);
        retry_with_backoff(self.config.max_retries, self.config.backoff_base_ms, || {
            let url = url.clone();
            async move {
                let response = self
                    .http
                    .post(&url)
                    .header("Client-Id", &self.client_id)
                    .header("Api-Key", &self.api_key)
                    .json(body)
                    .send()
                    .await?;
                read_json(response, context).await
            }
        })
        .await
    }

    /// Lists FBS postings awaiting action, paging until the server
    /// reports fewer results than the page size.
    ///
    /// `cutoff_from`/`cutoff_to` are RFC 3339 timestamps bounding the
    /// shipment cutoff window.
    ///
    /// # Errors
    ///
    /// Any transport/API error after retries are exhausted.
    pub async fn list_unfulfilled(
        &self,
        cutoff_from: &str,
        cutoff_to: &str,
    ) -> Result<Vec<Posting>, ChannelError> {
        const PAGE: u32 = 100;
        let mut postings = Vec::new();
        let mut offset = 0u32;
        loop {
            let request = UnfulfilledListRequest {
                dir: "ASC",
                filter: UnfulfilledFilter {
                    cutoff_from: cutoff_from.to_string(),
                    cutoff_to: cutoff_to.to_string(),
                },
                limit: PAGE,
                offset,
            };
            let response: UnfulfilledListResponse = self
                .post_json(
                    "/v3/posting/fbs/unfulfilled/list",
                    &request,
                    "ozon unfulfilled list",
                )
                .await?;
            let batch = response.result.postings;
            let got = u32::try_from(batch.len()).unwrap_or(u32::MAX);
            postings.extend(batch);
            // A short page is the last one.
            if got < PAGE {
                break;
            }
            offset += got;
        }
        Ok(postings)
    }

    /// Fetches one posting by its number.
    ///
    /// # Errors
    ///
    /// Any transport/API error after retries are exhausted.
    pub async fn get_posting(&self, posting_number: &str) -> Result<Posting, ChannelError> {
        let request = PostingGetRequest { posting_number };
        let response: PostingGetResponse = self
            .post_json("/v3/posting/fbs/get", &request, "ozon posting get")
            .await?;
        Ok(response.result)
    }

    /// Reports the posting as assembled into a single package.
    ///
    /// # Errors
    ///
    /// - [`ChannelError::Api`] when Ozon does not acknowledge the
    ///   posting number in its answer.
    /// - Any transport/API error after retries are exhausted.
    pub async fn ship_posting(
        &self,
        posting_number: &str,
        lines: Vec<ShipLine>,
    ) -> Result<(), ChannelError> {
        let request = ShipRequest {
            posting_number,
            packages: vec![ShipPackage {
                products: lines
                    .into_iter()
                    .map(|l| ShipProduct {
                        product_id: l.product_id,
                        quantity: l.quantity,
                    })
                    .collect(),
            }],
        };
        let response: ShipResponse = self
            .post_json("/v3/posting/fbs/ship", &request, "ozon ship")
            .await?;
        if response.result.iter().any(|n| n == posting_number) {
            Ok(())
        } else {
            Err(ChannelError::Api(format!(
                "ship not acknowledged for posting {posting_number}"
            )))
        }
    }

    /// Uploads stock counts and returns the per-sku results that Ozon
    /// rejected.
    ///
    /// # Errors
    ///
    /// Any transport/API error after retries are exhausted.
    pub async fn import_stocks(
        &self,
        stocks: &[StockUpdate],
    ) -> Result<Vec<ImportStockResult>, ChannelError> {
        let request = ImportStocksRequest { stocks };
        let response: ImportStocksResponse = self
            .post_json("/v1/product/import/stocks", &request, "ozon import stocks")
            .await?;
        Ok(response
            .result
            .into_iter()
            .filter(|r| !r.updated)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn awaiting_packaging_maps_to_confirmed() {
        assert_eq!(
            map_inbound_status("awaiting_packaging").expect("known"),
            OrderStatus::Confirmed
        );
    }

    #[test]
    fn awaiting_deliver_maps_to_assembled() {
        assert_eq!(
            map_inbound_status("awaiting_deliver").expect("known"),
            OrderStatus::Assembled
        );
    }

    #[test]
    fn carrier_states_map_to_shipped_and_beyond() {
        assert_eq!(
            map_inbound_status("delivering").expect("known"),
            OrderStatus::Shipped
        );
        assert_eq!(
            map_inbound_status("delivered").expect("known"),
            OrderStatus::Delivered
        );
        assert_eq!(
            map_inbound_status("cancelled").expect("known"),
            OrderStatus::Cancelled
        );
    }

    #[test]
    fn unknown_posting_status_is_an_error() {
        let err = map_inbound_status("quantum_flux").expect_err("unknown");
        assert!(matches!(
            err,
            ChannelError::UnknownVendorStatus { channel: "ozon", .. }
        ));
    }

    #[test]
    fn late_first_seen_statuses_are_reachable_from_new() {
        for vendor in ["awaiting_deliver", "delivering", "driver_pickup", "delivered"] {
            let status = map_inbound_status(vendor).expect("known");
            assert!(
                OrderStatus::New.catch_up_path(status).is_some(),
                "a posting first seen as {vendor} must be reachable from a fresh order"
            );
        }
    }

    #[test]
    fn unfulfilled_list_parses_without_count() {
        let payload = serde_json::json!({
            "result": {
                "postings": [
                    {"posting_number": "111-9", "status": "awaiting_packaging"}
                ]
            }
        });
        let response: UnfulfilledListResponse = serde_json::from_value(payload).expect("parses");
        assert_eq!(response.result.postings.len(), 1);
        assert_eq!(response.result.postings[0].posting_number, "111-9");
    }

    #[test]
    fn posting_parses_seller_api_payload() {
        let payload = serde_json::json!({
            "posting_number": "12345-0001-1",
            "status": "awaiting_packaging",
            "order_id": 98765,
            "in_process_at": "2026-03-01T09:00:00Z",
            "products": [
                {"offer_id": "THREAD-RED-40", "name": "Thread, red", "quantity": 2, "price": "129.00"}
            ]
        });
        let posting: Posting = serde_json::from_value(payload).expect("parses");
        assert_eq!(posting.posting_number, "12345-0001-1");
        assert_eq!(posting.products[0].offer_id, "THREAD-RED-40");
        assert_eq!(posting.products[0].quantity, 2);
    }
}
