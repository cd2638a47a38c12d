//! Wildberries Marketplace API v3 adapter.
//!
//! Pull-driven like Ozon: a scheduled job fetches new FBS orders,
//! polls statuses for the open ones, and uploads stock counts per
//! warehouse. The API keeps two status tracks per order: the supplier
//! status (what we set) and the WB status (what the marketplace and
//! carrier observed).

use serde::{Deserialize, Serialize};
use sewmart_core::OrderStatus;

use crate::error::ChannelError;
use crate::http::{expect_success, read_json};
use crate::retry::retry_with_backoff;
use crate::ClientConfig;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WbOrder {
    pub id: i64,
    /// Stable order identifier, unique across re-deliveries.
    pub rid: String,
    /// Seller sku.
    pub article: String,
    #[serde(default)]
    pub created_at: Option<String>,
    /// Price in kopecks after WB discounts.
    #[serde(default)]
    pub converted_price: Option<i64>,
    #[serde(default)]
    pub warehouse_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct NewOrdersResponse {
    #[serde(default)]
    orders: Vec<WbOrder>,
}

#[derive(Debug, Serialize)]
struct StatusRequest<'a> {
    orders: &'a [i64],
}

#[derive(Debug, Deserialize)]
struct StatusResponse {
    #[serde(default)]
    orders: Vec<WbOrderStatus>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WbOrderStatus {
    pub id: i64,
    #[serde(rename = "supplierStatus")]
    pub supplier_status: String,
    #[serde(rename = "wbStatus")]
    pub wb_status: String,
}

/// One stock figure for `PUT /api/v3/stocks/{warehouse_id}`.
#[derive(Debug, Clone, Serialize)]
pub struct StockUpdate {
    /// WB barcode for the sku.
    pub sku: String,
    pub amount: u32,
}

#[derive(Debug, Serialize)]
struct StocksBody<'a> {
    stocks: &'a [StockUpdate],
}

// ---------------------------------------------------------------------------
// Status vocabulary
// ---------------------------------------------------------------------------

/// Maps the WB (supplierStatus, wbStatus) pair onto the internal status.
///
/// The WB track wins when it reports a terminal outcome; otherwise the
/// supplier track tells us how far assembly got.
///
/// # Errors
///
/// Returns [`ChannelError::UnknownVendorStatus`] when neither track is
/// recognized.
pub fn map_inbound_status(
    supplier_status: &str,
    wb_status: &str,
) -> Result<OrderStatus, ChannelError> {
    match wb_status {
        "sold" => return Ok(OrderStatus::Delivered),
        "canceled" | "canceled_by_client" | "declined_by_client" => {
            return Ok(OrderStatus::Cancelled)
        }
        _ => {}
    }
    match supplier_status {
        "new" => Ok(OrderStatus::New),
        "confirm" => Ok(OrderStatus::Confirmed),
        "complete" => Ok(OrderStatus::Assembled),
        "deliver" => Ok(OrderStatus::Shipped),
        "receive" => Ok(OrderStatus::Delivered),
        "cancel" => Ok(OrderStatus::Cancelled),
        other => Err(ChannelError::UnknownVendorStatus {
            channel: "wb",
            status: format!("{other}/{wb_status}"),
        }),
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client for the Wildberries Marketplace API.
pub struct WbClient {
    http: reqwest::Client,
    config: ClientConfig,
    token: String,
}

impl WbClient {
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

    /// Fetches FBS orders awaiting confirmation.
    ///
    /// # Errors
    ///
    /// Any transport/API error after retries are exhausted.
    pub async fn list_new_orders(&self) -> Result<Vec<WbOrder>, ChannelError> {
        let url = format!("{}/api/v3/orders/new", self.config.api_base);
        let response: NewOrdersResponse =
            retry_with_backoff(self.config.max_retries, self.config.backoff_base_ms, || {
                let url = url.clone();
                async move {
                    let response = self
                        .http
                        .get(&url)
                        .header(reqwest::header::AUTHORIZATION, &self.token)
                        .send()
                        .await?;
                    read_json(response, "wb new orders").await
                }
            })
            .await?;
        Ok(response.orders)
    }

    /// Polls both status tracks for the given order ids.
    ///
    /// # Errors
    ///
    /// Any transport/API error after retries are exhausted.
    pub async fn get_statuses(&self, order_ids: &[i64]) -> Result<Vec<WbOrderStatus>, ChannelError> {
        if order_ids.is_empty() {
            return Ok(Vec::new());
        }
        let url = format!("{}/api/v3/orders/status", self.config.api_base);
        let body = StatusRequest { orders: order_ids };
        let response: StatusResponse =
            retry_with_backoff(self.config.max_retries, self.config.backoff_base_ms, || {
                let url = url.clone();
                let body = &body;
                async move {
                    let response = self
                        .http
                        .post(&url)
                        .header(reqwest::header::AUTHORIZATION, &self.token)
                        .json(body)
                        .send()
                        .await?;
                    read_json(response, "wb order statuses").await
                }
            })
            .await?;
        Ok(response.orders)
    }

    /// Declines an order the shop cannot fulfil.
    ///
    /// # Errors
    ///
    /// Any transport/API error after retries are exhausted.
    pub async fn cancel_order(&self, order_id: i64) -> Result<(), ChannelError> {
        let url = format!("{}/api/v3/orders/{order_id}/cancel", self.config.api_base);
        retry_with_backoff(self.config.max_retries, self.config.backoff_base_ms, || {
            let url = url.clone();
            async move {
                let response = self
                    .http
                    .patch(&url)
                    .header(reqwest::header::AUTHORIZATION, &self.token)
                    .send()
                    .await?;
                expect_success(response).await
            }
        })
        .await
    }

    /// Uploads stock counts for one WB warehouse. Answers 204 on
    /// success.
    ///
    /// # Errors
    ///
    /// Any transport/API error after retries are exhausted.
    pub async fn update_stocks(
        &self,
        warehouse_id: i64,
        stocks: &[StockUpdate],
    ) -> Result<(), ChannelError> {
        if stocks.is_empty() {
            return Ok(());
        }
        let url = format!("{}/api/v3/stocks/{warehouse_id}", self.config.api_base);
        let body = StocksBody { stocks };
        retry_with_backoff(self.config.max_retries, self.config.backoff_base_ms, || {
            let url = url.clone();
            let body = &body;
            async move {
                let response = self
                    .http
                    .put(&url)
                    .header(reqwest::header::AUTHORIZATION, &self.token)
                    .json(body)
                    .send()
                    .await?;
                expect_success(response).await
            }
        })
        .await
    }
}
