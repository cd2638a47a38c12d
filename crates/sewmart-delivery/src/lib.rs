//! Yandex Delivery client: shipping cost quotes and draft delivery
//! orders, authenticated with an OAuth bearer token.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod retry;

/// Errors returned by the delivery client.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// HTTP 401/403 — bad or expired OAuth token.
    #[error("unauthorized by delivery API: {url}")]
    Unauthorized { url: String },

    /// Any other non-2xx status.
    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// The calculator answered but offered no tariff for the parcel.
    #[error("no delivery option for the requested destination")]
    NoOptions,
}

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Parcel dimensions in centimetres, weight in kilograms.
#[derive(Debug, Clone, Serialize)]
pub struct Parcel {
    pub weight: Decimal,
    pub length: u32,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct PricingRequest {
    /// Station the shop ships from.
    pub source_station: String,
    /// Free-form destination address.
    pub address: String,
    pub parcel: Parcel,
    /// Declared value, drives insurance cost.
    pub assessed_cost: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PricingOption {
    pub tariff: String,
    /// Cost charged to the shop, roubles.
    pub cost: Decimal,
    #[serde(default)]
    pub delivery_days: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct PricingResponse {
    #[serde(default)]
    options: Vec<PricingOption>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DraftOrderRequest {
    /// Our order code, echoed in the carrier's cabinet.
    pub external_id: String,
    pub source_station: String,
    pub address: String,
    pub recipient_name: String,
    pub recipient_phone: String,
    pub parcel: Parcel,
    pub assessed_cost: Decimal,
    pub tariff: String,
}

#[derive(Debug, Deserialize)]
struct DraftOrderResponse {
    order_id: String,
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// HTTP client for the Yandex Delivery API.
pub struct DeliveryClient {
    http: reqwest::Client,
    api_base: String,
    token: String,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl DeliveryClient {
    /// Transient API failures are retried up to `max_retries` times
    /// with exponential back-off starting at `backoff_base_ms`.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::Http`] if the underlying HTTP client
    /// cannot be constructed.
    pub fn new(
        api_base: impl Into<String>,
        token: impl Into<String>,
        timeout_secs: u64,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, DeliveryError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()?;
        let api_base: String = api_base.into();
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            token: token.into(),
            max_retries,
            backoff_base_ms,
        })
    }

    async fn post_json<T, B>(&self, path: &str, body: &B, context: &str) -> Result<T, DeliveryError>
    where
        T: serde::de::DeserializeOwned,
        B: Serialize,
    {
        let url = format!("{}{path}", self.api_base);
        retry::retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            let url = url.clone();
            async move {
                let response = self
                    .http
                    .post(&url)
                    .bearer_auth(&self.token)
                    .json(body)
                    .send()
                    .await?;

                let url = response.url().to_string();
                let status = response.status();
                if status == reqwest::StatusCode::UNAUTHORIZED
                    || status == reqwest::StatusCode::FORBIDDEN
                {
                    return Err(DeliveryError::Unauthorized { url });
                }
                if !status.is_success() {
                    return Err(DeliveryError::UnexpectedStatus {
                        status: status.as_u16(),
                        url,
                    });
                }
                let text = response.text().await?;
                serde_json::from_str(&text).map_err(|source| DeliveryError::Deserialize {
                    context: context.to_string(),
                    source,
                })
            }
        })
        .await
    }

    /// Quotes shipping options for a parcel, cheapest first.
    ///
    /// # Errors
    ///
    /// [`DeliveryError::NoOptions`] when the calculator returns an
    /// empty list, otherwise any transport or API error.
    pub async fn get_pricing(
        &self,
        request: &PricingRequest,
    ) -> Result<Vec<PricingOption>, DeliveryError> {
        let response: PricingResponse = self
            .post_json("/pricing-calculator", request, "delivery pricing")
            .await?;
        let mut options = response.options;
        if options.is_empty() {
            return Err(DeliveryError::NoOptions);
        }
        options.sort_by(|a, b| a.cost.cmp(&b.cost));
        Ok(options)
    }

    /// Creates a draft delivery order and returns the carrier's order id.
    ///
    /// # Errors
    ///
    /// Any transport or API error.
    pub async fn create_draft_order(
        &self,
        request: &DraftOrderRequest,
    ) -> Result<String, DeliveryError> {
        let response: DraftOrderResponse = self
            .post_json("/orders", request, "delivery draft order")
            .await?;
        tracing::info!(
            external_id = %request.external_id,
            delivery_order_id = %response.order_id,
            "draft delivery order created"
        );
        Ok(response.order_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pricing_option_parses_calculator_payload() {
        let payload = serde_json::json!({
            "tariff": "courier",
            "cost": "349.00",
            "delivery_days": 2
        });
        let option: PricingOption = serde_json::from_value(payload).expect("parses");
        assert_eq!(option.tariff, "courier");
        assert_eq!(option.cost, Decimal::new(34_900, 2));
        assert_eq!(option.delivery_days, Some(2));
    }
}
