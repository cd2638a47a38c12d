//! YooKassa v3 payment gateway client.
//!
//! All requests use HTTP Basic auth with the shop id and secret key.
//! Mutating calls carry an `Idempotence-Key` header so a retried
//! request cannot create a second payment. Webhook notifications are
//! treated as a hint only: the handler takes the payment id from the
//! notification and re-fetches the payment over the authenticated API
//! before acting on it.

use rust_decimal::Decimal;
use serde::de::DeserializeOwned;
use uuid::Uuid;

mod error;
mod retry;
mod types;

pub use error::KassaError;
pub use types::{
    Amount, Confirmation, Notification, NotificationObject, Payment, PaymentMetadata,
    PaymentStatus, Receipt, ReceiptItem, ReceiptStatus,
};

use types::{ApiErrorBody, ConfirmationRequest, CreatePaymentRequest, ReceiptListResponse};

/// Webhook event emitted when a payment reaches `succeeded`.
pub const EVENT_PAYMENT_SUCCEEDED: &str = "payment.succeeded";
/// Webhook event emitted when a payment is cancelled or expires.
pub const EVENT_PAYMENT_CANCELED: &str = "payment.canceled";

/// HTTP client for the YooKassa API.
pub struct KassaClient {
    http: reqwest::Client,
    api_base: String,
    shop_id: String,
    secret_key: String,
    return_url: String,
    max_retries: u32,
    backoff_base_ms: u64,
}

impl KassaClient {
    /// Builds a client for one shop. Transient gateway failures are
    /// retried up to `max_retries` times with exponential back-off
    /// starting at `backoff_base_ms`.
    ///
    /// # Errors
    ///
    /// Returns [`KassaError::Http`] if the underlying HTTP client
    /// cannot be constructed.
    pub fn new(
        api_base: impl Into<String>,
        shop_id: impl Into<String>,
        secret_key: impl Into<String>,
        return_url: impl Into<String>,
        timeout_secs: u64,
        max_retries: u32,
        backoff_base_ms: u64,
    ) -> Result<Self, KassaError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(timeout_secs))
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()?;
        let api_base: String = api_base.into();
        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            shop_id: shop_id.into(),
            secret_key: secret_key.into(),
            return_url: return_url.into(),
            max_retries,
            backoff_base_ms,
        })
    }

    async fn read_response<T: DeserializeOwned>(
        response: reqwest::Response,
        context: &str,
    ) -> Result<T, KassaError> {
        let url = response.url().to_string();
        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(KassaError::Unauthorized);
        }

        let body = response.text().await?;
        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<ApiErrorBody>(&body) {
                if err.code.is_some() || err.description.is_some() {
                    return Err(KassaError::Api {
                        code: err.code.unwrap_or_else(|| "unknown".to_string()),
                        description: err
                            .description
                            .unwrap_or_else(|| "no description".to_string()),
                    });
                }
            }
            return Err(KassaError::UnexpectedStatus {
                status: status.as_u16(),
                url,
            });
        }

        serde_json::from_str(&body).map_err(|source| KassaError::Deserialize {
            context: context.to_string(),
            source,
        })
    }

    /// Creates a redirect-confirmation payment for an order. The
    /// customer is sent to `confirmation.confirmation_url`; one
    /// idempotence key is shared by every retry attempt, so a transient
    /// failure cannot create a second payment.
    ///
    /// # Errors
    ///
    /// Any transport or gateway error after retries are exhausted.
    pub async fn create_payment(
        &self,
        amount_rub: Decimal,
        description: Option<&str>,
        order_id: i64,
    ) -> Result<Payment, KassaError> {
        let body = CreatePaymentRequest {
            amount: Amount::rub(amount_rub),
            capture: true,
            confirmation: ConfirmationRequest {
                kind: "redirect",
                return_url: &self.return_url,
            },
            description,
            metadata: PaymentMetadata {
                order_id: Some(order_id.to_string()),
            },
        };
        let url = format!("{}/v3/payments", self.api_base);
        let idempotence_key = Uuid::new_v4().to_string();
        retry::retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            let url = url.clone();
            let key = idempotence_key.clone();
            let body = &body;
            async move {
                let response = self
                    .http
                    .post(&url)
                    .basic_auth(&self.shop_id, Some(&self.secret_key))
                    .header("Idempotence-Key", key)
                    .json(body)
                    .send()
                    .await?;
                Self::read_response(response, "create payment").await
            }
        })
        .await
    }

    /// Fetches the authoritative state of a payment.
    ///
    /// # Errors
    ///
    /// [`KassaError::PaymentNotFound`] on 404, otherwise any transport
    /// or gateway error after retries are exhausted.
    pub async fn get_payment(&self, payment_id: &str) -> Result<Payment, KassaError> {
        let url = format!("{}/v3/payments/{payment_id}", self.api_base);
        retry::retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
            let url = url.clone();
            async move {
                let response = self
                    .http
                    .get(&url)
                    .basic_auth(&self.shop_id, Some(&self.secret_key))
                    .send()
                    .await?;
                if response.status() == reqwest::StatusCode::NOT_FOUND {
                    return Err(KassaError::PaymentNotFound(payment_id.to_string()));
                }
                Self::read_response(response, "get payment").await
            }
        })
        .await
    }

    /// Fetches the fiscal receipt registered for a payment, if any.
    /// Payments settled without fiscalization have no receipt.
    ///
    /// # Errors
    ///
    /// Any transport or gateway error after retries are exhausted.
    pub async fn find_receipt(&self, payment_id: &str) -> Result<Option<Receipt>, KassaError> {
        let url = format!("{}/v3/receipts", self.api_base);
        let list: ReceiptListResponse =
            retry::retry_with_backoff(self.max_retries, self.backoff_base_ms, || {
                let url = url.clone();
                async move {
                    let response = self
                        .http
                        .get(&url)
                        .query(&[("payment_id", payment_id)])
                        .basic_auth(&self.shop_id, Some(&self.secret_key))
                        .send()
                        .await?;
                    Self::read_response(response, "list receipts").await
                }
            })
            .await?;
        Ok(list.items.into_iter().next())
    }

    /// Resolves a webhook notification to the gateway's view of the
    /// payment. The notification body itself is never trusted.
    ///
    /// # Errors
    ///
    /// Same as [`Self::get_payment`].
    pub async fn resolve_notification(
        &self,
        notification: &Notification,
    ) -> Result<Payment, KassaError> {
        tracing::debug!(
            event = %notification.event,
            payment_id = %notification.object.id,
            "resolving payment notification"
        );
        self.get_payment(&notification.object.id).await
    }
}
