//! Wire types for the YooKassa v3 API and its webhook notifications.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Money as the gateway writes it: decimal string plus ISO currency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Amount {
    pub value: Decimal,
    pub currency: String,
}

impl Amount {
    #[must_use]
    pub fn rub(value: Decimal) -> Self {
        Self {
            value,
            currency: "RUB".to_string(),
        }
    }
}

/// Payment lifecycle state as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    WaitingForCapture,
    Succeeded,
    Canceled,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Payment {
    pub id: String,
    pub status: PaymentStatus,
    pub amount: Amount,
    #[serde(default)]
    pub paid: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub confirmation: Option<Confirmation>,
    #[serde(default)]
    pub metadata: Option<PaymentMetadata>,
    #[serde(default)]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Confirmation {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub confirmation_url: Option<String>,
}

/// Our own keys carried through the gateway and back in webhooks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMetadata {
    #[serde(default)]
    pub order_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct CreatePaymentRequest<'a> {
    pub amount: Amount,
    pub capture: bool,
    pub confirmation: ConfirmationRequest<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<&'a str>,
    pub metadata: PaymentMetadata,
}

#[derive(Debug, Serialize)]
pub(crate) struct ConfirmationRequest<'a> {
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub return_url: &'a str,
}

/// Webhook envelope: `{"type": "notification", "event": ..., "object": {...}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Notification {
    #[serde(rename = "type")]
    pub kind: String,
    pub event: String,
    pub object: NotificationObject,
}

/// The notification body is untrusted; only the payment id is taken
/// from it, the rest is re-fetched from the gateway.
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationObject {
    pub id: String,
}

/// Fiscal receipt registration state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReceiptStatus {
    Pending,
    Succeeded,
    Canceled,
}

/// A fiscal receipt registered for a payment.
#[derive(Debug, Clone, Deserialize)]
pub struct Receipt {
    pub id: String,
    pub status: ReceiptStatus,
    #[serde(default)]
    pub payment_id: Option<String>,
    /// Fiscal document number assigned by the fiscal data operator.
    #[serde(default)]
    pub fiscal_document_number: Option<String>,
    #[serde(default)]
    pub fiscal_storage_number: Option<String>,
    #[serde(default)]
    pub registered_at: Option<String>,
    #[serde(default)]
    pub items: Vec<ReceiptItem>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReceiptItem {
    pub description: String,
    pub quantity: Decimal,
    pub amount: Amount,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReceiptListResponse {
    #[serde(default)]
    pub items: Vec<Receipt>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_parses_gateway_payload() {
        let payload = serde_json::json!({
            "id": "2d1f0d35-000f-5000-8000-1a2b3c4d5e6f",
            "status": "succeeded",
            "paid": true,
            "amount": {"value": "22491.00", "currency": "RUB"},
            "description": "Order SW-1042",
            "metadata": {"order_id": "1042"},
            "created_at": "2026-03-01T10:00:00.000Z"
        });
        let payment: Payment = serde_json::from_value(payload).expect("parses");
        assert_eq!(payment.status, PaymentStatus::Succeeded);
        assert!(payment.paid);
        assert_eq!(
            payment.metadata.and_then(|m| m.order_id).as_deref(),
            Some("1042")
        );
    }

    #[test]
    fn notification_yields_only_the_payment_id() {
        let payload = serde_json::json!({
            "type": "notification",
            "event": "payment.succeeded",
            "object": {
                "id": "2d1f0d35-000f-5000-8000-1a2b3c4d5e6f",
                "status": "succeeded",
                "extra_field_we_ignore": {"nested": true}
            }
        });
        let notification: Notification = serde_json::from_value(payload).expect("parses");
        assert_eq!(notification.event, "payment.succeeded");
        assert_eq!(notification.object.id, "2d1f0d35-000f-5000-8000-1a2b3c4d5e6f");
    }

    #[test]
    fn amount_serializes_value_as_decimal_string() {
        let amount = Amount::rub(Decimal::new(2_249_100, 2));
        let json = serde_json::to_value(&amount).expect("serializes");
        assert_eq!(json["value"], "22491.00");
        assert_eq!(json["currency"], "RUB");
    }
}
