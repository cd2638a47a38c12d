//! Payment gateway webhook handler.
//!
//! The gateway sends unauthenticated notifications; nothing in the
//! payload is trusted beyond the payment id, which is re-fetched over
//! the authenticated API before any order is touched.

use axum::{extract::State, http::StatusCode, Extension, Json};
use sewmart_kassa::{KassaClient, Notification, PaymentStatus};

use crate::middleware::RequestId;

use super::AppState;

/// `POST /kassa/webhook`. Always acknowledges with 200 once the payload
/// parses; processing problems are logged and resolved on the next
/// notification or by operator review.
pub(super) async fn webhook(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(notification): Json<Notification>,
) -> StatusCode {
    tracing::info!(
        request_id = %req_id.0,
        event = %notification.event,
        payment_id = %notification.object.id,
        "payment notification received"
    );

    let config = &state.config;
    let (Some(shop_id), Some(secret_key)) = (&config.kassa_shop_id, &config.kassa_secret_key)
    else {
        tracing::error!("payment notification received but gateway credentials are not configured");
        return StatusCode::OK;
    };

    let client = match KassaClient::new(
        config.kassa_api_base.clone(),
        shop_id.clone(),
        secret_key.clone(),
        config.kassa_return_url.clone(),
        config.http_timeout_secs,
        config.http_max_retries,
        config.http_retry_backoff_base_secs.saturating_mul(1000),
    ) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "failed to build payment gateway client");
            return StatusCode::OK;
        }
    };

    let payment = match client.resolve_notification(&notification).await {
        Ok(payment) => payment,
        Err(e) => {
            tracing::error!(
                payment_id = %notification.object.id,
                error = %e,
                "failed to resolve payment notification"
            );
            return StatusCode::OK;
        }
    };

    let Some(order_id) = payment
        .metadata
        .as_ref()
        .and_then(|m| m.order_id.as_deref())
        .and_then(|id| id.parse::<i64>().ok())
    else {
        tracing::warn!(payment_id = %payment.id, "payment carries no usable order id");
        return StatusCode::OK;
    };

    match payment.status {
        PaymentStatus::Succeeded if payment.paid => {
            if let Err(e) = sewmart_db::mark_paid(&state.pool, order_id, &payment.id).await {
                tracing::error!(order_id, payment_id = %payment.id, error = %e, "failed to mark order paid");
            } else {
                tracing::info!(order_id, payment_id = %payment.id, "order marked paid");
                record_receipt(&client, order_id, &payment.id).await;
            }
        }
        PaymentStatus::Canceled => {
            let alert = format!("payment {} was canceled", payment.id);
            if let Err(e) = sewmart_db::set_alert(&state.pool, order_id, Some(&alert)).await {
                tracing::error!(order_id, error = %e, "failed to record payment alert");
            }
        }
        other => {
            tracing::debug!(order_id, status = ?other, "payment notification ignored");
        }
    }

    StatusCode::OK
}

/// Logs the fiscal receipt for a settled payment. The receipt may lag
/// the payment; absence here is normal.
async fn record_receipt(client: &KassaClient, order_id: i64, payment_id: &str) {
    match client.find_receipt(payment_id).await {
        Ok(Some(receipt)) => {
            tracing::info!(
                order_id,
                receipt_id = %receipt.id,
                fiscal_document = receipt.fiscal_document_number.as_deref().unwrap_or("-"),
                "fiscal receipt registered"
            );
        }
        Ok(None) => {
            tracing::debug!(order_id, payment_id, "no fiscal receipt registered yet");
        }
        Err(e) => {
            tracing::warn!(order_id, payment_id, error = %e, "fiscal receipt lookup failed");
        }
    }
}
