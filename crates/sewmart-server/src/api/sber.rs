//! SberMegaMarket webhook handlers.
//!
//! Answers use the marketplace's `{data, meta}` envelope. The
//! marketplace redelivers on non-2xx, so recoverable per-shipment
//! problems are recorded as alerts and acknowledged.

use axum::{extract::State, Extension, Json};
use rust_decimal::Decimal;
use sewmart_channels::sber::{webhook_ack, Envelope, OrderCancelRequest, OrderNewRequest};
use sewmart_core::{OrderStatus, PriceTier};
use sewmart_db::DbError;

use crate::middleware::RequestId;

use super::{map_db_error, orders::integration_for_channel, ApiError, AppState};

/// `POST /sber/order/new` — registers each offered shipment as a local
/// order. Redelivered shipments are recognized by their external id.
pub(super) async fn order_new(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(request): Json<OrderNewRequest>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    let integration = integration_for_channel(&state, "sber")
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let Some(integration) = integration else {
        tracing::warn!("sber order webhook without a configured integration");
        return Ok(Json(webhook_ack()));
    };

    for shipment in &request.data.shipments {
        let existing = sewmart_db::find_order_by_external(
            &state.pool,
            integration.id,
            &shipment.shipment_id,
        )
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
        if existing.is_some() {
            continue;
        }

        let mut items = Vec::with_capacity(shipment.items.len());
        for line in &shipment.items {
            let product = match sewmart_db::get_product_by_sku(&state.pool, &line.offer_id).await {
                Ok(product) => Some(product),
                Err(DbError::NotFound) => None,
                Err(e) => return Err(map_db_error(req_id.0.clone(), &e)),
            };
            let unit_price = line.price.unwrap_or_else(|| {
                product.as_ref().map_or(Decimal::ZERO, |p| {
                    p.pricing().effective_price(PriceTier::Retail, Decimal::ZERO)
                })
            });
            items.push(sewmart_db::NewOrderItem {
                product_id: product.as_ref().map(|p| p.id),
                sku: line.offer_id.clone(),
                name: product
                    .as_ref()
                    .map_or_else(|| line.offer_id.clone(), |p| p.name.clone()),
                unit_price,
                quantity: i32::try_from(line.quantity).unwrap_or(0),
                line_total: unit_price * Decimal::from(line.quantity),
            });
        }

        let order = sewmart_db::NewOrder {
            integration_id: Some(integration.id),
            external_order_id: Some(shipment.shipment_id.clone()),
            ..sewmart_db::NewOrder::default()
        };
        let row = sewmart_db::create_order(&state.pool, &order, &items)
            .await
            .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
        tracing::info!(
            order_id = row.id,
            shipment = %shipment.shipment_id,
            "sber shipment registered"
        );
    }

    Ok(Json(webhook_ack()))
}

/// `POST /sber/order/cancel` — cancels the local orders for the listed
/// shipments. Conflicting transitions become alerts, not errors.
pub(super) async fn order_cancel(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(request): Json<OrderCancelRequest>,
) -> Result<Json<Envelope<serde_json::Value>>, ApiError> {
    let integration = integration_for_channel(&state, "sber")
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let Some(integration) = integration else {
        return Ok(Json(webhook_ack()));
    };

    for shipment in &request.data.shipments {
        let Some(order) = sewmart_db::find_order_by_external(
            &state.pool,
            integration.id,
            &shipment.shipment_id,
        )
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
        else {
            tracing::warn!(shipment = %shipment.shipment_id, "sber cancel for unknown shipment");
            continue;
        };

        match sewmart_db::update_status(&state.pool, order.id, OrderStatus::Cancelled).await {
            Ok(_) => {
                tracing::info!(order_id = order.id, "sber shipment cancelled");
            }
            Err(
                e @ (DbError::StaleStatus { .. }
                | DbError::Core(sewmart_core::CoreError::IllegalTransition { .. })),
            ) => {
                tracing::warn!(order_id = order.id, error = %e, "sber cancel not applied");
                let reason = shipment.reason.as_deref().unwrap_or("unspecified");
                let alert = format!("sber cancel ({reason}) rejected: {e}");
                if let Err(e) = sewmart_db::set_alert(&state.pool, order.id, Some(&alert)).await {
                    tracing::error!(order_id = order.id, error = %e, "failed to record alert");
                }
            }
            Err(e) => return Err(map_db_error(req_id.0.clone(), &e)),
        }
    }

    Ok(Json(webhook_ack()))
}
