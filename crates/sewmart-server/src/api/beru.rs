//! Beru (Yandex Market FBS) webhook handlers.
//!
//! These endpoints answer in the marketplace's own wire format, not the
//! internal API envelope. Replies must be synchronous: the marketplace
//! treats a non-2xx answer as "shop unavailable" and retries.

use axum::{extract::State, Extension, Json};
use chrono::Utc;
use rust_decimal::Decimal;
use sewmart_channels::beru::{
    CartRequest, CartResponse, CartResponseBody, CartResponseItem, OrderAcceptDecision,
    OrderAcceptRequest, OrderAcceptResponse, OrderStatusRequest, SkuStock, StocksRequest,
    StocksResponse,
};
use sewmart_core::{available_quantity, PriceTier};
use sewmart_db::{DbError, IntegrationRow};

use crate::middleware::RequestId;

use super::{map_db_error, orders::integration_for_channel, ApiError, AppState};

/// Availability of one sku for the channel: sellable units after
/// subtracting open-order reservations, restricted to the channel's
/// suppliers.
async fn channel_availability(
    state: &AppState,
    integration: Option<&IntegrationRow>,
    product_id: i64,
) -> Result<u32, DbError> {
    let stocks = sewmart_db::list_stocks_for_product(&state.pool, product_id).await?;
    let reserved = sewmart_db::reserved_quantity(&state.pool, product_id).await?;
    let supplier_stocks: Vec<_> = stocks.iter().map(|s| s.as_supplier_stock()).collect();
    let allowed = integration.and_then(|i| i.suppliers.as_deref());
    Ok(available_quantity(&supplier_stocks, allowed, reserved))
}

/// `POST /beru/cart` — answers which cart lines the shop can fulfil and
/// at what price.
pub(super) async fn cart(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(request): Json<CartRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let integration = integration_for_channel(&state, "beru")
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let mut items = Vec::with_capacity(request.cart.items.len());
    for line in &request.cart.items {
        let product = match sewmart_db::get_product_by_sku(&state.pool, &line.offer_id).await {
            Ok(product) if product.is_active => product,
            Ok(_) | Err(DbError::NotFound) => {
                items.push(CartResponseItem {
                    offer_id: line.offer_id.clone(),
                    count: 0,
                    price: Decimal::ZERO,
                    delivery: false,
                    feed_id: line.feed_id,
                });
                continue;
            }
            Err(e) => return Err(map_db_error(req_id.0.clone(), &e)),
        };

        let available = channel_availability(&state, integration.as_ref(), product.id)
            .await
            .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
        let count = line.count.min(available);
        items.push(CartResponseItem {
            offer_id: line.offer_id.clone(),
            count,
            price: product
                .pricing()
                .effective_price(PriceTier::Retail, Decimal::ZERO),
            delivery: count > 0,
            feed_id: line.feed_id,
        });
    }

    Ok(Json(CartResponse {
        cart: CartResponseBody { items },
    }))
}

/// `POST /beru/order/accept` — registers the marketplace order locally
/// and accepts it. A redelivered webhook finds the existing order and
/// answers the same way.
pub(super) async fn order_accept(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(request): Json<OrderAcceptRequest>,
) -> Result<Json<OrderAcceptResponse>, ApiError> {
    let integration = integration_for_channel(&state, "beru")
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let Some(integration) = integration else {
        tracing::warn!("beru order webhook without a configured integration");
        return Ok(Json(OrderAcceptResponse {
            order: OrderAcceptDecision {
                accepted: false,
                id: None,
                reason: Some("OTHER"),
            },
        }));
    };

    let external_id = request.order.id.to_string();
    if let Some(existing) =
        sewmart_db::find_order_by_external(&state.pool, integration.id, &external_id)
            .await
            .map_err(|e| map_db_error(req_id.0.clone(), &e))?
    {
        return Ok(Json(accept_decision(existing.id)));
    }

    let mut items = Vec::with_capacity(request.order.items.len());
    for line in &request.order.items {
        let product = match sewmart_db::get_product_by_sku(&state.pool, &line.offer_id).await {
            Ok(product) => Some(product),
            Err(DbError::NotFound) => None,
            Err(e) => return Err(map_db_error(req_id.0.clone(), &e)),
        };
        // The marketplace price is authoritative for its own orders;
        // the catalog price is only a fallback.
        let unit_price = line.price.unwrap_or_else(|| {
            product.as_ref().map_or(Decimal::ZERO, |p| {
                p.pricing().effective_price(PriceTier::Retail, Decimal::ZERO)
            })
        });
        items.push(sewmart_db::NewOrderItem {
            product_id: product.as_ref().map(|p| p.id),
            sku: line.offer_id.clone(),
            name: line
                .offer_name
                .clone()
                .or_else(|| product.as_ref().map(|p| p.name.clone()))
                .unwrap_or_else(|| line.offer_id.clone()),
            unit_price,
            quantity: i32::try_from(line.count).unwrap_or(0),
            line_total: unit_price * Decimal::from(line.count),
        });
    }

    let order = sewmart_db::NewOrder {
        integration_id: Some(integration.id),
        external_order_id: Some(external_id),
        ..sewmart_db::NewOrder::default()
    };
    let row = sewmart_db::create_order(&state.pool, &order, &items)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    tracing::info!(order_id = row.id, external = ?row.external_order_id, "beru order accepted");
    Ok(Json(accept_decision(row.id)))
}

fn accept_decision(order_id: i64) -> OrderAcceptResponse {
    OrderAcceptResponse {
        order: OrderAcceptDecision {
            accepted: true,
            id: Some(order_id.to_string()),
            reason: None,
        },
    }
}

/// `POST /beru/order/status` — applies a marketplace status change to
/// the local order. Transition conflicts are recorded as an alert and
/// acknowledged, so the marketplace does not redeliver forever.
pub(super) async fn order_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(request): Json<OrderStatusRequest>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let integration = integration_for_channel(&state, "beru")
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let Some(integration) = integration else {
        return Ok(Json(serde_json::json!({"order": {"accepted": true}})));
    };

    let external_id = request.order.id.to_string();
    let Some(order) = sewmart_db::find_order_by_external(&state.pool, integration.id, &external_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?
    else {
        tracing::warn!(external = %external_id, "beru status for unknown order");
        return Ok(Json(serde_json::json!({"order": {"accepted": true}})));
    };

    let vendor_status = request.order.status.as_deref().unwrap_or_default();
    let status = sewmart_channels::beru::map_inbound_status(
        vendor_status,
        request.order.substatus.as_deref(),
    )
    .map_err(|e| ApiError::new(req_id.0.clone(), "validation_error", e.to_string()))?;

    match sewmart_db::update_status(&state.pool, order.id, status).await {
        Ok(_) => {}
        Err(
            e @ (DbError::StaleStatus { .. }
            | DbError::Core(sewmart_core::CoreError::IllegalTransition { .. })),
        ) => {
            tracing::warn!(order_id = order.id, error = %e, "beru status not applied");
            let alert = format!("beru reported {vendor_status}: {e}");
            if let Err(e) = sewmart_db::set_alert(&state.pool, order.id, Some(&alert)).await {
                tracing::error!(order_id = order.id, error = %e, "failed to record alert");
            }
        }
        Err(e) => return Err(map_db_error(req_id.0.clone(), &e)),
    }

    Ok(Json(serde_json::json!({"order": {"accepted": true}})))
}

/// `POST /beru/stocks` — answers live warehouse stock for the requested
/// skus. Unknown skus answer zero rather than erroring the whole batch.
pub(super) async fn stocks(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(request): Json<StocksRequest>,
) -> Result<Json<StocksResponse>, ApiError> {
    let integration = integration_for_channel(&state, "beru")
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let updated_at = Utc::now().to_rfc3339();

    let mut skus = Vec::with_capacity(request.skus.len());
    for sku in &request.skus {
        let count = match sewmart_db::get_product_by_sku(&state.pool, sku).await {
            Ok(product) if product.is_active => {
                channel_availability(&state, integration.as_ref(), product.id)
                    .await
                    .map_err(|e| map_db_error(req_id.0.clone(), &e))?
            }
            Ok(_) | Err(DbError::NotFound) => 0,
            Err(e) => return Err(map_db_error(req_id.0.clone(), &e)),
        };
        skus.push(SkuStock::fit(
            sku.clone(),
            request.warehouse_id,
            count,
            updated_at.clone(),
        ));
    }

    Ok(Json(StocksResponse { skus }))
}
