use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sewmart_channels::{beru, ozon, sber, wb, ClientConfig};
use sewmart_core::OrderStatus;
use sewmart_db::{IntegrationRow, OrderItemRow, OrderRow};

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct OrderView {
    id: i64,
    integration_id: Option<i64>,
    external_order_id: Option<String>,
    status: String,
    paid: bool,
    payment_id: Option<String>,
    price_tier: String,
    delivery_price: Decimal,
    delivery_order_id: Option<String>,
    delivery_info: Option<String>,
    alert: Option<String>,
    customer_name: Option<String>,
    customer_phone: Option<String>,
    customer_email: Option<String>,
    delivery_address: Option<String>,
    total: Option<Decimal>,
    items: Option<Vec<OrderItemView>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct OrderItemView {
    product_id: Option<i64>,
    sku: String,
    name: String,
    unit_price: Decimal,
    quantity: i32,
    line_total: Decimal,
}

impl OrderView {
    fn from_row(row: OrderRow, items: Option<Vec<OrderItemRow>>) -> Self {
        let (total, items) = match items {
            Some(items) => {
                let line_totals: Vec<Decimal> = items.iter().map(|i| i.line_total).collect();
                let total = sewmart_core::order_total(&line_totals, row.delivery_price);
                (
                    Some(total),
                    Some(items.into_iter().map(OrderItemView::from_row).collect()),
                )
            }
            None => (None, None),
        };
        Self {
            id: row.id,
            integration_id: row.integration_id,
            external_order_id: row.external_order_id,
            status: row.status,
            paid: row.paid,
            payment_id: row.payment_id,
            price_tier: row.price_tier,
            delivery_price: row.delivery_price,
            delivery_order_id: row.delivery_order_id,
            delivery_info: row.delivery_info,
            alert: row.alert,
            customer_name: row.customer_name,
            customer_phone: row.customer_phone,
            customer_email: row.customer_email,
            delivery_address: row.delivery_address,
            total,
            items,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl OrderItemView {
    fn from_row(row: OrderItemRow) -> Self {
        Self {
            product_id: row.product_id,
            sku: row.sku,
            name: row.name,
            unit_price: row.unit_price,
            quantity: row.quantity,
            line_total: row.line_total,
        }
    }
}

#[derive(Debug, Deserialize)]
pub(super) struct OrderQuery {
    pub status: Option<String>,
    pub integration_id: Option<i64>,
    pub limit: Option<i64>,
}

pub(super) async fn list_orders(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<OrderQuery>,
) -> Result<Json<ApiResponse<Vec<OrderView>>>, ApiError> {
    let rows = sewmart_db::list_orders(
        &state.pool,
        &sewmart_db::OrderListFilters {
            status: query.status,
            integration_id: query.integration_id,
            limit: Some(normalize_limit(query.limit)),
        },
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| OrderView::from_row(row, None))
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}

pub(super) async fn get_order(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(order_id): Path<i64>,
) -> Result<Json<ApiResponse<OrderView>>, ApiError> {
    let row = sewmart_db::get_order(&state.pool, order_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let items = sewmart_db::list_order_items(&state.pool, order_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: OrderView::from_row(row, Some(items)),
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct StatusBody {
    pub status: String,
}

/// Moves the order through the workflow and mirrors the change to its
/// sales channel. A failed channel push does not roll back the local
/// transition; it is recorded as an operator alert on the order.
pub(super) async fn update_order_status(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(order_id): Path<i64>,
    Json(body): Json<StatusBody>,
) -> Result<Json<ApiResponse<OrderView>>, ApiError> {
    let to: OrderStatus = body.status.parse().map_err(|_| {
        ApiError::new(
            req_id.0.clone(),
            "validation_error",
            format!("unknown order status: {}", body.status),
        )
    })?;

    let mut row = sewmart_db::update_status(&state.pool, order_id, to)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    if let Err(reason) = push_status_to_channel(&state, &row, to).await {
        tracing::warn!(order_id, status = %to, reason, "channel status push failed");
        let alert = format!("status push failed: {reason}");
        if let Err(e) = sewmart_db::set_alert(&state.pool, order_id, Some(&alert)).await {
            tracing::error!(order_id, error = %e, "failed to record push alert");
        } else {
            row.alert = Some(alert);
        }
    }

    Ok(Json(ApiResponse {
        data: OrderView::from_row(row, None),
        meta: ResponseMeta::new(req_id.0),
    }))
}

/// Mirrors a local status change to the marketplace the order came
/// from. Pull-driven channels and statuses the channel does not accept
/// are skipped silently.
async fn push_status_to_channel(
    state: &AppState,
    order: &OrderRow,
    status: OrderStatus,
) -> Result<(), String> {
    let Some(integration_id) = order.integration_id else {
        return Ok(());
    };
    let Some(external_id) = order.external_order_id.as_deref() else {
        return Ok(());
    };

    let integration = sewmart_db::get_integration(&state.pool, integration_id)
        .await
        .map_err(|e| format!("integration lookup failed: {e}"))?;
    if !integration.uses_api {
        return Ok(());
    }

    match integration.channel.as_str() {
        "beru" => push_beru(state, external_id, status).await,
        "sber" => push_sber(state, order, external_id, status).await,
        "ozon" => push_ozon(state, order, external_id, status).await,
        "wb" => push_wb(state, external_id, status).await,
        other => {
            tracing::warn!(channel = other, "no status push for unknown channel");
            Ok(())
        }
    }
}

async fn push_beru(state: &AppState, external_id: &str, status: OrderStatus) -> Result<(), String> {
    if beru::map_outbound_status(status).is_none() {
        return Ok(());
    }
    let credentials = &state.config.beru;
    let (Some(token), Some(campaign_id)) = (&credentials.token, &credentials.campaign_id) else {
        return Err("beru credentials not configured".to_string());
    };
    let marketplace_order_id: i64 = external_id
        .parse()
        .map_err(|_| format!("beru order id is not numeric: {external_id}"))?;
    let config = ClientConfig::from_app_config(&state.config, &credentials.api_base);
    let client = beru::BeruClient::new(config, token.as_str(), campaign_id.as_str())
        .map_err(|e| e.to_string())?;
    client
        .update_order_status(marketplace_order_id, status)
        .await
        .map_err(|e| e.to_string())
}

async fn push_sber(
    state: &AppState,
    order: &OrderRow,
    external_id: &str,
    status: OrderStatus,
) -> Result<(), String> {
    if sber::map_outbound_action(status).is_none() {
        return Ok(());
    }
    let credentials = &state.config.sber;
    let Some(token) = &credentials.token else {
        return Err("sber credentials not configured".to_string());
    };
    let items = sewmart_db::list_order_items(&state.pool, order.id)
        .await
        .map_err(|e| format!("order items lookup failed: {e}"))?;
    let lines: Vec<sber::ItemLine> = items
        .iter()
        .enumerate()
        .map(|(index, item)| sber::ItemLine {
            item_index: i32::try_from(index).unwrap_or(i32::MAX).saturating_add(1),
            quantity: u32::try_from(item.quantity).unwrap_or(0),
        })
        .collect();
    let order_code = format!("SW-{}", order.id);

    let config = ClientConfig::from_app_config(&state.config, &credentials.api_base);
    let client = sber::SberClient::new(config, token.as_str()).map_err(|e| e.to_string())?;
    client
        .push_status(external_id, &order_code, status, &lines)
        .await
        .map_err(|e| e.to_string())
}

async fn push_ozon(
    state: &AppState,
    order: &OrderRow,
    external_id: &str,
    status: OrderStatus,
) -> Result<(), String> {
    // Ozon is pull-driven except for the ship call that closes assembly.
    if status != OrderStatus::Assembled {
        return Ok(());
    }
    let credentials = &state.config.ozon;
    let (Some(client_id), Some(api_key)) = (&credentials.client_id, &credentials.token) else {
        return Err("ozon credentials not configured".to_string());
    };
    let items = sewmart_db::list_order_items(&state.pool, order.id)
        .await
        .map_err(|e| format!("order items lookup failed: {e}"))?;
    let lines = ozon_ship_lines(&items)?;

    let config = ClientConfig::from_app_config(&state.config, &credentials.api_base);
    let client = ozon::OzonClient::new(config, client_id.as_str(), api_key.as_str())
        .map_err(|e| e.to_string())?;
    client
        .ship_posting(external_id, lines)
        .await
        .map_err(|e| e.to_string())
}

/// Ozon's ship call addresses lines by the numeric catalogue id, which
/// doubles as the sku for Ozon-listed products.
fn ozon_ship_lines(items: &[OrderItemRow]) -> Result<Vec<ozon::ShipLine>, String> {
    items
        .iter()
        .map(|item| {
            let product_id: i64 = item
                .sku
                .parse()
                .map_err(|_| format!("ozon sku is not numeric: {}", item.sku))?;
            Ok(ozon::ShipLine {
                product_id,
                quantity: u32::try_from(item.quantity).unwrap_or(0),
            })
        })
        .collect()
}

async fn push_wb(state: &AppState, external_id: &str, status: OrderStatus) -> Result<(), String> {
    // WB reads assembly progress from its own status polls; only a
    // cancellation must be pushed.
    if status != OrderStatus::Cancelled {
        return Ok(());
    }
    let credentials = &state.config.wb;
    let Some(token) = &credentials.token else {
        return Err("wb credentials not configured".to_string());
    };
    let wb_order_id: i64 = external_id
        .parse()
        .map_err(|_| format!("wb order id is not numeric: {external_id}"))?;

    let config = ClientConfig::from_app_config(&state.config, &credentials.api_base);
    let client = wb::WbClient::new(config, token.as_str()).map_err(|e| e.to_string())?;
    client
        .cancel_order(wb_order_id)
        .await
        .map_err(|e| e.to_string())
}

/// Looks up the one api-enabled integration for a channel, used by the
/// webhook handlers to attach inbound orders.
pub(super) async fn integration_for_channel(
    state: &AppState,
    channel: &str,
) -> Result<Option<IntegrationRow>, sewmart_db::DbError> {
    let mut integrations =
        sewmart_db::list_integrations_by_channel(&state.pool, channel).await?;
    let integration = integrations.drain(..).find(|i| i.uses_api);
    Ok(integration)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(sku: &str, quantity: i32) -> OrderItemRow {
        OrderItemRow {
            id: 1,
            order_id: 1,
            product_id: Some(1),
            sku: sku.to_string(),
            name: "Test".to_string(),
            unit_price: Decimal::new(10_000, 2),
            quantity,
            line_total: Decimal::new(10_000, 2) * Decimal::from(quantity),
        }
    }

    #[test]
    fn ozon_ship_lines_parses_numeric_skus() {
        let lines = ozon_ship_lines(&[item("123456", 2), item("789", 1)]).expect("parses");
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].product_id, 123_456);
        assert_eq!(lines[0].quantity, 2);
    }

    #[test]
    fn ozon_ship_lines_rejects_non_numeric_skus() {
        let err = ozon_ship_lines(&[item("JANOME-500E", 1)]).expect_err("rejects");
        assert!(err.contains("JANOME-500E"));
    }
}
