//! Order reconciliation jobs for the pull-driven marketplaces.

use chrono::{Duration, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sewmart_channels::{ozon, wb, ClientConfig};
use sewmart_core::{AppConfig, PriceTier};
use sewmart_db::{DbError, IntegrationRow};
use sqlx::PgPool;

/// Polls Ozon unfulfilled postings for every api-enabled ozon
/// integration and reconciles them with local orders.
pub(super) async fn run_ozon_poll(pool: &PgPool, config: &AppConfig) {
    let credentials = &config.ozon;
    let (Some(client_id), Some(api_key)) = (&credentials.client_id, &credentials.token) else {
        tracing::debug!("ozon credentials not configured; skipping poll");
        return;
    };

    let integrations = match api_integrations(pool, "ozon").await {
        Ok(integrations) => integrations,
        Err(e) => {
            tracing::error!(error = %e, "scheduler: failed to load ozon integrations");
            return;
        }
    };
    if integrations.is_empty() {
        return;
    }

    let client_config = ClientConfig::from_app_config(config, &credentials.api_base);
    let client = match ozon::OzonClient::new(client_config, client_id.as_str(), api_key.as_str()) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "scheduler: failed to build ozon client");
            return;
        }
    };

    // Postings with a shipment cutoff from two days back to a week out.
    let from = (Utc::now() - Duration::days(2)).to_rfc3339_opts(SecondsFormat::Secs, true);
    let to = (Utc::now() + Duration::days(7)).to_rfc3339_opts(SecondsFormat::Secs, true);
    let postings = match client.list_unfulfilled(&from, &to).await {
        Ok(postings) => postings,
        Err(e) => {
            tracing::error!(error = %e, "scheduler: ozon unfulfilled list failed");
            return;
        }
    };

    tracing::info!(count = postings.len(), "scheduler: ozon postings fetched");
    for integration in &integrations {
        for posting in &postings {
            if let Err(e) = reconcile_ozon_posting(pool, integration, posting).await {
                tracing::error!(
                    posting = %posting.posting_number,
                    error = %e,
                    "scheduler: ozon posting reconcile failed"
                );
            }
        }
    }
}

async fn reconcile_ozon_posting(
    pool: &PgPool,
    integration: &IntegrationRow,
    posting: &ozon::Posting,
) -> Result<(), DbError> {
    let status = match ozon::map_inbound_status(&posting.status) {
        Ok(status) => status,
        Err(e) => {
            tracing::warn!(posting = %posting.posting_number, error = %e, "unmapped ozon status");
            return Ok(());
        }
    };

    let existing =
        sewmart_db::find_order_by_external(pool, integration.id, &posting.posting_number).await?;

    let order_id = match existing {
        Some(order) => order.id,
        None => {
            let items = ozon_order_items(pool, posting).await?;
            let order = sewmart_db::NewOrder {
                integration_id: Some(integration.id),
                external_order_id: Some(posting.posting_number.clone()),
                ..sewmart_db::NewOrder::default()
            };
            let row = sewmart_db::create_order(pool, &order, &items).await?;
            tracing::info!(
                order_id = row.id,
                posting = %posting.posting_number,
                "scheduler: ozon posting registered"
            );
            row.id
        }
    };

    apply_status(pool, order_id, status, "ozon").await;
    Ok(())
}

async fn ozon_order_items(
    pool: &PgPool,
    posting: &ozon::Posting,
) -> Result<Vec<sewmart_db::NewOrderItem>, DbError> {
    let mut items = Vec::with_capacity(posting.products.len());
    for product in &posting.products {
        let local = match sewmart_db::get_product_by_sku(pool, &product.offer_id).await {
            Ok(local) => Some(local),
            Err(DbError::NotFound) => None,
            Err(e) => return Err(e),
        };
        let Some(quantity) = line_quantity(product.quantity) else {
            tracing::warn!(
                posting = %posting.posting_number,
                sku = %product.offer_id,
                quantity = product.quantity,
                "skipping line with unusable quantity"
            );
            continue;
        };
        let unit_price = product.price.unwrap_or_else(|| {
            local.as_ref().map_or(Decimal::ZERO, |p| {
                p.pricing().effective_price(PriceTier::Retail, Decimal::ZERO)
            })
        });
        items.push(sewmart_db::NewOrderItem {
            product_id: local.as_ref().map(|p| p.id),
            sku: product.offer_id.clone(),
            name: product
                .name
                .clone()
                .or_else(|| local.as_ref().map(|p| p.name.clone()))
                .unwrap_or_else(|| product.offer_id.clone()),
            unit_price,
            quantity,
            line_total: unit_price * Decimal::from(quantity),
        });
    }
    Ok(items)
}

/// Order-line snapshots require a positive quantity; a zero or
/// out-of-range vendor count would sink the whole posting's insert.
fn line_quantity(raw: u32) -> Option<i32> {
    i32::try_from(raw).ok().filter(|q| *q > 0)
}

/// Pulls new WB orders, registers them, then reconciles the status of
/// every open WB order.
pub(super) async fn run_wb_poll(pool: &PgPool, config: &AppConfig) {
    let Some(token) = &config.wb.token else {
        tracing::debug!("wb credentials not configured; skipping poll");
        return;
    };

    let integrations = match api_integrations(pool, "wb").await {
        Ok(integrations) => integrations,
        Err(e) => {
            tracing::error!(error = %e, "scheduler: failed to load wb integrations");
            return;
        }
    };
    if integrations.is_empty() {
        return;
    }

    let client_config = ClientConfig::from_app_config(config, &config.wb.api_base);
    let client = match wb::WbClient::new(client_config, token.as_str()) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "scheduler: failed to build wb client");
            return;
        }
    };

    for integration in &integrations {
        register_new_wb_orders(pool, &client, integration).await;
        reconcile_open_wb_orders(pool, &client, integration).await;
    }
}

async fn register_new_wb_orders(
    pool: &PgPool,
    client: &wb::WbClient,
    integration: &IntegrationRow,
) {
    let new_orders = match client.list_new_orders().await {
        Ok(orders) => orders,
        Err(e) => {
            tracing::error!(error = %e, "scheduler: wb new-orders fetch failed");
            return;
        }
    };

    for wb_order in &new_orders {
        if let Err(e) = register_wb_order(pool, integration, wb_order).await {
            tracing::error!(wb_order = wb_order.id, error = %e, "scheduler: wb order register failed");
        }
    }
}

async fn register_wb_order(
    pool: &PgPool,
    integration: &IntegrationRow,
    wb_order: &wb::WbOrder,
) -> Result<(), DbError> {
    let external_id = wb_order.id.to_string();
    if sewmart_db::find_order_by_external(pool, integration.id, &external_id)
        .await?
        .is_some()
    {
        return Ok(());
    }

    let local = match sewmart_db::get_product_by_sku(pool, &wb_order.article).await {
        Ok(local) => Some(local),
        Err(DbError::NotFound) => None,
        Err(e) => return Err(e),
    };
    // WB prices arrive in kopecks.
    let unit_price = wb_order
        .converted_price
        .map_or(Decimal::ZERO, |kopecks| Decimal::new(kopecks, 2));

    let items = vec![sewmart_db::NewOrderItem {
        product_id: local.as_ref().map(|p| p.id),
        sku: wb_order.article.clone(),
        name: local
            .as_ref()
            .map_or_else(|| wb_order.article.clone(), |p| p.name.clone()),
        unit_price,
        quantity: 1,
        line_total: unit_price,
    }];
    let order = sewmart_db::NewOrder {
        integration_id: Some(integration.id),
        external_order_id: Some(external_id),
        ..sewmart_db::NewOrder::default()
    };
    let row = sewmart_db::create_order(pool, &order, &items).await?;
    tracing::info!(order_id = row.id, wb_order = wb_order.id, "scheduler: wb order registered");
    Ok(())
}

async fn reconcile_open_wb_orders(
    pool: &PgPool,
    client: &wb::WbClient,
    integration: &IntegrationRow,
) {
    let open = match sewmart_db::list_open_orders_for_integration(pool, integration.id).await {
        Ok(open) => open,
        Err(e) => {
            tracing::error!(error = %e, "scheduler: failed to list open wb orders");
            return;
        }
    };

    let ids: Vec<i64> = open
        .iter()
        .filter_map(|o| o.external_order_id.as_deref())
        .filter_map(|id| id.parse().ok())
        .collect();
    let statuses = match client.get_statuses(&ids).await {
        Ok(statuses) => statuses,
        Err(e) => {
            tracing::error!(error = %e, "scheduler: wb status poll failed");
            return;
        }
    };

    for vendor in &statuses {
        let external_id = vendor.id.to_string();
        let Some(order) = open
            .iter()
            .find(|o| o.external_order_id.as_deref() == Some(external_id.as_str()))
        else {
            continue;
        };
        let status = match wb::map_inbound_status(&vendor.supplier_status, &vendor.wb_status) {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(wb_order = vendor.id, error = %e, "unmapped wb status");
                continue;
            }
        };
        apply_status(pool, order.id, status, "wb").await;
    }
}

/// Applies a polled status change, logging conflicts instead of failing
/// the batch. A lagging order is walked through the intermediate
/// fulfilment states, so a posting first seen past `Confirmed` still
/// converges. A conflict here means the next poll will retry with
/// fresh state.
async fn apply_status(pool: &PgPool, order_id: i64, status: sewmart_core::OrderStatus, channel: &str) {
    match sewmart_db::advance_status(pool, order_id, status).await {
        Ok(_) => {}
        Err(
            e @ (DbError::StaleStatus { .. }
            | DbError::Core(sewmart_core::CoreError::IllegalTransition { .. })),
        ) => {
            tracing::warn!(order_id, channel, status = %status, error = %e, "scheduler: status not applied");
        }
        Err(e) => {
            tracing::error!(order_id, channel, error = %e, "scheduler: status update failed");
        }
    }
}

pub(super) async fn api_integrations(
    pool: &PgPool,
    channel: &str,
) -> Result<Vec<IntegrationRow>, DbError> {
    let integrations = sewmart_db::list_integrations_by_channel(pool, channel).await?;
    Ok(integrations.into_iter().filter(|i| i.uses_api).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_quantity_rejects_zero_and_overflow() {
        assert_eq!(line_quantity(0), None);
        assert_eq!(line_quantity(1), Some(1));
        assert_eq!(line_quantity(40), Some(40));
        assert_eq!(line_quantity(u32::MAX), None);
    }
}
