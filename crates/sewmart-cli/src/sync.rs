//! One-shot order reconciliation, the CLI counterpart of the server's
//! polling jobs. Fails fast on vendor or database errors so the
//! operator sees them; status conflicts are counted as skips.

use anyhow::{bail, Context};
use chrono::{Duration, SecondsFormat, Utc};
use rust_decimal::Decimal;
use sewmart_channels::{ozon, wb, ClientConfig};
use sewmart_core::{AppConfig, PriceTier};
use sewmart_db::{DbError, IntegrationRow};
use sqlx::PgPool;

use crate::Channel;

pub(crate) struct SyncSummary {
    pub registered: u32,
    pub updated: u32,
    pub skipped: u32,
}

pub(crate) async fn run(
    pool: &PgPool,
    config: &AppConfig,
    channel: Channel,
) -> anyhow::Result<SyncSummary> {
    let integration = api_integration(pool, channel.as_str()).await?;
    match channel {
        Channel::Ozon => sync_ozon(pool, config, &integration).await,
        Channel::Wb => sync_wb(pool, config, &integration).await,
    }
}

/// Picks the first API-enabled integration for the channel.
pub(crate) async fn api_integration(
    pool: &PgPool,
    channel: &str,
) -> anyhow::Result<IntegrationRow> {
    let integrations = sewmart_db::list_integrations_by_channel(pool, channel).await?;
    integrations
        .into_iter()
        .find(|i| i.uses_api)
        .with_context(|| format!("no API-enabled integration configured for channel '{channel}'"))
}

async fn sync_ozon(
    pool: &PgPool,
    config: &AppConfig,
    integration: &IntegrationRow,
) -> anyhow::Result<SyncSummary> {
    let credentials = &config.ozon;
    let (Some(client_id), Some(api_key)) = (&credentials.client_id, &credentials.token) else {
        bail!("SEWMART_OZON_CLIENT_ID / SEWMART_OZON_TOKEN are not set");
    };
    let client = ozon::OzonClient::new(
        ClientConfig::from_app_config(config, &credentials.api_base),
        client_id.as_str(),
        api_key.as_str(),
    )?;

    let from = (Utc::now() - Duration::days(2)).to_rfc3339_opts(SecondsFormat::Secs, true);
    let to = (Utc::now() + Duration::days(7)).to_rfc3339_opts(SecondsFormat::Secs, true);
    let postings = client.list_unfulfilled(&from, &to).await?;
    tracing::info!(count = postings.len(), "fetched ozon postings");

    let mut summary = SyncSummary {
        registered: 0,
        updated: 0,
        skipped: 0,
    };
    for posting in &postings {
        let status = match ozon::map_inbound_status(&posting.status) {
            Ok(status) => status,
            Err(e) => {
                tracing::warn!(posting = %posting.posting_number, error = %e, "skipping posting");
                summary.skipped += 1;
                continue;
            }
        };

        let order_id = match sewmart_db::find_order_by_external(
            pool,
            integration.id,
            &posting.posting_number,
        )
        .await?
        {
            Some(order) => order.id,
            None => {
                let items = posting_items(pool, posting).await?;
                let order = sewmart_db::NewOrder {
                    integration_id: Some(integration.id),
                    external_order_id: Some(posting.posting_number.clone()),
                    ..sewmart_db::NewOrder::default()
                };
                let row = sewmart_db::create_order(pool, &order, &items).await?;
                summary.registered += 1;
                row.id
            }
        };

        apply(pool, order_id, status, &mut summary).await?;
    }
    Ok(summary)
}

async fn posting_items(
    pool: &PgPool,
    posting: &ozon::Posting,
) -> anyhow::Result<Vec<sewmart_db::NewOrderItem>> {
    let mut items = Vec::with_capacity(posting.products.len());
    for product in &posting.products {
        let local = match sewmart_db::get_product_by_sku(pool, &product.offer_id).await {
            Ok(local) => Some(local),
            Err(DbError::NotFound) => None,
            Err(e) => return Err(e.into()),
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

async fn sync_wb(
    pool: &PgPool,
    config: &AppConfig,
    integration: &IntegrationRow,
) -> anyhow::Result<SyncSummary> {
    let Some(token) = &config.wb.token else {
        bail!("SEWMART_WB_TOKEN is not set");
    };
    let client = wb::WbClient::new(
        ClientConfig::from_app_config(config, &config.wb.api_base),
        token.as_str(),
    )?;

    let mut summary = SyncSummary {
        registered: 0,
        updated: 0,
        skipped: 0,
    };

    let new_orders = client.list_new_orders().await?;
    tracing::info!(count = new_orders.len(), "fetched new wb orders");
    for wb_order in &new_orders {
        let external_id = wb_order.id.to_string();
        if sewmart_db::find_order_by_external(pool, integration.id, &external_id)
            .await?
            .is_some()
        {
            continue;
        }
        let local = match sewmart_db::get_product_by_sku(pool, &wb_order.article).await {
            Ok(local) => Some(local),
            Err(DbError::NotFound) => None,
            Err(e) => return Err(e.into()),
        };
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
        sewmart_db::create_order(pool, &order, &items).await?;
        summary.registered += 1;
    }

    let open = sewmart_db::list_open_orders_for_integration(pool, integration.id).await?;
    let ids: Vec<i64> = open
        .iter()
        .filter_map(|o| o.external_order_id.as_deref())
        .filter_map(|id| id.parse().ok())
        .collect();
    let statuses = client.get_statuses(&ids).await?;
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
                tracing::warn!(wb_order = vendor.id, error = %e, "skipping status");
                summary.skipped += 1;
                continue;
            }
        };
        apply(pool, order.id, status, &mut summary).await?;
    }
    Ok(summary)
}

/// Walks a lagging order through the intermediate fulfilment states, so
/// a posting first seen past `Confirmed` still converges.
async fn apply(
    pool: &PgPool,
    order_id: i64,
    status: sewmart_core::OrderStatus,
    summary: &mut SyncSummary,
) -> anyhow::Result<()> {
    match sewmart_db::advance_status(pool, order_id, status).await {
        Ok(_) => summary.updated += 1,
        Err(
            e @ (DbError::StaleStatus { .. }
            | DbError::Core(sewmart_core::CoreError::IllegalTransition { .. })),
        ) => {
            tracing::warn!(order_id, status = %status, error = %e, "status not applied");
            summary.skipped += 1;
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}
