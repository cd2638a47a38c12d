//! One-shot stock push, the CLI counterpart of the server's hourly job.

use std::collections::HashMap;

use anyhow::{bail, Context};
use sewmart_channels::{ozon, wb, ClientConfig};
use sewmart_core::AppConfig;
use sewmart_db::IntegrationRow;
use sqlx::PgPool;

use crate::sync::api_integration;
use crate::Channel;

const CATALOG_LIMIT: i64 = 10_000;

pub(crate) struct StocksSummary {
    pub pushed: usize,
    pub rejected: usize,
}

pub(crate) async fn run(
    pool: &PgPool,
    config: &AppConfig,
    channel: Channel,
) -> anyhow::Result<StocksSummary> {
    let integration = api_integration(pool, channel.as_str()).await?;
    let availability = channel_availability(pool, &integration).await?;

    match channel {
        Channel::Ozon => push_ozon(config, &availability).await,
        Channel::Wb => push_wb(config, &integration, &availability).await,
    }
}

async fn push_ozon(
    config: &AppConfig,
    availability: &[(String, u32)],
) -> anyhow::Result<StocksSummary> {
    let credentials = &config.ozon;
    let (Some(client_id), Some(api_key)) = (&credentials.client_id, &credentials.token) else {
        bail!("SEWMART_OZON_CLIENT_ID / SEWMART_OZON_TOKEN are not set");
    };
    let client = ozon::OzonClient::new(
        ClientConfig::from_app_config(config, &credentials.api_base),
        client_id.as_str(),
        api_key.as_str(),
    )?;

    let stocks: Vec<ozon::StockUpdate> = availability
        .iter()
        .map(|(sku, quantity)| ozon::StockUpdate {
            offer_id: sku.clone(),
            stock: *quantity,
        })
        .collect();
    let rejected = client.import_stocks(&stocks).await?;
    for result in &rejected {
        tracing::warn!(sku = %result.offer_id, errors = ?result.errors, "ozon rejected stock figure");
    }
    Ok(StocksSummary {
        pushed: stocks.len(),
        rejected: rejected.len(),
    })
}

async fn push_wb(
    config: &AppConfig,
    integration: &IntegrationRow,
    availability: &[(String, u32)],
) -> anyhow::Result<StocksSummary> {
    let Some(token) = &config.wb.token else {
        bail!("SEWMART_WB_TOKEN is not set");
    };
    let warehouse_id: i64 = integration
        .warehouse_id
        .as_deref()
        .context("wb integration has no warehouse id")?
        .parse()
        .context("wb warehouse id is not numeric")?;
    let client = wb::WbClient::new(
        ClientConfig::from_app_config(config, &config.wb.api_base),
        token.as_str(),
    )?;

    let stocks: Vec<wb::StockUpdate> = availability
        .iter()
        .map(|(sku, quantity)| wb::StockUpdate {
            sku: sku.clone(),
            amount: *quantity,
        })
        .collect();
    client.update_stocks(warehouse_id, &stocks).await?;
    Ok(StocksSummary {
        pushed: stocks.len(),
        rejected: 0,
    })
}

/// Sellable quantity per sku for the integration: supplier stock
/// filtered by the integration's supplier list, minus reservations.
async fn channel_availability(
    pool: &PgPool,
    integration: &IntegrationRow,
) -> anyhow::Result<Vec<(String, u32)>> {
    let products = sewmart_db::list_active_products(pool, CATALOG_LIMIT).await?;
    let ids: Vec<i64> = products.iter().map(|p| p.id).collect();

    let stock_rows = sewmart_db::list_stocks_for_products(pool, &ids).await?;
    let mut stocks_by_product: HashMap<i64, Vec<sewmart_core::SupplierStock>> = HashMap::new();
    for row in &stock_rows {
        stocks_by_product
            .entry(row.product_id)
            .or_default()
            .push(row.as_supplier_stock());
    }

    let reserved: HashMap<i64, i64> = sewmart_db::reserved_quantities(pool, &ids)
        .await?
        .into_iter()
        .collect();

    Ok(products
        .iter()
        .map(|product| {
            let stocks = stocks_by_product
                .get(&product.id)
                .map_or(&[] as &[sewmart_core::SupplierStock], Vec::as_slice);
            let quantity = sewmart_core::available_quantity(
                stocks,
                integration.suppliers.as_deref(),
                reserved.get(&product.id).copied().unwrap_or(0),
            );
            (product.sku.clone(), quantity)
        })
        .collect())
}
