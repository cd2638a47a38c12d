//! Hourly stock reconciliation push to Ozon and WB.

use std::collections::HashMap;

use sewmart_channels::{ozon, wb, ClientConfig};
use sewmart_core::AppConfig;
use sewmart_db::{DbError, IntegrationRow, ProductRow};
use sqlx::PgPool;

use super::orders::api_integrations;

const CATALOG_LIMIT: i64 = 10_000;

/// One product's sellable quantity on a channel after subtracting
/// reservations and applying the integration's supplier filter.
struct Availability {
    sku: String,
    quantity: u32,
}

/// Pushes reconciled stock figures to every api-enabled Ozon and WB
/// integration. Per-integration failures are logged and do not stop the
/// run.
pub(super) async fn run_stock_push(pool: &PgPool, config: &AppConfig) {
    push_ozon_stocks(pool, config).await;
    push_wb_stocks(pool, config).await;
}

async fn push_ozon_stocks(pool: &PgPool, config: &AppConfig) {
    let credentials = &config.ozon;
    let (Some(client_id), Some(api_key)) = (&credentials.client_id, &credentials.token) else {
        tracing::debug!("ozon credentials not configured; skipping stock push");
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

    for integration in &integrations {
        let availability = match channel_availability(pool, integration).await {
            Ok(availability) => availability,
            Err(e) => {
                tracing::error!(
                    integration = %integration.slug,
                    error = %e,
                    "scheduler: stock reconcile failed"
                );
                continue;
            }
        };
        let stocks: Vec<ozon::StockUpdate> = availability
            .into_iter()
            .map(|a| ozon::StockUpdate {
                offer_id: a.sku,
                stock: a.quantity,
            })
            .collect();
        if stocks.is_empty() {
            continue;
        }

        match client.import_stocks(&stocks).await {
            Ok(rejected) => {
                for result in &rejected {
                    tracing::warn!(
                        integration = %integration.slug,
                        sku = %result.offer_id,
                        errors = ?result.errors,
                        "scheduler: ozon rejected stock figure"
                    );
                }
                tracing::info!(
                    integration = %integration.slug,
                    pushed = stocks.len(),
                    rejected = rejected.len(),
                    "scheduler: ozon stocks pushed"
                );
            }
            Err(e) => {
                tracing::error!(
                    integration = %integration.slug,
                    error = %e,
                    "scheduler: ozon stock push failed"
                );
            }
        }
    }
}

async fn push_wb_stocks(pool: &PgPool, config: &AppConfig) {
    let Some(token) = &config.wb.token else {
        tracing::debug!("wb credentials not configured; skipping stock push");
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
        // WB stocks land on a specific marketplace warehouse.
        let Some(warehouse_id) = integration
            .warehouse_id
            .as_deref()
            .and_then(|id| id.parse::<i64>().ok())
        else {
            tracing::warn!(
                integration = %integration.slug,
                "scheduler: wb integration has no numeric warehouse id, skipping"
            );
            continue;
        };

        let availability = match channel_availability(pool, integration).await {
            Ok(availability) => availability,
            Err(e) => {
                tracing::error!(
                    integration = %integration.slug,
                    error = %e,
                    "scheduler: stock reconcile failed"
                );
                continue;
            }
        };
        let stocks: Vec<wb::StockUpdate> = availability
            .into_iter()
            .map(|a| wb::StockUpdate {
                sku: a.sku,
                amount: a.quantity,
            })
            .collect();

        match client.update_stocks(warehouse_id, &stocks).await {
            Ok(()) => {
                tracing::info!(
                    integration = %integration.slug,
                    pushed = stocks.len(),
                    "scheduler: wb stocks pushed"
                );
            }
            Err(e) => {
                tracing::error!(
                    integration = %integration.slug,
                    error = %e,
                    "scheduler: wb stock push failed"
                );
            }
        }
    }
}

/// Computes the sellable quantity of every active product for one
/// integration: supplier stock filtered by the integration's supplier
/// list, minus units reserved by open orders.
async fn channel_availability(
    pool: &PgPool,
    integration: &IntegrationRow,
) -> Result<Vec<Availability>, DbError> {
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
        .map(|product| Availability {
            sku: product.sku.clone(),
            quantity: product_availability(product, &stocks_by_product, &reserved, integration),
        })
        .collect())
}

fn product_availability(
    product: &ProductRow,
    stocks_by_product: &HashMap<i64, Vec<sewmart_core::SupplierStock>>,
    reserved: &HashMap<i64, i64>,
    integration: &IntegrationRow,
) -> u32 {
    let stocks = stocks_by_product
        .get(&product.id)
        .map_or(&[] as &[sewmart_core::SupplierStock], Vec::as_slice);
    sewmart_core::available_quantity(
        stocks,
        integration.suppliers.as_deref(),
        reserved.get(&product.id).copied().unwrap_or(0),
    )
}
