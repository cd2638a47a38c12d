//! Database operations for `supplier_stocks`.

use chrono::{DateTime, Utc};
use sewmart_core::SupplierStock;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `supplier_stocks` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StockRow {
    pub product_id: i64,
    pub supplier: String,
    pub quantity: i32,
    pub updated_at: DateTime<Utc>,
}

impl StockRow {
    #[must_use]
    pub fn as_supplier_stock(&self) -> SupplierStock {
        SupplierStock {
            supplier: self.supplier.clone(),
            quantity: self.quantity,
        }
    }
}

/// Upserts the quantity one supplier holds for one product.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_supplier_stock(
    pool: &PgPool,
    product_id: i64,
    supplier: &str,
    quantity: i32,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO supplier_stocks (product_id, supplier, quantity) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (product_id, supplier) DO UPDATE SET \
             quantity   = EXCLUDED.quantity, \
             updated_at = NOW()",
    )
    .bind(product_id)
    .bind(supplier)
    .bind(quantity)
    .execute(pool)
    .await?;
    Ok(())
}

/// Returns all supplier stock rows for one product.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_stocks_for_product(
    pool: &PgPool,
    product_id: i64,
) -> Result<Vec<StockRow>, DbError> {
    let rows = sqlx::query_as::<_, StockRow>(
        "SELECT product_id, supplier, quantity, updated_at \
         FROM supplier_stocks \
         WHERE product_id = $1 \
         ORDER BY supplier",
    )
    .bind(product_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Returns supplier stock rows for a batch of products in one query,
/// ordered by product then supplier. Callers group by `product_id`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_stocks_for_products(
    pool: &PgPool,
    product_ids: &[i64],
) -> Result<Vec<StockRow>, DbError> {
    let rows = sqlx::query_as::<_, StockRow>(
        "SELECT product_id, supplier, quantity, updated_at \
         FROM supplier_stocks \
         WHERE product_id = ANY($1) \
         ORDER BY product_id, supplier",
    )
    .bind(product_ids)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
