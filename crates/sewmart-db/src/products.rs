//! Database operations for `products` and `product_set_items`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sewmart_core::pricing::ProductPricing;
use sqlx::PgPool;

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `products` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub sku: String,
    pub name: String,
    pub price: Decimal,
    pub ws_price: Decimal,
    pub currency_code: String,
    pub currency_rate: Decimal,
    pub discount_percent: Decimal,
    pub max_discount_percent: Decimal,
    pub discount_rub: Decimal,
    pub is_set: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ProductRow {
    /// The pricing fields as a domain value for effective-price math.
    #[must_use]
    pub fn pricing(&self) -> ProductPricing {
        ProductPricing {
            price: self.price,
            ws_price: self.ws_price,
            currency_rate: self.currency_rate,
            discount_percent: self.discount_percent,
            max_discount_percent: self.max_discount_percent,
            discount_rub: self.discount_rub,
        }
    }
}

/// One constituent of a set, joined with its product fields.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SetItemRow {
    pub product_id: i64,
    pub sku: String,
    pub name: String,
    pub quantity: i32,
    pub price: Decimal,
    pub ws_price: Decimal,
    pub currency_rate: Decimal,
    pub discount_percent: Decimal,
    pub max_discount_percent: Decimal,
    pub discount_rub: Decimal,
}

impl SetItemRow {
    #[must_use]
    pub fn pricing(&self) -> ProductPricing {
        ProductPricing {
            price: self.price,
            ws_price: self.ws_price,
            currency_rate: self.currency_rate,
            discount_percent: self.discount_percent,
            max_discount_percent: self.max_discount_percent,
            discount_rub: self.discount_rub,
        }
    }
}

/// Catalog fields for inserting or updating a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub sku: String,
    pub name: String,
    pub price: Decimal,
    pub ws_price: Decimal,
    pub currency_code: String,
    pub currency_rate: Decimal,
    pub discount_percent: Decimal,
    pub max_discount_percent: Decimal,
    pub discount_rub: Decimal,
    pub is_set: bool,
}

const PRODUCT_COLUMNS: &str = "id, sku, name, price, ws_price, currency_code, currency_rate, \
     discount_percent, max_discount_percent, discount_rub, is_set, is_active, \
     created_at, updated_at";

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// Upserts a product by `sku`, returning its internal id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_product(pool: &PgPool, product: &NewProduct) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar::<_, i64>(
        "INSERT INTO products \
             (sku, name, price, ws_price, currency_code, currency_rate, \
              discount_percent, max_discount_percent, discount_rub, is_set) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
         ON CONFLICT (sku) DO UPDATE SET \
             name                 = EXCLUDED.name, \
             price                = EXCLUDED.price, \
             ws_price             = EXCLUDED.ws_price, \
             currency_code        = EXCLUDED.currency_code, \
             currency_rate        = EXCLUDED.currency_rate, \
             discount_percent     = EXCLUDED.discount_percent, \
             max_discount_percent = EXCLUDED.max_discount_percent, \
             discount_rub         = EXCLUDED.discount_rub, \
             is_set               = EXCLUDED.is_set, \
             updated_at           = NOW() \
         RETURNING id",
    )
    .bind(&product.sku)
    .bind(&product.name)
    .bind(product.price)
    .bind(product.ws_price)
    .bind(&product.currency_code)
    .bind(product.currency_rate)
    .bind(product.discount_percent)
    .bind(product.max_discount_percent)
    .bind(product.discount_rub)
    .bind(product.is_set)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Fetches a product by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no such product exists.
pub async fn get_product(pool: &PgPool, id: i64) -> Result<ProductRow, DbError> {
    let query = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1");
    sqlx::query_as::<_, ProductRow>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Fetches a product by sku.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no such product exists.
pub async fn get_product_by_sku(pool: &PgPool, sku: &str) -> Result<ProductRow, DbError> {
    let query = format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE sku = $1");
    sqlx::query_as::<_, ProductRow>(&query)
        .bind(sku)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Returns all active products ordered by sku.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_products(pool: &PgPool, limit: i64) -> Result<Vec<ProductRow>, DbError> {
    let query =
        format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE is_active ORDER BY sku LIMIT $1");
    let rows = sqlx::query_as::<_, ProductRow>(&query)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Returns the constituents of a set product, joined with their catalog
/// pricing fields, in a stable order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_set_items(pool: &PgPool, set_id: i64) -> Result<Vec<SetItemRow>, DbError> {
    let rows = sqlx::query_as::<_, SetItemRow>(
        "SELECT p.id AS product_id, p.sku, p.name, s.quantity, \
                p.price, p.ws_price, p.currency_rate, \
                p.discount_percent, p.max_discount_percent, p.discount_rub \
         FROM product_set_items s \
         JOIN products p ON p.id = s.product_id \
         WHERE s.set_id = $1 \
         ORDER BY p.sku",
    )
    .bind(set_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}
