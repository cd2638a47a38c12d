//! Database operations for `baskets` and `basket_items`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `baskets` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BasketRow {
    pub id: i64,
    pub session_key: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A basket line joined with the product's catalog pricing fields.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct BasketItemRow {
    pub basket_id: i64,
    pub product_id: i64,
    pub quantity: i32,
    pub sku: String,
    pub name: String,
    pub is_set: bool,
    pub price: Decimal,
    pub ws_price: Decimal,
    pub currency_rate: Decimal,
    pub discount_percent: Decimal,
    pub max_discount_percent: Decimal,
    pub discount_rub: Decimal,
}

impl BasketItemRow {
    #[must_use]
    pub fn pricing(&self) -> sewmart_core::pricing::ProductPricing {
        sewmart_core::pricing::ProductPricing {
            price: self.price,
            ws_price: self.ws_price,
            currency_rate: self.currency_rate,
            discount_percent: self.discount_percent,
            max_discount_percent: self.max_discount_percent,
            discount_rub: self.discount_rub,
        }
    }
}

/// Returns the basket for a session, creating it if absent.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn open_basket(pool: &PgPool, session_key: &str) -> Result<BasketRow, DbError> {
    let row = sqlx::query_as::<_, BasketRow>(
        "INSERT INTO baskets (session_key) VALUES ($1) \
         ON CONFLICT (session_key) DO UPDATE SET updated_at = NOW() \
         RETURNING id, session_key, created_at, updated_at",
    )
    .bind(session_key)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Fetches a basket by session key without creating one.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no basket exists for the session.
pub async fn get_basket_by_session(pool: &PgPool, session_key: &str) -> Result<BasketRow, DbError> {
    sqlx::query_as::<_, BasketRow>(
        "SELECT id, session_key, created_at, updated_at FROM baskets WHERE session_key = $1",
    )
    .bind(session_key)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Fetches a basket by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no such basket exists.
pub async fn get_basket_by_id(pool: &PgPool, basket_id: i64) -> Result<BasketRow, DbError> {
    sqlx::query_as::<_, BasketRow>(
        "SELECT id, session_key, created_at, updated_at FROM baskets WHERE id = $1",
    )
    .bind(basket_id)
    .fetch_optional(pool)
    .await?
    .ok_or(DbError::NotFound)
}

/// Sets the quantity of one product in a basket. A quantity of zero
/// removes the line.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the statement fails.
pub async fn add_basket_item(
    pool: &PgPool,
    basket_id: i64,
    product_id: i64,
    quantity: i32,
) -> Result<(), DbError> {
    if quantity <= 0 {
        sqlx::query("DELETE FROM basket_items WHERE basket_id = $1 AND product_id = $2")
            .bind(basket_id)
            .bind(product_id)
            .execute(pool)
            .await?;
        return Ok(());
    }

    sqlx::query(
        "INSERT INTO basket_items (basket_id, product_id, quantity) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (basket_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity",
    )
    .bind(basket_id)
    .bind(product_id)
    .bind(quantity)
    .execute(pool)
    .await?;
    Ok(())
}

/// Returns basket lines joined with catalog pricing, ordered by sku.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_basket_items(
    pool: &PgPool,
    basket_id: i64,
) -> Result<Vec<BasketItemRow>, DbError> {
    let rows = sqlx::query_as::<_, BasketItemRow>(
        "SELECT b.basket_id, b.product_id, b.quantity, \
                p.sku, p.name, p.is_set, p.price, p.ws_price, p.currency_rate, \
                p.discount_percent, p.max_discount_percent, p.discount_rub \
         FROM basket_items b \
         JOIN products p ON p.id = b.product_id \
         WHERE b.basket_id = $1 \
         ORDER BY p.sku",
    )
    .bind(basket_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Removes all lines from a basket. The basket row itself survives.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the statement fails.
pub async fn clear_basket(pool: &PgPool, basket_id: i64) -> Result<(), DbError> {
    sqlx::query("DELETE FROM basket_items WHERE basket_id = $1")
        .bind(basket_id)
        .execute(pool)
        .await?;
    Ok(())
}
