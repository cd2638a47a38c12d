//! Database operations for `orders` and `order_items`.
//!
//! Order lines are immutable snapshots taken at registration time:
//! `line_total` is the authoritative amount (unit price times quantity,
//! except for set constituents where it carries the decomposed share of
//! the set price). The order total is the sum of line totals plus the
//! delivery price.

use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sewmart_core::{decompose_set_price, pricing, OrderStatus, PriceTier, SetConstituent};
use sqlx::PgPool;

use crate::{baskets, products, DbError};

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `orders` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderRow {
    pub id: i64,
    pub integration_id: Option<i64>,
    pub external_order_id: Option<String>,
    pub status: String,
    pub paid: bool,
    pub payment_id: Option<String>,
    pub price_tier: String,
    pub delivery_price: Decimal,
    pub delivery_order_id: Option<String>,
    pub delivery_info: Option<String>,
    pub alert: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub delivery_address: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl OrderRow {
    /// Parses the stored status string.
    ///
    /// # Errors
    ///
    /// Returns [`sewmart_core::CoreError::UnknownStatus`] if the column
    /// holds a value outside the enumeration (schema drift).
    pub fn status(&self) -> Result<OrderStatus, sewmart_core::CoreError> {
        self.status.parse()
    }
}

/// A row from the `order_items` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OrderItemRow {
    pub id: i64,
    pub order_id: i64,
    pub product_id: Option<i64>,
    pub sku: String,
    pub name: String,
    /// Informational per-unit price; `line_total` is authoritative.
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// Header fields for a new order.
#[derive(Debug, Clone, Default)]
pub struct NewOrder {
    pub integration_id: Option<i64>,
    pub external_order_id: Option<String>,
    pub price_tier: Option<PriceTier>,
    pub delivery_price: Decimal,
    pub delivery_info: Option<String>,
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub delivery_address: Option<String>,
}

/// One snapshot line for a new order.
#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub product_id: Option<i64>,
    pub sku: String,
    pub name: String,
    pub unit_price: Decimal,
    pub quantity: i32,
    pub line_total: Decimal,
}

/// Filters for [`list_orders`].
#[derive(Debug, Clone, Default)]
pub struct OrderListFilters {
    pub status: Option<String>,
    pub integration_id: Option<i64>,
    pub limit: Option<i64>,
}

const ORDER_COLUMNS: &str = "id, integration_id, external_order_id, status, paid, payment_id, \
     price_tier, delivery_price, delivery_order_id, delivery_info, alert, \
     customer_name, customer_phone, customer_email, delivery_address, \
     created_at, updated_at";

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

/// Inserts an order with its line snapshots in one transaction.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement fails; nothing is written
/// in that case.
pub async fn create_order(
    pool: &PgPool,
    order: &NewOrder,
    items: &[NewOrderItem],
) -> Result<OrderRow, DbError> {
    let mut tx = pool.begin().await?;
    let row = insert_order_tx(&mut tx, order, items).await?;
    tx.commit().await?;
    Ok(row)
}

/// Registers an order from a basket: copies basket lines into immutable
/// order-line snapshots priced at this moment, decomposing set products
/// into constituent lines, then clears the basket. Snapshot insertion
/// and basket clearing happen in one transaction.
///
/// `extra_percent` is an additional discount (promo code, customer
/// discount) applied on top of product discounts, still capped per
/// product.
///
/// # Errors
///
/// - [`DbError::EmptyBasket`] when the basket has no lines.
/// - [`DbError::Core`] when pricing or set decomposition fails.
/// - [`DbError::Sqlx`] on statement failure.
pub async fn register_order(
    pool: &PgPool,
    basket_id: i64,
    order: &NewOrder,
    extra_percent: Decimal,
) -> Result<OrderRow, DbError> {
    let basket_items = baskets::list_basket_items(pool, basket_id).await?;
    if basket_items.is_empty() {
        return Err(DbError::EmptyBasket { basket_id });
    }

    let tier = order.price_tier.unwrap_or(PriceTier::Retail);
    let mut lines: Vec<NewOrderItem> = Vec::new();

    for item in &basket_items {
        if item.is_set {
            let constituents = products::list_set_items(pool, item.product_id).await?;
            if constituents.is_empty() {
                // A set without constituent rows is a catalog defect;
                // sell it as a plain product rather than lose the order.
                lines.push(plain_line(item, tier, extra_percent));
                continue;
            }
            lines.extend(set_lines(item, &constituents, tier, extra_percent)?);
        } else {
            lines.push(plain_line(item, tier, extra_percent));
        }
    }

    let mut tx = pool.begin().await?;
    let row = insert_order_tx(&mut tx, order, &lines).await?;
    sqlx::query("DELETE FROM basket_items WHERE basket_id = $1")
        .bind(basket_id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(row)
}

fn plain_line(item: &baskets::BasketItemRow, tier: PriceTier, extra_percent: Decimal) -> NewOrderItem {
    let unit = item.pricing().effective_price(tier, extra_percent);
    NewOrderItem {
        product_id: Some(item.product_id),
        sku: item.sku.clone(),
        name: item.name.clone(),
        unit_price: unit,
        quantity: item.quantity,
        line_total: pricing::line_total(unit, u32::try_from(item.quantity).unwrap_or(0)),
    }
}

fn set_lines(
    item: &baskets::BasketItemRow,
    constituents: &[products::SetItemRow],
    tier: PriceTier,
    extra_percent: Decimal,
) -> Result<Vec<NewOrderItem>, DbError> {
    let set_price = item.pricing().effective_price(tier, extra_percent);
    let parts: Vec<SetConstituent> = constituents
        .iter()
        .map(|c| SetConstituent {
            product_id: c.product_id,
            unit_price: c.pricing().effective_price(PriceTier::Retail, Decimal::ZERO),
            quantity: u32::try_from(c.quantity).unwrap_or(1),
        })
        .collect();

    let shares = decompose_set_price(set_price, &parts)?;
    let sets_bought = Decimal::from(item.quantity);

    Ok(constituents
        .iter()
        .zip(shares)
        .map(|(c, share)| {
            let unit = (share / Decimal::from(c.quantity))
                .round_dp_with_strategy(2, RoundingStrategy::ToZero);
            NewOrderItem {
                product_id: Some(c.product_id),
                sku: c.sku.clone(),
                name: c.name.clone(),
                unit_price: unit,
                quantity: c.quantity * item.quantity,
                line_total: share * sets_bought,
            }
        })
        .collect())
}

async fn insert_order_tx(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    order: &NewOrder,
    items: &[NewOrderItem],
) -> Result<OrderRow, DbError> {
    let tier = order.price_tier.unwrap_or(PriceTier::Retail);
    let query = format!(
        "INSERT INTO orders \
             (integration_id, external_order_id, price_tier, delivery_price, delivery_info, \
              customer_name, customer_phone, customer_email, delivery_address) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         RETURNING {ORDER_COLUMNS}"
    );
    let row = sqlx::query_as::<_, OrderRow>(&query)
        .bind(order.integration_id)
        .bind(&order.external_order_id)
        .bind(tier.as_str())
        .bind(order.delivery_price)
        .bind(&order.delivery_info)
        .bind(&order.customer_name)
        .bind(&order.customer_phone)
        .bind(&order.customer_email)
        .bind(&order.delivery_address)
        .fetch_one(&mut **tx)
        .await?;

    for item in items {
        sqlx::query(
            "INSERT INTO order_items (order_id, product_id, sku, name, unit_price, quantity, line_total) \
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(row.id)
        .bind(item.product_id)
        .bind(&item.sku)
        .bind(&item.name)
        .bind(item.unit_price)
        .bind(item.quantity)
        .bind(item.line_total)
        .execute(&mut **tx)
        .await?;
    }

    Ok(row)
}

// ---------------------------------------------------------------------------
// Lookup
// ---------------------------------------------------------------------------

/// Fetches an order by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no such order exists.
pub async fn get_order(pool: &PgPool, id: i64) -> Result<OrderRow, DbError> {
    let query = format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1");
    sqlx::query_as::<_, OrderRow>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Finds the local order for a marketplace order id, if any.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_order_by_external(
    pool: &PgPool,
    integration_id: i64,
    external_order_id: &str,
) -> Result<Option<OrderRow>, DbError> {
    let query = format!(
        "SELECT {ORDER_COLUMNS} FROM orders \
         WHERE integration_id = $1 AND external_order_id = $2"
    );
    let row = sqlx::query_as::<_, OrderRow>(&query)
        .bind(integration_id)
        .bind(external_order_id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Lists orders, newest first, with optional status and integration
/// filters.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_orders(
    pool: &PgPool,
    filters: &OrderListFilters,
) -> Result<Vec<OrderRow>, DbError> {
    let query = format!(
        "SELECT {ORDER_COLUMNS} FROM orders \
         WHERE ($1::text IS NULL OR status = $1) \
           AND ($2::bigint IS NULL OR integration_id = $2) \
         ORDER BY id DESC \
         LIMIT $3"
    );
    let rows = sqlx::query_as::<_, OrderRow>(&query)
        .bind(&filters.status)
        .bind(filters.integration_id)
        .bind(filters.limit.unwrap_or(50))
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Lists orders of one integration that are not in a terminal state.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_open_orders_for_integration(
    pool: &PgPool,
    integration_id: i64,
) -> Result<Vec<OrderRow>, DbError> {
    let terminal: Vec<String> = OrderStatus::ALL
        .iter()
        .filter(|s| s.is_terminal())
        .map(|s| s.as_str().to_string())
        .collect();
    let query = format!(
        "SELECT {ORDER_COLUMNS} FROM orders \
         WHERE integration_id = $1 AND status <> ALL($2) \
         ORDER BY id"
    );
    let rows = sqlx::query_as::<_, OrderRow>(&query)
        .bind(integration_id)
        .bind(&terminal)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Returns the line snapshots of an order in insertion order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_order_items(pool: &PgPool, order_id: i64) -> Result<Vec<OrderItemRow>, DbError> {
    let rows = sqlx::query_as::<_, OrderItemRow>(
        "SELECT id, order_id, product_id, sku, name, unit_price, quantity, line_total \
         FROM order_items WHERE order_id = $1 ORDER BY id",
    )
    .bind(order_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Mutation
// ---------------------------------------------------------------------------

/// Moves an order to a new status after validating the transition.
///
/// The write is a compare-and-set on the previous status, so two
/// concurrent webhook deliveries cannot both apply: the loser sees
/// [`DbError::StaleStatus`] and should re-read and retry if it still
/// wants the change. A transition to the current status is a no-op.
///
/// # Errors
///
/// - [`DbError::NotFound`] if the order does not exist.
/// - [`DbError::Core`] if the transition is illegal.
/// - [`DbError::StaleStatus`] if the status changed concurrently.
pub async fn update_status(
    pool: &PgPool,
    order_id: i64,
    to: OrderStatus,
) -> Result<OrderRow, DbError> {
    let row = get_order(pool, order_id).await?;
    let current = row.status()?;
    current.transition(to)?;
    if current == to {
        return Ok(row);
    }

    let query = format!(
        "UPDATE orders SET status = $1, updated_at = NOW() \
         WHERE id = $2 AND status = $3 \
         RETURNING {ORDER_COLUMNS}"
    );
    sqlx::query_as::<_, OrderRow>(&query)
        .bind(to.as_str())
        .bind(order_id)
        .bind(current.as_str())
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::StaleStatus { order_id })
}

/// Advances an order to the status a channel reports, walking through
/// intermediate fulfilment states when the local order lags behind the
/// marketplace (poller downtime, an order first seen past `Confirmed`).
/// Each step is validated and written through [`update_status`].
///
/// # Errors
///
/// - [`DbError::NotFound`] if the order does not exist.
/// - [`DbError::Core`] if `to` is not reachable going forward.
/// - [`DbError::StaleStatus`] if the status changed concurrently.
pub async fn advance_status(
    pool: &PgPool,
    order_id: i64,
    to: OrderStatus,
) -> Result<OrderRow, DbError> {
    let mut row = get_order(pool, order_id).await?;
    let current = row.status()?;
    let Some(path) = current.catch_up_path(to) else {
        return Err(DbError::Core(
            sewmart_core::CoreError::IllegalTransition { from: current, to },
        ));
    };
    for step in path {
        row = update_status(pool, order_id, step).await?;
    }
    Ok(row)
}

/// Marks an order paid and records the payment id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the order does not exist.
pub async fn mark_paid(pool: &PgPool, order_id: i64, payment_id: &str) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE orders SET paid = TRUE, payment_id = $1, updated_at = NOW() WHERE id = $2",
    )
    .bind(payment_id)
    .bind(order_id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Records an operator-visible alert on the order (e.g. a failed status
/// push to the marketplace).
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the order does not exist.
pub async fn set_alert(pool: &PgPool, order_id: i64, alert: Option<&str>) -> Result<(), DbError> {
    let result = sqlx::query("UPDATE orders SET alert = $1, updated_at = NOW() WHERE id = $2")
        .bind(alert)
        .bind(order_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Records customer-visible delivery information.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the order does not exist.
pub async fn set_delivery_info(pool: &PgPool, order_id: i64, info: &str) -> Result<(), DbError> {
    let result =
        sqlx::query("UPDATE orders SET delivery_info = $1, updated_at = NOW() WHERE id = $2")
            .bind(info)
            .bind(order_id)
            .execute(pool)
            .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Stores the delivery service's order id and the quoted price.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if the order does not exist.
pub async fn set_delivery_order(
    pool: &PgPool,
    order_id: i64,
    delivery_order_id: &str,
    delivery_price: Decimal,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE orders SET delivery_order_id = $1, delivery_price = $2, updated_at = NOW() \
         WHERE id = $3",
    )
    .bind(delivery_order_id)
    .bind(delivery_price)
    .bind(order_id)
    .execute(pool)
    .await?;
    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Reservation
// ---------------------------------------------------------------------------

/// Units of one product committed to open (not yet shipped, not
/// terminal) orders.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn reserved_quantity(pool: &PgPool, product_id: i64) -> Result<i64, DbError> {
    let reserving = reserving_statuses();
    let total: Option<i64> = sqlx::query_scalar(
        "SELECT SUM(oi.quantity)::bigint \
         FROM order_items oi \
         JOIN orders o ON o.id = oi.order_id \
         WHERE oi.product_id = $1 AND o.status = ANY($2)",
    )
    .bind(product_id)
    .bind(&reserving)
    .fetch_one(pool)
    .await?;
    Ok(total.unwrap_or(0))
}

/// Reserved units per product for a batch of products. Products with no
/// reservation are absent from the result.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn reserved_quantities(
    pool: &PgPool,
    product_ids: &[i64],
) -> Result<Vec<(i64, i64)>, DbError> {
    let reserving = reserving_statuses();
    let rows = sqlx::query_as::<_, (i64, i64)>(
        "SELECT oi.product_id, SUM(oi.quantity)::bigint \
         FROM order_items oi \
         JOIN orders o ON o.id = oi.order_id \
         WHERE oi.product_id = ANY($1) AND o.status = ANY($2) \
         GROUP BY oi.product_id",
    )
    .bind(product_ids)
    .bind(&reserving)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

fn reserving_statuses() -> Vec<String> {
    OrderStatus::ALL
        .iter()
        .filter(|s| s.reserves_stock())
        .map(|s| s.as_str().to_string())
        .collect()
}
