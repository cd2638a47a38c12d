//! Database operations for the `integrations` table.
//!
//! An integration row describes one sales channel: which marketplace it
//! is, the warehouse it ships from, and which suppliers it may draw
//! stock from.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `integrations` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct IntegrationRow {
    pub id: i64,
    pub slug: String,
    pub name: String,
    /// `"beru"`, `"ozon"`, `"wb"` or `"sber"`.
    pub channel: String,
    pub warehouse_id: Option<String>,
    /// `None` means the channel may sell from all suppliers.
    pub suppliers: Option<Vec<String>>,
    pub uses_api: bool,
    pub created_at: DateTime<Utc>,
}

/// Fields for inserting or updating an integration.
#[derive(Debug, Clone)]
pub struct NewIntegration {
    pub slug: String,
    pub name: String,
    pub channel: String,
    pub warehouse_id: Option<String>,
    pub suppliers: Option<Vec<String>>,
    pub uses_api: bool,
}

const INTEGRATION_COLUMNS: &str =
    "id, slug, name, channel, warehouse_id, suppliers, uses_api, created_at";

/// Upserts an integration by slug, returning its id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_integration(
    pool: &PgPool,
    integration: &NewIntegration,
) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar::<_, i64>(
        "INSERT INTO integrations (slug, name, channel, warehouse_id, suppliers, uses_api) \
         VALUES ($1, $2, $3, $4, $5, $6) \
         ON CONFLICT (slug) DO UPDATE SET \
             name         = EXCLUDED.name, \
             channel      = EXCLUDED.channel, \
             warehouse_id = EXCLUDED.warehouse_id, \
             suppliers    = EXCLUDED.suppliers, \
             uses_api     = EXCLUDED.uses_api \
         RETURNING id",
    )
    .bind(&integration.slug)
    .bind(&integration.name)
    .bind(&integration.channel)
    .bind(&integration.warehouse_id)
    .bind(&integration.suppliers)
    .bind(integration.uses_api)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

/// Fetches an integration by id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no such integration exists.
pub async fn get_integration(pool: &PgPool, id: i64) -> Result<IntegrationRow, DbError> {
    let query = format!("SELECT {INTEGRATION_COLUMNS} FROM integrations WHERE id = $1");
    sqlx::query_as::<_, IntegrationRow>(&query)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Fetches an integration by slug.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no such integration exists.
pub async fn get_integration_by_slug(pool: &PgPool, slug: &str) -> Result<IntegrationRow, DbError> {
    let query = format!("SELECT {INTEGRATION_COLUMNS} FROM integrations WHERE slug = $1");
    sqlx::query_as::<_, IntegrationRow>(&query)
        .bind(slug)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Returns integrations for one channel, API-enabled first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_integrations_by_channel(
    pool: &PgPool,
    channel: &str,
) -> Result<Vec<IntegrationRow>, DbError> {
    let query = format!(
        "SELECT {INTEGRATION_COLUMNS} FROM integrations \
         WHERE channel = $1 ORDER BY uses_api DESC, slug"
    );
    let rows = sqlx::query_as::<_, IntegrationRow>(&query)
        .bind(channel)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Returns every API-enabled integration, ordered by slug.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_api_integrations(pool: &PgPool) -> Result<Vec<IntegrationRow>, DbError> {
    let query =
        format!("SELECT {INTEGRATION_COLUMNS} FROM integrations WHERE uses_api ORDER BY slug");
    let rows = sqlx::query_as::<_, IntegrationRow>(&query)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}
