use axum::{
    extract::{Query, State},
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sewmart_core::PriceTier;

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct ProductItem {
    id: i64,
    sku: String,
    name: String,
    is_set: bool,
    price: Decimal,
    ws_price: Decimal,
    /// Catalog price after conversion and discounts, retail tier.
    effective_price: Decimal,
    discount_percent: Decimal,
    max_discount_percent: Decimal,
}

#[derive(Debug, Deserialize)]
pub(super) struct ProductQuery {
    pub limit: Option<i64>,
}

pub(super) async fn list_products(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<ProductQuery>,
) -> Result<Json<ApiResponse<Vec<ProductItem>>>, ApiError> {
    let rows = sewmart_db::list_active_products(&state.pool, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows
        .into_iter()
        .map(|row| {
            let pricing = row.pricing();
            ProductItem {
                id: row.id,
                sku: row.sku,
                name: row.name,
                is_set: row.is_set,
                price: pricing.price,
                ws_price: pricing.ws_price,
                effective_price: pricing.effective_price(PriceTier::Retail, Decimal::ZERO),
                discount_percent: pricing.discount_percent,
                max_discount_percent: pricing.max_discount_percent,
            }
        })
        .collect();

    Ok(Json(ApiResponse {
        data,
        meta: ResponseMeta::new(req_id.0),
    }))
}
