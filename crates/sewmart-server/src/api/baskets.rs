//! Basket endpoints: session baskets, line edits, and checkout.

use axum::{
    extract::{Path, State},
    Extension, Json,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sewmart_core::PriceTier;
use sewmart_delivery::{DeliveryClient, DraftOrderRequest, Parcel, PricingOption, PricingRequest};

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState, ResponseMeta};

#[derive(Debug, Serialize)]
pub(super) struct BasketView {
    id: i64,
    session_key: String,
    items: Vec<BasketItemView>,
}

#[derive(Debug, Serialize)]
pub(super) struct BasketItemView {
    product_id: i64,
    sku: String,
    name: String,
    quantity: i32,
    /// Retail effective price per unit at this moment; final prices are
    /// snapshotted at checkout.
    effective_price: Decimal,
}

#[derive(Debug, Deserialize)]
pub(super) struct OpenBasketBody {
    pub session_key: String,
}

pub(super) async fn open_basket(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Json(body): Json<OpenBasketBody>,
) -> Result<Json<ApiResponse<BasketView>>, ApiError> {
    if body.session_key.trim().is_empty() {
        return Err(ApiError::new(
            req_id.0,
            "validation_error",
            "session_key must not be empty",
        ));
    }

    let basket = sewmart_db::open_basket(&state.pool, &body.session_key)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let view = basket_view(&state, basket).await.map_err(|e| {
        map_db_error(req_id.0.clone(), &e)
    })?;

    Ok(Json(ApiResponse {
        data: view,
        meta: ResponseMeta::new(req_id.0),
    }))
}

#[derive(Debug, Deserialize)]
pub(super) struct SetItemBody {
    pub product_id: i64,
    pub quantity: i32,
}

pub(super) async fn set_basket_item(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(basket_id): Path<i64>,
    Json(body): Json<SetItemBody>,
) -> Result<Json<ApiResponse<BasketView>>, ApiError> {
    // Validates the product exists before touching the basket.
    if body.quantity > 0 {
        sewmart_db::get_product(&state.pool, body.product_id)
            .await
            .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    }

    sewmart_db::add_basket_item(&state.pool, basket_id, body.product_id, body.quantity)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let basket = sewmart_db::get_basket_by_id(&state.pool, basket_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let view = basket_view(&state, basket)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(Json(ApiResponse {
        data: view,
        meta: ResponseMeta::new(req_id.0),
    }))
}

async fn basket_view(
    state: &AppState,
    basket: sewmart_db::BasketRow,
) -> Result<BasketView, sewmart_db::DbError> {
    let items = sewmart_db::list_basket_items(&state.pool, basket.id).await?;
    Ok(BasketView {
        id: basket.id,
        session_key: basket.session_key,
        items: items
            .into_iter()
            .map(|item| BasketItemView {
                product_id: item.product_id,
                sku: item.sku.clone(),
                name: item.name.clone(),
                quantity: item.quantity,
                effective_price: item
                    .pricing()
                    .effective_price(PriceTier::Retail, Decimal::ZERO),
            })
            .collect(),
    })
}

#[derive(Debug, Deserialize)]
pub(super) struct CheckoutBody {
    pub customer_name: Option<String>,
    pub customer_phone: Option<String>,
    pub customer_email: Option<String>,
    pub delivery_address: Option<String>,
    /// `retail` (default) or `wholesale`.
    pub price_tier: Option<String>,
    /// Extra discount percent (promo code), still capped per product.
    pub extra_percent: Option<Decimal>,
}

#[derive(Debug, Serialize)]
pub(super) struct CheckoutData {
    order_id: i64,
    status: String,
    total: Decimal,
    delivery_price: Decimal,
    payment_url: Option<String>,
}

/// `POST /api/v1/baskets/{basket_id}/checkout` — snapshots the basket
/// into an order, quotes delivery when the carrier is configured, and
/// opens a payment when the gateway is configured.
pub(super) async fn checkout(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(basket_id): Path<i64>,
    Json(body): Json<CheckoutBody>,
) -> Result<Json<ApiResponse<CheckoutData>>, ApiError> {
    let tier = match body.price_tier.as_deref() {
        None => PriceTier::Retail,
        Some(raw) => raw.parse().map_err(|_| {
            ApiError::new(
                req_id.0.clone(),
                "validation_error",
                format!("unknown price tier: {raw}"),
            )
        })?,
    };
    let extra_percent = body.extra_percent.unwrap_or(Decimal::ZERO);

    let quote = quote_delivery(&state, body.delivery_address.as_deref()).await;
    let delivery_price = quote.as_ref().map_or(Decimal::ZERO, |option| option.cost);

    let order = sewmart_db::NewOrder {
        price_tier: Some(tier),
        delivery_price,
        customer_name: body.customer_name.clone(),
        customer_phone: body.customer_phone.clone(),
        customer_email: body.customer_email.clone(),
        delivery_address: body.delivery_address.clone(),
        ..sewmart_db::NewOrder::default()
    };
    let row = sewmart_db::register_order(&state.pool, basket_id, &order, extra_percent)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let items = sewmart_db::list_order_items(&state.pool, row.id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let line_totals: Vec<Decimal> = items.iter().map(|i| i.line_total).collect();
    let total = sewmart_core::order_total(&line_totals, row.delivery_price);

    if let Some(option) = quote {
        open_delivery_order(&state, &row, &body, &option, total).await;
    }

    let payment_url = open_payment(&state, row.id, total).await;

    tracing::info!(order_id = row.id, %total, "basket checked out");
    Ok(Json(ApiResponse {
        data: CheckoutData {
            order_id: row.id,
            status: row.status,
            total,
            delivery_price: row.delivery_price,
            payment_url,
        },
        meta: ResponseMeta::new(req_id.0),
    }))
}

fn delivery_client(state: &AppState) -> Option<DeliveryClient> {
    let config = &state.config;
    let token = config.delivery_token.as_deref()?;
    match DeliveryClient::new(
        config.delivery_api_base.clone(),
        token,
        config.http_timeout_secs,
        config.http_max_retries,
        config.http_retry_backoff_base_secs.saturating_mul(1000),
    ) {
        Ok(client) => Some(client),
        Err(e) => {
            tracing::error!(error = %e, "failed to build delivery client");
            None
        }
    }
}

/// Quotes the cheapest delivery option for the address. A missing
/// address, unconfigured carrier, or quote failure all price delivery
/// at zero; the operator can re-quote later.
async fn quote_delivery(state: &AppState, address: Option<&str>) -> Option<PricingOption> {
    let config = &state.config;
    let (Some(address), Some(station)) = (address, config.delivery_source_station.as_deref())
    else {
        return None;
    };
    let client = delivery_client(state)?;

    let request = PricingRequest {
        source_station: station.to_string(),
        address: address.to_string(),
        parcel: default_parcel(),
        assessed_cost: Decimal::ZERO,
    };
    match client.get_pricing(&request).await {
        Ok(options) => options.into_iter().next(),
        Err(e) => {
            tracing::warn!(error = %e, "delivery quote failed, pricing delivery at zero");
            None
        }
    }
}

/// Creates a draft carrier order for the quoted tariff and stores its
/// id on the order. Best-effort: the operator can create it by hand if
/// the carrier is down.
async fn open_delivery_order(
    state: &AppState,
    row: &sewmart_db::OrderRow,
    body: &CheckoutBody,
    option: &PricingOption,
    assessed_cost: Decimal,
) {
    let config = &state.config;
    let (Some(address), Some(station), Some(name), Some(phone)) = (
        row.delivery_address.as_deref(),
        config.delivery_source_station.as_deref(),
        body.customer_name.as_deref(),
        body.customer_phone.as_deref(),
    ) else {
        return;
    };
    let Some(client) = delivery_client(state) else {
        return;
    };

    let request = DraftOrderRequest {
        external_id: format!("SW-{}", row.id),
        source_station: station.to_string(),
        address: address.to_string(),
        recipient_name: name.to_string(),
        recipient_phone: phone.to_string(),
        parcel: default_parcel(),
        assessed_cost,
        tariff: option.tariff.clone(),
    };
    match client.create_draft_order(&request).await {
        Ok(delivery_order_id) => {
            if let Err(e) =
                sewmart_db::set_delivery_order(&state.pool, row.id, &delivery_order_id, option.cost)
                    .await
            {
                tracing::error!(order_id = row.id, error = %e, "failed to store delivery order id");
            }
        }
        Err(e) => {
            tracing::warn!(order_id = row.id, error = %e, "draft delivery order failed");
        }
    }
}

/// Standard box for quoting before the order is packed.
fn default_parcel() -> Parcel {
    Parcel {
        weight: Decimal::ONE,
        length: 30,
        width: 20,
        height: 15,
    }
}

/// Opens a payment for the order when the gateway is configured and
/// returns the customer confirmation URL.
async fn open_payment(state: &AppState, order_id: i64, total: Decimal) -> Option<String> {
    let config = &state.config;
    let (Some(shop_id), Some(secret_key)) = (&config.kassa_shop_id, &config.kassa_secret_key)
    else {
        return None;
    };

    let client = match sewmart_kassa::KassaClient::new(
        config.kassa_api_base.clone(),
        shop_id.clone(),
        secret_key.clone(),
        config.kassa_return_url.clone(),
        config.http_timeout_secs,
        config.http_max_retries,
        config.http_retry_backoff_base_secs.saturating_mul(1000),
    ) {
        Ok(client) => client,
        Err(e) => {
            tracing::error!(error = %e, "failed to build payment gateway client");
            return None;
        }
    };

    let description = format!("Order SW-{order_id}");
    match client
        .create_payment(total, Some(&description), order_id)
        .await
    {
        Ok(payment) => payment.confirmation.and_then(|c| c.confirmation_url),
        Err(e) => {
            tracing::error!(order_id, error = %e, "failed to open payment");
            None
        }
    }
}
