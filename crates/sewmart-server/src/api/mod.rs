mod baskets;
mod beru;
mod kassa;
mod orders;
mod products;
mod sber;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::middleware::{
    enforce_rate_limit, request_id, require_basic_auth, require_bearer_auth, AuthState,
    BasicAuthState, RateLimitState, RequestId,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<sewmart_core::AppConfig>,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            "rate_limited" => StatusCode::TOO_MANY_REQUESTS,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn normalize_limit(limit: Option<i64>) -> i64 {
    limit.unwrap_or(50).clamp(1, 200)
}

pub(super) fn map_db_error(request_id: String, error: &sewmart_db::DbError) -> ApiError {
    use sewmart_core::CoreError;
    use sewmart_db::DbError;

    match error {
        DbError::NotFound => ApiError::new(request_id, "not_found", "resource not found"),
        DbError::EmptyBasket { .. } => {
            ApiError::new(request_id, "bad_request", "basket has no items")
        }
        DbError::StaleStatus { .. } => ApiError::new(
            request_id,
            "conflict",
            "order status changed concurrently; re-read and retry",
        ),
        DbError::Core(CoreError::IllegalTransition { from, to }) => ApiError::new(
            request_id,
            "conflict",
            format!("illegal status transition {from} -> {to}"),
        ),
        DbError::Core(core) => ApiError::new(request_id, "validation_error", core.to_string()),
        other => {
            tracing::error!(error = %other, "database query failed");
            ApiError::new(request_id, "internal_error", "database query failed")
        }
    }
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

/// Marketplace webhook endpoints, each family behind its own channel
/// credentials.
fn channel_router(config: &sewmart_core::AppConfig) -> Router<AppState> {
    let beru_auth = AuthState::from_token(config.beru.token.as_deref());
    let sber_auth = BasicAuthState::new(
        config.sber_webhook_user.as_deref(),
        config.sber_webhook_password.as_deref(),
    );

    let beru_routes = Router::new()
        .route("/beru/cart", post(beru::cart))
        .route("/beru/order/accept", post(beru::order_accept))
        .route("/beru/order/status", post(beru::order_status))
        .route("/beru/stocks", post(beru::stocks))
        .layer(axum::middleware::from_fn_with_state(
            beru_auth,
            require_bearer_auth,
        ));

    let sber_routes = Router::new()
        .route("/sber/order/new", post(sber::order_new))
        .route("/sber/order/cancel", post(sber::order_cancel))
        .layer(axum::middleware::from_fn_with_state(
            sber_auth,
            require_basic_auth,
        ));

    // The payment gateway authenticates itself implicitly: the handler
    // re-fetches the payment over the authenticated API.
    let kassa_routes = Router::new().route("/kassa/webhook", post(kassa::webhook));

    Router::new()
        .merge(beru_routes)
        .merge(sber_routes)
        .merge(kassa_routes)
}

fn protected_router(auth: AuthState, rate_limit: RateLimitState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/products", get(products::list_products))
        .route("/api/v1/orders", get(orders::list_orders))
        .route("/api/v1/orders/{order_id}", get(orders::get_order))
        .route(
            "/api/v1/orders/{order_id}/status",
            put(orders::update_order_status),
        )
        .route("/api/v1/baskets", post(baskets::open_basket))
        .route(
            "/api/v1/baskets/{basket_id}/items",
            post(baskets::set_basket_item),
        )
        .route(
            "/api/v1/baskets/{basket_id}/checkout",
            post(baskets::checkout),
        )
        .layer(
            ServiceBuilder::new()
                .layer(axum::middleware::from_fn_with_state(
                    rate_limit,
                    enforce_rate_limit,
                ))
                .layer(axum::middleware::from_fn_with_state(
                    auth,
                    require_bearer_auth,
                )),
        )
}

pub fn build_app(state: AppState, auth: AuthState, rate_limit: RateLimitState) -> Router {
    let public_routes = Router::new().route("/healthz", get(health));

    Router::new()
        .merge(public_routes)
        .merge(channel_router(&state.config))
        .merge(protected_router(auth, rate_limit))
        .layer(
            ServiceBuilder::new()
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match sewmart_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}

pub fn default_rate_limit_state() -> RateLimitState {
    RateLimitState::new(120, Duration::from_secs(60))
}
