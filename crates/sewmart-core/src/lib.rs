//! Domain logic for the Sewing World order backend: pricing and discount
//! arithmetic, product-set price decomposition, the order status model,
//! and inventory reconciliation. No IO lives here.

use thiserror::Error;

pub mod app_config;
pub mod config;
pub mod pricing;
pub mod reconcile;
pub mod sets;
pub mod status;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env, ConfigError};
pub use pricing::{order_total, PriceTier, ProductPricing};
pub use reconcile::{available_quantity, SupplierStock};
pub use sets::{decompose_set_price, SetConstituent};
pub use status::OrderStatus;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid pricing: {0}")]
    InvalidPricing(String),

    #[error("product set has no constituents")]
    EmptySet,

    #[error("negative set price: {0}")]
    NegativeSetPrice(rust_decimal::Decimal),

    #[error("unknown order status: {0}")]
    UnknownStatus(String),

    #[error("unknown price tier: {0}")]
    UnknownPriceTier(String),

    #[error("illegal status transition: {from} -> {to}")]
    IllegalTransition {
        from: status::OrderStatus,
        to: status::OrderStatus,
    },
}
