//! Offline unit tests for sewmart-db pool configuration and row types.
//! These tests do not require a live database connection.

use chrono::Utc;
use rust_decimal::Decimal;
use sewmart_core::{AppConfig, Environment, PriceTier};
use sewmart_db::{NewOrder, OrderItemRow, OrderRow, PoolConfig, ProductRow};
use std::collections::HashMap;
use std::env::VarError;

fn app_config() -> AppConfig {
    let map = HashMap::from([
        ("DATABASE_URL", "postgres://example"),
        ("SEWMART_ENV", "test"),
        ("SEWMART_DB_MAX_CONNECTIONS", "42"),
        ("SEWMART_DB_MIN_CONNECTIONS", "7"),
        ("SEWMART_DB_ACQUIRE_TIMEOUT_SECS", "9"),
    ]);
    sewmart_core::config::build_app_config(move |key| {
        map.get(key).map(ToString::to_string).ok_or(VarError::NotPresent)
    })
    .expect("config builds")
}

#[test]
fn pool_config_from_app_config_uses_core_values() {
    let config = app_config();
    assert_eq!(config.env, Environment::Test);

    let pool_config = PoolConfig::from_app_config(&config);
    assert_eq!(pool_config.max_connections, 42);
    assert_eq!(pool_config.min_connections, 7);
    assert_eq!(pool_config.acquire_timeout_secs, 9);
}

/// Compile-time smoke test: confirm that [`OrderRow`] has all expected
/// fields with the correct types, and that the stored status string
/// parses back into the domain enum. No database required.
#[test]
fn order_row_status_parses_back() {
    let row = OrderRow {
        id: 1,
        integration_id: Some(2),
        external_order_id: Some("OZ-123".to_string()),
        status: "assembling".to_string(),
        paid: true,
        payment_id: Some("pay-1".to_string()),
        price_tier: "retail".to_string(),
        delivery_price: Decimal::new(35_000, 2),
        delivery_order_id: None,
        delivery_info: None,
        alert: None,
        customer_name: Some("Test Customer".to_string()),
        customer_phone: None,
        customer_email: None,
        delivery_address: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    let status = row.status().expect("stored status parses");
    assert_eq!(status, sewmart_core::OrderStatus::Assembling);
    assert_eq!(row.price_tier.parse::<PriceTier>().ok(), Some(PriceTier::Retail));
}

#[test]
fn order_row_with_garbage_status_is_an_error() {
    let row = OrderRow {
        id: 1,
        integration_id: None,
        external_order_id: None,
        status: "0x20".to_string(),
        paid: false,
        payment_id: None,
        price_tier: "retail".to_string(),
        delivery_price: Decimal::ZERO,
        delivery_order_id: None,
        delivery_info: None,
        alert: None,
        customer_name: None,
        customer_phone: None,
        customer_email: None,
        delivery_address: None,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    assert!(row.status().is_err());
}

#[test]
fn product_row_pricing_maps_every_field() {
    let row = ProductRow {
        id: 5,
        sku: "JANOME-500E".to_string(),
        name: "Janome Memory Craft 500E".to_string(),
        price: Decimal::new(1_999_00, 2),
        ws_price: Decimal::new(1_499_00, 2),
        currency_code: "EUR".to_string(),
        currency_rate: Decimal::new(98_5000, 4),
        discount_percent: Decimal::new(5_00, 2),
        max_discount_percent: Decimal::new(10_00, 2),
        discount_rub: Decimal::new(500_00, 2),
        is_set: false,
        is_active: true,
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    let pricing = row.pricing();
    assert_eq!(pricing.price, row.price);
    assert_eq!(pricing.ws_price, row.ws_price);
    assert_eq!(pricing.currency_rate, row.currency_rate);
    assert_eq!(pricing.discount_percent, row.discount_percent);
    assert_eq!(pricing.max_discount_percent, row.max_discount_percent);
    assert_eq!(pricing.discount_rub, row.discount_rub);
    assert!(pricing.validate().is_ok());
}

#[test]
fn new_order_defaults_to_retail_tier() {
    let order = NewOrder::default();
    assert!(order.price_tier.is_none());
    assert_eq!(order.delivery_price, Decimal::ZERO);
    assert!(order.integration_id.is_none());
}

#[test]
fn order_item_line_total_is_authoritative() {
    // A set constituent line can carry a line_total that is not exactly
    // unit_price * quantity; totals are summed from line_total.
    let item = OrderItemRow {
        id: 1,
        order_id: 1,
        product_id: Some(9),
        sku: "NEEDLES-10".to_string(),
        name: "Needle set".to_string(),
        unit_price: Decimal::new(33_33, 2),
        quantity: 3,
        line_total: Decimal::new(100_00, 2),
    };

    let computed = sewmart_core::order_total(&[item.line_total], Decimal::new(350_00, 2));
    assert_eq!(computed, Decimal::new(450_00, 2));
}
