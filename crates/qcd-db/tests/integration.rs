//! Offline unit tests for qcd-db pool configuration and row types.
//! These tests do not require a live database connection.

use chrono::Utc;
use qcd_db::{CurrentPriceRow, PlatformRow, PoolConfig, ProductRow};
use rust_decimal::Decimal;

#[test]
fn pool_config_defaults() {
    let config = PoolConfig::default();

    assert_eq!(config.max_connections, 10);
    assert_eq!(config.min_connections, 1);
    assert_eq!(config.acquire_timeout_secs, 30);
}

/// Compile-time smoke test: confirm that [`PlatformRow`] has all expected
/// fields with the correct types. No database required.
#[test]
fn platform_row_has_expected_fields() {
    let row = PlatformRow {
        id: 1,
        name: "Blinkit".to_string(),
        slug: "blinkit".to_string(),
        created_at: Utc::now(),
    };

    assert_eq!(row.id, 1);
    assert_eq!(row.name, "Blinkit");
    assert_eq!(row.slug, "blinkit");
}

/// Compile-time smoke test: confirm that [`ProductRow`] has all expected
/// fields with the correct types. No database required.
#[test]
fn product_row_has_expected_fields() {
    let row = ProductRow {
        id: 42,
        name: "Bananas".to_string(),
        category: "fruits".to_string(),
        unit: "dozen".to_string(),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };

    assert_eq!(row.id, 42);
    assert_eq!(row.name, "Bananas");
    assert_eq!(row.category, "fruits");
    assert_eq!(row.unit, "dozen");
}

/// Compile-time smoke test: confirm that [`CurrentPriceRow`] has all expected
/// fields with the correct types. No database required.
#[test]
fn current_price_row_has_expected_fields() {
    let row = CurrentPriceRow {
        id: 1,
        product_id: 42,
        platform_id: 1,
        price: Decimal::new(4000, 2),
        stock_status: "in_stock".to_string(),
        updated_at: Utc::now(),
    };

    assert_eq!(row.product_id, 42);
    assert_eq!(row.platform_id, 1);
    assert_eq!(row.price, Decimal::new(4000, 2));
    assert_eq!(row.stock_status, "in_stock");
}
