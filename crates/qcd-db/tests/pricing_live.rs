//! Live-database tests for the price mutation transaction. Each test gets
//! its own migrated, isolated database via `#[sqlx::test]`.

use qcd_db::{catalog, pricing};
use rust_decimal::Decimal;
use sqlx::PgPool;

async fn seed_one_price(pool: &PgPool) -> (i64, i64) {
    let platform_id = catalog::upsert_platform(pool, "Blinkit", "blinkit")
        .await
        .expect("upsert platform");
    let product_id = catalog::upsert_product(pool, "Bananas", "fruits", "dozen")
        .await
        .expect("upsert product");

    sqlx::query(
        "INSERT INTO current_prices (product_id, platform_id, price, stock_status) \
         VALUES ($1, $2, $3, 'in_stock')",
    )
    .bind(product_id)
    .bind(platform_id)
    .bind(Decimal::new(4000, 2))
    .execute(pool)
    .await
    .expect("seed current price");

    (product_id, platform_id)
}

#[sqlx::test(migrations = "../../migrations")]
async fn update_price_with_history_writes_both_tables(pool: PgPool) {
    let (product_id, platform_id) = seed_one_price(&pool).await;

    let history = pricing::update_price_with_history(
        &pool,
        product_id,
        platform_id,
        Decimal::new(4500, 2),
        "in_stock",
    )
    .await
    .expect("update price");

    assert_eq!(history.old_price, Decimal::new(4000, 2));
    assert_eq!(history.new_price, Decimal::new(4500, 2));
    assert_eq!(history.change_type, "increase");

    let current = pricing::get_current_price(&pool, product_id, platform_id)
        .await
        .expect("query current price")
        .expect("row exists");
    assert_eq!(current.price, Decimal::new(4500, 2));

    let recorded = pricing::get_price_history(&pool, product_id, 10)
        .await
        .expect("query history");
    assert_eq!(recorded.len(), 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn update_price_with_history_fails_for_unknown_pair(pool: PgPool) {
    let result = pricing::update_price_with_history(&pool, 9999, 9999, Decimal::new(100, 2), "in_stock")
        .await;

    assert!(matches!(result, Err(qcd_db::DbError::NotFound)));
}

#[sqlx::test(migrations = "../../migrations")]
async fn no_change_is_classified_as_no_change(pool: PgPool) {
    let (product_id, platform_id) = seed_one_price(&pool).await;

    let history = pricing::update_price_with_history(
        &pool,
        product_id,
        platform_id,
        Decimal::new(4000, 2),
        "in_stock",
    )
    .await
    .expect("update price");

    assert_eq!(history.change_type, "no_change");
}
