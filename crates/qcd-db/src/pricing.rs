//! Database operations for `current_prices` and `price_history` — the tables
//! the price update engine mutates on every tick, and the query pipeline
//! reads from on every request.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `current_prices` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CurrentPriceRow {
    pub id: i64,
    pub product_id: i64,
    pub platform_id: i64,
    pub price: Decimal,
    pub original_price: Option<Decimal>,
    pub discount_percentage: Option<i32>,
    pub is_available: bool,
    pub stock_status: String,
    pub updated_at: DateTime<Utc>,
}

/// A row from the `price_history` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PriceHistoryRow {
    pub id: i64,
    pub product_id: i64,
    pub platform_id: i64,
    pub old_price: Decimal,
    pub new_price: Decimal,
    pub original_price: Option<Decimal>,
    pub discount_percentage: Option<i32>,
    pub change_type: String,
    pub change_amount: Decimal,
    pub change_percentage: f64,
    pub stock_status: String,
    pub source: String,
    pub changed_at: DateTime<Utc>,
}

/// A `current_prices` row joined with enough product context for the price
/// update engine to simulate a market-driven change without a second
/// round-trip per row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UpdateBatchRow {
    pub product_id: i64,
    pub platform_id: i64,
    pub product_name: String,
    pub category: String,
    pub price: Decimal,
    pub stock_status: String,
}

/// Picks a random batch of up to `limit` `(product, platform)` pairs on
/// active platforms for the price update engine's next tick. `ORDER BY
/// RANDOM()` is fine at this table's scale; it is not meant to hold up
/// under a much larger catalogue.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_random_update_batch(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<UpdateBatchRow>, DbError> {
    let rows = sqlx::query_as::<_, UpdateBatchRow>(
        "SELECT cp.product_id, cp.platform_id, p.name AS product_name, \
                p.category AS category, cp.price, cp.stock_status \
         FROM current_prices cp \
         JOIN products p ON p.id = cp.product_id \
         JOIN platforms pl ON pl.id = cp.platform_id \
         WHERE pl.active \
         ORDER BY RANDOM() \
         LIMIT $1",
    )
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Returns the current price for a `(product_id, platform_id)` pair.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_current_price(
    pool: &PgPool,
    product_id: i64,
    platform_id: i64,
) -> Result<Option<CurrentPriceRow>, DbError> {
    let row = sqlx::query_as::<_, CurrentPriceRow>(
        "SELECT id, product_id, platform_id, price, original_price, discount_percentage, \
                is_available, stock_status, updated_at \
         FROM current_prices \
         WHERE product_id = $1 AND platform_id = $2",
    )
    .bind(product_id)
    .bind(platform_id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Lists current prices for a product across all active platforms, ordered
/// by platform name — the shape the comparison sample-query handler reads.
/// A platform with `active = false` never surfaces a row here.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_current_prices_for_product(
    pool: &PgPool,
    product_id: i64,
) -> Result<Vec<CurrentPriceRow>, DbError> {
    let rows = sqlx::query_as::<_, CurrentPriceRow>(
        "SELECT cp.id, cp.product_id, cp.platform_id, cp.price, cp.original_price, \
                cp.discount_percentage, cp.is_available, cp.stock_status, cp.updated_at \
         FROM current_prices cp \
         JOIN platforms p ON p.id = cp.platform_id \
         WHERE cp.product_id = $1 AND p.active \
         ORDER BY p.name",
    )
    .bind(product_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// The fields a price update writes, beyond the `(product_id, platform_id)`
/// key and the new price itself — bundled so `update_price_with_history`
/// doesn't take a dozen positional arguments.
#[derive(Debug, Clone)]
pub struct PriceUpdate {
    pub new_price: Decimal,
    pub original_price: Option<Decimal>,
    pub discount_percentage: Option<i32>,
    pub is_available: bool,
    pub stock_status: String,
    pub change_amount: Decimal,
    pub change_percentage: f64,
    pub source: &'static str,
}

/// Applies one price mutation inside a single transaction: locks the
/// `current_prices` row with `SELECT ... FOR UPDATE`, writes the new price,
/// discount/surge fields, availability and stock status, and appends the
/// corresponding `price_history` row.
///
/// The row lock is what lets several worker-pool tasks run concurrently
/// against disjoint rows while Postgres itself serialises any two tasks
/// that land on the same `(product_id, platform_id)` pair — the caller
/// does not need its own mutex.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no `current_prices` row exists for the
/// pair, or [`DbError::Sqlx`] on any transaction failure.
pub async fn update_price_with_history(
    pool: &PgPool,
    product_id: i64,
    platform_id: i64,
    update: &PriceUpdate,
) -> Result<PriceHistoryRow, DbError> {
    let mut tx = pool.begin().await?;

    let old_price: Option<Decimal> = sqlx::query_scalar::<_, Decimal>(
        "SELECT price FROM current_prices \
         WHERE product_id = $1 AND platform_id = $2 \
         FOR UPDATE",
    )
    .bind(product_id)
    .bind(platform_id)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(old_price) = old_price else {
        tx.rollback().await?;
        return Err(DbError::NotFound);
    };

    sqlx::query(
        "UPDATE current_prices \
         SET price = $1, original_price = $2, discount_percentage = $3, \
             is_available = $4, stock_status = $5, updated_at = NOW() \
         WHERE product_id = $6 AND platform_id = $7",
    )
    .bind(update.new_price)
    .bind(update.original_price)
    .bind(update.discount_percentage)
    .bind(update.is_available)
    .bind(&update.stock_status)
    .bind(product_id)
    .bind(platform_id)
    .execute(&mut *tx)
    .await?;

    let change_type = qcd_core::ChangeType::classify(old_price, update.new_price).as_str();

    let history_row = sqlx::query_as::<_, PriceHistoryRow>(
        "INSERT INTO price_history \
             (product_id, platform_id, old_price, new_price, original_price, \
              discount_percentage, change_type, change_amount, change_percentage, \
              stock_status, source) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11) \
         RETURNING id, product_id, platform_id, old_price, new_price, original_price, \
                   discount_percentage, change_type, change_amount, change_percentage, \
                   stock_status, source, changed_at",
    )
    .bind(product_id)
    .bind(platform_id)
    .bind(old_price)
    .bind(update.new_price)
    .bind(update.original_price)
    .bind(update.discount_percentage)
    .bind(change_type)
    .bind(update.change_amount)
    .bind(update.change_percentage)
    .bind(&update.stock_status)
    .bind(update.source)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;

    Ok(history_row)
}

/// Returns the most recent `price_history` rows for a product, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_price_history(
    pool: &PgPool,
    product_id: i64,
    limit: i64,
) -> Result<Vec<PriceHistoryRow>, DbError> {
    let rows = sqlx::query_as::<_, PriceHistoryRow>(
        "SELECT id, product_id, platform_id, old_price, new_price, original_price, \
                discount_percentage, change_type, change_amount, change_percentage, \
                stock_status, source, changed_at \
         FROM price_history \
         WHERE product_id = $1 \
         ORDER BY changed_at DESC, id DESC \
         LIMIT $2",
    )
    .bind(product_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
