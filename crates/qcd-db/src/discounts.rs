//! Database operations for `discounts`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;

use crate::DbError;

/// A row from the `discounts` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DiscountRow {
    pub id: i64,
    pub product_id: i64,
    pub platform_id: i64,
    pub discount_percent: i32,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Records a discount window for a `(product_id, platform_id)` pair.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn insert_discount(
    pool: &PgPool,
    product_id: i64,
    platform_id: i64,
    discount_percent: i32,
    ends_at: Option<DateTime<Utc>>,
) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar::<_, i64>(
        "INSERT INTO discounts (product_id, platform_id, discount_percent, starts_at, ends_at) \
         VALUES ($1, $2, $3, NOW(), $4) \
         RETURNING id",
    )
    .bind(product_id)
    .bind(platform_id)
    .bind(discount_percent)
    .bind(ends_at)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Lists discounts currently in effect (`ends_at` is NULL or in the future)
/// with at least `min_discount_percent`, ordered by discount descending —
/// the shape the discount-search sample-query handler reads.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_discounts(
    pool: &PgPool,
    min_discount_percent: i32,
    limit: i64,
) -> Result<Vec<DiscountRow>, DbError> {
    let rows = sqlx::query_as::<_, DiscountRow>(
        "SELECT id, product_id, platform_id, discount_percent, starts_at, ends_at, created_at \
         FROM discounts \
         WHERE discount_percent >= $1 \
           AND (ends_at IS NULL OR ends_at > NOW()) \
           AND starts_at <= NOW() \
         ORDER BY discount_percent DESC \
         LIMIT $2",
    )
    .bind(min_discount_percent)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Lists all discount rows for a product, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_discounts_for_product(
    pool: &PgPool,
    product_id: i64,
) -> Result<Vec<DiscountRow>, DbError> {
    let rows = sqlx::query_as::<_, DiscountRow>(
        "SELECT id, product_id, platform_id, discount_percent, starts_at, ends_at, created_at \
         FROM discounts \
         WHERE product_id = $1 \
         ORDER BY created_at DESC",
    )
    .bind(product_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// A discounted product row joined with enough context to render a single
/// "deal" on the HTTP surface: product/platform names, the live price, and
/// whether it belongs to an active promotional campaign.
#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct DealRow {
    pub product_id: i64,
    pub product_name: String,
    pub category: String,
    pub platform_name: String,
    pub current_price: Decimal,
    pub discount_percent: i32,
    pub stock_status: String,
    pub updated_at: DateTime<Utc>,
    pub featured: bool,
}

/// Lists active discounted products, joined with their live price and
/// optionally filtered by platform, category, and campaign membership.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
#[allow(clippy::too_many_arguments)]
pub async fn list_deals(
    pool: &PgPool,
    platform: Option<&str>,
    category: Option<&str>,
    min_discount_percent: i32,
    featured_only: bool,
    limit: i64,
) -> Result<Vec<DealRow>, DbError> {
    let rows = sqlx::query_as::<_, DealRow>(
        "SELECT p.id AS product_id, p.name AS product_name, p.category AS category, \
                pl.name AS platform_name, cp.price AS current_price, \
                d.discount_percent AS discount_percent, cp.stock_status AS stock_status, \
                cp.updated_at AS updated_at, \
                EXISTS ( \
                    SELECT 1 FROM campaign_products cpr \
                    JOIN promotional_campaigns pc ON pc.id = cpr.campaign_id \
                    WHERE cpr.product_id = p.id \
                      AND pc.starts_at <= NOW() AND (pc.ends_at IS NULL OR pc.ends_at > NOW()) \
                ) AS featured \
         FROM discounts d \
         JOIN products p ON p.id = d.product_id \
         JOIN platforms pl ON pl.id = d.platform_id \
         JOIN current_prices cp ON cp.product_id = d.product_id AND cp.platform_id = d.platform_id \
         WHERE d.discount_percent >= $1 \
           AND d.starts_at <= NOW() AND (d.ends_at IS NULL OR d.ends_at > NOW()) \
           AND ($2::text IS NULL OR pl.name ILIKE $2) \
           AND ($3::text IS NULL OR p.category = $3) \
           AND (NOT $4 OR EXISTS ( \
               SELECT 1 FROM campaign_products cpr \
               JOIN promotional_campaigns pc ON pc.id = cpr.campaign_id \
               WHERE cpr.product_id = p.id \
                 AND pc.starts_at <= NOW() AND (pc.ends_at IS NULL OR pc.ends_at > NOW()) \
           )) \
         ORDER BY d.discount_percent DESC, cp.price ASC \
         LIMIT $5",
    )
    .bind(min_discount_percent)
    .bind(platform)
    .bind(category)
    .bind(featured_only)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
