//! Database operations for `platforms` and `products` — the schema catalogue
//! the query planner introspects and the price engine iterates over.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `platforms` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PlatformRow {
    pub id: i64,
    pub name: String,
    pub slug: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

/// A row from the `products` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProductRow {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub unit: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Optional filters for [`list_products`].
#[derive(Debug, Clone, Default)]
pub struct ProductFilters {
    pub category: Option<String>,
    pub name_contains: Option<String>,
}

/// Upserts a platform row, keyed on `slug`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_platform(pool: &PgPool, name: &str, slug: &str) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar::<_, i64>(
        "INSERT INTO platforms (name, slug) \
         VALUES ($1, $2) \
         ON CONFLICT (slug) DO UPDATE SET name = EXCLUDED.name \
         RETURNING id",
    )
    .bind(name)
    .bind(slug)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Returns a platform by its natural-key `name`, if one is registered.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_platform_by_name(
    pool: &PgPool,
    name: &str,
) -> Result<Option<PlatformRow>, DbError> {
    let row = sqlx::query_as::<_, PlatformRow>(
        "SELECT id, name, slug, active, created_at FROM platforms WHERE name = $1",
    )
    .bind(name)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Lists all registered platforms, ordered by `name`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_platforms(pool: &PgPool) -> Result<Vec<PlatformRow>, DbError> {
    let rows = sqlx::query_as::<_, PlatformRow>(
        "SELECT id, name, slug, active, created_at FROM platforms ORDER BY name",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Flips a platform's `active` flag, keyed on its id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no platform has this id, or
/// [`DbError::Sqlx`] on any other query failure.
pub async fn set_platform_active(pool: &PgPool, id: i64, active: bool) -> Result<(), DbError> {
    let result = sqlx::query("UPDATE platforms SET active = $1 WHERE id = $2")
        .bind(active)
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::NotFound);
    }
    Ok(())
}

/// Upserts a product row, keyed on `name`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_product(
    pool: &PgPool,
    name: &str,
    category: &str,
    unit: &str,
) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar::<_, i64>(
        "INSERT INTO products (name, category, unit) \
         VALUES ($1, $2, $3) \
         ON CONFLICT (name) DO UPDATE SET \
             category = EXCLUDED.category, \
             unit = EXCLUDED.unit, \
             updated_at = NOW() \
         RETURNING id",
    )
    .bind(name)
    .bind(category)
    .bind(unit)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Fetches a single product by id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_product_by_id(pool: &PgPool, id: i64) -> Result<Option<ProductRow>, DbError> {
    let row = sqlx::query_as::<_, ProductRow>(
        "SELECT id, name, category, unit, created_at, updated_at FROM products WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row)
}

/// Lists products, optionally filtered by category and a name substring
/// (matched case-insensitively).
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_products(
    pool: &PgPool,
    filters: &ProductFilters,
    limit: i64,
) -> Result<Vec<ProductRow>, DbError> {
    let rows = sqlx::query_as::<_, ProductRow>(
        "SELECT id, name, category, unit, created_at, updated_at \
         FROM products \
         WHERE ($1::text IS NULL OR category = $1) \
           AND ($2::text IS NULL OR name ILIKE '%' || $2 || '%') \
         ORDER BY name \
         LIMIT $3",
    )
    .bind(&filters.category)
    .bind(&filters.name_contains)
    .bind(limit)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
