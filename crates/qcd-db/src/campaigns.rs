//! Database operations for `promotional_campaigns` and the `campaign_products`
//! join table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `promotional_campaigns` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PromotionalCampaignRow {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A row from the `campaign_products` join table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CampaignProductRow {
    pub campaign_id: i64,
    pub product_id: i64,
}

/// Creates a promotional campaign.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_campaign(
    pool: &PgPool,
    name: &str,
    description: Option<&str>,
    ends_at: Option<DateTime<Utc>>,
) -> Result<i64, DbError> {
    let id: i64 = sqlx::query_scalar::<_, i64>(
        "INSERT INTO promotional_campaigns (name, description, starts_at, ends_at) \
         VALUES ($1, $2, NOW(), $3) \
         RETURNING id",
    )
    .bind(name)
    .bind(description)
    .bind(ends_at)
    .fetch_one(pool)
    .await?;

    Ok(id)
}

/// Associates a product with a campaign. Idempotent: re-adding the same
/// pair is a no-op.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn add_product_to_campaign(
    pool: &PgPool,
    campaign_id: i64,
    product_id: i64,
) -> Result<(), DbError> {
    sqlx::query(
        "INSERT INTO campaign_products (campaign_id, product_id) \
         VALUES ($1, $2) \
         ON CONFLICT (campaign_id, product_id) DO NOTHING",
    )
    .bind(campaign_id)
    .bind(product_id)
    .execute(pool)
    .await?;

    Ok(())
}

/// Lists campaigns currently in effect.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_active_campaigns(pool: &PgPool) -> Result<Vec<PromotionalCampaignRow>, DbError> {
    let rows = sqlx::query_as::<_, PromotionalCampaignRow>(
        "SELECT id, name, description, starts_at, ends_at, created_at \
         FROM promotional_campaigns \
         WHERE starts_at <= NOW() AND (ends_at IS NULL OR ends_at > NOW()) \
         ORDER BY starts_at DESC",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows)
}

/// Lists the products attached to a campaign.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_campaign_products(
    pool: &PgPool,
    campaign_id: i64,
) -> Result<Vec<CampaignProductRow>, DbError> {
    let rows = sqlx::query_as::<_, CampaignProductRow>(
        "SELECT campaign_id, product_id FROM campaign_products WHERE campaign_id = $1",
    )
    .bind(campaign_id)
    .fetch_all(pool)
    .await?;

    Ok(rows)
}
