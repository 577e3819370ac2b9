use qcd_core::AppConfig;
use sqlx::migrate::Migrate;
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

// Path relative to crates/qcd-db/Cargo.toml; resolves to <workspace-root>/migrations/
static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("../../migrations");

/// Connection-acquire latencies above this are logged as a warning, on the
/// theory that anything slower than this usually means the pool is
/// starved rather than the database being slow.
const SLOW_ACQUIRE_WARN_SECS: f64 = 5.0;

#[derive(Debug, Clone, Copy)]
pub struct PoolConfig {
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 10,
            min_connections: 1,
            acquire_timeout_secs: 30,
        }
    }
}

impl PoolConfig {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_connections: config.db_pool_size + config.db_max_overflow,
            min_connections: 1,
            acquire_timeout_secs: config.db_acquire_timeout_secs,
        }
    }
}

#[derive(Debug, Error)]
pub enum DbError {
    #[error("DATABASE_URL is not set")]
    MissingDatabaseUrl,
    #[error("record not found")]
    NotFound,
    #[error("conflicting concurrent update for {entity} id {id}")]
    ConcurrentUpdateConflict { entity: &'static str, id: i64 },
    #[error(transparent)]
    Config(#[from] qcd_core::ConfigError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Connect to a Postgres pool using explicit URL and config.
///
/// Logs a warning on the first acquire whenever it takes longer than
/// [`SLOW_ACQUIRE_WARN_SECS`], which is a cheap signal that `max_connections`
/// is undersized for the current load.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the connection cannot be established.
pub async fn connect_pool(database_url: &str, config: PoolConfig) -> Result<PgPool, sqlx::Error> {
    let started = std::time::Instant::now();
    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect(database_url)
        .await?;

    let elapsed = started.elapsed().as_secs_f64();
    if elapsed > SLOW_ACQUIRE_WARN_SECS {
        warn!(elapsed_secs = elapsed, "initial pool connection was slow");
    }
    Ok(pool)
}

/// Connect to a Postgres pool, reading `DATABASE_URL` and pool settings from env.
///
/// # Errors
///
/// Returns [`DbError::Config`] if configuration is missing/invalid, or
/// [`DbError::Sqlx`] if the connection cannot be established.
pub async fn connect_pool_from_env() -> Result<PgPool, DbError> {
    let app_config = qcd_core::load_app_config_from_env()?;
    let pool_config = PoolConfig::from_app_config(&app_config);
    connect_pool(&app_config.database_url, pool_config)
        .await
        .map_err(DbError::from)
}

/// Run all pending migrations against the pool.
///
/// Returns the number of migrations that were applied.
///
/// # Errors
///
/// Returns [`sqlx::migrate::MigrateError`] if any migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<usize, sqlx::migrate::MigrateError> {
    let applied_before = {
        let mut conn = pool.acquire().await?;
        conn.ensure_migrations_table().await?;
        conn.list_applied_migrations().await?.len()
    };

    MIGRATOR.run(pool).await?;

    let applied_after = {
        let mut conn = pool.acquire().await?;
        conn.ensure_migrations_table().await?;
        conn.list_applied_migrations().await?.len()
    };

    Ok(applied_after.saturating_sub(applied_before))
}

/// Send a `SELECT 1` to verify the pool has a live connection.
///
/// # Errors
///
/// Returns [`sqlx::Error`] if the query fails.
pub async fn ping(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query_scalar::<_, i32>("SELECT 1")
        .fetch_one(pool)
        .await?;
    Ok(())
}

/// Run a full health check: ping the pool and return a typed error on failure.
///
/// # Errors
///
/// Returns [`DbError`] if the ping fails.
pub async fn health_check(pool: &PgPool) -> Result<(), DbError> {
    ping(pool).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_config_has_sane_defaults() {
        let config = PoolConfig::default();

        assert_eq!(config.max_connections, 10);
        assert_eq!(config.min_connections, 1);
        assert_eq!(config.acquire_timeout_secs, 30);
    }
}

pub mod campaigns;
pub mod catalog;
pub mod discounts;
pub mod pricing;
pub mod seed;

pub use campaigns::{
    add_product_to_campaign, create_campaign, list_active_campaigns, list_campaign_products,
    CampaignProductRow, PromotionalCampaignRow,
};
pub use catalog::{
    get_platform_by_name, get_product_by_id, list_platforms, list_products, upsert_product,
    upsert_platform, PlatformRow, ProductFilters, ProductRow,
};
pub use discounts::{
    insert_discount, list_active_discounts, list_deals, list_discounts_for_product, DealRow,
    DiscountRow,
};
pub use pricing::{
    get_current_price, get_price_history, get_random_update_batch, list_current_prices_for_product,
    update_price_with_history, CurrentPriceRow, PriceHistoryRow, UpdateBatchRow,
};
pub use seed::seed_demo_catalog;
