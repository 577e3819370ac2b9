//! Orchestrates one price-update tick: pull a random batch, fan it out
//! across a bounded worker pool, and retry each row's write with back-off on
//! a transient failure. [`PriceUpdateEngine::run_continuous`] is the
//! scheduler loop `qcd-server` spawns at startup.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use qcd_core::{AppConfig, StockStatus};
use qcd_db::pricing::{get_random_update_batch, update_price_with_history, PriceUpdate, UpdateBatchRow};
use qcd_db::seed::category_volatility;
use qcd_db::DbError;

use crate::metrics::{MetricsSnapshot, UpdateMetrics};
use crate::simulate::{calculate_price_change, maybe_flip_stock_status, price_f64, EngineConfig};

const MAX_RETRIES: u32 = 3;
const UPDATE_SOURCE: &str = "price_update_engine";

#[derive(Debug, Error)]
pub enum PriceUpdateError {
    #[error(transparent)]
    Db(#[from] DbError),
}

/// Attempts the write once, reporting whether the retry loop should give
/// the row another try. A row vanishing mid-cycle (deleted product) is not
/// retried — there is nothing a retry would fix.
async fn apply_once(
    pool: &PgPool,
    row: &UpdateBatchRow,
    config: EngineConfig,
    rng: &mut StdRng,
) -> Result<Option<(crate::simulate::PriceChange, String)>, DbError> {
    let volatility = category_volatility(&row.category);
    let now = Utc::now();
    let change = calculate_price_change(row.price, volatility, config, now, rng);
    let stock_status = maybe_flip_stock_status(&row.stock_status, rng);
    // Availability tracks stock status directly: only `out_of_stock` takes a
    // row off the shelf, `low_stock` still counts as available.
    let is_available = StockStatus::from_str(&stock_status) != Some(StockStatus::OutOfStock);

    let update = PriceUpdate {
        new_price: change.new_price,
        original_price: change.original_price,
        discount_percentage: change.discount_percentage,
        is_available,
        stock_status: stock_status.clone(),
        change_amount: change.change_amount,
        change_percentage: change.change_percentage,
        source: UPDATE_SOURCE,
    };

    match update_price_with_history(pool, row.product_id, row.platform_id, &update).await {
        Ok(_) => Ok(Some((change, stock_status))),
        Err(DbError::NotFound) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Updates a single `(product, platform)` row, retrying on a transient
/// database error with a short linear back-off (0.1s, 0.2s, 0.3s).
async fn update_single_row(
    pool: &PgPool,
    row: &UpdateBatchRow,
    config: EngineConfig,
    metrics: &UpdateMetrics,
) -> bool {
    let mut rng = StdRng::from_os_rng();
    let mut attempt = 0u32;

    loop {
        match apply_once(pool, row, config, &mut rng).await {
            Ok(Some((change, stock_status))) => {
                debug!(
                    product_id = row.product_id,
                    platform_id = row.platform_id,
                    old_price = price_f64(row.price),
                    new_price = price_f64(change.new_price),
                    change_type = change.change_type.as_str(),
                    stock_status,
                    "updated price"
                );
                metrics.record_success(&change, attempt > 0, Utc::now());
                return true;
            }
            Ok(None) => {
                warn!(product_id = row.product_id, platform_id = row.platform_id, "price row vanished mid-cycle");
                metrics.record_failure();
                return false;
            }
            Err(e) => {
                attempt += 1;
                if attempt >= MAX_RETRIES {
                    warn!(product_id = row.product_id, platform_id = row.platform_id, error = %e, "giving up after max retries");
                    metrics.record_failure();
                    return false;
                }
                warn!(product_id = row.product_id, platform_id = row.platform_id, attempt, error = %e, "retrying after transient failure");
                tokio::time::sleep(Duration::from_millis(100 * u64::from(attempt))).await;
            }
        }
    }
}

/// Runs `batch` across up to `max_workers` concurrent tasks, returning the
/// number that succeeded.
async fn process_batch(
    pool: &PgPool,
    batch: Vec<UpdateBatchRow>,
    config: EngineConfig,
    max_workers: usize,
    metrics: Arc<UpdateMetrics>,
) -> usize {
    if batch.is_empty() {
        return 0;
    }

    let semaphore = Arc::new(Semaphore::new(max_workers.max(1)));
    let mut tasks = JoinSet::new();

    for row in batch {
        let pool = pool.clone();
        let metrics = Arc::clone(&metrics);
        let semaphore = Arc::clone(&semaphore);
        tasks.spawn(async move {
            let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
            update_single_row(&pool, &row, config, &metrics).await
        });
    }

    let mut successful = 0usize;
    while let Some(result) = tasks.join_next().await {
        match result {
            Ok(true) => successful += 1,
            Ok(false) => {}
            Err(e) => warn!(error = %e, "price update task panicked"),
        }
    }
    successful
}

/// Configuration an engine is built from — a narrow view of [`AppConfig`]
/// plus the parts [`EngineConfig`] needs for the simulation math.
#[derive(Debug, Clone, Copy)]
pub struct EngineSettings {
    pub interval: Duration,
    pub batch_size: i64,
    pub max_workers: usize,
    pub simulation: EngineConfig,
}

impl From<&AppConfig> for EngineSettings {
    fn from(config: &AppConfig) -> Self {
        EngineSettings {
            interval: Duration::from_secs(config.price_update_interval_secs),
            batch_size: config.price_update_batch_size as i64,
            max_workers: config.price_update_max_workers,
            simulation: EngineConfig::from(config),
        }
    }
}

/// The price update engine: one instance per process, holding the pool and
/// its running metrics. Cloning is cheap (the pool and metrics are both
/// reference-counted internally) so the same engine can be handed to both
/// the scheduler loop and the `qcd-server` status endpoint.
#[derive(Clone)]
pub struct PriceUpdateEngine {
    pool: PgPool,
    settings: EngineSettings,
    metrics: Arc<UpdateMetrics>,
}

impl PriceUpdateEngine {
    #[must_use]
    pub fn new(pool: PgPool, settings: EngineSettings) -> Self {
        PriceUpdateEngine { pool, settings, metrics: Arc::new(UpdateMetrics::new(Utc::now())) }
    }

    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot(Utc::now())
    }

    /// Runs exactly one tick: fetch a random batch, apply it, return how
    /// many rows changed.
    ///
    /// # Errors
    ///
    /// Returns [`PriceUpdateError`] if fetching the batch itself fails; a
    /// row that fails its own update is recorded in the metrics instead of
    /// surfacing here.
    pub async fn run_cycle(&self) -> Result<usize, PriceUpdateError> {
        let batch = get_random_update_batch(&self.pool, self.settings.batch_size).await?;
        if batch.is_empty() {
            warn!("no current_prices rows available for update");
            return Ok(0);
        }

        debug!(batch_size = batch.len(), "processing price update batch");
        let successful = process_batch(
            &self.pool,
            batch,
            self.settings.simulation,
            self.settings.max_workers,
            Arc::clone(&self.metrics),
        )
        .await;
        Ok(successful)
    }

    /// Runs ticks on a fixed interval until `shutdown` is signalled (set to
    /// `true`) or dropped. Logs a metrics summary every 10 cycles, matching
    /// the original simulator's reporting cadence.
    pub async fn run_continuous(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_secs = self.settings.interval.as_secs(),
            batch_size = self.settings.batch_size,
            max_workers = self.settings.max_workers,
            "starting continuous price updates"
        );

        let mut ticker = tokio::time::interval(self.settings.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut cycle = 0u64;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    cycle += 1;
                    match self.run_cycle().await {
                        Ok(successful) => info!(cycle, successful, "update cycle completed"),
                        Err(e) => warn!(cycle, error = %e, "update cycle failed"),
                    }
                    if cycle % 10 == 0 {
                        let snap = self.metrics();
                        info!(
                            total = snap.total_updates,
                            success_rate = snap.success_rate_percent,
                            updates_per_minute = snap.updates_per_minute,
                            "price update metrics"
                        );
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("price update engine stopping");
                        break;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_settings_derive_from_app_config_fields() {
        let settings = EngineSettings {
            interval: Duration::from_secs(5),
            batch_size: 50,
            max_workers: 5,
            simulation: EngineConfig { max_change_percent: 15.0, discount_probability: 0.15, surge_probability: 0.05 },
        };
        assert_eq!(settings.batch_size, 50);
        assert_eq!(settings.max_workers, 5);
    }
}
