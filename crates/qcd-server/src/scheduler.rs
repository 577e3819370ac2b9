//! Background tasks spawned alongside the HTTP server: the continuous
//! price-update engine and a periodic host-resource sample, both stopped
//! by the same shutdown signal the server's graceful shutdown uses.

use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::info;

use crate::state::AppState;

/// Handles for the spawned background tasks, held by `main` so it can wait
/// for them to finish unwinding after the shutdown signal fires.
pub struct Scheduler {
    pub price_updates: JoinHandle<()>,
    pub system_sampling: JoinHandle<()>,
}

impl Scheduler {
    pub async fn shutdown(self) {
        let _ = self.price_updates.await;
        let _ = self.system_sampling.await;
    }
}

/// Spawns the price update engine's continuous loop and a system-resource
/// sampler at `system_sample_interval_secs`, both watching `shutdown`.
pub fn spawn(state: &AppState, shutdown: watch::Receiver<bool>) -> Scheduler {
    let engine = state.pricing_engine.clone();
    let price_shutdown = shutdown.clone();
    let price_updates = tokio::spawn(async move {
        engine.run_continuous(price_shutdown).await;
    });

    let monitors = state.monitors.clone();
    let interval = Duration::from_secs(state.config.system_sample_interval_secs.max(1));
    let mut system_shutdown = shutdown;
    let system_sampling = tokio::spawn(async move {
        info!(interval_secs = interval.as_secs(), "starting system resource sampling");
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let sample = monitors.system.sample();
                    let raised = monitors.alerts.check_thresholds(
                        f64::from(sample.cpu_percent),
                        sample.memory_percent,
                        monitors.database.performance_summary().overall.error_rate,
                        monitors.cache.statistics().performance.hit_ratio,
                    );
                    for alert in raised {
                        tracing::warn!(alert_type = alert.alert_type, value = alert.value, "threshold alert");
                    }
                }
                changed = system_shutdown.changed() => {
                    if changed.is_err() || *system_shutdown.borrow() {
                        info!("system resource sampling stopping");
                        break;
                    }
                }
            }
        }
    });

    Scheduler { price_updates, system_sampling }
}
