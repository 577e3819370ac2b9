//! Monitoring core (component H): bounded-history tracking of database
//! query performance, cache hit ratio, host resource usage, and
//! threshold-based alerting, composed into one comprehensive snapshot for
//! the HTTP surface's health/metrics endpoints.

pub mod alerts;
pub mod cache;
pub mod db;
mod ring;
pub mod system;

pub use alerts::{Alert, AlertManager, AlertSeverity, AlertThresholds};
pub use cache::{CacheMonitor, CacheStatistics};
pub use db::{DatabaseMonitor, PerformanceSummary, QueryMetric};
pub use system::{SystemMonitor, SystemSample, SystemSummary};

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct ComprehensiveMetrics {
    pub database: DatabaseMetricsView,
    pub cache: CacheMetricsView,
    pub system: SystemMetricsView,
    pub alerts_raised: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct DatabaseMetricsView {
    pub total_queries: u64,
    pub total_errors: u64,
    pub error_rate: f64,
    pub avg_execution_time_secs: f64,
    pub queries_last_hour: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheMetricsView {
    pub hit_ratio: f64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub cache_sets: u64,
    pub cache_deletes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemMetricsView {
    pub cpu_percent: Option<f32>,
    pub memory_percent: Option<f64>,
    pub disk_usage_percent: Option<f64>,
}

/// Registry holding every monitor the service runs, with one method to
/// assemble their current state into a single payload plus run the
/// threshold checks that feed the alert manager.
pub struct MonitorRegistry {
    pub database: DatabaseMonitor,
    pub cache: CacheMonitor,
    pub system: SystemMonitor,
    pub alerts: AlertManager,
}

impl MonitorRegistry {
    #[must_use]
    pub fn new(slow_query_threshold_secs: f64, alert_thresholds: AlertThresholds) -> Self {
        MonitorRegistry {
            database: DatabaseMonitor::new(slow_query_threshold_secs),
            cache: CacheMonitor::new(),
            system: SystemMonitor::new(),
            alerts: AlertManager::new(alert_thresholds),
        }
    }

    /// Takes a fresh system sample, evaluates alert thresholds against the
    /// current metrics, and returns a single snapshot of everything.
    pub fn comprehensive_metrics(&self) -> ComprehensiveMetrics {
        let db_summary = self.database.performance_summary();
        let cache_stats = self.cache.statistics();
        let system_sample = self.system.sample();

        let raised = self.alerts.check_thresholds(
            f64::from(system_sample.cpu_percent),
            system_sample.memory_percent,
            db_summary.overall.error_rate,
            cache_stats.performance.hit_ratio,
        );

        ComprehensiveMetrics {
            database: DatabaseMetricsView {
                total_queries: db_summary.overall.total_queries,
                total_errors: db_summary.overall.total_errors,
                error_rate: db_summary.overall.error_rate,
                avg_execution_time_secs: db_summary.overall.avg_execution_time_secs,
                queries_last_hour: db_summary.recent.queries_last_hour,
            },
            cache: CacheMetricsView {
                hit_ratio: cache_stats.performance.hit_ratio,
                cache_hits: cache_stats.performance.cache_hits,
                cache_misses: cache_stats.performance.cache_misses,
                cache_sets: cache_stats.operations.cache_sets,
                cache_deletes: cache_stats.operations.cache_deletes,
            },
            system: SystemMetricsView {
                cpu_percent: Some(system_sample.cpu_percent),
                memory_percent: Some(system_sample.memory_percent),
                disk_usage_percent: Some(system_sample.disk_usage_percent),
            },
            alerts_raised: raised.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comprehensive_metrics_composes_all_monitors() {
        let registry = MonitorRegistry::new(1.0, AlertThresholds::default());
        registry.database.record_query("SELECT 1", 0.01, true, None, Some(1));
        registry.cache.record_hit();
        let metrics = registry.comprehensive_metrics();
        assert_eq!(metrics.database.total_queries, 1);
        assert_eq!(metrics.cache.cache_hits, 1);
        assert!(metrics.system.cpu_percent.is_some());
    }
}
