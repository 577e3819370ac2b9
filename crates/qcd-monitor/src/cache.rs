//! Cache hit/miss monitoring, with the same hourly-bucket shape the
//! database monitor uses so both render the same way on a dashboard.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::Utc;
use serde::Serialize;

#[derive(Debug, Clone, Copy, Default)]
pub struct CacheBucketStats {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CachePerformance {
    pub cache_hits: u64,
    pub cache_misses: u64,
    pub hit_ratio: f64,
    pub total_operations: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CacheOperations {
    pub cache_sets: u64,
    pub cache_deletes: u64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CacheRecentPerformance {
    pub hits_last_hour: u64,
    pub misses_last_hour: u64,
    pub hit_ratio_last_hour: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct CacheStatistics {
    pub performance: CachePerformance,
    pub operations: CacheOperations,
    pub recent: CacheRecentPerformance,
}

/// Cache performance counters. Hit/miss/set/delete totals are plain atomics
/// since they're incremented from every request path; the hourly breakdown
/// needs a map, so it sits behind its own mutex.
pub struct CacheMonitor {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    hourly: Mutex<HashMap<String, CacheBucketStats>>,
}

impl Default for CacheMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl CacheMonitor {
    #[must_use]
    pub fn new() -> Self {
        CacheMonitor {
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            sets: AtomicU64::new(0),
            deletes: AtomicU64::new(0),
            hourly: Mutex::new(HashMap::new()),
        }
    }

    fn current_hour_key() -> String {
        Utc::now().format("%Y-%m-%d-%H").to_string()
    }

    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        self.hourly.lock().unwrap().entry(Self::current_hour_key()).or_default().hits += 1;
    }

    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        self.hourly.lock().unwrap().entry(Self::current_hour_key()).or_default().misses += 1;
    }

    pub fn record_set(&self) {
        self.sets.fetch_add(1, Ordering::Relaxed);
        self.hourly.lock().unwrap().entry(Self::current_hour_key()).or_default().sets += 1;
    }

    pub fn record_delete(&self) {
        self.deletes.fetch_add(1, Ordering::Relaxed);
        self.hourly.lock().unwrap().entry(Self::current_hour_key()).or_default().deletes += 1;
    }

    #[must_use]
    pub fn hit_ratio(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        if total == 0 {
            0.0
        } else {
            hits as f64 / total as f64
        }
    }

    #[must_use]
    pub fn statistics(&self) -> CacheStatistics {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;

        let hourly = self.hourly.lock().unwrap();
        let recent = hourly.get(&Self::current_hour_key()).copied().unwrap_or_default();
        let recent_total = recent.hits + recent.misses;

        CacheStatistics {
            performance: CachePerformance {
                cache_hits: hits,
                cache_misses: misses,
                hit_ratio: if total == 0 { 0.0 } else { hits as f64 / total as f64 },
                total_operations: total,
            },
            operations: CacheOperations {
                cache_sets: self.sets.load(Ordering::Relaxed),
                cache_deletes: self.deletes.load(Ordering::Relaxed),
            },
            recent: CacheRecentPerformance {
                hits_last_hour: recent.hits,
                misses_last_hour: recent.misses,
                hit_ratio_last_hour: if recent_total == 0 {
                    0.0
                } else {
                    recent.hits as f64 / recent_total as f64
                },
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hit_ratio_is_zero_with_no_operations() {
        assert_eq!(CacheMonitor::new().hit_ratio(), 0.0);
    }

    #[test]
    fn hit_ratio_reflects_recorded_operations() {
        let monitor = CacheMonitor::new();
        monitor.record_hit();
        monitor.record_hit();
        monitor.record_miss();
        assert!((monitor.hit_ratio() - (2.0 / 3.0)).abs() < f64::EPSILON);
    }

    #[test]
    fn statistics_track_sets_and_deletes_separately_from_hit_ratio() {
        let monitor = CacheMonitor::new();
        monitor.record_set();
        monitor.record_delete();
        monitor.record_hit();
        let stats = monitor.statistics();
        assert_eq!(stats.operations.cache_sets, 1);
        assert_eq!(stats.operations.cache_deletes, 1);
        assert_eq!(stats.performance.cache_hits, 1);
    }
}
