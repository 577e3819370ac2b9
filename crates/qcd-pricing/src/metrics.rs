//! Counters for the price update engine's own health, independent of the
//! monitoring core (`qcd-monitor`) — these track what the engine *did*,
//! not how fast the database responded while it did it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};

use crate::simulate::PriceChange;
use qcd_core::ChangeType;

/// Atomic counters safe to update concurrently from every worker in a batch.
#[derive(Debug)]
pub struct UpdateMetrics {
    total_updates: AtomicU64,
    successful_updates: AtomicU64,
    failed_updates: AtomicU64,
    price_increases: AtomicU64,
    price_decreases: AtomicU64,
    new_discounts: AtomicU64,
    surge_pricing_events: AtomicU64,
    conflicts_resolved: AtomicU64,
    start_time: DateTime<Utc>,
    last_update_time: Mutex<Option<DateTime<Utc>>>,
}

/// A point-in-time read of [`UpdateMetrics`], safe to serialise and hand to
/// a monitoring snapshot or a CLI printout.
#[derive(Debug, Clone, Copy)]
pub struct MetricsSnapshot {
    pub total_updates: u64,
    pub successful_updates: u64,
    pub failed_updates: u64,
    pub price_increases: u64,
    pub price_decreases: u64,
    pub new_discounts: u64,
    pub surge_pricing_events: u64,
    pub conflicts_resolved: u64,
    pub runtime_seconds: f64,
    pub success_rate_percent: f64,
    pub updates_per_minute: f64,
    pub last_update_time: Option<DateTime<Utc>>,
}

impl UpdateMetrics {
    #[must_use]
    pub fn new(start_time: DateTime<Utc>) -> Self {
        UpdateMetrics {
            total_updates: AtomicU64::new(0),
            successful_updates: AtomicU64::new(0),
            failed_updates: AtomicU64::new(0),
            price_increases: AtomicU64::new(0),
            price_decreases: AtomicU64::new(0),
            new_discounts: AtomicU64::new(0),
            surge_pricing_events: AtomicU64::new(0),
            conflicts_resolved: AtomicU64::new(0),
            start_time,
            last_update_time: Mutex::new(None),
        }
    }

    /// Records one successful price mutation and the change it produced.
    pub fn record_success(&self, change: &PriceChange, was_conflict: bool, now: DateTime<Utc>) {
        self.total_updates.fetch_add(1, Ordering::Relaxed);
        self.successful_updates.fetch_add(1, Ordering::Relaxed);
        *self.last_update_time.lock().unwrap() = Some(now);

        if was_conflict {
            self.conflicts_resolved.fetch_add(1, Ordering::Relaxed);
        }
        match change.change_type {
            ChangeType::Increase => {
                self.price_increases.fetch_add(1, Ordering::Relaxed);
            }
            ChangeType::Decrease => {
                self.price_decreases.fetch_add(1, Ordering::Relaxed);
            }
            ChangeType::NoChange => {}
        }
        if change.discount_percentage.is_some() {
            self.new_discounts.fetch_add(1, Ordering::Relaxed);
        }
        if change.is_surge {
            self.surge_pricing_events.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Records one row that exhausted its retries without applying.
    pub fn record_failure(&self) {
        self.total_updates.fetch_add(1, Ordering::Relaxed);
        self.failed_updates.fetch_add(1, Ordering::Relaxed);
    }

    #[must_use]
    pub fn snapshot(&self, now: DateTime<Utc>) -> MetricsSnapshot {
        let total = self.total_updates.load(Ordering::Relaxed);
        let successful = self.successful_updates.load(Ordering::Relaxed);
        let runtime_seconds = (now - self.start_time).num_milliseconds().max(0) as f64 / 1000.0;
        let runtime_minutes = runtime_seconds / 60.0;

        MetricsSnapshot {
            total_updates: total,
            successful_updates: successful,
            failed_updates: self.failed_updates.load(Ordering::Relaxed),
            price_increases: self.price_increases.load(Ordering::Relaxed),
            price_decreases: self.price_decreases.load(Ordering::Relaxed),
            new_discounts: self.new_discounts.load(Ordering::Relaxed),
            surge_pricing_events: self.surge_pricing_events.load(Ordering::Relaxed),
            conflicts_resolved: self.conflicts_resolved.load(Ordering::Relaxed),
            runtime_seconds,
            success_rate_percent: if total == 0 { 0.0 } else { (successful as f64 / total as f64) * 100.0 },
            updates_per_minute: if runtime_minutes <= 0.0 { 0.0 } else { total as f64 / runtime_minutes },
            last_update_time: *self.last_update_time.lock().unwrap(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;

    fn change(change_type: ChangeType, discount: Option<i32>, surge: bool) -> PriceChange {
        PriceChange {
            new_price: Decimal::new(10000, 2),
            original_price: None,
            discount_percentage: discount,
            is_surge: surge,
            change_type,
            change_amount: Decimal::ZERO,
            change_percentage: 0.0,
        }
    }

    #[test]
    fn success_rate_is_zero_with_no_updates() {
        let m = UpdateMetrics::new(Utc::now());
        assert_eq!(m.snapshot(Utc::now()).success_rate_percent, 0.0);
    }

    #[test]
    fn records_increase_and_discount() {
        let m = UpdateMetrics::new(Utc::now());
        m.record_success(&change(ChangeType::Increase, Some(20), false), false, Utc::now());
        let snap = m.snapshot(Utc::now());
        assert_eq!(snap.total_updates, 1);
        assert_eq!(snap.successful_updates, 1);
        assert_eq!(snap.price_increases, 1);
        assert_eq!(snap.new_discounts, 1);
        assert_eq!(snap.success_rate_percent, 100.0);
    }

    #[test]
    fn records_failure_without_touching_success_counters() {
        let m = UpdateMetrics::new(Utc::now());
        m.record_failure();
        let snap = m.snapshot(Utc::now());
        assert_eq!(snap.total_updates, 1);
        assert_eq!(snap.failed_updates, 1);
        assert_eq!(snap.successful_updates, 0);
    }

    #[test]
    fn conflict_resolution_is_counted() {
        let m = UpdateMetrics::new(Utc::now());
        m.record_success(&change(ChangeType::NoChange, None, false), true, Utc::now());
        assert_eq!(m.snapshot(Utc::now()).conflicts_resolved, 1);
    }
}
