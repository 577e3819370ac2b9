//! Threshold-based alerting over the other monitors' metrics, with a
//! 5-minute suppression window so a sustained condition doesn't spam the
//! same alert on every check.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::ring::push_bounded;

const DEDUP_WINDOW: Duration = Duration::minutes(5);
const ALERT_HISTORY_CAPACITY: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlertSeverity {
    Warning,
    Critical,
}

#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub alert_type: String,
    pub severity: AlertSeverity,
    pub message: String,
    pub value: f64,
    pub threshold: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy)]
pub struct AlertThresholds {
    pub cpu_percent: f64,
    pub memory_percent: f64,
    pub error_rate: f64,
    pub cache_hit_ratio_min: f64,
}

impl Default for AlertThresholds {
    fn default() -> Self {
        AlertThresholds {
            cpu_percent: 80.0,
            memory_percent: 85.0,
            error_rate: 0.05,
            cache_hit_ratio_min: 0.7,
        }
    }
}

struct State {
    active: HashMap<String, DateTime<Utc>>,
    history: VecDeque<Alert>,
}

/// Evaluates resource/error metrics against fixed thresholds and raises
/// alerts, deduplicating the same (type, value) pair within a 5-minute
/// window so a sustained breach raises one alert, not one per poll.
pub struct AlertManager {
    thresholds: AlertThresholds,
    state: Mutex<State>,
}

impl AlertManager {
    #[must_use]
    pub fn new(thresholds: AlertThresholds) -> Self {
        AlertManager {
            thresholds,
            state: Mutex::new(State { active: HashMap::new(), history: VecDeque::new() }),
        }
    }

    /// Checks every known threshold against the current metric values and
    /// returns the alerts that were newly raised (suppressed repeats are
    /// not returned).
    pub fn check_thresholds(
        &self,
        cpu_percent: f64,
        memory_percent: f64,
        error_rate: f64,
        cache_hit_ratio: f64,
    ) -> Vec<Alert> {
        let mut raised = Vec::new();

        if cpu_percent > self.thresholds.cpu_percent {
            if let Some(alert) = self.process_alert(
                "high_cpu",
                AlertSeverity::Warning,
                format!("CPU usage at {cpu_percent:.1}%"),
                cpu_percent,
                self.thresholds.cpu_percent,
            ) {
                raised.push(alert);
            }
        }

        if memory_percent > self.thresholds.memory_percent {
            if let Some(alert) = self.process_alert(
                "high_memory",
                AlertSeverity::Warning,
                format!("Memory usage at {memory_percent:.1}%"),
                memory_percent,
                self.thresholds.memory_percent,
            ) {
                raised.push(alert);
            }
        }

        if error_rate > self.thresholds.error_rate {
            if let Some(alert) = self.process_alert(
                "high_error_rate",
                AlertSeverity::Critical,
                format!("Error rate at {:.1}%", error_rate * 100.0),
                error_rate,
                self.thresholds.error_rate,
            ) {
                raised.push(alert);
            }
        }

        if cache_hit_ratio < self.thresholds.cache_hit_ratio_min {
            if let Some(alert) = self.process_alert(
                "low_cache_hit_ratio",
                AlertSeverity::Warning,
                format!("Cache hit ratio at {:.1}%", cache_hit_ratio * 100.0),
                cache_hit_ratio,
                self.thresholds.cache_hit_ratio_min,
            ) {
                raised.push(alert);
            }
        }

        raised
    }

    fn process_alert(
        &self,
        alert_type: &str,
        severity: AlertSeverity,
        message: String,
        value: f64,
        threshold: f64,
    ) -> Option<Alert> {
        let now = Utc::now();
        let key = format!("{alert_type}_{value}");

        let mut state = self.state.lock().unwrap();
        if let Some(last_raised) = state.active.get(&key) {
            if now - *last_raised < DEDUP_WINDOW {
                return None;
            }
        }
        state.active.insert(key, now);

        let alert = Alert { alert_type: alert_type.to_string(), severity, message, value, threshold, timestamp: now };
        tracing::warn!(alert_type, value, threshold, "alert raised");
        push_bounded(&mut state.history, alert.clone(), ALERT_HISTORY_CAPACITY);
        Some(alert)
    }

    /// Returns alerts raised within the last hour, oldest first.
    #[must_use]
    pub fn active_alerts(&self) -> Vec<Alert> {
        let state = self.state.lock().unwrap();
        let one_hour_ago = Utc::now() - Duration::hours(1);
        state.history.iter().filter(|a| a.timestamp > one_hour_ago).cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_alerts_when_everything_is_within_bounds() {
        let manager = AlertManager::new(AlertThresholds::default());
        assert!(manager.check_thresholds(10.0, 20.0, 0.0, 0.99).is_empty());
    }

    #[test]
    fn high_cpu_raises_a_warning_alert() {
        let manager = AlertManager::new(AlertThresholds::default());
        let alerts = manager.check_thresholds(95.0, 20.0, 0.0, 0.99);
        assert_eq!(alerts.len(), 1);
        assert_eq!(alerts[0].alert_type, "high_cpu");
        assert_eq!(alerts[0].severity, AlertSeverity::Warning);
    }

    #[test]
    fn repeated_breach_within_dedup_window_is_suppressed() {
        let manager = AlertManager::new(AlertThresholds::default());
        assert_eq!(manager.check_thresholds(95.0, 20.0, 0.0, 0.99).len(), 1);
        assert!(manager.check_thresholds(95.0, 20.0, 0.0, 0.99).is_empty());
        assert_eq!(manager.active_alerts().len(), 1);
    }

    #[test]
    fn distinct_breaches_both_raise_alerts() {
        let manager = AlertManager::new(AlertThresholds::default());
        let alerts = manager.check_thresholds(95.0, 95.0, 0.5, 0.1);
        assert_eq!(alerts.len(), 4);
    }
}
