//! Host resource sampling (CPU/memory/disk) via `sysinfo`, kept as a
//! bounded 24h history of one-sample-per-call points.

use std::collections::VecDeque;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sysinfo::{Disks, System};

use crate::ring::push_bounded;

/// 24h of history at a 1-minute sampling interval.
const HISTORY_CAPACITY: usize = 1_440;

const CPU_WARN_THRESHOLD: f32 = 80.0;
const MEMORY_WARN_THRESHOLD: f64 = 85.0;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct SystemSample {
    pub timestamp: DateTime<Utc>,
    pub cpu_percent: f32,
    pub memory_percent: f64,
    pub memory_used_bytes: u64,
    pub memory_total_bytes: u64,
    pub disk_usage_percent: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SystemSummary {
    pub samples: usize,
    pub avg_cpu_percent: f64,
    pub max_cpu_percent: f32,
    pub avg_memory_percent: f64,
    pub max_memory_percent: f64,
}

struct State {
    system: System,
    history: VecDeque<SystemSample>,
}

/// Samples host CPU, memory and disk usage on demand. `sysinfo::System`
/// keeps internal state between refreshes (needed for CPU deltas), so one
/// instance is held for the process lifetime behind a mutex.
pub struct SystemMonitor {
    state: Mutex<State>,
}

impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemMonitor {
    #[must_use]
    pub fn new() -> Self {
        let mut system = System::new();
        system.refresh_cpu_usage();
        system.refresh_memory();
        SystemMonitor {
            state: Mutex::new(State { system, history: VecDeque::new() }),
        }
    }

    /// Takes one sample of current host resource usage, records it into the
    /// bounded history, and logs a warning if CPU or memory crosses its
    /// threshold.
    pub fn sample(&self) -> SystemSample {
        let mut state = self.state.lock().unwrap();
        state.system.refresh_cpu_usage();
        state.system.refresh_memory();

        let cpu_percent = state.system.global_cpu_usage();
        let memory_total_bytes = state.system.total_memory();
        let memory_used_bytes = state.system.used_memory();
        let memory_percent = if memory_total_bytes > 0 {
            memory_used_bytes as f64 / memory_total_bytes as f64 * 100.0
        } else {
            0.0
        };

        let disks = Disks::new_with_refreshed_list();
        let (total_space, available_space) = disks
            .iter()
            .fold((0u64, 0u64), |(t, a), d| (t + d.total_space(), a + d.available_space()));
        let disk_usage_percent = if total_space > 0 {
            (total_space - available_space) as f64 / total_space as f64 * 100.0
        } else {
            0.0
        };

        let sample = SystemSample {
            timestamp: Utc::now(),
            cpu_percent,
            memory_percent,
            memory_used_bytes,
            memory_total_bytes,
            disk_usage_percent,
        };

        if cpu_percent > CPU_WARN_THRESHOLD {
            tracing::warn!(cpu_percent, "high CPU usage");
        }
        if memory_percent > MEMORY_WARN_THRESHOLD {
            tracing::warn!(memory_percent, "high memory usage");
        }

        push_bounded(&mut state.history, sample, HISTORY_CAPACITY);
        sample
    }

    /// Returns the most recent sample without taking a new one.
    #[must_use]
    pub fn current(&self) -> Option<SystemSample> {
        self.state.lock().unwrap().history.back().copied()
    }

    #[must_use]
    pub fn summary(&self, hours: i64) -> Option<SystemSummary> {
        let state = self.state.lock().unwrap();
        let cutoff = Utc::now() - Duration::hours(hours);
        let samples: Vec<SystemSample> =
            state.history.iter().filter(|s| s.timestamp > cutoff).copied().collect();
        if samples.is_empty() {
            return None;
        }

        let count = samples.len() as f64;
        let avg_cpu_percent = samples.iter().map(|s| f64::from(s.cpu_percent)).sum::<f64>() / count;
        let max_cpu_percent = samples.iter().map(|s| s.cpu_percent).fold(0.0, f32::max);
        let avg_memory_percent = samples.iter().map(|s| s.memory_percent).sum::<f64>() / count;
        let max_memory_percent = samples.iter().map(|s| s.memory_percent).fold(0.0, f64::max);

        Some(SystemSummary {
            samples: samples.len(),
            avg_cpu_percent,
            max_cpu_percent,
            avg_memory_percent,
            max_memory_percent,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn current_is_none_before_any_sample_is_taken() {
        assert!(SystemMonitor::new().current().is_none());
    }

    #[test]
    fn sample_populates_current_and_summary() {
        let monitor = SystemMonitor::new();
        let sample = monitor.sample();
        assert!(sample.memory_percent >= 0.0);
        assert_eq!(monitor.current().unwrap().timestamp, sample.timestamp);
        assert_eq!(monitor.summary(24).unwrap().samples, 1);
    }

    #[test]
    fn summary_excludes_samples_outside_the_window() {
        let monitor = SystemMonitor::new();
        monitor.sample();
        assert!(monitor.summary(0).is_none());
    }
}
