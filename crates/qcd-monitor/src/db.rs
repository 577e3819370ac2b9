//! Database query monitoring: a bounded history of every query the server
//! runs, plus a slow-query and an error-query tail, and hourly/daily
//! bucketed aggregates for the monitoring dashboard.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::ring::push_bounded;

const QUERY_HISTORY_CAPACITY: usize = 10_000;
const SLOW_QUERY_CAPACITY: usize = 1_000;
const ERROR_QUERY_CAPACITY: usize = 1_000;

#[derive(Debug, Clone, Serialize)]
pub struct QueryMetric {
    pub sql: String,
    pub execution_time_secs: f64,
    pub timestamp: DateTime<Utc>,
    pub success: bool,
    pub error_message: Option<String>,
    pub affected_rows: Option<u64>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BucketStats {
    pub queries: u64,
    pub errors: u64,
    pub total_time_secs: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct OverallStats {
    pub total_queries: u64,
    pub total_errors: u64,
    pub error_rate: f64,
    pub avg_execution_time_secs: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RecentPerformance {
    pub queries_last_hour: u64,
    pub errors_last_hour: u64,
    pub avg_response_time_secs: f64,
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct PerformanceSummary {
    pub overall: OverallStats,
    pub recent: RecentPerformance,
}

struct State {
    query_history: VecDeque<QueryMetric>,
    slow_queries: VecDeque<QueryMetric>,
    error_queries: VecDeque<QueryMetric>,
    total_queries: u64,
    total_errors: u64,
    hourly_stats: HashMap<String, BucketStats>,
    daily_stats: HashMap<String, BucketStats>,
}

/// Tracks every query the server runs in bounded ring buffers, classifying
/// slow and failed queries into their own tails as it goes. One instance is
/// shared across the whole process behind an `Arc`.
pub struct DatabaseMonitor {
    slow_query_threshold_secs: f64,
    state: Mutex<State>,
}

impl DatabaseMonitor {
    #[must_use]
    pub fn new(slow_query_threshold_secs: f64) -> Self {
        DatabaseMonitor {
            slow_query_threshold_secs,
            state: Mutex::new(State {
                query_history: VecDeque::new(),
                slow_queries: VecDeque::new(),
                error_queries: VecDeque::new(),
                total_queries: 0,
                total_errors: 0,
                hourly_stats: HashMap::new(),
                daily_stats: HashMap::new(),
            }),
        }
    }

    /// Records one query execution. Appends to the rolling history, the
    /// slow-query tail if it crossed the threshold, and the error tail if
    /// it failed, then rolls all three counts into the current hour/day
    /// bucket.
    pub fn record_query(
        &self,
        sql: &str,
        execution_time_secs: f64,
        success: bool,
        error_message: Option<String>,
        affected_rows: Option<u64>,
    ) {
        let now = Utc::now();
        let metric = QueryMetric {
            sql: sql.to_string(),
            execution_time_secs,
            timestamp: now,
            success,
            error_message,
            affected_rows,
        };

        let mut state = self.state.lock().unwrap();
        push_bounded(&mut state.query_history, metric.clone(), QUERY_HISTORY_CAPACITY);
        state.total_queries += 1;

        if !success {
            push_bounded(&mut state.error_queries, metric.clone(), ERROR_QUERY_CAPACITY);
            state.total_errors += 1;
            tracing::error!(
                sql,
                error = metric.error_message.as_deref().unwrap_or(""),
                "database query failed"
            );
        }

        if execution_time_secs > self.slow_query_threshold_secs {
            push_bounded(&mut state.slow_queries, metric, SLOW_QUERY_CAPACITY);
            tracing::warn!(sql, execution_time_secs, "slow query detected");
        }

        let hour_key = now.format("%Y-%m-%d-%H").to_string();
        let hour_bucket = state.hourly_stats.entry(hour_key).or_default();
        hour_bucket.queries += 1;
        hour_bucket.total_time_secs += execution_time_secs;
        if !success {
            hour_bucket.errors += 1;
        }

        let day_key = now.format("%Y-%m-%d").to_string();
        let day_bucket = state.daily_stats.entry(day_key).or_default();
        day_bucket.queries += 1;
        day_bucket.total_time_secs += execution_time_secs;
        if !success {
            day_bucket.errors += 1;
        }
    }

    #[must_use]
    pub fn performance_summary(&self) -> PerformanceSummary {
        let state = self.state.lock().unwrap();
        if state.query_history.is_empty() {
            return PerformanceSummary::default();
        }

        let total_time: f64 = state.query_history.iter().map(|q| q.execution_time_secs).sum();
        let avg_execution_time_secs = total_time / state.query_history.len() as f64;
        let error_rate = if state.total_queries > 0 {
            state.total_errors as f64 / state.total_queries as f64
        } else {
            0.0
        };

        let one_hour_ago = Utc::now() - Duration::hours(1);
        let recent: Vec<&QueryMetric> =
            state.query_history.iter().filter(|q| q.timestamp > one_hour_ago).collect();
        let errors_last_hour = recent.iter().filter(|q| !q.success).count() as u64;
        let avg_response_time_secs = if recent.is_empty() {
            0.0
        } else {
            recent.iter().map(|q| q.execution_time_secs).sum::<f64>() / recent.len() as f64
        };

        PerformanceSummary {
            overall: OverallStats {
                total_queries: state.total_queries,
                total_errors: state.total_errors,
                error_rate,
                avg_execution_time_secs,
            },
            recent: RecentPerformance {
                queries_last_hour: recent.len() as u64,
                errors_last_hour,
                avg_response_time_secs,
            },
        }
    }

    /// Returns up to `limit` of the slowest recorded queries, worst first.
    #[must_use]
    pub fn slow_queries(&self, limit: usize) -> Vec<QueryMetric> {
        let state = self.state.lock().unwrap();
        let mut queries: Vec<QueryMetric> = state.slow_queries.iter().cloned().collect();
        queries.sort_by(|a, b| b.execution_time_secs.total_cmp(&a.execution_time_secs));
        queries.truncate(limit);
        queries
    }

    #[must_use]
    pub fn optimization_suggestions(&self) -> Vec<&'static str> {
        let state = self.state.lock().unwrap();
        let mut suggestions = Vec::new();
        if state.slow_queries.len() > 5 {
            suggestions.push("consider adding indexes for frequently slow queries");
        }
        let error_rate = if state.total_queries > 0 {
            state.total_errors as f64 / state.total_queries as f64
        } else {
            0.0
        };
        if error_rate > 0.05 {
            suggestions.push("high error rate detected - review query validation");
        }
        suggestions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_summary_has_zeroed_fields() {
        let monitor = DatabaseMonitor::new(1.0);
        let summary = monitor.performance_summary();
        assert_eq!(summary.overall.total_queries, 0);
    }

    #[test]
    fn slow_query_crosses_threshold_and_is_recorded() {
        let monitor = DatabaseMonitor::new(0.5);
        monitor.record_query("SELECT 1", 0.9, true, None, Some(1));
        assert_eq!(monitor.slow_queries(10).len(), 1);
    }

    #[test]
    fn failed_query_increments_error_rate() {
        let monitor = DatabaseMonitor::new(1.0);
        monitor.record_query("SELECT 1", 0.1, true, None, Some(1));
        monitor.record_query("SELECT bad", 0.1, false, Some("syntax error".into()), None);
        let summary = monitor.performance_summary();
        assert_eq!(summary.overall.total_queries, 2);
        assert_eq!(summary.overall.total_errors, 1);
        assert!((summary.overall.error_rate - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn suggestions_flag_high_error_rate() {
        let monitor = DatabaseMonitor::new(5.0);
        for _ in 0..10 {
            monitor.record_query("SELECT bad", 0.01, false, Some("err".into()), None);
        }
        assert!(monitor
            .optimization_suggestions()
            .iter()
            .any(|s| s.contains("error rate")));
    }

    #[test]
    fn query_history_is_bounded_and_drops_oldest() {
        let monitor = DatabaseMonitor::new(100.0);
        for i in 0..(QUERY_HISTORY_CAPACITY + 10) {
            monitor.record_query(&format!("SELECT {i}"), 0.01, true, None, None);
        }
        let state = monitor.state.lock().unwrap();
        assert_eq!(state.query_history.len(), QUERY_HISTORY_CAPACITY);
    }
}
