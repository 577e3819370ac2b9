//! `/monitoring/*` — health, database/cache performance, and the
//! comprehensive metrics snapshot. These routes sit outside the rate
//! limiter and the database health gate: an operator needs them to work
//! precisely when the rest of the service is struggling.

use axum::extract::{Extension, Path, Query, State};
use axum::Json;
use qcd_cache::CacheNamespace;
use qcd_core::ErrorCode;
use qcd_monitor::{Alert, CacheStatistics, ComprehensiveMetrics, PerformanceSummary, QueryMetric};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::middleware::RequestId;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: bool,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = qcd_db::health_check(&state.pool).await.is_ok();
    Json(HealthResponse { status: if database { "ok" } else { "degraded" }, database })
}

pub async fn database_performance(State(state): State<AppState>) -> Json<PerformanceSummary> {
    Json(state.monitors.database.performance_summary())
}

#[derive(Debug, Deserialize)]
pub struct SlowQueriesParams {
    #[serde(default)]
    pub limit: Option<usize>,
}

const DEFAULT_SLOW_QUERY_LIMIT: usize = 20;

pub async fn slow_queries(
    State(state): State<AppState>,
    Query(params): Query<SlowQueriesParams>,
) -> Json<Vec<QueryMetric>> {
    let limit = params.limit.unwrap_or(DEFAULT_SLOW_QUERY_LIMIT);
    Json(state.monitors.database.slow_queries(limit))
}

pub async fn cache_stats(State(state): State<AppState>) -> Json<CacheStatistics> {
    Json(state.monitors.cache.statistics())
}

pub async fn metrics_summary(State(state): State<AppState>) -> Json<ComprehensiveMetrics> {
    Json(state.monitors.comprehensive_metrics())
}

#[derive(Debug, Serialize)]
pub struct RealtimeMetrics {
    pub metrics: ComprehensiveMetrics,
    pub active_alerts: Vec<Alert>,
    pub optimization_suggestions: Vec<&'static str>,
}

pub async fn metrics_realtime(State(state): State<AppState>) -> Json<RealtimeMetrics> {
    Json(RealtimeMetrics {
        metrics: state.monitors.comprehensive_metrics(),
        active_alerts: state.monitors.alerts.active_alerts(),
        optimization_suggestions: state.monitors.database.optimization_suggestions(),
    })
}

#[derive(Debug, Serialize)]
pub struct InvalidateCacheResponse {
    pub namespace: String,
    pub removed: usize,
}

/// Drops every cached entry in `namespace` (one of `query_results`,
/// `table_embeddings`, `schema_info`, `execution_plans`) — a bulk reset
/// distinct from the per-table invalidation the price engine triggers on
/// every write.
pub async fn invalidate_cache(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(namespace): Path<String>,
) -> Result<Json<InvalidateCacheResponse>, ApiError> {
    let request_id = request_id.0;
    let Some(parsed) = CacheNamespace::from_str(&namespace) else {
        return Err(ApiError::new(
            ErrorCode::ValidationError,
            format!("unknown cache namespace '{namespace}'"),
            request_id,
        )
        .with_suggestions(vec![
            "use one of: query_results, table_embeddings, schema_info, execution_plans".to_string(),
        ]));
    };
    let removed = state.cache.invalidate_namespace(parsed).await;
    Ok(Json(InvalidateCacheResponse { namespace, removed }))
}
