//! `POST /query/` and `POST /query/advanced` — natural-language product
//! queries, resolved through the sample handlers / multi-step executor and
//! rendered either as a flat result list or a fully processed, paginated
//! view.

use std::collections::HashMap;
use std::time::Instant;

use axum::extract::{Extension, State};
use axum::Json;
use chrono::Utc;
use qcd_core::validation::validate_query_text;
use qcd_core::ErrorCode;
use qcd_executor::{dispatch, DispatchOutcome};
use qcd_planner::{analyse_performance, create_execution_plan, ExecutionPlan, PerformanceAnalysis};
use qcd_result::{PaginationConfig, ProcessedResult, ResultFormat, SamplingConfig, SamplingMethod};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{db_error, ApiError};
use crate::middleware::RequestId;
use crate::routes::QueryResultOut;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub context: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct QueryResponse {
    pub query: String,
    pub results: Vec<QueryResultOut>,
    pub execution_time: f64,
    pub relevant_tables: Vec<String>,
    pub total_results: usize,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

fn validated_query(raw: &str, request_id: &str) -> Result<String, ApiError> {
    let trimmed = raw.trim();
    validate_query_text(trimmed).map_err(|issue| {
        ApiError::new(ErrorCode::ValidationError, issue.message(), request_id)
            .with_suggestions(issue.suggestions())
    })?;
    Ok(trimmed.to_string())
}

/// Resolves `query` through the dispatcher, converting a [`DispatchOutcome`]
/// into the HTTP-facing result list. A `MultiStep` outcome carries the rows
/// its `FilterApplication`/`Aggregation`/`ResultFormatting` steps produced,
/// if it got that far; its own step suggestions are surfaced alongside them.
async fn resolve(
    state: &AppState,
    query: &str,
    request_id: &str,
) -> Result<(Vec<QueryResultOut>, Option<Vec<String>>), ApiError> {
    match dispatch(&state.pool, query).await {
        Ok(DispatchOutcome::SampleResults(results)) => {
            Ok((results.into_iter().map(QueryResultOut::from).collect(), None))
        }
        Ok(DispatchOutcome::MultiStep(multi)) => {
            let results = multi.rows.unwrap_or_default().into_iter().map(QueryResultOut::from).collect();
            Ok((results, Some(multi.suggestions)))
        }
        Err(e) => Err(db_error(e, request_id)),
    }
}

pub async fn handle_query(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(body): Json<QueryRequest>,
) -> Result<Json<QueryResponse>, ApiError> {
    let request_id = request_id.0;
    let started = Instant::now();
    let query = validated_query(&body.query, &request_id)?;
    let relevant_tables = state.relevant_tables(&query);

    let cache_context = "basic";
    if let Some(cached) = state.cache.get_query_result::<Vec<QueryResultOut>>(&query, cache_context).await {
        state.monitors.cache.record_hit();
        return Ok(Json(QueryResponse {
            total_results: cached.len(),
            query,
            results: cached,
            execution_time: started.elapsed().as_secs_f64(),
            relevant_tables,
            cached: true,
            suggestions: None,
            metadata: None,
        }));
    }
    state.monitors.cache.record_miss();

    let (results, suggestions) = resolve(&state, &query, &request_id).await?;

    let table_refs: Vec<&str> = relevant_tables.iter().map(String::as_str).collect();
    state
        .cache
        .cache_query_result(&query, cache_context, &results, std::time::Duration::from_secs(60), &table_refs)
        .await;
    state.monitors.cache.record_set();

    Ok(Json(QueryResponse {
        total_results: results.len(),
        query,
        results,
        execution_time: started.elapsed().as_secs_f64(),
        relevant_tables,
        cached: false,
        suggestions,
        metadata: None,
    }))
}

#[derive(Debug, Deserialize)]
pub struct AdvancedQueryRequest {
    pub query: String,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub context: Option<Value>,
    #[serde(default)]
    pub page: Option<usize>,
    #[serde(default)]
    pub page_size: Option<usize>,
    #[serde(default)]
    pub sampling_method: Option<SamplingMethod>,
    #[serde(default)]
    pub sample_size: Option<usize>,
    #[serde(default)]
    pub format: Option<ResultFormat>,
}

#[derive(Debug, Serialize)]
pub struct AdvancedQueryResponse {
    pub query: String,
    pub relevant_tables: Vec<String>,
    pub execution_time: f64,
    pub processed: ProcessedResult,
    pub plan: ExecutionPlan,
    pub performance: PerformanceAnalysis,
}

const PLAN_CACHE_TTL: std::time::Duration = std::time::Duration::from_secs(30 * 60);

/// Builds the join-graph execution plan for `relevant_tables`, reusing a
/// cached plan for the same (query, table set) pair within the 30-minute
/// window rather than recomputing the MST on every request.
async fn planned(state: &AppState, query: &str, relevant_tables: &[String]) -> ExecutionPlan {
    let schema = match state.catalog.get().await {
        Ok(schema) => schema,
        Err(e) => {
            tracing::warn!(error = %e, "schema lookup failed, planning without foreign-key context");
            qcd_catalog::SchemaSnapshot { tables: relevant_tables.to_vec(), columns: Vec::new(), foreign_keys: Vec::new() }
        }
    };

    let cache_key = qcd_planner::plan_cache_key(query, relevant_tables);
    if let Some(plan) = state.cache.get_execution_plan::<ExecutionPlan>(&cache_key).await {
        return plan;
    }

    let plan = create_execution_plan(query, &schema, relevant_tables, &HashMap::new());
    let touched: Vec<&str> = relevant_tables.iter().map(String::as_str).collect();
    state.cache.cache_execution_plan(&cache_key, &plan, PLAN_CACHE_TTL, &touched).await;
    plan
}

pub async fn handle_advanced_query(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(body): Json<AdvancedQueryRequest>,
) -> Result<Json<AdvancedQueryResponse>, ApiError> {
    let request_id = request_id.0;
    let started = Instant::now();
    let query = validated_query(&body.query, &request_id)?;
    let relevant_tables = state.relevant_tables(&query);
    let plan = planned(&state, &query, &relevant_tables).await;

    let sampling_config = SamplingConfig {
        method: body.sampling_method.unwrap_or(SamplingMethod::Random),
        sample_size: body.sample_size.unwrap_or(1000),
        ..SamplingConfig::default()
    };
    let pagination_config = PaginationConfig::new(body.page.unwrap_or(1), body.page_size.unwrap_or(20));
    let format = body.format.unwrap_or(ResultFormat::Structured);

    let pool = state.pool.clone();
    let query_for_compute = query.clone();
    let processed = qcd_result::process_results_cached(
        &state.cache,
        &query,
        &sampling_config,
        &pagination_config,
        format,
        Utc::now(),
        || async move {
            match dispatch(&pool, &query_for_compute).await? {
                DispatchOutcome::SampleResults(results) => Ok(results),
                DispatchOutcome::MultiStep(multi) => Ok(multi.rows.unwrap_or_default()),
            }
        },
    )
    .await
    .map_err(|e: qcd_executor::ExecutorError| db_error(e, &request_id))?;

    let execution_time = started.elapsed().as_secs_f64();
    let performance = analyse_performance(&plan, execution_time);

    Ok(Json(AdvancedQueryResponse { query, relevant_tables, execution_time, processed, plan, performance }))
}
