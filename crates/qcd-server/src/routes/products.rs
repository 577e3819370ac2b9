//! `GET|POST /products/compare` — cross-platform price comparison for a
//! single product, built on top of the existing price-comparison sample
//! handler rather than a new ad-hoc query.

use std::time::Instant;

use axum::extract::{Extension, Query, State};
use axum::Json;
use qcd_core::domain::KNOWN_PLATFORMS;
use qcd_core::ErrorCode;
use qcd_executor::sample::{handle_cheapest_product_query, handle_price_comparison_query};
use qcd_result::{format_results, ResultFormat};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::db_error;
use crate::error::ApiError;
use crate::middleware::RequestId;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CompareParams {
    pub product: String,
    #[serde(default)]
    pub platforms: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct CompareResponse {
    pub product: String,
    pub comparison: Value,
    pub execution_time: f64,
}

/// Synthesises a natural-language query matching the price-comparison
/// sample handler's expected shape, rather than writing new SQL — it
/// already does the cross-platform join and grouping this endpoint needs.
fn synthesize_query(product: &str, platforms: &[String]) -> String {
    if platforms.len() >= 2 {
        format!("compare {product} price between {}", platforms.join(" and "))
    } else {
        format!("compare {product} price between {}", KNOWN_PLATFORMS.join(" and "))
    }
}

/// Rejects any platform name not in [`KNOWN_PLATFORMS`] (matched
/// case-insensitively) before it reaches the synthesized query — spec §6's
/// "platforms must belong to the known set".
fn validate_platforms(platforms: &[String], request_id: &str) -> Result<(), ApiError> {
    for platform in platforms {
        let known = KNOWN_PLATFORMS.iter().any(|k| k.eq_ignore_ascii_case(platform));
        if !known {
            return Err(ApiError::new(
                ErrorCode::ValidationError,
                format!("unknown platform '{platform}'"),
                request_id,
            )
            .with_suggestions(vec![format!(
                "use one of: {}",
                KNOWN_PLATFORMS.join(", ")
            )]));
        }
    }
    Ok(())
}

async fn compare_core(
    state: AppState,
    request_id: String,
    params: CompareParams,
) -> Result<Json<CompareResponse>, ApiError> {
    let started = Instant::now();
    let platforms = params.platforms.unwrap_or_default();
    validate_platforms(&platforms, &request_id)?;
    let synthesized = synthesize_query(&params.product, &platforms);

    let mut results = handle_price_comparison_query(&state.pool, &synthesized)
        .await
        .map_err(|e| db_error(e, &request_id))?;
    if results.is_empty() {
        results = handle_cheapest_product_query(&state.pool, &synthesized)
            .await
            .map_err(|e| db_error(e, &request_id))?;
    }

    let comparison = format_results(&results, ResultFormat::Comparison);

    Ok(Json(CompareResponse {
        product: params.product,
        comparison,
        execution_time: started.elapsed().as_secs_f64(),
    }))
}

pub async fn compare_get(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(params): Query<CompareParams>,
) -> Result<Json<CompareResponse>, ApiError> {
    compare_core(state, request_id.0, params).await
}

pub async fn compare_post(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(params): Json<CompareParams>,
) -> Result<Json<CompareResponse>, ApiError> {
    compare_core(state, request_id.0, params).await
}
