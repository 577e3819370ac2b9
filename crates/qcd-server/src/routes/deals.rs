//! `GET|POST /deals/` and `GET /deals/campaigns` — active discounts joined
//! with live prices, and the promotional campaigns currently running.

use axum::extract::{Extension, Query, State};
use axum::Json;
use qcd_core::validation::{validate_discount_percent, validate_limit};
use qcd_core::ErrorCode;
use qcd_db::discounts::DealRow;
use serde::{Deserialize, Serialize};

use crate::error::{db_error, ApiError};
use crate::middleware::RequestId;
use crate::state::AppState;

const DEFAULT_DEALS_LIMIT: i64 = 20;
const MAX_DEALS_LIMIT: i64 = 100;

#[derive(Debug, Deserialize)]
pub struct DealsParams {
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub min_discount_percent: Option<i32>,
    #[serde(default)]
    pub featured_only: Option<bool>,
    #[serde(default)]
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct DealsResponse {
    pub deals: Vec<DealRow>,
    pub total_results: usize,
}

async fn deals_core(
    state: AppState,
    request_id: String,
    params: DealsParams,
) -> Result<Json<DealsResponse>, ApiError> {
    let min_discount_percent = params.min_discount_percent.unwrap_or(0);
    if !validate_discount_percent(min_discount_percent) {
        return Err(ApiError::new(
            ErrorCode::ValidationError,
            "min_discount_percent must be between 0 and 100",
            request_id,
        ));
    }
    let limit = validate_limit(params.limit, DEFAULT_DEALS_LIMIT, MAX_DEALS_LIMIT);

    let deals = qcd_db::discounts::list_deals(
        &state.pool,
        params.platform.as_deref(),
        params.category.as_deref(),
        min_discount_percent,
        params.featured_only.unwrap_or(false),
        limit,
    )
    .await
    .map_err(|e| db_error(e, &request_id))?;

    Ok(Json(DealsResponse { total_results: deals.len(), deals }))
}

pub async fn list_deals_get(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Query(params): Query<DealsParams>,
) -> Result<Json<DealsResponse>, ApiError> {
    deals_core(state, request_id.0, params).await
}

pub async fn list_deals_post(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Json(params): Json<DealsParams>,
) -> Result<Json<DealsResponse>, ApiError> {
    deals_core(state, request_id.0, params).await
}

#[derive(Debug, Serialize)]
pub struct CampaignOut {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub product_ids: Vec<i64>,
}

#[derive(Debug, Serialize)]
pub struct CampaignsResponse {
    pub campaigns: Vec<CampaignOut>,
}

pub async fn list_campaigns(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
) -> Result<Json<CampaignsResponse>, ApiError> {
    let request_id = request_id.0;
    let active = qcd_db::campaigns::list_active_campaigns(&state.pool)
        .await
        .map_err(|e| db_error(e, &request_id))?;

    let mut campaigns = Vec::with_capacity(active.len());
    for campaign in active {
        let products = qcd_db::campaigns::list_campaign_products(&state.pool, campaign.id)
            .await
            .map_err(|e| db_error(e, &request_id))?;
        campaigns.push(CampaignOut {
            id: campaign.id,
            name: campaign.name,
            description: campaign.description,
            product_ids: products.into_iter().map(|p| p.product_id).collect(),
        });
    }

    Ok(Json(CampaignsResponse { campaigns }))
}
