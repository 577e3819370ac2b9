//! Route construction and the HTTP-facing result shape shared by the
//! query, comparison, and deals handlers.

pub mod deals;
pub mod monitoring;
pub mod products;
pub mod query;

use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post};
use axum::Router;
use chrono::{DateTime, Utc};
use qcd_executor::QueryResult as ExecutorQueryResult;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;

use crate::middleware::{
    content_security_policy_header, enforce_rate_limit, frame_options_header, request_id,
    require_healthy_database, require_json_content_type, security_headers, RateLimitState,
    RateLimiter,
};
use crate::state::AppState;

/// The result shape every query-facing endpoint serialises, distinct from
/// `qcd_executor::QueryResult` — this is what the HTTP contract names, the
/// executor's shape is an internal implementation detail.
#[derive(Debug, Clone, Serialize)]
pub struct QueryResultOut {
    pub product_id: i64,
    pub product_name: String,
    pub platform_name: String,
    pub current_price: Decimal,
    pub original_price: Option<Decimal>,
    pub discount_percentage: Option<i32>,
    pub is_available: bool,
    pub last_updated: DateTime<Utc>,
}

impl From<ExecutorQueryResult> for QueryResultOut {
    fn from(r: ExecutorQueryResult) -> Self {
        let original_price = r.discount_percent.and_then(|pct| {
            if pct <= 0 || pct >= 100 {
                return None;
            }
            let factor = Decimal::from(100 - pct) / Decimal::from(100);
            let original = r.current_price.checked_div(factor)?;
            Some(original.round_dp(2))
        });

        QueryResultOut {
            product_id: r.product_id,
            product_name: r.product_name,
            platform_name: r.platform_name,
            current_price: r.current_price,
            original_price,
            discount_percentage: r.discount_percent,
            is_available: r.stock_status == "in_stock",
            last_updated: r.updated_at,
        }
    }
}

#[must_use]
pub fn price_as_f64(price: Decimal) -> f64 {
    price.to_f64().unwrap_or(0.0)
}

/// Builds the full router: every spec route, each wrapped in its
/// per-endpoint rate limit, plus the shared middleware stack applied to
/// the whole service.
#[must_use]
pub fn build_router(state: AppState) -> Router {
    let limiter = Arc::new(RateLimiter::new());
    let limit_state = |limit_per_minute: u32| RateLimitState { limiter: Arc::clone(&limiter), limit_per_minute };

    let query_routes = Router::new()
        .route("/query/", post(query::handle_query))
        .route_layer(from_fn_with_state(limit_state(10), enforce_rate_limit));

    let advanced_routes = Router::new()
        .route("/query/advanced", post(query::handle_advanced_query))
        .route_layer(from_fn_with_state(limit_state(5), enforce_rate_limit));

    let compare_routes = Router::new()
        .route("/products/compare", get(products::compare_get).post(products::compare_post))
        .route_layer(from_fn_with_state(limit_state(20), enforce_rate_limit));

    let deal_routes = Router::new()
        .route("/deals/", get(deals::list_deals_get).post(deals::list_deals_post))
        .route("/deals/campaigns", get(deals::list_campaigns))
        .route_layer(from_fn_with_state(limit_state(30), enforce_rate_limit));

    let monitoring_routes = Router::new()
        .route("/monitoring/health", get(monitoring::health))
        .route("/monitoring/database/performance", get(monitoring::database_performance))
        .route("/monitoring/database/slow-queries", get(monitoring::slow_queries))
        .route("/monitoring/cache/stats", get(monitoring::cache_stats))
        .route("/monitoring/metrics/summary", get(monitoring::metrics_summary))
        .route("/monitoring/metrics/realtime", get(monitoring::metrics_realtime))
        .route("/monitoring/cache/invalidate/{namespace}", post(monitoring::invalidate_cache));

    let data_routes = Router::new()
        .merge(query_routes)
        .merge(advanced_routes)
        .merge(compare_routes)
        .merge(deal_routes)
        .route_layer(from_fn_with_state(state.clone(), require_healthy_database));

    let api_v1 = Router::new()
        .merge(data_routes)
        .merge(monitoring_routes)
        .with_state(state);

    Router::new()
        .nest("/api/v1", api_v1)
        .layer(from_fn(require_json_content_type))
        .layer(security_headers())
        .layer(frame_options_header())
        .layer(content_security_policy_header())
        .layer(from_fn(request_id))
        .layer(tower_http::limit::RequestBodyLimitLayer::new(crate::middleware::MAX_BODY_BYTES))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(tower_http::compression::CompressionLayer::new())
}
