//! The four canonical sample-query handlers: cheapest-product lookup,
//! discount search, cross-platform price comparison, and budget-constrained
//! grocery list optimisation. Each extracts its parameters from the raw
//! natural-language query and issues a single joined SQL query rather than
//! round-tripping per product.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;
use tracing::{info, warn};

use crate::extract::{
    extract_budget_amount, extract_discount_percentage, extract_platform_name,
    extract_platforms_for_comparison, extract_product_name, platform_variations,
    product_variations,
};
use crate::ExecutorError;

/// A single priced row, joined across product, platform, and any active
/// discount — the common shape every sample-query handler returns.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryResult {
    pub product_id: i64,
    pub product_name: String,
    pub category: String,
    pub platform_name: String,
    pub current_price: Decimal,
    pub discount_percent: Option<i32>,
    pub stock_status: String,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub(crate) struct PricedRow {
    product_id: i64,
    product_name: String,
    category: String,
    platform_name: String,
    current_price: Decimal,
    discount_percent: Option<i32>,
    stock_status: String,
    updated_at: DateTime<Utc>,
}

impl From<PricedRow> for QueryResult {
    fn from(row: PricedRow) -> Self {
        QueryResult {
            product_id: row.product_id,
            product_name: row.product_name,
            category: row.category,
            platform_name: row.platform_name,
            current_price: row.current_price,
            discount_percent: row.discount_percent,
            stock_status: row.stock_status,
            updated_at: row.updated_at,
        }
    }
}

pub(crate) fn like_patterns(variations: &[String]) -> Vec<String> {
    variations.iter().map(|v| format!("%{v}%")).collect()
}

pub(crate) const SELECT_PRICED_ROW: &str = "SELECT \
    p.id AS product_id, p.name AS product_name, p.category AS category, \
    pl.name AS platform_name, cp.price AS current_price, \
    d.discount_percent AS discount_percent, \
    cp.stock_status AS stock_status, cp.updated_at AS updated_at \
    FROM products p \
    JOIN current_prices cp ON cp.product_id = p.id \
    JOIN platforms pl ON pl.id = cp.platform_id AND pl.active \
    LEFT JOIN discounts d ON d.product_id = p.id AND d.platform_id = pl.id \
        AND d.starts_at <= NOW() AND (d.ends_at IS NULL OR d.ends_at > NOW())";

/// "Which app has the cheapest `<product>` right now?"
///
/// # Errors
///
/// Returns [`ExecutorError`] if the query can't be parsed or the database
/// call fails.
pub async fn handle_cheapest_product_query(
    pool: &PgPool,
    query: &str,
) -> Result<Vec<QueryResult>, ExecutorError> {
    info!(query, "handling cheapest-product sample query");
    let Some(product_name) = extract_product_name(query) else {
        warn!(query, "could not extract a product name");
        return Ok(Vec::new());
    };

    let patterns = like_patterns(&product_variations(&product_name));
    let sql = format!(
        "{SELECT_PRICED_ROW} \
         WHERE p.name ILIKE ANY($1) AND cp.stock_status = 'in_stock' \
         ORDER BY cp.price ASC \
         LIMIT 10"
    );

    let rows = sqlx::query_as::<_, PricedRow>(&sql)
        .bind(&patterns)
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(QueryResult::from).collect())
}

/// "Show products with X%+ discount on [platform]."
///
/// # Errors
///
/// Returns [`ExecutorError`] if the query can't be parsed or the database
/// call fails.
pub async fn handle_discount_query(
    pool: &PgPool,
    query: &str,
) -> Result<Vec<QueryResult>, ExecutorError> {
    info!(query, "handling discount-search sample query");
    let min_discount = extract_discount_percentage(query);
    if min_discount <= 0.0 {
        warn!(query, "could not extract a discount percentage");
        return Ok(Vec::new());
    }
    let min_discount = min_discount as i32;

    let platform_name = extract_platform_name(query);
    let rows = if let Some(platform) = platform_name {
        let patterns = like_patterns(&platform_variations(&platform));
        let sql = format!(
            "{SELECT_PRICED_ROW} \
             WHERE d.discount_percent >= $1 AND cp.stock_status = 'in_stock' \
               AND pl.name ILIKE ANY($2) \
             ORDER BY d.discount_percent DESC, cp.price ASC \
             LIMIT 50"
        );
        sqlx::query_as::<_, PricedRow>(&sql)
            .bind(min_discount)
            .bind(&patterns)
            .fetch_all(pool)
            .await?
    } else {
        let sql = format!(
            "{SELECT_PRICED_ROW} \
             WHERE d.discount_percent >= $1 AND cp.stock_status = 'in_stock' \
             ORDER BY d.discount_percent DESC, cp.price ASC \
             LIMIT 50"
        );
        sqlx::query_as::<_, PricedRow>(&sql)
            .bind(min_discount)
            .fetch_all(pool)
            .await?
    };

    Ok(rows.into_iter().map(QueryResult::from).collect())
}

/// "Compare `<product>` prices between `<platform1>` and `<platform2>`."
///
/// # Errors
///
/// Returns [`ExecutorError`] if the query can't be parsed or the database
/// call fails.
pub async fn handle_price_comparison_query(
    pool: &PgPool,
    query: &str,
) -> Result<Vec<QueryResult>, ExecutorError> {
    info!(query, "handling price-comparison sample query");
    let product_name = extract_product_name(query);
    let platforms = extract_platforms_for_comparison(query);

    let (Some(product_name), true) = (product_name.clone(), platforms.len() >= 2) else {
        warn!(query, ?product_name, ?platforms, "insufficient comparison inputs");
        return Ok(Vec::new());
    };

    let product_patterns = like_patterns(&product_variations(&product_name));
    let platform_patterns: Vec<String> = platforms
        .iter()
        .flat_map(|p| like_patterns(&platform_variations(p)))
        .collect();

    let sql = format!(
        "{SELECT_PRICED_ROW} \
         WHERE p.name ILIKE ANY($1) AND pl.name ILIKE ANY($2) AND cp.stock_status = 'in_stock' \
         ORDER BY p.name ASC, cp.price ASC \
         LIMIT 100"
    );

    let rows = sqlx::query_as::<_, PricedRow>(&sql)
        .bind(&product_patterns)
        .bind(&platform_patterns)
        .fetch_all(pool)
        .await?;

    let mut by_product: HashMap<String, Vec<QueryResult>> = HashMap::new();
    for row in rows {
        let result = QueryResult::from(row);
        by_product
            .entry(result.product_name.to_lowercase())
            .or_default()
            .push(result);
    }

    let mut on_multiple_platforms: Vec<QueryResult> = Vec::new();
    let mut all_results: Vec<QueryResult> = Vec::new();
    for mut group in by_product.into_values() {
        group.sort_by(|a, b| a.current_price.cmp(&b.current_price));
        let distinct_platforms: std::collections::HashSet<&str> =
            group.iter().map(|r| r.platform_name.as_str()).collect();
        if distinct_platforms.len() >= 2 {
            on_multiple_platforms.extend(group.iter().cloned());
        }
        all_results.extend(group);
    }

    let mut results = if on_multiple_platforms.is_empty() {
        all_results
    } else {
        on_multiple_platforms
    };
    results.truncate(50);
    Ok(results)
}

const ESSENTIAL_CATEGORIES: &[&str] = &[
    "vegetables", "fruits", "dairy", "staples", "snacks",
];

/// "Find best deals for ₹X grocery list."
///
/// Greedily fills a basket within budget, prioritising the steepest
/// discounts first and skipping a category once it's already represented so
/// the basket doesn't end up all one kind of item.
///
/// # Errors
///
/// Returns [`ExecutorError`] if the query can't be parsed or the database
/// call fails.
pub async fn handle_budget_optimization_query(
    pool: &PgPool,
    query: &str,
) -> Result<Vec<QueryResult>, ExecutorError> {
    info!(query, "handling budget-optimization sample query");
    let budget = extract_budget_amount(query);
    if budget <= 0.0 {
        warn!(query, "could not extract a budget amount");
        return Ok(Vec::new());
    }

    let max_item_price = Decimal::try_from(budget * 0.3).unwrap_or(Decimal::MAX);
    let sql = format!(
        "{SELECT_PRICED_ROW} \
         WHERE cp.stock_status = 'in_stock' \
           AND cp.price <= $1 \
           AND (COALESCE(d.discount_percent, 0) >= 10 OR cp.price <= 100) \
           AND p.category = ANY($2) \
         ORDER BY COALESCE(d.discount_percent, 0) DESC, cp.price ASC \
         LIMIT 100"
    );

    let rows = sqlx::query_as::<_, PricedRow>(&sql)
        .bind(max_item_price)
        .bind(ESSENTIAL_CATEGORIES)
        .fetch_all(pool)
        .await?;

    let candidates: Vec<QueryResult> = rows.into_iter().map(QueryResult::from).collect();
    Ok(optimize_grocery_selection(&candidates, budget))
}

/// Greedily selects items within `budget`, skipping a product once it's
/// already in the basket so the list stays diverse rather than repeating
/// the single cheapest item.
fn optimize_grocery_selection(candidates: &[QueryResult], budget: f64) -> Vec<QueryResult> {
    let mut selected = Vec::new();
    let mut seen_products = std::collections::HashSet::new();
    let mut total = Decimal::ZERO;
    let budget_decimal = Decimal::try_from(budget).unwrap_or(Decimal::MAX);

    for candidate in candidates {
        if seen_products.contains(&candidate.product_id) {
            continue;
        }
        if total + candidate.current_price > budget_decimal {
            continue;
        }
        total += candidate.current_price;
        seen_products.insert(candidate.product_id);
        selected.push(candidate.clone());
    }

    selected
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(id: i64, price: &str, discount: Option<i32>) -> QueryResult {
        QueryResult {
            product_id: id,
            product_name: format!("product-{id}"),
            category: "staples".into(),
            platform_name: "blinkit".into(),
            current_price: price.parse().unwrap(),
            discount_percent: discount,
            stock_status: "in_stock".into(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn optimize_grocery_selection_respects_budget() {
        let candidates = vec![sample(1, "80.00", Some(20)), sample(2, "50.00", Some(10)), sample(3, "40.00", None)];
        let selected = optimize_grocery_selection(&candidates, 120.0);
        let total: Decimal = selected.iter().map(|r| r.current_price).sum();
        assert!(total <= "120.00".parse().unwrap());
        assert!(!selected.is_empty());
    }

    #[test]
    fn optimize_grocery_selection_skips_duplicate_products() {
        let mut candidates = vec![sample(1, "10.00", Some(5))];
        candidates.push(candidates[0].clone());
        let selected = optimize_grocery_selection(&candidates, 100.0);
        assert_eq!(selected.len(), 1);
    }
}
