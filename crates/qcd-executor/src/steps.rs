//! Multi-step query execution: breaks a natural-language query into an
//! ordered sequence of steps (table selection, data validation, join
//! validation, filter application, aggregation, result formatting) and runs
//! each against the database. `FilterApplication` onward execute real SQL
//! and build up the plan's result rows; the three validation steps each
//! have one named recovery strategy they retry with if the first check
//! comes back empty (broaden the ILIKE match, demote to a LEFT JOIN, relax
//! the stock/platform filters).

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::{debug, info, warn};

use crate::extract::{
    extract_discount_percentage, extract_platform_name, extract_product_name, platform_variations,
    product_variations,
};
use crate::sample::{like_patterns, PricedRow, QueryResult, SELECT_PRICED_ROW};
use crate::ExecutorError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueryStepType {
    TableSelection,
    DataValidation,
    JoinValidation,
    FilterApplication,
    Aggregation,
    ResultFormatting,
}

impl QueryStepType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            QueryStepType::TableSelection => "table_selection",
            QueryStepType::DataValidation => "data_validation",
            QueryStepType::JoinValidation => "join_validation",
            QueryStepType::FilterApplication => "filter_application",
            QueryStepType::Aggregation => "aggregation",
            QueryStepType::ResultFormatting => "result_formatting",
        }
    }

    /// Suggestions offered when a step of this type fails and recovery
    /// doesn't help.
    #[must_use]
    pub fn recovery_suggestions(self) -> &'static [&'static str] {
        match self {
            QueryStepType::TableSelection => &[
                "retry with alternative table names",
                "fall back to core tables (products, current_prices, platforms)",
            ],
            QueryStepType::DataValidation => &[
                "broaden the search criteria",
                "check for typos in the product name",
            ],
            QueryStepType::JoinValidation => &[
                "verify foreign key relationships",
                "try an alternative join path",
            ],
            QueryStepType::FilterApplication => &["relax filter criteria", "use a broader date range"],
            QueryStepType::Aggregation => &["use a simpler aggregation", "apply a LIMIT to reduce the result set"],
            QueryStepType::ResultFormatting => &["use basic column selection", "return raw data if formatting fails"],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryPattern {
    PriceComparison,
    DiscountSearch,
    ProductSearch,
}

impl QueryPattern {
    /// Classifies a query into one of the three step templates by keyword.
    #[must_use]
    pub fn classify(query: &str) -> Self {
        let lower = query.to_lowercase();
        if ["cheapest", "compare", "price", "cost"].iter().any(|w| lower.contains(w)) {
            QueryPattern::PriceComparison
        } else if ["discount", "%", "offer", "deal", "sale"].iter().any(|w| lower.contains(w)) {
            QueryPattern::DiscountSearch
        } else {
            QueryPattern::ProductSearch
        }
    }
}

#[derive(Debug, Clone)]
pub struct QueryStep {
    pub step_id: String,
    pub step_type: QueryStepType,
    pub description: String,
    pub validation_query: Option<String>,
    pub timeout_seconds: u32,
}

#[derive(Debug, Clone)]
pub struct ExecutionPlan {
    pub query_id: String,
    pub original_query: String,
    pub steps: Vec<QueryStep>,
    pub complexity_score: u32,
    pub relevant_tables: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct StepExecutionResult {
    pub step_id: String,
    pub success: bool,
    pub error_message: Option<String>,
    pub suggestions: Vec<&'static str>,
}

#[derive(Debug, Clone)]
pub struct MultiStepResult {
    pub query_id: String,
    pub success: bool,
    pub steps_executed: usize,
    pub steps_failed: usize,
    pub step_results: Vec<StepExecutionResult>,
    pub error_recovery_applied: bool,
    pub suggestions: Vec<String>,
    /// The rows `FilterApplication`/`Aggregation` built up and
    /// `ResultFormatting` produced as the plan's final output. `None` until
    /// the plan reaches `FilterApplication`; `Some(vec![])` is a real,
    /// executed query that matched nothing.
    pub rows: Option<Vec<QueryResult>>,
    pub generated_at: DateTime<Utc>,
}

/// Scores query complexity 1-10: length, conjunctions, named platforms, and
/// numeric constraints each add weight.
#[must_use]
pub fn calculate_complexity_score(query: &str) -> u32 {
    let mut score = 1u32;
    let lower = query.to_lowercase();

    if query.len() > 100 {
        score += 2;
    } else if query.len() > 50 {
        score += 1;
    }

    let condition_words = ["and", "or", "but", "with", "between", "compare"];
    score += condition_words.iter().filter(|w| lower.contains(*w)).count() as u32;

    let platforms = ["blinkit", "zepto", "instamart", "bigbasket"];
    score += platforms.iter().filter(|p| lower.contains(*p)).count() as u32;

    if query.chars().any(|c| c.is_ascii_digit()) || query.contains('%') {
        score += 1;
    }

    score.min(10)
}

/// The static feasibility query shown on the plan for a step, where one
/// exists. `DataValidation` and `JoinValidation` run their own dynamic,
/// pattern-aware checks in `execute_plan` (with a named recovery strategy
/// each) rather than a single fixed string, so they carry no fixed
/// `validation_query` here; neither do `FilterApplication`, `Aggregation`,
/// or `ResultFormatting`, which execute real row-producing SQL instead of a
/// feasibility count.
fn validation_query_for(step_type: QueryStepType) -> Option<String> {
    match step_type {
        QueryStepType::TableSelection => Some(
            "SELECT COUNT(*) FROM information_schema.tables \
             WHERE table_name IN ('products', 'current_prices', 'platforms', 'discounts')"
                .to_string(),
        ),
        QueryStepType::DataValidation
        | QueryStepType::JoinValidation
        | QueryStepType::FilterApplication
        | QueryStepType::Aggregation
        | QueryStepType::ResultFormatting => None,
    }
}

fn template_for(pattern: QueryPattern) -> &'static [QueryStepType] {
    match pattern {
        QueryPattern::PriceComparison => &[
            QueryStepType::TableSelection,
            QueryStepType::DataValidation,
            QueryStepType::JoinValidation,
            QueryStepType::FilterApplication,
            QueryStepType::Aggregation,
            QueryStepType::ResultFormatting,
        ],
        QueryPattern::DiscountSearch => &[
            QueryStepType::TableSelection,
            QueryStepType::DataValidation,
            QueryStepType::FilterApplication,
            QueryStepType::Aggregation,
            QueryStepType::ResultFormatting,
        ],
        QueryPattern::ProductSearch => &[
            QueryStepType::TableSelection,
            QueryStepType::DataValidation,
            QueryStepType::FilterApplication,
            QueryStepType::ResultFormatting,
        ],
    }
}

/// Builds an ordered execution plan for `query`. `relevant_tables` typically
/// comes from a semantic table-ranking pass; this module only needs their
/// count to scale step timeouts.
#[must_use]
pub fn create_execution_plan(
    query_id: String,
    query: &str,
    relevant_tables: Vec<String>,
) -> ExecutionPlan {
    let pattern = QueryPattern::classify(query);
    let complexity_score = calculate_complexity_score(query);

    let steps: Vec<QueryStep> = template_for(pattern)
        .iter()
        .enumerate()
        .map(|(i, step_type)| QueryStep {
            step_id: format!("step_{}_{}", i + 1, step_type.as_str()),
            step_type: *step_type,
            description: format!("{} for this query", step_type.as_str().replace('_', " ")),
            validation_query: validation_query_for(*step_type),
            timeout_seconds: (30 + complexity_score * 5).min(120),
        })
        .collect();

    debug!(query_id, complexity_score, step_count = steps.len(), "built execution plan");

    ExecutionPlan {
        query_id,
        original_query: query.to_string(),
        steps,
        complexity_score,
        relevant_tables,
    }
}

async fn run_count_validation(pool: &PgPool, validation_query: &str) -> Result<bool, ExecutorError> {
    let count: i64 = sqlx::query_scalar(validation_query).fetch_one(pool).await?;
    Ok(count > 0)
}

/// Runs `step`'s stored feasibility count, returning `(success, recovered)`.
/// `TableSelection` has no broadening strategy — an empty
/// `information_schema.tables` hit means the schema itself is missing, which
/// no query-level retry can fix.
async fn run_table_selection(pool: &PgPool, step: &QueryStep) -> Result<(bool, bool), ExecutorError> {
    let Some(validation_query) = &step.validation_query else {
        return Ok((true, false));
    };
    Ok((run_count_validation(pool, validation_query).await?, false))
}

/// Checks that the query's subject actually exists in `products`, broadening
/// from an exact-ish ILIKE match on the extracted product name to a bare
/// "does the catalogue have anything at all" check if the first count is
/// zero — the DataValidation recovery strategy.
async fn run_data_validation(
    pool: &PgPool,
    pattern: QueryPattern,
    original_query: &str,
) -> Result<(bool, bool), ExecutorError> {
    if pattern == QueryPattern::DiscountSearch {
        let narrow: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM discounts WHERE discount_percent > 0")
            .fetch_one(pool)
            .await?;
        if narrow > 0 {
            return Ok((true, false));
        }
        let broadened: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products").fetch_one(pool).await?;
        return Ok((broadened > 0, true));
    }

    let Some(product_name) = extract_product_name(original_query) else {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products").fetch_one(pool).await?;
        return Ok((count > 0, false));
    };

    let patterns = like_patterns(&product_variations(&product_name));
    let narrow: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE name ILIKE ANY($1)")
            .bind(&patterns)
            .fetch_one(pool)
            .await?;
    if narrow > 0 {
        return Ok((true, false));
    }

    let broadened: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products").fetch_one(pool).await?;
    Ok((broadened > 0, true))
}

/// Checks the products/current_prices/platforms join actually produces a
/// row, demoting the `platforms` join from `INNER` to `LEFT` if the inner
/// join comes back empty — the JoinValidation recovery strategy.
async fn run_join_validation(pool: &PgPool) -> Result<(bool, bool), ExecutorError> {
    let inner: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM products p \
         JOIN current_prices cp ON p.id = cp.product_id \
         JOIN platforms pl ON cp.platform_id = pl.id",
    )
    .fetch_one(pool)
    .await?;
    if inner > 0 {
        return Ok((true, false));
    }

    let demoted: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM products p \
         JOIN current_prices cp ON p.id = cp.product_id \
         LEFT JOIN platforms pl ON cp.platform_id = pl.id",
    )
    .fetch_one(pool)
    .await?;
    Ok((demoted > 0, true))
}

/// `$1` relaxed, `$2` min discount, `$3` product name patterns, `$4`
/// platform name patterns — always bound so the same prepared statement
/// covers both the strict and the relaxed pass.
const FILTERED_ROWS_SQL_SUFFIX: &str = " \
    WHERE (cp.stock_status = 'in_stock' OR $1) \
      AND ($2::int <= 0 OR COALESCE(d.discount_percent, 0) >= $2) \
      AND (cardinality($3::text[]) = 0 OR p.name ILIKE ANY($3)) \
      AND ($1 OR cardinality($4::text[]) = 0 OR pl.name ILIKE ANY($4)) \
    ORDER BY cp.price ASC \
    LIMIT 50";

/// Builds and runs the pattern-specific priced-row query for
/// `FilterApplication`, relaxing the stock/platform filters once if the
/// first pass comes back empty — the FilterApplication recovery strategy.
async fn fetch_filtered_rows(
    pool: &PgPool,
    pattern: QueryPattern,
    original_query: &str,
) -> Result<(Vec<QueryResult>, bool), ExecutorError> {
    let product_patterns: Vec<String> = extract_product_name(original_query)
        .map(|n| like_patterns(&product_variations(&n)))
        .unwrap_or_default();
    let platform_patterns: Vec<String> = extract_platform_name(original_query)
        .map(|p| like_patterns(&platform_variations(&p)))
        .unwrap_or_default();
    let min_discount: i32 = if pattern == QueryPattern::DiscountSearch {
        extract_discount_percentage(original_query) as i32
    } else {
        0
    };

    let sql = format!("{SELECT_PRICED_ROW}{FILTERED_ROWS_SQL_SUFFIX}");

    let run = |relaxed: bool| {
        sqlx::query_as::<_, PricedRow>(&sql)
            .bind(relaxed)
            .bind(min_discount)
            .bind(product_patterns.clone())
            .bind(platform_patterns.clone())
            .fetch_all(pool)
    };

    let first = run(false).await?;
    if !first.is_empty() {
        return Ok((first.into_iter().map(QueryResult::from).collect(), false));
    }

    let relaxed = run(true).await?;
    Ok((relaxed.into_iter().map(QueryResult::from).collect(), true))
}

/// Collapses the filtered rows to the single cheapest offer per platform —
/// the Aggregation step's grouping pass over whatever FilterApplication
/// produced.
fn aggregate_rows(rows: Vec<QueryResult>) -> Vec<QueryResult> {
    use std::collections::HashMap;
    let mut cheapest: HashMap<String, QueryResult> = HashMap::new();
    for row in rows {
        cheapest
            .entry(row.platform_name.clone())
            .and_modify(|existing| {
                if row.current_price < existing.current_price {
                    *existing = row.clone();
                }
            })
            .or_insert(row);
    }
    let mut out: Vec<QueryResult> = cheapest.into_values().collect();
    out.sort_by(|a, b| a.current_price.cmp(&b.current_price));
    out
}

/// Executes every step of `plan` in order. `TableSelection`, `DataValidation`
/// and `JoinValidation` are feasibility checks with a single named broadening
/// strategy on failure (see their helper functions); `FilterApplication`
/// executes the real priced-row query (also with one relaxation retry),
/// `Aggregation` groups it to the cheapest offer per platform, and
/// `ResultFormatting` orders and truncates the final set into
/// [`MultiStepResult::rows`].
///
/// # Errors
///
/// Returns [`ExecutorError`] only if a non-validation database error occurs;
/// a step whose check legitimately comes back empty even after its recovery
/// attempt is recorded as a failed step, not a hard error.
pub async fn execute_plan(pool: &PgPool, plan: &ExecutionPlan) -> Result<MultiStepResult, ExecutorError> {
    info!(query_id = %plan.query_id, steps = plan.steps.len(), "executing multi-step plan");

    let pattern = QueryPattern::classify(&plan.original_query);
    let mut step_results = Vec::with_capacity(plan.steps.len());
    let mut steps_failed = 0usize;
    let mut error_recovery_applied = false;
    let mut working_rows: Vec<QueryResult> = Vec::new();
    let mut final_rows: Option<Vec<QueryResult>> = None;

    for step in &plan.steps {
        let outcome: Result<(bool, bool), ExecutorError> = match step.step_type {
            QueryStepType::TableSelection => run_table_selection(pool, step).await,
            QueryStepType::DataValidation => run_data_validation(pool, pattern, &plan.original_query).await,
            QueryStepType::JoinValidation => run_join_validation(pool).await,
            QueryStepType::FilterApplication => {
                fetch_filtered_rows(pool, pattern, &plan.original_query).await.map(|(rows, recovered)| {
                    let success = !rows.is_empty();
                    working_rows = rows;
                    (success, recovered)
                })
            }
            QueryStepType::Aggregation => {
                working_rows = aggregate_rows(std::mem::take(&mut working_rows));
                Ok((true, false))
            }
            QueryStepType::ResultFormatting => {
                let mut rows = std::mem::take(&mut working_rows);
                rows.sort_by(|a, b| a.current_price.cmp(&b.current_price));
                rows.truncate(50);
                final_rows = Some(rows);
                Ok((true, false))
            }
        };

        match outcome {
            Ok((true, recovered)) => {
                if recovered {
                    error_recovery_applied = true;
                }
                step_results.push(StepExecutionResult {
                    step_id: step.step_id.clone(),
                    success: true,
                    error_message: None,
                    suggestions: Vec::new(),
                });
            }
            Ok((false, recovered)) => {
                if recovered {
                    error_recovery_applied = true;
                }
                steps_failed += 1;
                warn!(step_id = %step.step_id, "step check returned no rows, even after recovery");
                step_results.push(StepExecutionResult {
                    step_id: step.step_id.clone(),
                    success: false,
                    error_message: Some("check returned no rows".to_string()),
                    suggestions: step.step_type.recovery_suggestions().to_vec(),
                });
            }
            Err(e) => {
                steps_failed += 1;
                warn!(step_id = %step.step_id, error = %e, "step query failed, recording and continuing");
                step_results.push(StepExecutionResult {
                    step_id: step.step_id.clone(),
                    success: false,
                    error_message: Some(e.to_string()),
                    suggestions: step.step_type.recovery_suggestions().to_vec(),
                });
            }
        }
    }

    let mut suggestions: Vec<String> = Vec::new();
    if steps_failed > 0 {
        suggestions.push("some query steps failed - try simplifying your query".to_string());
    }
    if plan.complexity_score >= 8 {
        suggestions.push("this was a complex query - consider breaking it into smaller parts".to_string());
    }
    suggestions.truncate(5);

    Ok(MultiStepResult {
        query_id: plan.query_id.clone(),
        success: steps_failed < plan.steps.len(),
        steps_executed: step_results.len(),
        steps_failed,
        step_results,
        error_recovery_applied,
        suggestions,
        rows: final_rows,
        generated_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_detects_price_comparison() {
        assert_eq!(QueryPattern::classify("cheapest onions"), QueryPattern::PriceComparison);
    }

    #[test]
    fn classify_detects_discount_search() {
        assert_eq!(QueryPattern::classify("30% discount on snacks"), QueryPattern::DiscountSearch);
    }

    #[test]
    fn classify_defaults_to_product_search() {
        assert_eq!(QueryPattern::classify("show me milk"), QueryPattern::ProductSearch);
    }

    #[test]
    fn complexity_score_is_capped_at_ten() {
        let long_query = "a".repeat(200) + " and or but with between compare blinkit zepto instamart bigbasket 50%";
        assert_eq!(calculate_complexity_score(&long_query), 10);
    }

    #[test]
    fn plan_has_ordered_template_steps_for_pattern() {
        let plan = create_execution_plan("q1".into(), "30% discount on chips", vec!["products".into()]);
        assert_eq!(plan.steps.len(), 5);
        assert_eq!(plan.steps[0].step_type, QueryStepType::TableSelection);
        assert_eq!(plan.steps.last().unwrap().step_type, QueryStepType::ResultFormatting);
    }

    #[test]
    fn timeout_scales_with_complexity_but_caps_at_120() {
        let plan = create_execution_plan(
            "q2".into(),
            &"cheapest milk and tomatoes compare blinkit zepto instamart bigbasket between".repeat(3),
            vec![],
        );
        assert!(plan.steps.iter().all(|s| s.timeout_seconds <= 120));
    }
}
