//! Multi-step query execution (component D) and the four canonical
//! sample-query handlers (component K), plus the dispatch table that
//! decides between them: sample handlers are tried first for the
//! recognised query shapes, the step executor handles everything else, and
//! a sample handler is the fallback recovery path if the executor's
//! critical steps fail.

pub mod extract;
pub mod sample;
pub mod steps;

use sqlx::PgPool;
use thiserror::Error;
use tracing::{info, warn};

pub use sample::QueryResult;
pub use steps::{ExecutionPlan, MultiStepResult, QueryPattern, QueryStepType};

#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("no handler could process this query")]
    NoMatchingHandler,
}

/// Outcome of dispatching a query: either a direct result set from a sample
/// handler, or a full multi-step execution trace.
#[derive(Debug)]
pub enum DispatchOutcome {
    SampleResults(Vec<QueryResult>),
    MultiStep(MultiStepResult),
}

async fn try_sample_handlers(
    pool: &PgPool,
    pattern: QueryPattern,
    query: &str,
) -> Result<Option<Vec<QueryResult>>, ExecutorError> {
    let results = match pattern {
        QueryPattern::PriceComparison => {
            let comparison = sample::handle_price_comparison_query(pool, query).await?;
            if comparison.is_empty() {
                sample::handle_cheapest_product_query(pool, query).await?
            } else {
                comparison
            }
        }
        QueryPattern::DiscountSearch => sample::handle_discount_query(pool, query).await?,
        QueryPattern::ProductSearch => {
            let budget = sample::handle_budget_optimization_query(pool, query).await?;
            if budget.is_empty() {
                sample::handle_cheapest_product_query(pool, query).await?
            } else {
                budget
            }
        }
    };

    Ok(if results.is_empty() { None } else { Some(results) })
}

/// Picks whichever sample handler best matches `pattern`, run with no
/// expectation it will match — used only as the executor's last-resort
/// recovery path.
async fn generic_fallback_handler(
    pool: &PgPool,
    pattern: QueryPattern,
    query: &str,
) -> Result<Vec<QueryResult>, ExecutorError> {
    match pattern {
        QueryPattern::PriceComparison => sample::handle_cheapest_product_query(pool, query).await,
        QueryPattern::DiscountSearch => sample::handle_discount_query(pool, query).await,
        QueryPattern::ProductSearch => sample::handle_cheapest_product_query(pool, query).await,
    }
}

fn critical_step_failed(result: &MultiStepResult) -> bool {
    result.step_results.iter().any(|r| {
        !r.success
            && (r.step_id.contains("table_selection") || r.step_id.contains("data_validation"))
    })
}

/// Resolves a natural-language query to results.
///
/// Precedence: the four sample-query handlers are tried first against the
/// query's detected pattern (no planning overhead for the common shapes).
/// If none produce results, the multi-step executor runs a full validated
/// plan. If the executor's `TableSelection` or `DataValidation` step fails
/// even after its own step-level recovery, this function falls back once
/// more to the generic sample handler matching the detected pattern, before
/// finally giving up with [`ExecutorError::NoMatchingHandler`].
///
/// # Errors
///
/// Returns [`ExecutorError`] if every path — sample handlers, executor, and
/// the final fallback — fails to produce a result, or if a database call
/// errors outright.
pub async fn dispatch(pool: &PgPool, query: &str) -> Result<DispatchOutcome, ExecutorError> {
    let pattern = QueryPattern::classify(query);
    info!(query, pattern = ?pattern, "dispatching query");

    if let Some(results) = try_sample_handlers(pool, pattern, query).await? {
        return Ok(DispatchOutcome::SampleResults(results));
    }

    let query_id = format!("query_{}", query.len());
    let plan = steps::create_execution_plan(query_id, query, Vec::new());
    let result = steps::execute_plan(pool, &plan).await?;

    if critical_step_failed(&result) {
        warn!(query, "executor critical step failed, falling back to generic sample handler");
        let fallback = generic_fallback_handler(pool, pattern, query).await?;
        if !fallback.is_empty() {
            return Ok(DispatchOutcome::SampleResults(fallback));
        }
        return Err(ExecutorError::NoMatchingHandler);
    }

    Ok(DispatchOutcome::MultiStep(result))
}
