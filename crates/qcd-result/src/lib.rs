//! Result processing (component E): statistical sampling of oversized
//! result sets, pagination, five output shapes for different frontend
//! consumers, freshness/quality metadata, and cache-backed reuse of the
//! whole pipeline for a given query/config combination.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use qcd_cache::{CacheBackend, CacheManager};
use qcd_executor::QueryResult;
use rand::seq::SliceRandom;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMethod {
    Random,
    Systematic,
    Stratified,
    TopN,
    None,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultFormat {
    Raw,
    Structured,
    Summary,
    Comparison,
    ChartData,
}

#[derive(Debug, Clone)]
pub struct SamplingConfig {
    pub method: SamplingMethod,
    pub sample_size: usize,
    pub confidence_level: f64,
    pub margin_of_error: f64,
    pub stratify_by: Option<fn(&QueryResult) -> String>,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            method: SamplingMethod::Random,
            sample_size: 1000,
            confidence_level: 0.95,
            margin_of_error: 0.05,
            stratify_by: None,
        }
    }
}

impl SamplingConfig {
    /// Cochran's formula for the sample size needed to estimate a
    /// proportion at the configured confidence/margin, adjusted for a
    /// finite population, capped at both the configured `sample_size` and
    /// the population itself.
    #[must_use]
    pub fn calculate_required_sample_size(&self, population_size: usize) -> usize {
        if population_size <= self.sample_size {
            return population_size;
        }

        let z_score = if (self.confidence_level - 0.99).abs() < f64::EPSILON {
            2.58
        } else {
            1.96
        };
        let p = 0.5;
        let numerator = z_score.powi(2) * p * (1.0 - p);
        let denominator = self.margin_of_error.powi(2);
        let mut sample_size = numerator / denominator;

        sample_size /= 1.0 + (sample_size - 1.0) / population_size as f64;

        (sample_size.ceil() as usize)
            .min(self.sample_size)
            .min(population_size)
    }
}

#[derive(Debug, Clone)]
pub struct PaginationConfig {
    pub page: usize,
    pub page_size: usize,
    pub max_page_size: usize,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: 20,
            max_page_size: 100,
        }
    }
}

impl PaginationConfig {
    #[must_use]
    pub fn new(page: usize, page_size: usize) -> Self {
        let mut config = Self {
            page: page.max(1),
            page_size,
            max_page_size: 100,
        };
        config.page_size = config.page_size.clamp(1, config.max_page_size);
        config
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingMetadata {
    pub sampled: bool,
    pub method: Option<SamplingMethod>,
    pub sample_size: usize,
    pub original_size: usize,
    pub confidence_level: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationMetadata {
    pub page: usize,
    pub page_size: usize,
    pub total_count: usize,
    pub total_pages: usize,
    pub has_next: bool,
    pub has_previous: bool,
    pub start_index: usize,
    pub end_index: usize,
}

/// Reduces `results` to at most `config.sample_size` items. A no-op when
/// the result set is already within budget.
#[must_use]
pub fn apply_sampling(
    results: &[QueryResult],
    config: &SamplingConfig,
) -> (Vec<QueryResult>, SamplingMetadata) {
    if results.len() <= config.sample_size || config.method == SamplingMethod::None {
        return (
            results.to_vec(),
            SamplingMetadata {
                sampled: false,
                method: None,
                sample_size: results.len(),
                original_size: results.len(),
                confidence_level: None,
            },
        );
    }

    info!(
        method = ?config.method,
        original_size = results.len(),
        "applying statistical sampling"
    );

    let required = config.calculate_required_sample_size(results.len());
    let mut rng = rand::rng();

    let sampled: Vec<QueryResult> = match config.method {
        SamplingMethod::Random => {
            let mut indices: Vec<usize> = (0..results.len()).collect();
            indices.shuffle(&mut rng);
            indices.truncate(required);
            indices.sort_unstable();
            indices.into_iter().map(|i| results[i].clone()).collect()
        }
        SamplingMethod::Systematic => {
            let interval = (results.len() / required).max(1);
            let start = rand::random::<usize>() % interval;
            results
                .iter()
                .skip(start)
                .step_by(interval)
                .take(required)
                .cloned()
                .collect()
        }
        SamplingMethod::Stratified => {
            if let Some(key_fn) = config.stratify_by {
                stratified_sample(results, key_fn, required, &mut rng)
            } else {
                let mut indices: Vec<usize> = (0..results.len()).collect();
                indices.shuffle(&mut rng);
                indices.truncate(required);
                indices.into_iter().map(|i| results[i].clone()).collect()
            }
        }
        SamplingMethod::TopN => results.iter().take(required).cloned().collect(),
        SamplingMethod::None => unreachable!(),
    };

    let sample_size = sampled.len();
    (
        sampled,
        SamplingMetadata {
            sampled: true,
            method: Some(config.method),
            sample_size,
            original_size: results.len(),
            confidence_level: Some(config.confidence_level),
        },
    )
}

fn stratified_sample(
    results: &[QueryResult],
    key_fn: fn(&QueryResult) -> String,
    sample_size: usize,
    rng: &mut impl rand::Rng,
) -> Vec<QueryResult> {
    let mut strata: HashMap<String, Vec<&QueryResult>> = HashMap::new();
    for r in results {
        strata.entry(key_fn(r)).or_default().push(r);
    }

    let total = results.len();
    let mut sampled = Vec::new();
    for group in strata.values() {
        let stratum_sample_size = ((group.len() as f64 / total as f64) * sample_size as f64)
            .max(1.0) as usize;
        if stratum_sample_size >= group.len() {
            sampled.extend(group.iter().map(|r| (*r).clone()));
        } else {
            let mut indices: Vec<usize> = (0..group.len()).collect();
            indices.shuffle(rng);
            sampled.extend(indices.into_iter().take(stratum_sample_size).map(|i| group[i].clone()));
        }
    }

    if sampled.len() > sample_size {
        sampled.shuffle(rng);
        sampled.truncate(sample_size);
    }
    sampled
}

/// Slices `results` into one page per `config`, returning the page plus the
/// metadata a client needs to render pagination controls.
#[must_use]
pub fn apply_pagination(
    results: &[QueryResult],
    config: &PaginationConfig,
) -> (Vec<QueryResult>, PaginationMetadata) {
    let total_count = results.len();
    let total_pages = total_count.div_ceil(config.page_size).max(1);
    let start_index = (config.page - 1) * config.page_size;
    let end_index = (start_index + config.page_size).min(total_count);

    let page = if start_index < total_count {
        results[start_index..end_index].to_vec()
    } else {
        Vec::new()
    };

    debug!(page = config.page, total_pages, showing = page.len(), total_count, "applied pagination");

    (
        page,
        PaginationMetadata {
            page: config.page,
            page_size: config.page_size,
            total_count,
            total_pages,
            has_next: config.page < total_pages,
            has_previous: config.page > 1,
            start_index: start_index + 1,
            end_index,
        },
    )
}

fn price_f64(results: &[QueryResult]) -> Vec<f64> {
    results.iter().filter_map(|r| r.current_price.to_f64()).collect()
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Renders `results` in `format` as a JSON value ready for the HTTP layer.
#[must_use]
pub fn format_results(results: &[QueryResult], format: ResultFormat) -> Value {
    match format {
        ResultFormat::Raw => json!(results
            .iter()
            .map(|r| json!({
                "product_id": r.product_id,
                "product_name": r.product_name,
                "platform_name": r.platform_name,
                "price": r.current_price.to_string(),
            }))
            .collect::<Vec<_>>()),
        ResultFormat::Structured => format_structured(results),
        ResultFormat::Summary => format_summary(results),
        ResultFormat::Comparison => format_comparison(results),
        ResultFormat::ChartData => format_chart_data(results),
    }
}

fn format_structured(results: &[QueryResult]) -> Value {
    json!(results
        .iter()
        .map(|r| {
            let discount_value = r.discount_percent.map(|d| json!(d));
            json!({
                "id": r.product_id,
                "product_name": r.product_name,
                "category": r.category,
                "platform_name": r.platform_name,
                "current_price": r.current_price.to_string(),
                "discount_percentage": discount_value,
                "is_available": r.stock_status == "in_stock",
                "last_updated": r.updated_at.to_rfc3339(),
            })
        })
        .collect::<Vec<_>>())
}

fn format_summary(results: &[QueryResult]) -> Value {
    if results.is_empty() {
        return json!({"summary": "No results found"});
    }

    let prices = price_f64(results);
    let platforms: std::collections::HashSet<&str> =
        results.iter().map(|r| r.platform_name.as_str()).collect();
    let products: std::collections::HashSet<&str> =
        results.iter().map(|r| r.product_name.as_str()).collect();

    json!({
        "total_results": results.len(),
        "unique_products": products.len(),
        "unique_platforms": platforms.len(),
        "price_statistics": {
            "min_price": prices.iter().cloned().fold(f64::INFINITY, f64::min),
            "max_price": prices.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            "average_price": mean(&prices),
            "median_price": median(&prices),
        },
        "platforms": platforms.into_iter().collect::<Vec<_>>(),
        "sample_products": products.into_iter().take(10).collect::<Vec<_>>(),
    })
}

fn format_comparison(results: &[QueryResult]) -> Value {
    if results.is_empty() {
        return json!([]);
    }

    let mut groups: HashMap<&str, Vec<&QueryResult>> = HashMap::new();
    for r in results {
        groups.entry(r.product_name.as_str()).or_default().push(r);
    }

    let mut comparisons = Vec::new();
    for (product_name, mut group) in groups {
        group.sort_by(|a, b| a.current_price.cmp(&b.current_price));
        let prices = price_f64(&group.iter().map(|r| (*r).clone()).collect::<Vec<_>>());

        let platforms: Vec<Value> = group
            .iter()
            .map(|r| {
                json!({
                    "platform_name": r.platform_name,
                    "price": r.current_price.to_string(),
                    "discount_percentage": r.discount_percent,
                    "is_available": r.stock_status == "in_stock",
                })
            })
            .collect();

        comparisons.push(json!({
            "product_name": product_name,
            "platforms": platforms,
            "cheapest_platform": group.first().map(|r| r.platform_name.clone()),
            "most_expensive_platform": group.last().map(|r| r.platform_name.clone()),
            "price_range": {
                "min": prices.iter().cloned().fold(f64::INFINITY, f64::min),
                "max": prices.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            },
            "average_price": mean(&prices),
        }));
    }

    json!(comparisons)
}

fn format_chart_data(results: &[QueryResult]) -> Value {
    if results.is_empty() {
        return json!([]);
    }

    let prices = price_f64(results);
    let mut price_distribution = Vec::new();
    if let (Some(min_price), Some(max_price)) = (
        prices.iter().cloned().reduce(f64::min),
        prices.iter().cloned().reduce(f64::max),
    ) {
        let bucket_size = if max_price > min_price { (max_price - min_price) / 10.0 } else { 1.0 };
        let mut buckets: HashMap<String, usize> = HashMap::new();
        for price in &prices {
            let bucket = ((price - min_price) / bucket_size) as i64;
            let key = format!(
                "₹{:.0}-₹{:.0}",
                min_price + bucket as f64 * bucket_size,
                min_price + (bucket + 1) as f64 * bucket_size
            );
            *buckets.entry(key).or_insert(0) += 1;
        }
        price_distribution = buckets
            .into_iter()
            .map(|(range, count)| json!({"range": range, "count": count}))
            .collect();
    }

    let mut platform_stats: HashMap<&str, Vec<f64>> = HashMap::new();
    for r in results {
        if let Some(p) = r.current_price.to_f64() {
            platform_stats.entry(r.platform_name.as_str()).or_default().push(p);
        }
    }
    let platform_comparison: Vec<Value> = platform_stats
        .into_iter()
        .map(|(platform, prices)| {
            json!({
                "platform": platform,
                "average_price": mean(&prices),
                "min_price": prices.iter().cloned().fold(f64::INFINITY, f64::min),
                "max_price": prices.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
                "product_count": prices.len(),
            })
        })
        .collect();

    json!([{
        "price_distribution": price_distribution,
        "platform_comparison": platform_comparison,
    }])
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FreshnessMetadata {
    pub status: &'static str,
    pub oldest_data_hours: Option<f64>,
    pub newest_data_hours: Option<f64>,
    pub average_age_hours: Option<f64>,
    pub stale_data_count: Option<usize>,
}

/// Computes age-of-data statistics from each result's `updated_at`.
#[must_use]
pub fn calculate_data_freshness(results: &[QueryResult], now: DateTime<Utc>) -> FreshnessMetadata {
    if results.is_empty() {
        return FreshnessMetadata {
            status: "no_data",
            oldest_data_hours: None,
            newest_data_hours: None,
            average_age_hours: None,
            stale_data_count: None,
        };
    }

    let ages: Vec<f64> = results
        .iter()
        .map(|r| (now - r.updated_at).num_seconds() as f64 / 3600.0)
        .collect();

    FreshnessMetadata {
        status: "calculated",
        oldest_data_hours: ages.iter().cloned().reduce(f64::max),
        newest_data_hours: ages.iter().cloned().reduce(f64::min),
        average_age_hours: Some(mean(&ages)),
        stale_data_count: Some(ages.iter().filter(|a| **a > 24.0).count()),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityMetadata {
    pub status: &'static str,
    pub availability_rate: Option<f64>,
    pub total_records: usize,
}

/// Computes completeness/availability statistics for a result set.
#[must_use]
pub fn calculate_quality_metrics(results: &[QueryResult]) -> QualityMetadata {
    if results.is_empty() {
        return QualityMetadata {
            status: "no_data",
            availability_rate: None,
            total_records: 0,
        };
    }

    let available = results.iter().filter(|r| r.stock_status == "in_stock").count();
    QualityMetadata {
        status: "calculated",
        availability_rate: Some((available as f64 / results.len() as f64) * 100.0),
        total_records: results.len(),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessedResult {
    pub data: Value,
    pub total_count: usize,
    pub sampling: SamplingMetadata,
    pub pagination: PaginationMetadata,
    pub format_type: ResultFormat,
    pub freshness: FreshnessMetadata,
    pub quality: QualityMetadata,
    pub generated_at: DateTime<Utc>,
}

impl ProcessedResult {
    /// Builds the full processed view of `raw_results`: sampling, then
    /// pagination, then formatting, alongside freshness/quality metadata
    /// computed from the pre-sampled raw set.
    #[must_use]
    pub fn build(
        raw_results: &[QueryResult],
        sampling_config: &SamplingConfig,
        pagination_config: &PaginationConfig,
        format: ResultFormat,
        now: DateTime<Utc>,
    ) -> Self {
        let (sampled, sampling_metadata) = apply_sampling(raw_results, sampling_config);
        let (page, pagination_metadata) = apply_pagination(&sampled, pagination_config);
        let data = format_results(&page, format);

        ProcessedResult {
            data,
            total_count: raw_results.len(),
            sampling: sampling_metadata,
            pagination: pagination_metadata,
            format_type: format,
            freshness: calculate_data_freshness(raw_results, now),
            quality: calculate_quality_metrics(raw_results),
            generated_at: now,
        }
    }
}

/// Builds (or reuses a cached) [`ProcessedResult`] for `query`. The cache
/// key folds in every parameter that changes the output shape, so two
/// requests for the same query with different pagination never collide.
///
/// # Errors
///
/// Propagates whatever `compute` (typically a call into `qcd-executor`)
/// returns.
pub async fn process_results_cached<B, E, F, Fut>(
    cache: &CacheManager<B>,
    query: &str,
    sampling_config: &SamplingConfig,
    pagination_config: &PaginationConfig,
    format: ResultFormat,
    now: DateTime<Utc>,
    compute: F,
) -> Result<ProcessedResult, E>
where
    B: CacheBackend,
    F: FnOnce() -> Fut,
    Fut: std::future::Future<Output = Result<Vec<QueryResult>, E>>,
{
    let context_key = format!(
        "page_{}|size_{}|sample_{:?}_{}|format_{:?}",
        pagination_config.page,
        pagination_config.page_size,
        sampling_config.method,
        sampling_config.sample_size,
        format
    );

    if let Some(hit) = cache.get_query_result::<ProcessedResult>(query, &context_key).await {
        debug!(query, "returning cached processed result");
        return Ok(hit);
    }

    let raw_results = compute().await?;
    let touched_tables = ["products", "current_prices", "discounts"];
    let processed = ProcessedResult::build(&raw_results, sampling_config, pagination_config, format, now);

    cache
        .cache_query_result(query, &context_key, &processed, std::time::Duration::from_secs(300), &touched_tables)
        .await;

    Ok(processed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    fn result(product_id: i64, product_name: &str, platform_name: &str, price: &str, stock_status: &str) -> QueryResult {
        QueryResult {
            product_id,
            product_name: product_name.to_string(),
            category: "fruits".to_string(),
            platform_name: platform_name.to_string(),
            current_price: Decimal::from_str(price).unwrap(),
            discount_percent: None,
            stock_status: stock_status.to_string(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn sampling_is_a_no_op_below_the_configured_size() {
        let results = vec![result(1, "Bananas", "Blinkit", "40", "in_stock")];
        let config = SamplingConfig { sample_size: 10, ..SamplingConfig::default() };
        let (sampled, meta) = apply_sampling(&results, &config);
        assert_eq!(sampled.len(), 1);
        assert!(!meta.sampled);
        assert_eq!(meta.original_size, 1);
    }

    #[test]
    fn random_sampling_respects_the_required_sample_size() {
        let results: Vec<QueryResult> =
            (0..200).map(|i| result(i, "Bananas", "Blinkit", "40", "in_stock")).collect();
        let config = SamplingConfig { method: SamplingMethod::Random, sample_size: 20, ..SamplingConfig::default() };
        let (sampled, meta) = apply_sampling(&results, &config);
        assert!(meta.sampled);
        assert!(sampled.len() <= 20);
        assert_eq!(meta.original_size, 200);
    }

    #[test]
    fn top_n_sampling_keeps_the_first_n_in_order() {
        let results: Vec<QueryResult> =
            (0..50).map(|i| result(i, "Bananas", "Blinkit", "40", "in_stock")).collect();
        let config = SamplingConfig { method: SamplingMethod::TopN, sample_size: 5, ..SamplingConfig::default() };
        let (sampled, _) = apply_sampling(&results, &config);
        assert_eq!(sampled.len(), 5);
        assert_eq!(sampled[0].product_id, 0);
        assert_eq!(sampled[4].product_id, 4);
    }

    #[test]
    fn required_sample_size_never_exceeds_population_or_config_cap() {
        let config = SamplingConfig { sample_size: 1000, ..SamplingConfig::default() };
        assert_eq!(config.calculate_required_sample_size(10), 10);
        assert!(config.calculate_required_sample_size(100_000) <= 1000);
    }

    #[test]
    fn pagination_computes_bounds_and_flags() {
        let results: Vec<QueryResult> =
            (0..45).map(|i| result(i, "Bananas", "Blinkit", "40", "in_stock")).collect();
        let config = PaginationConfig::new(2, 20);
        let (page, meta) = apply_pagination(&results, &config);
        assert_eq!(page.len(), 20);
        assert_eq!(meta.total_pages, 3);
        assert!(meta.has_next);
        assert!(meta.has_previous);
        assert_eq!(meta.start_index, 21);
        assert_eq!(meta.end_index, 40);
    }

    #[test]
    fn pagination_past_the_last_page_returns_an_empty_slice() {
        let results: Vec<QueryResult> = vec![result(1, "Bananas", "Blinkit", "40", "in_stock")];
        let config = PaginationConfig::new(5, 20);
        let (page, meta) = apply_pagination(&results, &config);
        assert!(page.is_empty());
        assert!(!meta.has_next);
    }

    #[test]
    fn pagination_config_clamps_page_size_to_the_maximum() {
        let config = PaginationConfig::new(1, 10_000);
        assert_eq!(config.page_size, 100);
    }

    #[test]
    fn structured_format_marks_in_stock_availability() {
        let results = vec![result(1, "Bananas", "Blinkit", "40", "in_stock")];
        let rendered = format_results(&results, ResultFormat::Structured);
        assert_eq!(rendered[0]["is_available"], true);
    }

    #[test]
    fn summary_format_reports_empty_result_sets() {
        let rendered = format_results(&[], ResultFormat::Summary);
        assert_eq!(rendered["summary"], "No results found");
    }

    #[test]
    fn summary_format_computes_price_statistics() {
        let results = vec![
            result(1, "Bananas", "Blinkit", "40", "in_stock"),
            result(2, "Bananas", "Zepto", "60", "in_stock"),
        ];
        let rendered = format_results(&results, ResultFormat::Summary);
        assert_eq!(rendered["unique_platforms"], 2);
        assert_eq!(rendered["price_statistics"]["average_price"], 50.0);
    }

    #[test]
    fn comparison_format_identifies_cheapest_and_most_expensive_platform() {
        let results = vec![
            result(1, "Bananas", "Blinkit", "40", "in_stock"),
            result(1, "Bananas", "Zepto", "60", "in_stock"),
        ];
        let rendered = format_results(&results, ResultFormat::Comparison);
        assert_eq!(rendered[0]["cheapest_platform"], "Blinkit");
        assert_eq!(rendered[0]["most_expensive_platform"], "Zepto");
    }

    #[test]
    fn data_freshness_flags_stale_records_past_24_hours() {
        let now = Utc::now();
        let mut stale = result(1, "Bananas", "Blinkit", "40", "in_stock");
        stale.updated_at = now - chrono::Duration::hours(48);
        let fresh = result(2, "Bananas", "Zepto", "40", "in_stock");
        let freshness = calculate_data_freshness(&[stale, fresh], now);
        assert_eq!(freshness.status, "calculated");
        assert_eq!(freshness.stale_data_count, Some(1));
    }

    #[test]
    fn data_freshness_reports_no_data_for_an_empty_result_set() {
        let freshness = calculate_data_freshness(&[], Utc::now());
        assert_eq!(freshness.status, "no_data");
        assert!(freshness.stale_data_count.is_none());
    }

    #[test]
    fn quality_metrics_compute_availability_rate() {
        let results = vec![
            result(1, "Bananas", "Blinkit", "40", "in_stock"),
            result(2, "Bananas", "Zepto", "40", "out_of_stock"),
        ];
        let quality = calculate_quality_metrics(&results);
        assert_eq!(quality.total_records, 2);
        assert_eq!(quality.availability_rate, Some(50.0));
    }

    #[test]
    fn processed_result_build_applies_sampling_pagination_and_format_in_order() {
        let results: Vec<QueryResult> =
            (0..5).map(|i| result(i, "Bananas", "Blinkit", "40", "in_stock")).collect();
        let processed = ProcessedResult::build(
            &results,
            &SamplingConfig::default(),
            &PaginationConfig::new(1, 20),
            ResultFormat::Structured,
            Utc::now(),
        );
        assert_eq!(processed.total_count, 5);
        assert_eq!(processed.pagination.total_count, 5);
        assert!(!processed.sampling.sampled);
    }
}
