//! Shared application state handed to every route handler via
//! [`axum::extract::State`].

use std::sync::{Arc, RwLock};

use qcd_cache::{CacheManager, MemoryCacheBackend};
use qcd_catalog::SchemaCatalog;
use qcd_core::AppConfig;
use qcd_embed::{EmbeddingFn, HashEmbedding, SemanticIndex};
use qcd_monitor::MonitorRegistry;
use qcd_pricing::PriceUpdateEngine;
use sqlx::PgPool;

/// Embedding dimensionality for the deterministic stand-in backend. Chosen
/// to be large enough that [`qcd_embed::cosine_similarity`] has enough
/// spread to produce a meaningful ranking over the service's small table
/// count, without the memory/compute cost a real embedding model would add.
const EMBEDDING_DIMS: usize = 64;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub config: Arc<AppConfig>,
    pub catalog: Arc<SchemaCatalog>,
    pub semantic_index: Arc<RwLock<SemanticIndex>>,
    pub embedder: Arc<dyn EmbeddingFn>,
    pub cache: Arc<CacheManager<MemoryCacheBackend>>,
    pub monitors: Arc<MonitorRegistry>,
    pub pricing_engine: PriceUpdateEngine,
}

impl AppState {
    /// Builds the application state, warming the schema catalogue and the
    /// semantic table index so the first request doesn't pay for
    /// introspection + embedding.
    ///
    /// # Errors
    ///
    /// Returns an error if schema introspection or the embedding warm-up
    /// fails.
    pub async fn build(pool: PgPool, config: Arc<AppConfig>) -> anyhow::Result<Self> {
        let catalog = Arc::new(SchemaCatalog::new(pool.clone()));
        let schema = catalog.get().await?;

        let embedder: Arc<dyn EmbeddingFn> = Arc::new(HashEmbedding { dims: EMBEDDING_DIMS });
        let mut semantic_index =
            SemanticIndex::new(config.embedding_cache_dir.clone(), config.embedding_cache_horizon_hours);
        semantic_index.load_or_build(&schema, embedder.as_ref())?;

        let cache = Arc::new(CacheManager::new(MemoryCacheBackend::new(config.cache_max_entries)));
        let monitors = Arc::new(MonitorRegistry::new(
            config.slow_query_threshold_secs,
            qcd_monitor::AlertThresholds::default(),
        ));
        let pricing_engine =
            PriceUpdateEngine::new(pool.clone(), qcd_pricing::EngineSettings::from(config.as_ref()));

        Ok(AppState {
            pool,
            config,
            catalog,
            semantic_index: Arc::new(RwLock::new(semantic_index)),
            embedder,
            cache,
            monitors,
            pricing_engine,
        })
    }

    /// Ranks every known table against `query`, returning just the table
    /// names with a positive similarity score — the `relevant_tables` hint
    /// surfaced in query responses.
    #[must_use]
    pub fn relevant_tables(&self, query: &str) -> Vec<String> {
        let index = self.semantic_index.read().unwrap();
        match index.rank_tables(query, self.embedder.as_ref()) {
            Ok(ranked) => {
                let positive: Vec<String> =
                    ranked.iter().filter(|m| m.score > 0.0).map(|m| m.table.clone()).take(5).collect();
                if positive.is_empty() {
                    core_tables()
                } else {
                    positive
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "table ranking failed, falling back to core tables");
                core_tables()
            }
        }
    }
}

fn core_tables() -> Vec<String> {
    vec!["products".to_string(), "current_prices".to_string(), "platforms".to_string()]
}
