//! Semantic table selection: synthesises a short natural-language
//! description for each table/column, embeds it, and ranks tables against
//! an incoming query by cosine similarity. Embeddings are persisted to disk
//! and reused until they go stale.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use qcd_catalog::SchemaSnapshot;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("embedding function failed: {0}")]
    EmbeddingFn(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Serde(#[from] serde_json::Error),
}

/// A dense embedding vector.
pub type Vector = Vec<f32>;

/// Pluggable embedding backend. Production code wires this to a real
/// embedding API; tests use a deterministic hash-based stand-in.
pub trait EmbeddingFn: Send + Sync {
    /// # Errors
    ///
    /// Returns [`EmbedError::EmbeddingFn`] if the backend call fails.
    fn embed(&self, text: &str) -> Result<Vector, EmbedError>;
}

/// A trivial embedding function for tests and offline use: hashes the text
/// into a fixed-length vector. Not semantically meaningful, but deterministic
/// and dependency-free, which is what the unit tests need.
pub struct HashEmbedding {
    pub dims: usize,
}

impl EmbeddingFn for HashEmbedding {
    fn embed(&self, text: &str) -> Result<Vector, EmbedError> {
        let mut v = vec![0f32; self.dims];
        for (i, byte) in text.bytes().enumerate() {
            v[i % self.dims] += f32::from(byte) / 255.0;
        }
        Ok(v)
    }
}

/// Synthesises a short natural-language description of a table from its
/// name and column list — the text that gets embedded.
#[must_use]
pub fn describe_table(schema: &SchemaSnapshot, table: &str) -> String {
    let cols: Vec<&str> = schema
        .columns_for(table)
        .into_iter()
        .map(|c| c.name.rsplit('.').next().unwrap_or(&c.name))
        .collect();
    format!("table {table} with columns: {}", cols.join(", "))
}

/// Cosine similarity between two equal-length vectors. Returns `0.0` if
/// either vector is all-zero (avoids a division by zero on empty embeddings).
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// On-disk embedding cache payload.
#[derive(Debug, Serialize, Deserialize)]
struct CachePayload {
    table_embeddings: HashMap<String, Vector>,
}

/// Ranked table-selection result.
#[derive(Debug, Clone, PartialEq)]
pub struct TableMatch {
    pub table: String,
    pub score: f32,
}

/// Holds the current table embeddings, persisting and reloading them from
/// an on-disk cache so embedding calls aren't repeated across process
/// restarts within the staleness horizon.
pub struct SemanticIndex {
    cache_dir: PathBuf,
    staleness_horizon: Duration,
    table_embeddings: HashMap<String, Vector>,
}

impl SemanticIndex {
    #[must_use]
    pub fn new(cache_dir: PathBuf, staleness_horizon_hours: u64) -> Self {
        Self {
            cache_dir,
            staleness_horizon: Duration::from_secs(staleness_horizon_hours * 3600),
            table_embeddings: HashMap::new(),
        }
    }

    fn cache_file(&self) -> PathBuf {
        self.cache_dir.join("table_embeddings.json")
    }

    /// `true` if the on-disk cache file exists and was modified within the
    /// staleness horizon.
    #[must_use]
    pub fn cache_is_fresh(&self) -> bool {
        let Ok(meta) = std::fs::metadata(self.cache_file()) else {
            return false;
        };
        let Ok(modified) = meta.modified() else {
            return false;
        };
        match SystemTime::now().duration_since(modified) {
            Ok(age) => age < self.staleness_horizon,
            Err(_) => true,
        }
    }

    /// Loads the on-disk cache into memory if fresh, otherwise rebuilds
    /// embeddings for every table in `schema` using `embedder` and persists
    /// the result.
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError`] if the embedder fails or the cache can't be
    /// read/written.
    pub fn load_or_build(
        &mut self,
        schema: &SchemaSnapshot,
        embedder: &dyn EmbeddingFn,
    ) -> Result<(), EmbedError> {
        if self.cache_is_fresh() {
            if let Ok(contents) = std::fs::read_to_string(self.cache_file()) {
                if let Ok(payload) = serde_json::from_str::<CachePayload>(&contents) {
                    info!(
                        table_count = payload.table_embeddings.len(),
                        "loaded cached table embeddings"
                    );
                    self.table_embeddings = payload.table_embeddings;
                    return Ok(());
                }
            }
        }

        self.rebuild(schema, embedder)
    }

    /// Forces a rebuild of every table embedding, bypassing freshness checks.
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError`] if the embedder fails or the cache can't be
    /// written.
    pub fn rebuild(
        &mut self,
        schema: &SchemaSnapshot,
        embedder: &dyn EmbeddingFn,
    ) -> Result<(), EmbedError> {
        let mut embeddings = HashMap::new();
        for table in &schema.tables {
            let description = describe_table(schema, table);
            embeddings.insert(table.clone(), embedder.embed(&description)?);
        }
        self.table_embeddings = embeddings;
        self.persist()?;
        Ok(())
    }

    fn persist(&self) -> Result<(), EmbedError> {
        std::fs::create_dir_all(&self.cache_dir)?;
        let payload = CachePayload {
            table_embeddings: self.table_embeddings.clone(),
        };
        std::fs::write(self.cache_file(), serde_json::to_string(&payload)?)?;
        Ok(())
    }

    /// Ranks all indexed tables against `query` by cosine similarity,
    /// highest first.
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError`] if the embedder fails on the query text.
    pub fn rank_tables(
        &self,
        query: &str,
        embedder: &dyn EmbeddingFn,
    ) -> Result<Vec<TableMatch>, EmbedError> {
        let query_vec = embedder.embed(query)?;
        let mut matches: Vec<TableMatch> = self
            .table_embeddings
            .iter()
            .map(|(table, vec)| TableMatch {
                table: table.clone(),
                score: cosine_similarity(&query_vec, vec),
            })
            .collect();
        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        Ok(matches)
    }

    /// Suggests tables to join with `anchor_table`: any table whose name or
    /// description shares a token with the query, excluding the anchor
    /// itself. A lightweight heuristic on top of [`rank_tables`].
    #[must_use]
    pub fn suggest_joins(&self, anchor_table: &str, ranked: &[TableMatch], top_n: usize) -> Vec<String> {
        ranked
            .iter()
            .filter(|m| m.table != anchor_table && m.score > 0.0)
            .take(top_n)
            .map(|m| m.table.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use qcd_catalog::{ColumnInfo, SchemaSnapshot};

    fn sample_schema() -> SchemaSnapshot {
        SchemaSnapshot {
            tables: vec!["products".into(), "current_prices".into()],
            columns: vec![
                ColumnInfo {
                    name: "products.name".into(),
                    data_type: "text".into(),
                    is_nullable: false,
                },
                ColumnInfo {
                    name: "current_prices.price".into(),
                    data_type: "numeric".into(),
                    is_nullable: false,
                },
            ],
            foreign_keys: vec![],
        }
    }

    #[test]
    fn cosine_similarity_of_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_handles_zero_vector() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }

    #[test]
    fn describe_table_includes_column_names() {
        let schema = sample_schema();
        let desc = describe_table(&schema, "products");
        assert!(desc.contains("products"));
        assert!(desc.contains("name"));
    }

    #[test]
    fn rebuild_persists_and_reloads_from_disk() {
        let tmp = tempfile::tempdir().unwrap();
        let schema = sample_schema();
        let embedder = HashEmbedding { dims: 8 };

        let mut index = SemanticIndex::new(tmp.path().to_path_buf(), 24);
        index.rebuild(&schema, &embedder).unwrap();
        assert!(index.cache_is_fresh());
        assert!(tmp.path().join("table_embeddings.json").exists());

        let mut reloaded = SemanticIndex::new(tmp.path().to_path_buf(), 24);
        reloaded.load_or_build(&schema, &embedder).unwrap();
        assert_eq!(reloaded.table_embeddings.len(), 2);
    }

    #[test]
    fn rank_tables_orders_by_similarity() {
        let tmp = tempfile::tempdir().unwrap();
        let schema = sample_schema();
        let embedder = HashEmbedding { dims: 8 };
        let mut index = SemanticIndex::new(tmp.path().to_path_buf(), 24);
        index.rebuild(&schema, &embedder).unwrap();

        let ranked = index.rank_tables("products name", &embedder).unwrap();
        assert_eq!(ranked.len(), 2);
        assert!(ranked[0].score >= ranked[1].score);
    }

    #[test]
    fn suggest_joins_excludes_anchor() {
        let ranked = vec![
            TableMatch { table: "products".into(), score: 0.9 },
            TableMatch { table: "current_prices".into(), score: 0.5 },
        ];
        let tmp = tempfile::tempdir().unwrap();
        let index = SemanticIndex::new(tmp.path().to_path_buf(), 24);
        let suggestions = index.suggest_joins("products", &ranked, 5);
        assert_eq!(suggestions, vec!["current_prices".to_string()]);
    }
}
