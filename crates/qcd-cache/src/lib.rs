//! Two-tier cache layer: an in-process bounded store with per-entry TTL,
//! with tag-based invalidation so a single price update can drop every
//! cached query result that touched the affected table. Backend errors are
//! treated as cache misses rather than propagated — a cold cache should
//! never turn into a request failure.

use std::collections::{HashMap, HashSet};
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use serde::{de::DeserializeOwned, Serialize};
use sha2::{Digest, Sha256};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    QueryResults,
    TableEmbeddings,
    SchemaInfo,
    ExecutionPlans,
}

impl CacheNamespace {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            CacheNamespace::QueryResults => "query_results",
            CacheNamespace::TableEmbeddings => "table_embeddings",
            CacheNamespace::SchemaInfo => "schema_info",
            CacheNamespace::ExecutionPlans => "execution_plans",
        }
    }

    #[must_use]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "query_results" => Some(CacheNamespace::QueryResults),
            "table_embeddings" => Some(CacheNamespace::TableEmbeddings),
            "schema_info" => Some(CacheNamespace::SchemaInfo),
            "execution_plans" => Some(CacheNamespace::ExecutionPlans),
            _ => None,
        }
    }
}

/// Backend storage contract. `MemoryCacheBackend` is the default; an
/// external K/V store (Redis, etc.) can implement this trait to back the
/// same [`CacheManager`] API.
pub trait CacheBackend: Send + Sync {
    fn get(&self, key: &str) -> impl Future<Output = Option<String>> + Send;
    fn set(&self, key: &str, value: String, ttl: Duration) -> impl Future<Output = bool> + Send;
    fn delete(&self, key: &str) -> impl Future<Output = bool> + Send;
    fn exists(&self, key: &str) -> impl Future<Output = bool> + Send;
    /// Deletes every live key starting with `prefix`, returning how many
    /// were removed. Used for namespace-wide invalidation, as distinct from
    /// the tag-based per-table invalidation [`CacheManager::invalidate_table_cache`]
    /// does.
    fn delete_prefix(&self, prefix: &str) -> impl Future<Output = usize> + Send;
}

struct Entry {
    value: String,
    created_at: Instant,
    expires_at: Instant,
}

/// In-process bounded cache. When full, expired entries are purged first;
/// if that isn't enough, the oldest 10% by insertion time are evicted.
pub struct MemoryCacheBackend {
    entries: Mutex<HashMap<String, Entry>>,
    max_entries: usize,
}

impl MemoryCacheBackend {
    #[must_use]
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_entries,
        }
    }

    fn evict_expired(&self, entries: &mut HashMap<String, Entry>) {
        let now = Instant::now();
        entries.retain(|_, e| e.expires_at > now);
    }

    fn evict_oldest_fraction(&self, entries: &mut HashMap<String, Entry>) {
        let to_remove = (entries.len() as f64 * 0.1).ceil() as usize;
        let mut keys: Vec<(String, Instant)> = entries
            .iter()
            .map(|(k, e)| (k.clone(), e.created_at))
            .collect();
        keys.sort_by_key(|(_, created_at)| *created_at);
        for (key, _) in keys.into_iter().take(to_remove) {
            entries.remove(&key);
        }
    }
}

impl CacheBackend for MemoryCacheBackend {
    async fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(e) if e.expires_at > Instant::now() => Some(e.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> bool {
        let mut entries = self.entries.lock().unwrap();
        if entries.len() >= self.max_entries {
            self.evict_expired(&mut entries);
        }
        if entries.len() >= self.max_entries {
            self.evict_oldest_fraction(&mut entries);
        }
        let now = Instant::now();
        entries.insert(
            key.to_string(),
            Entry {
                value,
                created_at: now,
                expires_at: now + ttl,
            },
        );
        true
    }

    async fn delete(&self, key: &str) -> bool {
        self.entries.lock().unwrap().remove(key).is_some()
    }

    async fn exists(&self, key: &str) -> bool {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(e) if e.expires_at > Instant::now() => true,
            Some(_) => {
                entries.remove(key);
                false
            }
            None => false,
        }
    }

    async fn delete_prefix(&self, prefix: &str) -> usize {
        let mut entries = self.entries.lock().unwrap();
        let matching: Vec<String> = entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        for key in &matching {
            entries.remove(key);
        }
        matching.len()
    }
}

/// Builds a namespaced, content-addressed cache key.
#[must_use]
pub fn cache_key(namespace: CacheNamespace, parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(namespace.as_str().as_bytes());
    for part in parts {
        hasher.update(b"|");
        hasher.update(part.as_bytes());
    }
    format!("{}:{:x}", namespace.as_str(), hasher.finalize())
}

/// Wraps a [`CacheBackend`] with the named convenience methods the query
/// pipeline calls, plus a tag index for table-scoped invalidation.
pub struct CacheManager<B: CacheBackend> {
    backend: B,
    /// table name -> cache keys tagged with it, so a price update can drop
    /// exactly the cached entries it invalidates.
    tags: Mutex<HashMap<String, HashSet<String>>>,
}

impl<B: CacheBackend> CacheManager<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            tags: Mutex::new(HashMap::new()),
        }
    }

    fn tag(&self, key: &str, tables: &[&str]) {
        let mut tags = self.tags.lock().unwrap();
        for table in tables {
            tags.entry((*table).to_string())
                .or_default()
                .insert(key.to_string());
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let raw = self.backend.get(key).await?;
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(error = %e, key, "cache value failed to deserialize, treating as miss");
                None
            }
        }
    }

    async fn set_json<T: Serialize>(
        &self,
        key: &str,
        value: &T,
        ttl: Duration,
        tables: &[&str],
    ) -> bool {
        let Ok(raw) = serde_json::to_string(value) else {
            return false;
        };
        let ok = self.backend.set(key, raw, ttl).await;
        if ok {
            self.tag(key, tables);
        }
        ok
    }

    /// Fetches a cached result for `query`, scoped by `context_key` (e.g. a
    /// serialised filter set), if present and unexpired.
    pub async fn get_query_result<T: DeserializeOwned>(
        &self,
        query: &str,
        context_key: &str,
    ) -> Option<T> {
        let key = cache_key(CacheNamespace::QueryResults, &[query, context_key]);
        self.get_json(&key).await
    }

    /// Caches a query result, tagged by every table the query touched so a
    /// price update on any of them invalidates it.
    pub async fn cache_query_result<T: Serialize>(
        &self,
        query: &str,
        context_key: &str,
        result: &T,
        ttl: Duration,
        touched_tables: &[&str],
    ) -> bool {
        let key = cache_key(CacheNamespace::QueryResults, &[query, context_key]);
        self.set_json(&key, result, ttl, touched_tables).await
    }

    pub async fn cache_schema_metadata<T: Serialize>(
        &self,
        table: &str,
        value: &T,
        ttl: Duration,
    ) -> bool {
        let key = cache_key(CacheNamespace::SchemaInfo, &[table]);
        self.set_json(&key, value, ttl, &[table]).await
    }

    pub async fn get_schema_metadata<T: DeserializeOwned>(&self, table: &str) -> Option<T> {
        let key = cache_key(CacheNamespace::SchemaInfo, &[table]);
        self.get_json(&key).await
    }

    pub async fn cache_table_embeddings<T: Serialize>(
        &self,
        table: &str,
        value: &T,
        ttl: Duration,
    ) -> bool {
        let key = cache_key(CacheNamespace::TableEmbeddings, &[table]);
        self.set_json(&key, value, ttl, &[table]).await
    }

    pub async fn cache_execution_plan<T: Serialize>(
        &self,
        plan_cache_key: &str,
        value: &T,
        ttl: Duration,
        touched_tables: &[&str],
    ) -> bool {
        let key = cache_key(CacheNamespace::ExecutionPlans, &[plan_cache_key]);
        self.set_json(&key, value, ttl, touched_tables).await
    }

    pub async fn get_execution_plan<T: DeserializeOwned>(&self, plan_cache_key: &str) -> Option<T> {
        let key = cache_key(CacheNamespace::ExecutionPlans, &[plan_cache_key]);
        self.get_json(&key).await
    }

    /// Drops every cached entry in `namespace`, regardless of which table
    /// tagged it — a coarser bulk invalidation than
    /// [`Self::invalidate_table_cache`], for operator-triggered cache
    /// resets rather than per-write table invalidation. Keys removed this
    /// way are left in the tag index; they're harmless there since a lookup
    /// always checks the backend for liveness before trusting a tag.
    pub async fn invalidate_namespace(&self, namespace: CacheNamespace) -> usize {
        let prefix = format!("{}:", namespace.as_str());
        self.backend.delete_prefix(&prefix).await
    }

    /// Drops every cached entry tagged with `table` — called after the
    /// price engine mutates rows in that table.
    pub async fn invalidate_table_cache(&self, table: &str) -> usize {
        let keys: Vec<String> = {
            let mut tags = self.tags.lock().unwrap();
            tags.remove(table).unwrap_or_default().into_iter().collect()
        };
        let mut removed = 0;
        for key in &keys {
            if self.backend.delete(key).await {
                removed += 1;
            }
        }
        removed
    }

    /// Generic read-through helper: return the cached value for `key` if
    /// present, otherwise call `compute`, cache its result, and return it.
    pub async fn cached<T, F, Fut>(&self, key: &str, ttl: Duration, compute: F) -> T
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        if let Some(hit) = self.get_json(key).await {
            return hit;
        }
        let value = compute().await;
        let _ = self.set_json(key, &value, ttl, &[]).await;
        value
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Sample {
        value: i32,
    }

    #[tokio::test]
    async fn memory_backend_round_trips_within_ttl() {
        let backend = MemoryCacheBackend::new(100);
        backend.set("k", "v".to_string(), Duration::from_secs(60)).await;
        assert_eq!(backend.get("k").await, Some("v".to_string()));
        assert!(backend.exists("k").await);
    }

    #[tokio::test]
    async fn memory_backend_expires_entries() {
        let backend = MemoryCacheBackend::new(100);
        backend
            .set("k", "v".to_string(), Duration::from_millis(1))
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(backend.get("k").await, None);
    }

    #[tokio::test]
    async fn memory_backend_evicts_when_full() {
        let backend = MemoryCacheBackend::new(4);
        for i in 0..10 {
            backend
                .set(&format!("k{i}"), "v".to_string(), Duration::from_secs(60))
                .await;
        }
        let entries = backend.entries.lock().unwrap();
        assert!(entries.len() <= 4);
    }

    #[tokio::test]
    async fn query_result_cache_round_trips() {
        let manager = CacheManager::new(MemoryCacheBackend::new(100));
        let result = Sample { value: 42 };
        manager
            .cache_query_result("cheapest onions", "{}", &result, Duration::from_secs(60), &["products"])
            .await;

        let hit: Option<Sample> = manager.get_query_result("cheapest onions", "{}").await;
        assert_eq!(hit, Some(Sample { value: 42 }));
    }

    #[tokio::test]
    async fn invalidate_table_cache_drops_tagged_entries() {
        let manager = CacheManager::new(MemoryCacheBackend::new(100));
        let result = Sample { value: 1 };
        manager
            .cache_query_result("q", "{}", &result, Duration::from_secs(60), &["products"])
            .await;

        let removed = manager.invalidate_table_cache("products").await;
        assert_eq!(removed, 1);

        let hit: Option<Sample> = manager.get_query_result("q", "{}").await;
        assert_eq!(hit, None);
    }

    #[tokio::test]
    async fn invalidate_namespace_drops_only_that_namespace() {
        let manager = CacheManager::new(MemoryCacheBackend::new(100));
        let query_result = Sample { value: 1 };
        manager
            .cache_query_result("q", "{}", &query_result, Duration::from_secs(60), &["products"])
            .await;
        manager
            .cache_schema_metadata("products", &Sample { value: 2 }, Duration::from_secs(60))
            .await;

        let removed = manager.invalidate_namespace(CacheNamespace::QueryResults).await;
        assert_eq!(removed, 1);

        let query_hit: Option<Sample> = manager.get_query_result("q", "{}").await;
        assert_eq!(query_hit, None);
        let schema_hit: Option<Sample> = manager.get_schema_metadata("products").await;
        assert_eq!(schema_hit, Some(Sample { value: 2 }));
    }

    #[tokio::test]
    async fn cached_helper_computes_once_and_reuses() {
        let manager = CacheManager::new(MemoryCacheBackend::new(100));
        let key = cache_key(CacheNamespace::QueryResults, &["x"]);

        let first: Sample = manager
            .cached(&key, Duration::from_secs(60), || async { Sample { value: 7 } })
            .await;
        let second: Sample = manager
            .cached(&key, Duration::from_secs(60), || async { Sample { value: 999 } })
            .await;

        assert_eq!(first, Sample { value: 7 });
        assert_eq!(second, Sample { value: 7 });
    }
}
