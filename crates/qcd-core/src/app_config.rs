use std::net::SocketAddr;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub bind_addr: SocketAddr,
    pub log_level: String,

    // Persistence bindings (§4.J)
    pub db_pool_size: u32,
    pub db_max_overflow: u32,
    pub db_acquire_timeout_secs: u64,

    // Cache layer (§4.F)
    pub cache_ttl_seconds: u64,
    pub cache_max_entries: usize,
    pub redis_url: Option<String>,

    // Rate limiting (§6)
    pub rate_limit_per_minute: u32,

    // Embedding index (§4.B)
    pub embedding_api_key: Option<String>,
    pub embedding_cache_dir: PathBuf,
    pub embedding_cache_horizon_hours: u64,

    // Price update engine (§4.G)
    pub price_update_interval_secs: u64,
    pub price_update_batch_size: usize,
    pub price_update_max_workers: usize,
    pub price_update_max_change_percent: f64,
    pub price_update_discount_probability: f64,
    pub price_update_surge_probability: f64,

    // Monitoring (§4.H)
    pub slow_query_threshold_secs: f64,
    pub system_sample_interval_secs: u64,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field("db_pool_size", &self.db_pool_size)
            .field("db_max_overflow", &self.db_max_overflow)
            .field("cache_ttl_seconds", &self.cache_ttl_seconds)
            .field("rate_limit_per_minute", &self.rate_limit_per_minute)
            .field(
                "embedding_api_key",
                &self.embedding_api_key.as_ref().map(|_| "[redacted]"),
            )
            .field("redis_url", &self.redis_url.as_ref().map(|_| "[redacted]"))
            .field(
                "price_update_interval_secs",
                &self.price_update_interval_secs,
            )
            .field("price_update_batch_size", &self.price_update_batch_size)
            .finish()
    }
}
