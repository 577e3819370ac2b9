//! Real-time price simulation engine (component G): a scheduler tick that
//! pulls a random batch of `(product, platform)` rows, fans them out across
//! a bounded worker pool, and writes each mutation — plus its
//! `price_history` entry — inside the single transaction `qcd-db` already
//! provides. Conflict resolution is Postgres's own row lock
//! (`SELECT ... FOR UPDATE` inside [`qcd_db::pricing::update_price_with_history`]);
//! this crate only adds the retry-with-back-off around it.

pub mod engine;
pub mod metrics;
pub mod simulate;

pub use engine::{EngineSettings, PriceUpdateEngine, PriceUpdateError};
pub use metrics::{MetricsSnapshot, UpdateMetrics};
pub use simulate::{calculate_price_change, EngineConfig, PriceChange};
