pub mod app_config;
pub mod config;
pub mod domain;
pub mod error;
pub mod validation;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use domain::{ChangeType, KNOWN_PLATFORMS, StockStatus};
pub use error::ErrorCode;
pub use validation::{validate_discount_percent, validate_limit, validate_query_text, ValidationIssue};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env var: {0}")]
    MissingEnvVar(String),

    #[error("invalid env var {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("validation error: {0}")]
    Validation(String),
}
