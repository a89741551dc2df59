pub mod accounts;
pub mod app_config;
pub mod config;
pub mod identifier;
pub mod scoring;

pub use accounts::{AutoWhitelistRule, FollowedUser, ProtectionPolicy, PublicMetrics};
pub use app_config::{AppConfig, CleanerConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env};
pub use identifier::AccountIdentifier;
pub use scoring::{raw_score, score, ScoreInput, SENTINEL_NEVER};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}
