use std::net::SocketAddr;

use serde::Serialize;

use crate::accounts::ProtectionPolicy;

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
    /// OAuth2 user-context access token for the X API.
    pub x_access_token: Option<String>,
    /// Numeric id of the tracked account (the one doing the following).
    pub x_user_id: Option<String>,
    pub x_api_base_url: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
    pub refresh_cron: String,
    pub cleaner: CleanerConfig,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("bind_addr", &self.bind_addr)
            .field("log_level", &self.log_level)
            .field("database_url", &"[redacted]")
            .field(
                "x_access_token",
                &self.x_access_token.as_ref().map(|_| "[redacted]"),
            )
            .field("x_user_id", &self.x_user_id)
            .field("x_api_base_url", &self.x_api_base_url)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("user_agent", &self.user_agent)
            .field("max_retries", &self.max_retries)
            .field("retry_backoff_base_ms", &self.retry_backoff_base_ms)
            .field("refresh_cron", &self.refresh_cron)
            .field("cleaner", &self.cleaner)
            .finish()
    }
}

/// Thresholds, caps, and pacing for the cleaning pipeline.
///
/// Passed explicitly into every pipeline component so tests can run with
/// deterministic values instead of whatever the environment holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CleanerConfig {
    pub inactive_threshold_days: i32,
    pub max_unfollows_per_run: u32,
    pub max_unfollows_per_day: u32,
    pub min_unfollow_score: i32,
    pub protect_verified: bool,
    pub protect_high_followers: bool,
    pub min_follower_threshold: i64,
    pub probe_delay_ms: u64,
    pub unfollow_delay_ms: u64,
    pub sync_page_delay_ms: u64,
    pub probe_stale_after_days: i64,
    pub probe_batch_size: u32,
}

impl Default for CleanerConfig {
    fn default() -> Self {
        Self {
            inactive_threshold_days: 180,
            max_unfollows_per_run: 50,
            max_unfollows_per_day: 100,
            min_unfollow_score: 50,
            protect_verified: true,
            protect_high_followers: true,
            min_follower_threshold: 10_000,
            probe_delay_ms: 100,
            unfollow_delay_ms: 2_000,
            sync_page_delay_ms: 1_000,
            probe_stale_after_days: 7,
            probe_batch_size: 1_000,
        }
    }
}

impl CleanerConfig {
    /// Candidate exclusions implied by the `protect_*` settings.
    #[must_use]
    pub fn protection_policy(&self) -> ProtectionPolicy {
        ProtectionPolicy {
            exclude_verified: self.protect_verified,
            max_follower_count: self
                .protect_high_followers
                .then_some(self.min_follower_threshold),
        }
    }
}
