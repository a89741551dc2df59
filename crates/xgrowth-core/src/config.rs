use std::str::FromStr;

use crate::app_config::{AppConfig, CleanerConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if required env vars are missing or values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a plain
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let require = |var: &str| -> Result<String, ConfigError> {
        lookup(var).map_err(|_| ConfigError::MissingEnvVar(var.to_string()))
    };

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        let raw = or_default(var, default);
        match raw.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            other => Err(ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: format!("expected a boolean, got '{other}'"),
            }),
        }
    };

    let database_url = require("DATABASE_URL")?;
    let env = parse_environment(&or_default("XGROWTH_ENV", "development"))?;

    let bind_addr = parse_var(&lookup, "XGROWTH_BIND_ADDR", "127.0.0.1:7860")?;
    let log_level = or_default("XGROWTH_LOG_LEVEL", "info");

    let x_access_token = optional("X_ACCESS_TOKEN");
    let x_user_id = optional("X_USER_ID");
    let x_api_base_url = or_default("XGROWTH_X_API_BASE_URL", "https://api.twitter.com/2/");

    let db_max_connections = parse_var(&lookup, "XGROWTH_DB_MAX_CONNECTIONS", "5")?;
    let db_min_connections = parse_var(&lookup, "XGROWTH_DB_MIN_CONNECTIONS", "1")?;
    let db_acquire_timeout_secs = parse_var(&lookup, "XGROWTH_DB_ACQUIRE_TIMEOUT_SECS", "10")?;

    let request_timeout_secs = parse_var(&lookup, "XGROWTH_REQUEST_TIMEOUT_SECS", "30")?;
    let user_agent = or_default("XGROWTH_USER_AGENT", "xgrowth/0.1 (inactive-cleaner)");
    let max_retries = parse_var(&lookup, "XGROWTH_MAX_RETRIES", "2")?;
    let retry_backoff_base_ms = parse_var(&lookup, "XGROWTH_RETRY_BACKOFF_BASE_MS", "1000")?;
    let refresh_cron = or_default("XGROWTH_REFRESH_CRON", "0 0 3 * * *");

    let cleaner = CleanerConfig {
        inactive_threshold_days: parse_var(&lookup, "XGROWTH_INACTIVE_THRESHOLD_DAYS", "180")?,
        max_unfollows_per_run: parse_var(&lookup, "XGROWTH_MAX_UNFOLLOWS_PER_RUN", "50")?,
        max_unfollows_per_day: parse_var(&lookup, "XGROWTH_MAX_UNFOLLOWS_PER_DAY", "100")?,
        min_unfollow_score: parse_var(&lookup, "XGROWTH_MIN_UNFOLLOW_SCORE", "50")?,
        protect_verified: parse_bool("XGROWTH_PROTECT_VERIFIED", "true")?,
        protect_high_followers: parse_bool("XGROWTH_PROTECT_HIGH_FOLLOWERS", "true")?,
        min_follower_threshold: parse_var(&lookup, "XGROWTH_MIN_FOLLOWER_THRESHOLD", "10000")?,
        probe_delay_ms: parse_var(&lookup, "XGROWTH_PROBE_DELAY_MS", "100")?,
        unfollow_delay_ms: parse_var(&lookup, "XGROWTH_UNFOLLOW_DELAY_MS", "2000")?,
        sync_page_delay_ms: parse_var(&lookup, "XGROWTH_SYNC_PAGE_DELAY_MS", "1000")?,
        probe_stale_after_days: parse_var(&lookup, "XGROWTH_PROBE_STALE_AFTER_DAYS", "7")?,
        probe_batch_size: parse_var(&lookup, "XGROWTH_PROBE_BATCH_SIZE", "1000")?,
    };

    if db_min_connections > db_max_connections {
        return Err(ConfigError::InvalidEnvVar {
            var: "XGROWTH_DB_MIN_CONNECTIONS".to_string(),
            reason: format!(
                "min connections ({db_min_connections}) exceeds max connections ({db_max_connections})"
            ),
        });
    }

    Ok(AppConfig {
        database_url,
        env,
        bind_addr,
        log_level,
        x_access_token,
        x_user_id,
        x_api_base_url,
        db_max_connections,
        db_min_connections,
        db_acquire_timeout_secs,
        request_timeout_secs,
        user_agent,
        max_retries,
        retry_backoff_base_ms,
        refresh_cron,
        cleaner,
    })
}

/// Read `var` (or `default` when unset) and parse it as `T`.
fn parse_var<F, T>(lookup: &F, var: &str, default: &str) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(var).unwrap_or_else(|_| default.to_string());
    raw.trim()
        .parse::<T>()
        .map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
}

/// Parse a string into an `Environment` variant.
///
/// # Errors
///
/// Returns `ConfigError::InvalidEnvVar` for anything other than
/// `development`, `test`, or `production`.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "XGROWTH_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
