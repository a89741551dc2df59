use chrono::{DateTime, Utc};
use thiserror::Error;

/// Errors returned by the X API client.
#[derive(Debug, Error)]
pub enum XError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// HTTP 429. The window resets at `reset_at` when the API reports it.
    #[error("rate limited by the X API (reset at {reset_at:?})")]
    RateLimited { reset_at: Option<DateTime<Utc>> },

    /// HTTP 404, or a 200 whose body reports the resource does not exist.
    #[error("not found: {resource}")]
    NotFound {
        resource: String,
        rate_limit_remaining: Option<i32>,
    },

    /// HTTP 401. For post lookups this usually means a protected account.
    #[error("unauthorized: {resource}")]
    Unauthorized { resource: String },

    /// The API answered an unfollow with `following: true`.
    #[error("unfollow of {user_id} not confirmed: still following")]
    StillFollowing { user_id: String },

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    #[error("invalid base URL \"{base_url}\": {reason}")]
    InvalidBaseUrl { base_url: String, reason: String },

    #[error("missing X API credential: {0} is not set")]
    MissingCredentials(&'static str),
}

impl XError {
    #[must_use]
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}
