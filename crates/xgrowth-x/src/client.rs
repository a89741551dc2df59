//! HTTP client for the X API v2.
//!
//! Wraps `reqwest` with bearer authentication, typed status mapping, and
//! retry on transient failures. Rate-limit metadata from every response is
//! surfaced as [`Quota`].

use std::time::Duration;

use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use xgrowth_core::{AppConfig, FollowedUser};

use crate::error::XError;
use crate::gateway::Gateway;
use crate::retry::retry_with_backoff;
use crate::types::{Envelope, FollowingPage, FollowingState, LatestPost, Post, Quota};

const DEFAULT_BASE_URL: &str = "https://api.twitter.com/2/";
const USER_FIELDS: &str =
    "created_at,description,location,profile_image_url,protected,public_metrics,url,verified";
const FOLLOWING_PAGE_SIZE: &str = "1000";
// The timeline endpoint rejects max_results below 5.
const TIMELINE_PAGE_SIZE: &str = "5";

/// Transport settings for [`XClient`].
#[derive(Debug, Clone)]
pub struct ClientOptions {
    pub base_url: String,
    pub timeout_secs: u64,
    pub user_agent: String,
    pub max_retries: u32,
    pub retry_backoff_base_ms: u64,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout_secs: 30,
            user_agent: "xgrowth/0.1 (inactive-cleaner)".to_string(),
            max_retries: 2,
            retry_backoff_base_ms: 1_000,
        }
    }
}

impl ClientOptions {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            base_url: config.x_api_base_url.clone(),
            timeout_secs: config.request_timeout_secs,
            user_agent: config.user_agent.clone(),
            max_retries: config.max_retries,
            retry_backoff_base_ms: config.retry_backoff_base_ms,
        }
    }
}

/// Client for the X API v2, acting on behalf of one tracked account.
pub struct XClient {
    client: Client,
    base_url: Url,
    access_token: String,
    user_id: String,
    max_retries: u32,
    retry_backoff_base_ms: u64,
}

impl std::fmt::Debug for XClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XClient")
            .field("base_url", &self.base_url.as_str())
            .field("user_id", &self.user_id)
            .field("access_token", &"[redacted]")
            .finish_non_exhaustive()
    }
}

impl XClient {
    /// Creates a client for the account `user_id` using `access_token`.
    ///
    /// # Errors
    ///
    /// Returns [`XError::Http`] if the underlying `reqwest::Client` cannot be
    /// constructed, or [`XError::InvalidBaseUrl`] if the base URL is unusable.
    pub fn new(
        access_token: &str,
        user_id: &str,
        options: &ClientOptions,
    ) -> Result<Self, XError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(options.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(options.user_agent.as_str())
            .build()?;

        // A trailing slash keeps the last base segment when paths are appended.
        let normalised = format!("{}/", options.base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| XError::InvalidBaseUrl {
            base_url: options.base_url.clone(),
            reason: e.to_string(),
        })?;
        if base_url.cannot_be_a_base() {
            return Err(XError::InvalidBaseUrl {
                base_url: options.base_url.clone(),
                reason: "URL cannot be used as a base".to_string(),
            });
        }

        Ok(Self {
            client,
            base_url,
            access_token: access_token.to_owned(),
            user_id: user_id.to_owned(),
            max_retries: options.max_retries,
            retry_backoff_base_ms: options.retry_backoff_base_ms,
        })
    }

    /// Builds a client from application config.
    ///
    /// # Errors
    ///
    /// Returns [`XError::MissingCredentials`] when `X_ACCESS_TOKEN` or
    /// `X_USER_ID` is unset, plus anything [`XClient::new`] returns.
    pub fn from_app_config(config: &AppConfig) -> Result<Self, XError> {
        let token = config
            .x_access_token
            .as_deref()
            .ok_or(XError::MissingCredentials("X_ACCESS_TOKEN"))?;
        let user_id = config
            .x_user_id
            .as_deref()
            .ok_or(XError::MissingCredentials("X_USER_ID"))?;
        Self::new(token, user_id, &ClientOptions::from_app_config(config))
    }

    /// Id of the account this client acts for.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Appends `segments` (each percent-encoded) and `query` to the base URL.
    fn endpoint(&self, segments: &[&str], query: &[(&str, &str)]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (k, v) in query {
                pairs.append_pair(k, v);
            }
        }
        url
    }

    /// Sends an authenticated request with retry and maps the status code.
    ///
    /// Returns the parsed body envelope and the response's quota headers.
    async fn request<T: DeserializeOwned + Send>(
        &self,
        method: Method,
        url: Url,
        resource: &str,
    ) -> Result<(Envelope<T>, Quota), XError> {
        retry_with_backoff(self.max_retries, self.retry_backoff_base_ms, || {
            let method = method.clone();
            let url = url.clone();
            async move {
                let response = self
                    .client
                    .request(method, url.clone())
                    .bearer_auth(&self.access_token)
                    .send()
                    .await?;
                let status = response.status();
                let quota = Quota::from_headers(response.headers());

                match status {
                    StatusCode::TOO_MANY_REQUESTS => {
                        return Err(XError::RateLimited {
                            reset_at: quota.reset_at,
                        });
                    }
                    StatusCode::NOT_FOUND => {
                        return Err(XError::NotFound {
                            resource: resource.to_owned(),
                            rate_limit_remaining: quota.remaining,
                        });
                    }
                    StatusCode::UNAUTHORIZED => {
                        return Err(XError::Unauthorized {
                            resource: resource.to_owned(),
                        });
                    }
                    s if !s.is_success() => {
                        return Err(XError::UnexpectedStatus {
                            status: s.as_u16(),
                            url: url.to_string(),
                        });
                    }
                    _ => {}
                }

                let body = response.text().await?;
                let envelope = serde_json::from_str::<Envelope<T>>(&body).map_err(|e| {
                    XError::Deserialize {
                        context: resource.to_owned(),
                        source: e,
                    }
                })?;
                Ok((envelope, quota))
            }
        })
        .await
    }

    /// Maps a 200 response without `data` to the error its `errors` array
    /// describes, if any.
    fn partial_error<T>(envelope: &Envelope<T>, resource: &str, quota: Quota) -> Option<XError> {
        if envelope.errors.iter().any(crate::types::ApiProblem::is_not_found) {
            return Some(XError::NotFound {
                resource: resource.to_owned(),
                rate_limit_remaining: quota.remaining,
            });
        }
        if envelope
            .errors
            .iter()
            .any(crate::types::ApiProblem::is_authorization)
        {
            return Some(XError::Unauthorized {
                resource: resource.to_owned(),
            });
        }
        None
    }
}

impl Gateway for XClient {
    async fn list_following(&self, cursor: Option<&str>) -> Result<FollowingPage, XError> {
        let mut query = vec![
            ("max_results", FOLLOWING_PAGE_SIZE),
            ("user.fields", USER_FIELDS),
        ];
        if let Some(token) = cursor {
            query.push(("pagination_token", token));
        }
        let url = self.endpoint(&["users", self.user_id.as_str(), "following"], &query);
        let resource = format!("following of {}", self.user_id);

        let (envelope, quota) = self
            .request::<Vec<FollowedUser>>(Method::GET, url, &resource)
            .await?;
        if envelope.data.is_none() {
            if let Some(err) = Self::partial_error(&envelope, &resource, quota) {
                return Err(err);
            }
        }

        Ok(FollowingPage {
            users: envelope.data.unwrap_or_default(),
            next_cursor: envelope.meta.and_then(|m| m.next_token),
            quota,
        })
    }

    async fn get_latest_post(&self, user_id: &str) -> Result<LatestPost, XError> {
        let url = self.endpoint(
            &["users", user_id, "tweets"],
            &[
                ("max_results", TIMELINE_PAGE_SIZE),
                ("tweet.fields", "created_at"),
            ],
        );
        let resource = format!("posts of {user_id}");

        let (envelope, quota) = self
            .request::<Vec<Post>>(Method::GET, url, &resource)
            .await?;
        if envelope.data.is_none() {
            if let Some(err) = Self::partial_error(&envelope, &resource, quota) {
                return Err(err);
            }
        }

        let post = envelope
            .data
            .unwrap_or_default()
            .into_iter()
            .max_by_key(|p| p.created_at);
        Ok(LatestPost { post, quota })
    }

    async fn unfollow(&self, user_id: &str) -> Result<Quota, XError> {
        let url = self.endpoint(&["users", self.user_id.as_str(), "following", user_id], &[]);
        let resource = format!("follow of {user_id}");

        let (envelope, quota) = self
            .request::<FollowingState>(Method::DELETE, url, &resource)
            .await?;
        if envelope.data.is_some_and(|state| state.following) {
            tracing::warn!(user_id, "unfollow acknowledged but still following");
            return Err(XError::StillFollowing {
                user_id: user_id.to_string(),
            });
        }
        Ok(quota)
    }

    async fn lookup_user(&self, username: &str) -> Result<FollowedUser, XError> {
        let handle = username.trim_start_matches('@');
        let url = self.endpoint(
            &["users", "by", "username", handle],
            &[("user.fields", USER_FIELDS)],
        );
        let resource = format!("user @{handle}");

        let (envelope, quota) = self
            .request::<FollowedUser>(Method::GET, url, &resource)
            .await?;
        match envelope.data {
            Some(user) => Ok(user),
            None => Err(
                Self::partial_error(&envelope, &resource, quota).unwrap_or(XError::NotFound {
                    resource,
                    rate_limit_remaining: quota.remaining,
                }),
            ),
        }
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
