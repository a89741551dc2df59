//! X API v2 response types and the client-facing results built from them.

use chrono::{DateTime, Utc};
use reqwest::header::HeaderMap;
use serde::Deserialize;
use xgrowth_core::FollowedUser;

/// Rate-limit state reported alongside a response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Quota {
    pub remaining: Option<i32>,
    pub reset_at: Option<DateTime<Utc>>,
}

impl Quota {
    /// Reads `x-rate-limit-remaining` and `x-rate-limit-reset` (epoch seconds).
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
        };
        Self {
            remaining: header("x-rate-limit-remaining").and_then(|v| v.parse().ok()),
            reset_at: header("x-rate-limit-reset")
                .and_then(|v| v.parse::<i64>().ok())
                .and_then(|secs| DateTime::from_timestamp(secs, 0)),
        }
    }
}

/// A post as returned with `tweet.fields=created_at`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Post {
    pub id: String,
    #[serde(default)]
    pub text: String,
    pub created_at: DateTime<Utc>,
}

/// Result of a latest-post lookup. `post` is `None` when the account has
/// never posted (or the timeline is empty).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestPost {
    pub post: Option<Post>,
    pub quota: Quota,
}

/// One page of the tracked account's following list.
#[derive(Debug, Clone)]
pub struct FollowingPage {
    pub users: Vec<FollowedUser>,
    pub next_cursor: Option<String>,
    pub quota: Quota,
}

// ---------------------------------------------------------------------------
// Wire envelopes
// ---------------------------------------------------------------------------

/// Standard v2 envelope: `{ "data": ..., "meta": ..., "errors": [...] }`.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub meta: Option<PageMeta>,
    #[serde(default)]
    pub errors: Vec<ApiProblem>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PageMeta {
    #[serde(default)]
    pub next_token: Option<String>,
}

/// Partial-error entry returned with HTTP 200.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiProblem {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
}

impl ApiProblem {
    pub(crate) fn is_not_found(&self) -> bool {
        self.title.as_deref() == Some("Not Found Error")
            || self
                .kind
                .as_deref()
                .is_some_and(|k| k.ends_with("resource-not-found"))
    }

    pub(crate) fn is_authorization(&self) -> bool {
        self.title.as_deref() == Some("Authorization Error")
            || self
                .kind
                .as_deref()
                .is_some_and(|k| k.ends_with("not-authorized-for-resource"))
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct FollowingState {
    pub following: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn quota_reads_rate_limit_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-rate-limit-remaining", HeaderValue::from_static("42"));
        headers.insert("x-rate-limit-reset", HeaderValue::from_static("1700000000"));
        let quota = Quota::from_headers(&headers);
        assert_eq!(quota.remaining, Some(42));
        assert_eq!(quota.reset_at.map(|t| t.timestamp()), Some(1_700_000_000));
    }

    #[test]
    fn quota_tolerates_missing_or_garbage_headers() {
        let mut headers = HeaderMap::new();
        headers.insert("x-rate-limit-remaining", HeaderValue::from_static("lots"));
        assert_eq!(Quota::from_headers(&headers), Quota::default());
    }

    #[test]
    fn envelope_parses_partial_not_found() {
        let body = serde_json::json!({
            "errors": [{
                "title": "Not Found Error",
                "type": "https://api.twitter.com/2/problems/resource-not-found",
                "detail": "Could not find user with id: [1]."
            }]
        });
        let envelope: Envelope<Vec<Post>> = serde_json::from_value(body).unwrap();
        assert!(envelope.data.is_none());
        assert!(envelope.errors[0].is_not_found());
        assert!(!envelope.errors[0].is_authorization());
    }

    #[test]
    fn envelope_without_data_parses_for_any_payload() {
        let body = serde_json::json!({
            "errors": [{
                "title": "Authorization Error",
                "type": "https://api.twitter.com/2/problems/not-authorized-for-resource",
                "detail": "Sorry, you are not authorized to see the user with id: [2]."
            }]
        });
        let envelope: Envelope<FollowingState> = serde_json::from_value(body).unwrap();
        assert!(envelope.data.is_none());
        assert!(envelope.meta.is_none());
        assert!(envelope.errors[0].is_authorization());

        let ack: Envelope<FollowingState> =
            serde_json::from_value(serde_json::json!({ "data": { "following": false } })).unwrap();
        assert!(!ack.data.unwrap().following);
    }
}
