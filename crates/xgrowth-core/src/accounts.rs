use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Public counters attached to a user object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicMetrics {
    #[serde(default)]
    pub followers_count: Option<i64>,
    #[serde(default)]
    pub following_count: Option<i64>,
    #[serde(default)]
    pub tweet_count: Option<i64>,
    #[serde(default)]
    pub listed_count: Option<i64>,
    #[serde(default)]
    pub like_count: Option<i64>,
}

/// A followed account's profile as reported by the platform.
///
/// Field names mirror the X API v2 user object so the gateway can deserialize
/// straight into this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowedUser {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub profile_image_url: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub protected: bool,
    #[serde(default)]
    pub public_metrics: PublicMetrics,
}

impl FollowedUser {
    /// Minimal profile with only identity set. Mostly useful in tests.
    #[must_use]
    pub fn new(id: impl Into<String>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            name: None,
            description: None,
            location: None,
            url: None,
            profile_image_url: None,
            created_at: None,
            verified: false,
            protected: false,
            public_metrics: PublicMetrics::default(),
        }
    }
}

/// Exclusions applied to the candidate query on top of the whitelist.
///
/// Unlike whitelisting, a policy never writes anything; it only narrows which
/// accounts the ranker may return.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProtectionPolicy {
    pub exclude_verified: bool,
    /// Accounts with at least this many followers are excluded.
    pub max_follower_count: Option<i64>,
}

impl ProtectionPolicy {
    /// A policy that excludes nothing.
    #[must_use]
    pub const fn none() -> Self {
        Self {
            exclude_verified: false,
            max_follower_count: None,
        }
    }
}

/// Predicates for bulk whitelisting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AutoWhitelistRule {
    Verified,
    MinFollowers(i64),
}
