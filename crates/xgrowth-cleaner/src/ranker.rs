//! Candidate ranking.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use xgrowth_core::{CleanerConfig, ProtectionPolicy};
use xgrowth_db::AccountRow;

use crate::error::CleanerError;

/// An account selected for removal, with the attributes the executor logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
    pub user_id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub days_inactive: Option<i32>,
    pub follower_count: Option<i64>,
    pub tweet_count: Option<i64>,
    pub last_tweet_date: Option<DateTime<Utc>>,
    pub verified: bool,
    pub unfollow_score: i32,
}

impl Candidate {
    /// Audit reason, e.g. `Inactive for 400 days (score: 135)`.
    #[must_use]
    pub fn reason(&self) -> String {
        match self.days_inactive {
            Some(days) => format!(
                "Inactive for {days} days (score: {})",
                self.unfollow_score
            ),
            None => format!("No recorded posts (score: {})", self.unfollow_score),
        }
    }
}

impl From<AccountRow> for Candidate {
    fn from(row: AccountRow) -> Self {
        Self {
            unfollow_score: row.effective_score.unwrap_or_default(),
            user_id: row.user_id,
            username: row.username,
            display_name: row.display_name,
            days_inactive: row.days_inactive,
            follower_count: row.follower_count,
            tweet_count: row.tweet_count,
            last_tweet_date: row.last_tweet_date,
            verified: row.verified,
        }
    }
}

pub struct CandidateRanker<'a> {
    pool: &'a PgPool,
    default_limit: u32,
    default_min_score: i32,
    policy: ProtectionPolicy,
}

impl<'a> CandidateRanker<'a> {
    #[must_use]
    pub fn new(pool: &'a PgPool, config: &CleanerConfig) -> Self {
        Self {
            pool,
            default_limit: config.max_unfollows_per_run,
            default_min_score: config.min_unfollow_score,
            policy: config.protection_policy(),
        }
    }

    #[must_use]
    pub fn with_policy(mut self, policy: ProtectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Top candidates, best first. `None` falls back to the configured per-run
    /// cap and score threshold.
    ///
    /// # Errors
    ///
    /// Returns [`CleanerError::Db`] if the query fails.
    pub async fn rank(
        &self,
        limit: Option<u32>,
        min_score: Option<i32>,
    ) -> Result<Vec<Candidate>, CleanerError> {
        let limit = limit.unwrap_or(self.default_limit);
        let min_score = min_score.unwrap_or(self.default_min_score);
        if limit == 0 {
            return Ok(Vec::new());
        }

        let rows = xgrowth_db::list_unfollow_candidates(
            self.pool,
            min_score,
            self.policy,
            i64::from(limit),
        )
        .await?;
        tracing::debug!(count = rows.len(), limit, min_score, "ranked unfollow candidates");
        Ok(rows.into_iter().map(Candidate::from).collect())
    }
}
