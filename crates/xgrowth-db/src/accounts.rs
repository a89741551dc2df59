//! Account Store: one row per followed account.
//!
//! Reads go through the `account_overview` view so whitelist membership and
//! the effective score always come from the `whitelist` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use xgrowth_core::FollowedUser;

use crate::DbError;

/// Column list for `account_overview` selects.
pub(crate) const ACCOUNT_COLUMNS: &str = "\
    user_id, username, display_name, bio, location, url, profile_image_url, \
    platform_created_at, follower_count, following_count, tweet_count, listed_count, \
    like_count, verified, protected, last_tweet_id, last_tweet_date, last_tweet_text, \
    days_inactive, posting_frequency, engagement_estimate, first_seen_date, \
    last_checked_date, check_count, unfollow_score, is_mutual_follow, account_value_score, \
    unfollowed_date, unfollow_reason, updated_at, is_whitelisted, effective_score";

/// A row from the `account_overview` view.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct AccountRow {
    pub user_id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub url: Option<String>,
    pub profile_image_url: Option<String>,
    pub platform_created_at: Option<DateTime<Utc>>,
    pub follower_count: Option<i64>,
    pub following_count: Option<i64>,
    pub tweet_count: Option<i64>,
    pub listed_count: Option<i64>,
    pub like_count: Option<i64>,
    pub verified: bool,
    pub protected: bool,
    pub last_tweet_id: Option<String>,
    pub last_tweet_date: Option<DateTime<Utc>>,
    pub last_tweet_text: Option<String>,
    /// `None` means no post has been observed, which is different from zero.
    pub days_inactive: Option<i32>,
    /// Reserved; never used for scoring.
    pub posting_frequency: Option<f64>,
    /// Reserved; never used for scoring.
    pub engagement_estimate: Option<f64>,
    pub first_seen_date: DateTime<Utc>,
    pub last_checked_date: Option<DateTime<Utc>>,
    pub check_count: i32,
    /// Raw score as last computed; `None` until the first recompute.
    pub unfollow_score: Option<i32>,
    pub is_mutual_follow: bool,
    pub account_value_score: Option<f64>,
    pub unfollowed_date: Option<DateTime<Utc>>,
    pub unfollow_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
    pub is_whitelisted: bool,
    /// `-1000` when whitelisted, otherwise `unfollow_score`.
    pub effective_score: Option<i32>,
}

impl AccountRow {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        self.unfollowed_date.is_some()
    }
}

/// Filter for [`list_eligible_accounts`]. Terminated accounts are always
/// excluded.
#[derive(Debug, Clone, Copy, Default)]
pub struct EligibleFilter {
    /// Only accounts never checked or last checked before this instant.
    pub checked_before: Option<DateTime<Utc>>,
    pub min_score: Option<i32>,
    pub max_score: Option<i32>,
    pub limit: Option<i64>,
}

/// Inserts a followed account or refreshes its profile fields.
///
/// Conflicts on `user_id` update only profile and counter columns. Activity,
/// bookkeeping, score, and terminal columns are never written here, so new
/// rows start unchecked and existing rows keep their history.
///
/// Returns `true` when a new row was inserted.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert fails.
pub async fn upsert_account(pool: &PgPool, user: &FollowedUser) -> Result<bool, DbError> {
    let metrics = &user.public_metrics;

    // xmax = 0 only for freshly inserted tuples.
    let inserted: bool = sqlx::query_scalar::<_, bool>(
        "INSERT INTO accounts \
             (user_id, username, display_name, bio, location, url, profile_image_url, \
              platform_created_at, follower_count, following_count, tweet_count, \
              listed_count, like_count, verified, protected) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
         ON CONFLICT (user_id) DO UPDATE SET \
             username            = EXCLUDED.username, \
             display_name        = EXCLUDED.display_name, \
             bio                 = EXCLUDED.bio, \
             location            = EXCLUDED.location, \
             url                 = EXCLUDED.url, \
             profile_image_url   = EXCLUDED.profile_image_url, \
             platform_created_at = EXCLUDED.platform_created_at, \
             follower_count      = EXCLUDED.follower_count, \
             following_count     = EXCLUDED.following_count, \
             tweet_count         = EXCLUDED.tweet_count, \
             listed_count        = EXCLUDED.listed_count, \
             like_count          = EXCLUDED.like_count, \
             verified            = EXCLUDED.verified, \
             protected           = EXCLUDED.protected, \
             updated_at          = NOW() \
         RETURNING (xmax = 0)",
    )
    .bind(&user.id)
    .bind(&user.username)
    .bind(&user.name)
    .bind(&user.description)
    .bind(&user.location)
    .bind(&user.url)
    .bind(&user.profile_image_url)
    .bind(user.created_at)
    .bind(metrics.followers_count)
    .bind(metrics.following_count)
    .bind(metrics.tweet_count)
    .bind(metrics.listed_count)
    .bind(metrics.like_count)
    .bind(user.verified)
    .bind(user.protected)
    .fetch_one(pool)
    .await?;

    Ok(inserted)
}

/// Fetches one account by user id, terminal or not.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no row exists, or [`DbError::Sqlx`] if the
/// query fails.
pub async fn get_account(pool: &PgPool, user_id: &str) -> Result<AccountRow, DbError> {
    let sql = format!("SELECT {ACCOUNT_COLUMNS} FROM account_overview WHERE user_id = $1");
    sqlx::query_as::<_, AccountRow>(&sql)
        .bind(user_id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Looks up an account by username, case-insensitively.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_account_by_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<AccountRow>, DbError> {
    let sql = format!(
        "SELECT {ACCOUNT_COLUMNS} FROM account_overview \
         WHERE LOWER(username) = LOWER($1) \
         ORDER BY unfollowed_date IS NULL DESC, updated_at DESC \
         LIMIT 1"
    );
    let row = sqlx::query_as::<_, AccountRow>(&sql)
        .bind(username)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Returns currently followed accounts matching `filter`, largest audience first.
///
/// Score bounds compare against the stored raw score; unscored rows are
/// excluded whenever a bound is set.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_eligible_accounts(
    pool: &PgPool,
    filter: &EligibleFilter,
) -> Result<Vec<AccountRow>, DbError> {
    let sql = format!(
        "SELECT {ACCOUNT_COLUMNS} FROM account_overview \
         WHERE unfollowed_date IS NULL \
           AND ($1::timestamptz IS NULL OR last_checked_date IS NULL OR last_checked_date < $1) \
           AND ($2::int IS NULL OR unfollow_score >= $2) \
           AND ($3::int IS NULL OR unfollow_score <= $3) \
         ORDER BY follower_count DESC NULLS LAST, user_id \
         LIMIT $4"
    );
    let rows = sqlx::query_as::<_, AccountRow>(&sql)
        .bind(filter.checked_before)
        .bind(filter.min_score)
        .bind(filter.max_score)
        .bind(filter.limit)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Ids of currently followed accounts that are due for an activity probe:
/// never checked, or last checked before `stale_before`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_stale_account_ids(
    pool: &PgPool,
    stale_before: DateTime<Utc>,
    limit: i64,
) -> Result<Vec<String>, DbError> {
    let ids = sqlx::query_scalar::<_, String>(
        "SELECT user_id FROM accounts \
         WHERE unfollowed_date IS NULL \
           AND (last_checked_date IS NULL OR last_checked_date < $1) \
         ORDER BY follower_count DESC NULLS LAST, user_id \
         LIMIT $2",
    )
    .bind(stale_before)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(ids)
}
