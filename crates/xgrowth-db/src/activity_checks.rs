//! Probe writes and the append-only `activity_checks` log.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use crate::DbError;

/// A row from the `activity_checks` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ActivityCheckRow {
    pub id: i64,
    pub user_id: String,
    pub check_date: DateTime<Utc>,
    pub last_tweet_date: Option<DateTime<Utc>>,
    pub days_inactive: Option<i32>,
    pub follower_count: Option<i64>,
    pub tweet_count: Option<i64>,
    pub rate_limit_remaining: Option<i32>,
}

/// The most recent post seen for an account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservedPost {
    pub id: String,
    pub created_at: DateTime<Utc>,
    /// Already truncated by the caller.
    pub text: Option<String>,
}

/// What a successful probe learned about one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivityObservation {
    pub user_id: String,
    /// `None` when the account has no posts or no longer exists.
    pub post: Option<ObservedPost>,
    pub days_inactive: Option<i32>,
    pub rate_limit_remaining: Option<i32>,
}

/// Writes a probe result and its check record in one transaction.
///
/// The account update is guarded by `unfollowed_date IS NULL`; when the
/// account is terminal or missing nothing is written and `false` is returned.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement or the commit fails.
pub async fn record_activity_observation(
    pool: &PgPool,
    observation: &ActivityObservation,
) -> Result<bool, DbError> {
    let post = observation.post.as_ref();
    let mut tx = pool.begin().await?;

    let counters = sqlx::query_as::<_, (Option<i64>, Option<i64>)>(
        "UPDATE accounts SET \
             last_tweet_id     = $2, \
             last_tweet_date   = $3, \
             last_tweet_text   = $4, \
             days_inactive     = $5, \
             check_count       = check_count + 1, \
             last_checked_date = NOW(), \
             updated_at        = NOW() \
         WHERE user_id = $1 AND unfollowed_date IS NULL \
         RETURNING follower_count, tweet_count",
    )
    .bind(&observation.user_id)
    .bind(post.map(|p| p.id.as_str()))
    .bind(post.map(|p| p.created_at))
    .bind(post.and_then(|p| p.text.as_deref()))
    .bind(observation.days_inactive)
    .fetch_optional(&mut *tx)
    .await?;

    let Some((follower_count, tweet_count)) = counters else {
        tx.rollback().await?;
        return Ok(false);
    };

    sqlx::query(
        "INSERT INTO activity_checks \
             (user_id, last_tweet_date, days_inactive, follower_count, tweet_count, \
              rate_limit_remaining) \
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(&observation.user_id)
    .bind(post.map(|p| p.created_at))
    .bind(observation.days_inactive)
    .bind(follower_count)
    .bind(tweet_count)
    .bind(observation.rate_limit_remaining)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(true)
}

/// Counts an account as checked without recording an observation. Used when
/// the platform refuses to show the account's posts.
///
/// Returns `false` when the account is terminal or missing.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn mark_checked_without_observation(
    pool: &PgPool,
    user_id: &str,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE accounts SET \
             check_count       = check_count + 1, \
             last_checked_date = NOW(), \
             updated_at        = NOW() \
         WHERE user_id = $1 AND unfollowed_date IS NULL",
    )
    .bind(user_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Returns the most recent `limit` checks for one account, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_activity_checks(
    pool: &PgPool,
    user_id: &str,
    limit: i64,
) -> Result<Vec<ActivityCheckRow>, DbError> {
    let rows = sqlx::query_as::<_, ActivityCheckRow>(
        "SELECT id, user_id, check_date, last_tweet_date, days_inactive, \
                follower_count, tweet_count, rate_limit_remaining \
         FROM activity_checks \
         WHERE user_id = $1 \
         ORDER BY check_date DESC, id DESC \
         LIMIT $2",
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Number of check records written since `since`.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_checks_since(pool: &PgPool, since: DateTime<Utc>) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM activity_checks WHERE check_date > $1",
    )
    .bind(since)
    .fetch_one(pool)
    .await?;
    Ok(count)
}
