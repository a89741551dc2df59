//! Terminal marks and the append-only `unfollow_log` audit table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `unfollow_log` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UnfollowLogRow {
    pub id: i64,
    pub user_id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub unfollowed_date: DateTime<Utc>,
    pub days_inactive: Option<i32>,
    pub follower_count: Option<i64>,
    pub last_tweet_date: Option<DateTime<Utc>>,
    pub unfollow_score: Option<i32>,
    pub reason: String,
    pub batch_id: Uuid,
    pub can_rollback: bool,
}

/// Snapshot of a candidate at the moment it was unfollowed.
#[derive(Debug, Clone)]
pub struct NewUnfollowLogEntry<'a> {
    pub user_id: &'a str,
    pub username: &'a str,
    pub display_name: Option<&'a str>,
    pub days_inactive: Option<i32>,
    pub follower_count: Option<i64>,
    pub last_tweet_date: Option<DateTime<Utc>>,
    pub unfollow_score: Option<i32>,
    pub reason: &'a str,
    pub batch_id: Uuid,
}

const UNFOLLOW_LOG_COLUMNS: &str = "\
    id, user_id, username, display_name, unfollowed_date, days_inactive, follower_count, \
    last_tweet_date, unfollow_score, reason, batch_id, can_rollback";

/// Marks the account terminal and appends the audit entry in one transaction.
///
/// Returns `false` (and writes nothing) when the account is already terminal
/// or missing.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any statement or the commit fails.
pub async fn record_unfollow(
    pool: &PgPool,
    entry: &NewUnfollowLogEntry<'_>,
) -> Result<bool, DbError> {
    let mut tx = pool.begin().await?;

    let marked = sqlx::query(
        "UPDATE accounts SET \
             unfollowed_date = NOW(), \
             unfollow_reason = $2, \
             updated_at      = NOW() \
         WHERE user_id = $1 AND unfollowed_date IS NULL",
    )
    .bind(entry.user_id)
    .bind(entry.reason)
    .execute(&mut *tx)
    .await?;

    if marked.rows_affected() == 0 {
        tx.rollback().await?;
        return Ok(false);
    }

    sqlx::query(
        "INSERT INTO unfollow_log \
             (user_id, username, display_name, days_inactive, follower_count, \
              last_tweet_date, unfollow_score, reason, batch_id) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(entry.user_id)
    .bind(entry.username)
    .bind(entry.display_name)
    .bind(entry.days_inactive)
    .bind(entry.follower_count)
    .bind(entry.last_tweet_date)
    .bind(entry.unfollow_score)
    .bind(entry.reason)
    .bind(entry.batch_id)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(true)
}

/// Marks the account terminal without an audit entry. Used when the platform
/// reports the follow relationship no longer exists.
///
/// Returns `false` when the account is already terminal or missing.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn mark_unfollowed_without_log(
    pool: &PgPool,
    user_id: &str,
    reason: &str,
) -> Result<bool, DbError> {
    let result = sqlx::query(
        "UPDATE accounts SET \
             unfollowed_date = NOW(), \
             unfollow_reason = $2, \
             updated_at      = NOW() \
         WHERE user_id = $1 AND unfollowed_date IS NULL",
    )
    .bind(user_id)
    .bind(reason)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Number of accounts marked unfollowed since `since`. Feeds the per-day cap.
///
/// Counts from `accounts` rather than the audit log so follows found already
/// gone (marked terminal without a log entry) also use up the day's budget.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_unfollows_since(pool: &PgPool, since: DateTime<Utc>) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM accounts WHERE unfollowed_date > $1",
    )
    .bind(since)
    .fetch_one(pool)
    .await?;
    Ok(count)
}

/// Returns the most recent `limit` audit entries, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_recent_unfollows(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<UnfollowLogRow>, DbError> {
    let sql = format!(
        "SELECT {UNFOLLOW_LOG_COLUMNS} FROM unfollow_log \
         ORDER BY unfollowed_date DESC, id DESC \
         LIMIT $1"
    );
    let rows = sqlx::query_as::<_, UnfollowLogRow>(&sql)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// Returns every audit entry written by one executor run, in write order.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_unfollows_by_batch(
    pool: &PgPool,
    batch_id: Uuid,
) -> Result<Vec<UnfollowLogRow>, DbError> {
    let sql = format!(
        "SELECT {UNFOLLOW_LOG_COLUMNS} FROM unfollow_log \
         WHERE batch_id = $1 \
         ORDER BY id"
    );
    let rows = sqlx::query_as::<_, UnfollowLogRow>(&sql)
        .bind(batch_id)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}
