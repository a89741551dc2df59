//! Whitelist persistence.
//!
//! Membership in this table is the only record of protection. Accounts read
//! as whitelisted, with the sentinel effective score, through the
//! `account_overview` view.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use xgrowth_core::AutoWhitelistRule;

use crate::accounts::{AccountRow, ACCOUNT_COLUMNS};
use crate::DbError;

/// A row from the `whitelist` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct WhitelistRow {
    pub user_id: String,
    pub username: String,
    pub display_name: Option<String>,
    pub reason: Option<String>,
    pub added_date: DateTime<Utc>,
    pub added_by: String,
    pub is_permanent: bool,
}

#[derive(Debug, Clone)]
pub struct NewWhitelistEntry<'a> {
    pub user_id: &'a str,
    pub username: &'a str,
    pub display_name: Option<&'a str>,
    pub reason: &'a str,
    pub added_by: &'a str,
}

const WHITELIST_COLUMNS: &str =
    "user_id, username, display_name, reason, added_date, added_by, is_permanent";

/// Adds or replaces a whitelist entry.
///
/// Adding an existing member replaces its username, reason, and `added_date`;
/// there is never more than one entry per user id.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the upsert or commit fails.
pub async fn add_to_whitelist(
    pool: &PgPool,
    entry: &NewWhitelistEntry<'_>,
) -> Result<WhitelistRow, DbError> {
    let mut tx = pool.begin().await?;

    let sql = format!(
        "INSERT INTO whitelist (user_id, username, display_name, reason, added_by) \
         VALUES ($1, $2, \
                 COALESCE($3, (SELECT display_name FROM accounts WHERE user_id = $1)), \
                 $4, $5) \
         ON CONFLICT (user_id) DO UPDATE SET \
             username     = EXCLUDED.username, \
             display_name = COALESCE(EXCLUDED.display_name, whitelist.display_name), \
             reason       = EXCLUDED.reason, \
             added_by     = EXCLUDED.added_by, \
             added_date   = NOW() \
         RETURNING {WHITELIST_COLUMNS}"
    );
    let row = sqlx::query_as::<_, WhitelistRow>(&sql)
        .bind(entry.user_id)
        .bind(entry.username)
        .bind(entry.display_name)
        .bind(entry.reason)
        .bind(entry.added_by)
        .fetch_one(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(row)
}

/// Deletes a whitelist entry. Returns `false` if `user_id` was not a member.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the delete fails.
pub async fn remove_from_whitelist(pool: &PgPool, user_id: &str) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM whitelist WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn is_whitelisted(pool: &PgPool, user_id: &str) -> Result<bool, DbError> {
    let exists = sqlx::query_scalar::<_, bool>(
        "SELECT EXISTS (SELECT 1 FROM whitelist WHERE user_id = $1)",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_whitelist_entry(
    pool: &PgPool,
    user_id: &str,
) -> Result<Option<WhitelistRow>, DbError> {
    let sql = format!("SELECT {WHITELIST_COLUMNS} FROM whitelist WHERE user_id = $1");
    let row = sqlx::query_as::<_, WhitelistRow>(&sql)
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Looks up an entry by username, case-insensitively.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn find_whitelist_entry_by_username(
    pool: &PgPool,
    username: &str,
) -> Result<Option<WhitelistRow>, DbError> {
    let sql = format!(
        "SELECT {WHITELIST_COLUMNS} FROM whitelist \
         WHERE LOWER(username) = LOWER($1) \
         ORDER BY added_date DESC \
         LIMIT 1"
    );
    let row = sqlx::query_as::<_, WhitelistRow>(&sql)
        .bind(username)
        .fetch_optional(pool)
        .await?;
    Ok(row)
}

/// Returns all entries, most recently added first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_whitelist(pool: &PgPool) -> Result<Vec<WhitelistRow>, DbError> {
    let sql = format!(
        "SELECT {WHITELIST_COLUMNS} FROM whitelist ORDER BY added_date DESC, user_id"
    );
    let rows = sqlx::query_as::<_, WhitelistRow>(&sql)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}

/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn count_whitelist(pool: &PgPool) -> Result<i64, DbError> {
    let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM whitelist")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Whitelists every currently followed, not yet protected account matching
/// `rule` in a single `INSERT .. SELECT`. Returns the number of entries added.
///
/// Entries record `added_by = 'auto'` and a reason naming the rule; the
/// follower rule includes the account's follower count.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the statement fails.
pub async fn auto_whitelist(pool: &PgPool, rule: AutoWhitelistRule) -> Result<u64, DbError> {
    let (verified_only, min_followers) = match rule {
        AutoWhitelistRule::Verified => (true, None),
        AutoWhitelistRule::MinFollowers(n) => (false, Some(n)),
    };

    let result = sqlx::query(
        "INSERT INTO whitelist (user_id, username, display_name, reason, added_by) \
         SELECT a.user_id, a.username, a.display_name, \
                CASE WHEN $1 THEN 'Auto-added: Verified account' \
                     ELSE format('Auto-added: High influence (%s followers)', \
                                 COALESCE(a.follower_count, 0)) \
                END, \
                'auto' \
         FROM accounts a \
         WHERE a.unfollowed_date IS NULL \
           AND (NOT $1 OR a.verified) \
           AND ($2::bigint IS NULL OR COALESCE(a.follower_count, 0) >= $2) \
         ON CONFLICT (user_id) DO NOTHING",
    )
    .bind(verified_only)
    .bind(min_followers)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

/// Accounts worth protecting that are not yet whitelisted: verified, more
/// than 50 000 followers, or more than 10 000 followers and active within
/// the last 30 days. Largest audience first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn suggest_whitelist_candidates(
    pool: &PgPool,
    limit: i64,
) -> Result<Vec<AccountRow>, DbError> {
    let sql = format!(
        "SELECT {ACCOUNT_COLUMNS} FROM account_overview \
         WHERE unfollowed_date IS NULL \
           AND NOT is_whitelisted \
           AND ( \
               verified \
               OR follower_count > 50000 \
               OR (follower_count > 10000 AND days_inactive < 30) \
           ) \
         ORDER BY follower_count DESC NULLS LAST, user_id \
         LIMIT $1"
    );
    let rows = sqlx::query_as::<_, AccountRow>(&sql)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}
