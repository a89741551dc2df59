//! Candidate query for the ranker.

use sqlx::PgPool;
use xgrowth_core::ProtectionPolicy;

use crate::accounts::{AccountRow, ACCOUNT_COLUMNS};
use crate::DbError;

/// Returns currently followed, non-whitelisted accounts scoring at least
/// `min_score`, best candidates first.
///
/// Ordering is fully deterministic: score descending, then `days_inactive`
/// descending with unknowns last, then `user_id` ascending. `policy` narrows
/// the set further without touching the whitelist.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_unfollow_candidates(
    pool: &PgPool,
    min_score: i32,
    policy: ProtectionPolicy,
    limit: i64,
) -> Result<Vec<AccountRow>, DbError> {
    let sql = format!(
        "SELECT {ACCOUNT_COLUMNS} FROM account_overview \
         WHERE unfollowed_date IS NULL \
           AND NOT is_whitelisted \
           AND unfollow_score IS NOT NULL \
           AND unfollow_score >= $1 \
           AND (NOT $2 OR NOT verified) \
           AND ($3::bigint IS NULL OR COALESCE(follower_count, 0) < $3) \
         ORDER BY unfollow_score DESC, days_inactive DESC NULLS LAST, user_id ASC \
         LIMIT $4"
    );
    let rows = sqlx::query_as::<_, AccountRow>(&sql)
        .bind(min_score)
        .bind(policy.exclude_verified)
        .bind(policy.max_follower_count)
        .bind(limit.max(0))
        .fetch_all(pool)
        .await?;
    Ok(rows)
}
