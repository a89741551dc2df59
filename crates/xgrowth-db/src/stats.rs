//! Aggregate read model for dashboards and reports.

use chrono::{Duration, Utc};
use serde::Serialize;
use sqlx::PgPool;
use xgrowth_core::ProtectionPolicy;

use crate::DbError;

/// Counts by inactivity bracket plus pipeline totals.
///
/// Brackets overlap at their edges (an account inactive exactly 180 days is
/// counted in both the 6-month and 3-month buckets), matching how operators
/// have always read these numbers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, sqlx::FromRow)]
pub struct CleanerStats {
    pub total_following: i64,
    pub dead_1year: i64,
    pub inactive_6months: i64,
    pub inactive_3months: i64,
    pub active: i64,
    pub unchecked: i64,
    pub unfollow_candidates: i64,
    pub whitelisted_accounts: i64,
    pub total_unfollowed: i64,
    pub checks_last_24h: i64,
}

/// Computes [`CleanerStats`] in one round trip.
///
/// `unfollow_candidates` uses the same predicate as
/// [`list_unfollow_candidates`](crate::list_unfollow_candidates): `min_score`
/// is the threshold, whitelisted accounts never count, and `policy` excludes
/// protected accounts.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_cleaner_stats(
    pool: &PgPool,
    min_score: i32,
    policy: ProtectionPolicy,
) -> Result<CleanerStats, DbError> {
    let since = Utc::now() - Duration::hours(24);

    let stats = sqlx::query_as::<_, CleanerStats>(
        "SELECT \
             COUNT(*) AS total_following, \
             COUNT(*) FILTER (WHERE days_inactive > 365) AS dead_1year, \
             COUNT(*) FILTER (WHERE days_inactive BETWEEN 180 AND 365) AS inactive_6months, \
             COUNT(*) FILTER (WHERE days_inactive BETWEEN 90 AND 180) AS inactive_3months, \
             COUNT(*) FILTER (WHERE days_inactive < 90) AS active, \
             COUNT(*) FILTER (WHERE days_inactive IS NULL) AS unchecked, \
             COUNT(*) FILTER ( \
                 WHERE NOT is_whitelisted \
                   AND unfollow_score >= $1 \
                   AND (NOT $2 OR NOT verified) \
                   AND ($3::bigint IS NULL OR COALESCE(follower_count, 0) < $3) \
             ) AS unfollow_candidates, \
             (SELECT COUNT(*) FROM whitelist) AS whitelisted_accounts, \
             (SELECT COUNT(*) FROM unfollow_log) AS total_unfollowed, \
             (SELECT COUNT(*) FROM activity_checks WHERE check_date > $4) AS checks_last_24h \
         FROM account_overview \
         WHERE unfollowed_date IS NULL",
    )
    .bind(min_score)
    .bind(policy.exclude_verified)
    .bind(policy.max_follower_count)
    .bind(since)
    .fetch_one(pool)
    .await?;

    Ok(stats)
}
