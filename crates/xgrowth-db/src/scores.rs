//! Score persistence for the recompute pass.

use sqlx::PgPool;

use crate::DbError;

/// The attributes the score engine reads, for one currently followed account.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ScoreSourceRow {
    pub user_id: String,
    pub is_whitelisted: bool,
    pub days_inactive: Option<i32>,
    pub follower_count: Option<i64>,
    pub tweet_count: Option<i64>,
    pub verified: bool,
    pub protected: bool,
    pub profile_image_url: Option<String>,
}

/// Loads score inputs for every account that has not been unfollowed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_score_sources(pool: &PgPool) -> Result<Vec<ScoreSourceRow>, DbError> {
    let rows = sqlx::query_as::<_, ScoreSourceRow>(
        "SELECT user_id, is_whitelisted, days_inactive, follower_count, tweet_count, \
                verified, protected, profile_image_url \
         FROM account_overview \
         WHERE unfollowed_date IS NULL \
         ORDER BY user_id",
    )
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Persists raw scores in a single statement.
///
/// Rows that became terminal since the scores were computed are skipped.
/// Returns the number of rows updated.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the update fails.
pub async fn update_unfollow_scores(
    pool: &PgPool,
    scores: &[(String, i32)],
) -> Result<u64, DbError> {
    if scores.is_empty() {
        return Ok(0);
    }

    let (user_ids, values): (Vec<String>, Vec<i32>) = scores.iter().cloned().unzip();

    let result = sqlx::query(
        "UPDATE accounts AS a SET \
             unfollow_score = v.score, \
             updated_at     = NOW() \
         FROM UNNEST($1::text[], $2::int[]) AS v(user_id, score) \
         WHERE a.user_id = v.user_id AND a.unfollowed_date IS NULL",
    )
    .bind(&user_ids)
    .bind(&values)
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}
