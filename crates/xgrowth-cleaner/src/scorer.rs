use sqlx::PgPool;
use xgrowth_core::{raw_score, ScoreInput};
use xgrowth_db::ScoreSourceRow;

use crate::error::CleanerError;

#[must_use]
pub fn score_input(row: &ScoreSourceRow) -> ScoreInput<'_> {
    ScoreInput {
        is_whitelisted: row.is_whitelisted,
        days_inactive: row.days_inactive,
        follower_count: row.follower_count,
        tweet_count: row.tweet_count,
        verified: row.verified,
        protected: row.protected,
        profile_image_url: row.profile_image_url.as_deref(),
    }
}

/// Rescores every account that has not been unfollowed and returns how many
/// rows were written.
///
/// The raw score is stored even for whitelisted accounts; membership is
/// applied when scores are read. Running it twice writes the same values.
///
/// # Errors
///
/// Returns [`CleanerError::Db`] if loading or persisting scores fails.
pub async fn recompute_all(pool: &PgPool) -> Result<u64, CleanerError> {
    let sources = xgrowth_db::list_score_sources(pool).await?;
    let scores: Vec<(String, i32)> = sources
        .iter()
        .map(|row| (row.user_id.clone(), raw_score(&score_input(row))))
        .collect();

    let updated = xgrowth_db::update_unfollow_scores(pool, &scores).await?;
    tracing::info!(accounts = sources.len(), updated, "recomputed unfollow scores");
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use xgrowth_core::{score, SENTINEL_NEVER};

    fn row() -> ScoreSourceRow {
        ScoreSourceRow {
            user_id: "1".to_string(),
            is_whitelisted: false,
            days_inactive: Some(400),
            follower_count: Some(20),
            tweet_count: Some(3),
            verified: false,
            protected: false,
            profile_image_url: Some("https://pbs.twimg.com/profile_images/1/me.jpg".to_string()),
        }
    }

    #[test]
    fn input_mirrors_the_row() {
        let row = row();
        let input = score_input(&row);
        // 80 (inactive > 365) + 30 (< 50 followers) + 25 (< 10 posts)
        assert_eq!(raw_score(&input), 135);
    }

    #[test]
    fn whitelisted_rows_keep_a_raw_score() {
        let row = ScoreSourceRow {
            is_whitelisted: true,
            ..row()
        };
        let input = score_input(&row);
        assert_eq!(score(&input), SENTINEL_NEVER);
        assert_eq!(raw_score(&input), 135);
    }
}
