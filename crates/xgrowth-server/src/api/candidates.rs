use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use xgrowth_cleaner::{Candidate, CandidateRanker, CleanerError};

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct CandidatesQuery {
    pub limit: Option<i64>,
    pub min_score: Option<i32>,
}

#[derive(Debug, Serialize)]
pub(super) struct CandidateItem {
    user_id: String,
    username: String,
    display_name: Option<String>,
    days_inactive: Option<i32>,
    follower_count: Option<i64>,
    tweet_count: Option<i64>,
    last_tweet_date: Option<DateTime<Utc>>,
    verified: bool,
    unfollow_score: i32,
    reason: String,
}

impl From<Candidate> for CandidateItem {
    fn from(candidate: Candidate) -> Self {
        let reason = candidate.reason();
        Self {
            user_id: candidate.user_id,
            username: candidate.username,
            display_name: candidate.display_name,
            days_inactive: candidate.days_inactive,
            follower_count: candidate.follower_count,
            tweet_count: candidate.tweet_count,
            last_tweet_date: candidate.last_tweet_date,
            verified: candidate.verified,
            unfollow_score: candidate.unfollow_score,
            reason,
        }
    }
}

pub(super) async fn list_candidates(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<CandidatesQuery>,
) -> Result<Json<ApiResponse<Vec<CandidateItem>>>, ApiError> {
    // normalize_limit bounds the value to 1..=200.
    let limit = u32::try_from(normalize_limit(query.limit)).unwrap_or(1);

    let candidates = CandidateRanker::new(&state.pool, &state.config.cleaner)
        .rank(Some(limit), query.min_score)
        .await
        .map_err(|e| match e {
            CleanerError::Db(db) => map_db_error(req_id.0.clone(), &db),
            other => {
                tracing::error!(error = %other, "candidate ranking failed");
                ApiError::new(req_id.0.clone(), "internal_error", "candidate ranking failed")
            }
        })?;

    let data = candidates.into_iter().map(CandidateItem::from).collect();
    Ok(ApiResponse::new(data, req_id.0))
}
