use axum::{
    extract::{Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use xgrowth_db::UnfollowLogRow;

use crate::middleware::RequestId;

use super::{map_db_error, normalize_limit, ApiError, ApiResponse, AppState};

#[derive(Debug, Deserialize)]
pub(super) struct UnfollowsQuery {
    pub limit: Option<i64>,
    pub batch_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub(super) struct UnfollowItem {
    user_id: String,
    username: String,
    display_name: Option<String>,
    unfollowed_date: DateTime<Utc>,
    days_inactive: Option<i32>,
    follower_count: Option<i64>,
    last_tweet_date: Option<DateTime<Utc>>,
    unfollow_score: Option<i32>,
    reason: String,
    batch_id: Uuid,
    can_rollback: bool,
}

impl From<UnfollowLogRow> for UnfollowItem {
    fn from(row: UnfollowLogRow) -> Self {
        Self {
            user_id: row.user_id,
            username: row.username,
            display_name: row.display_name,
            unfollowed_date: row.unfollowed_date,
            days_inactive: row.days_inactive,
            follower_count: row.follower_count,
            last_tweet_date: row.last_tweet_date,
            unfollow_score: row.unfollow_score,
            reason: row.reason,
            batch_id: row.batch_id,
            can_rollback: row.can_rollback,
        }
    }
}

pub(super) fn parse_batch_id(request_id: &str, raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw)
        .map_err(|_| ApiError::new(request_id, "bad_request", "batch_id must be a UUID"))
}

pub(super) async fn list_unfollows(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<UnfollowsQuery>,
) -> Result<Json<ApiResponse<Vec<UnfollowItem>>>, ApiError> {
    let rows = match query.batch_id.as_deref() {
        Some(raw) => {
            let batch_id = parse_batch_id(&req_id.0, raw)?;
            xgrowth_db::list_unfollows_by_batch(&state.pool, batch_id).await
        }
        None => xgrowth_db::list_recent_unfollows(&state.pool, normalize_limit(query.limit)).await,
    }
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows.into_iter().map(UnfollowItem::from).collect();
    Ok(ApiResponse::new(data, req_id.0))
}
