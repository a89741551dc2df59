use axum::{
    extract::{Path, Query, State},
    Extension, Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use xgrowth_db::CleanerRunRow;

use crate::middleware::RequestId;

use super::{
    map_db_error, normalize_limit,
    unfollows::{parse_batch_id, UnfollowItem},
    ApiError, ApiResponse, AppState,
};

#[derive(Debug, Deserialize)]
pub(super) struct RunsQuery {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub(super) struct RunItem {
    batch_id: Uuid,
    status: String,
    trigger_source: String,
    candidate_count: i32,
    succeeded: i32,
    failed: i32,
    vetoed: i32,
    abort_reason: Option<String>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub(super) struct RunDetail {
    #[serde(flatten)]
    run: RunItem,
    unfollows: Vec<UnfollowItem>,
}

impl From<CleanerRunRow> for RunItem {
    fn from(row: CleanerRunRow) -> Self {
        Self {
            batch_id: row.batch_id,
            status: row.status,
            trigger_source: row.trigger_source,
            candidate_count: row.candidate_count,
            succeeded: row.succeeded,
            failed: row.failed,
            vetoed: row.vetoed,
            abort_reason: row.abort_reason,
            started_at: row.started_at,
            completed_at: row.completed_at,
            created_at: row.created_at,
        }
    }
}

pub(super) async fn list_runs(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Query(query): Query<RunsQuery>,
) -> Result<Json<ApiResponse<Vec<RunItem>>>, ApiError> {
    let rows = xgrowth_db::list_cleaner_runs(&state.pool, normalize_limit(query.limit))
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let data = rows.into_iter().map(RunItem::from).collect();
    Ok(ApiResponse::new(data, req_id.0))
}

pub(super) async fn get_run(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Path(raw_batch_id): Path<String>,
) -> Result<Json<ApiResponse<RunDetail>>, ApiError> {
    let batch_id = parse_batch_id(&req_id.0, &raw_batch_id)?;

    let run = xgrowth_db::get_cleaner_run(&state.pool, batch_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;
    let unfollows = xgrowth_db::list_unfollows_by_batch(&state.pool, batch_id)
        .await
        .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    let detail = RunDetail {
        run: RunItem::from(run),
        unfollows: unfollows.into_iter().map(UnfollowItem::from).collect(),
    };
    Ok(ApiResponse::new(detail, req_id.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_detail_flattens_run_fields() {
        let detail = RunDetail {
            run: RunItem {
                batch_id: Uuid::nil(),
                status: "aborted".to_string(),
                trigger_source: "cli".to_string(),
                candidate_count: 3,
                succeeded: 1,
                failed: 1,
                vetoed: 0,
                abort_reason: Some("rate_limited".to_string()),
                started_at: Some(Utc::now()),
                completed_at: Some(Utc::now()),
                created_at: Utc::now(),
            },
            unfollows: Vec::new(),
        };

        let json = serde_json::to_value(&detail).expect("serialize run detail");
        assert_eq!(json["status"], "aborted");
        assert_eq!(json["abort_reason"], "rate_limited");
        assert!(json["unfollows"].as_array().is_some_and(Vec::is_empty));
    }
}
