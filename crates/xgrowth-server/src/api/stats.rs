use axum::{extract::State, Extension, Json};
use xgrowth_db::CleanerStats;

use crate::middleware::RequestId;

use super::{map_db_error, ApiError, ApiResponse, AppState};

pub(super) async fn get_stats(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> Result<Json<ApiResponse<CleanerStats>>, ApiError> {
    let cleaner = &state.config.cleaner;
    let stats = xgrowth_db::get_cleaner_stats(
        &state.pool,
        cleaner.min_unfollow_score,
        cleaner.protection_policy(),
    )
    .await
    .map_err(|e| map_db_error(req_id.0.clone(), &e))?;

    Ok(ApiResponse::new(stats, req_id.0))
}
