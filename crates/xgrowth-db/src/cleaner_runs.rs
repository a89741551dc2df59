//! Database operations for `cleaner_runs`.
//!
//! Lifecycle: `planned` → `executing` → `completed` | `aborted`. Every
//! transition is a guarded UPDATE; a row in the wrong state is an error.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::DbError;

/// A row from the `cleaner_runs` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct CleanerRunRow {
    pub id: i64,
    pub batch_id: Uuid,
    pub status: String,
    pub trigger_source: String,
    pub candidate_count: i32,
    pub succeeded: i32,
    pub failed: i32,
    pub vetoed: i32,
    pub abort_reason: Option<String>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// Final per-run tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanerRunCounts {
    pub succeeded: i32,
    pub failed: i32,
    pub vetoed: i32,
}

const CLEANER_RUN_COLUMNS: &str = "\
    id, batch_id, status, trigger_source, candidate_count, succeeded, failed, vetoed, \
    abort_reason, started_at, completed_at, created_at";

/// Creates a run in `planned` status.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails (including a duplicate
/// `batch_id`).
pub async fn create_cleaner_run(
    pool: &PgPool,
    batch_id: Uuid,
    trigger_source: &str,
    candidate_count: i32,
) -> Result<CleanerRunRow, DbError> {
    let sql = format!(
        "INSERT INTO cleaner_runs (batch_id, trigger_source, candidate_count, status) \
         VALUES ($1, $2, $3, 'planned') \
         RETURNING {CLEANER_RUN_COLUMNS}"
    );
    let row = sqlx::query_as::<_, CleanerRunRow>(&sql)
        .bind(batch_id)
        .bind(trigger_source)
        .bind(candidate_count)
        .fetch_one(pool)
        .await?;
    Ok(row)
}

/// Moves a run from `planned` to `executing` and sets `started_at = NOW()`.
///
/// # Errors
///
/// Returns [`DbError::InvalidCleanerRunTransition`] if the run is not
/// `planned`, or [`DbError::Sqlx`] if the update fails.
pub async fn start_cleaner_run(pool: &PgPool, batch_id: Uuid) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE cleaner_runs \
         SET status = 'executing', started_at = NOW() \
         WHERE batch_id = $1 AND status = 'planned'",
    )
    .bind(batch_id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidCleanerRunTransition {
            batch_id,
            expected_status: "planned",
        });
    }
    Ok(())
}

/// Moves a run from `executing` to `completed` with its final tallies.
///
/// # Errors
///
/// Returns [`DbError::InvalidCleanerRunTransition`] if the run is not
/// `executing`, or [`DbError::Sqlx`] if the update fails.
pub async fn complete_cleaner_run(
    pool: &PgPool,
    batch_id: Uuid,
    counts: CleanerRunCounts,
) -> Result<(), DbError> {
    finish_cleaner_run(pool, batch_id, "completed", counts, None).await
}

/// Moves a run from `executing` to `aborted` with its tallies and reason.
///
/// # Errors
///
/// Returns [`DbError::InvalidCleanerRunTransition`] if the run is not
/// `executing`, or [`DbError::Sqlx`] if the update fails.
pub async fn abort_cleaner_run(
    pool: &PgPool,
    batch_id: Uuid,
    counts: CleanerRunCounts,
    reason: &str,
) -> Result<(), DbError> {
    finish_cleaner_run(pool, batch_id, "aborted", counts, Some(reason)).await
}

async fn finish_cleaner_run(
    pool: &PgPool,
    batch_id: Uuid,
    status: &str,
    counts: CleanerRunCounts,
    abort_reason: Option<&str>,
) -> Result<(), DbError> {
    let result = sqlx::query(
        "UPDATE cleaner_runs SET \
             status       = $2, \
             succeeded    = $3, \
             failed       = $4, \
             vetoed       = $5, \
             abort_reason = $6, \
             completed_at = NOW() \
         WHERE batch_id = $1 AND status = 'executing'",
    )
    .bind(batch_id)
    .bind(status)
    .bind(counts.succeeded)
    .bind(counts.failed)
    .bind(counts.vetoed)
    .bind(abort_reason)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DbError::InvalidCleanerRunTransition {
            batch_id,
            expected_status: "executing",
        });
    }
    Ok(())
}

/// Fetches a single run by batch id.
///
/// # Errors
///
/// Returns [`DbError::NotFound`] if no such run exists, or [`DbError::Sqlx`]
/// if the query fails.
pub async fn get_cleaner_run(pool: &PgPool, batch_id: Uuid) -> Result<CleanerRunRow, DbError> {
    let sql = format!("SELECT {CLEANER_RUN_COLUMNS} FROM cleaner_runs WHERE batch_id = $1");
    sqlx::query_as::<_, CleanerRunRow>(&sql)
        .bind(batch_id)
        .fetch_optional(pool)
        .await?
        .ok_or(DbError::NotFound)
}

/// Returns the most recent `limit` runs, newest first.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn list_cleaner_runs(pool: &PgPool, limit: i64) -> Result<Vec<CleanerRunRow>, DbError> {
    let sql = format!(
        "SELECT {CLEANER_RUN_COLUMNS} FROM cleaner_runs \
         ORDER BY created_at DESC, id DESC \
         LIMIT $1"
    );
    let rows = sqlx::query_as::<_, CleanerRunRow>(&sql)
        .bind(limit)
        .fetch_all(pool)
        .await?;
    Ok(rows)
}
