//! Background refresh job.
//!
//! Keeps the account store current between operator sessions by running an
//! activity-only cleaning cycle (sync, stale probe, rescore) on
//! `XGROWTH_REFRESH_CRON`. Nothing is ever unfollowed from here.

use std::sync::Arc;

use sqlx::PgPool;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler, JobSchedulerError};
use xgrowth_cleaner::{CycleOptions, StopSignal};
use xgrowth_core::AppConfig;
use xgrowth_x::XClient;

/// Builds and starts the scheduler. The returned handle must be kept alive
/// for the lifetime of the process; dropping it stops the job.
///
/// # Errors
///
/// Returns [`JobSchedulerError`] if the scheduler cannot start or the cron
/// expression is invalid.
pub async fn build_scheduler(
    pool: PgPool,
    config: Arc<AppConfig>,
) -> Result<JobScheduler, JobSchedulerError> {
    let scheduler = JobScheduler::new().await?;
    register_refresh_job(&scheduler, pool, config).await?;
    scheduler.start().await?;
    Ok(scheduler)
}

async fn register_refresh_job(
    scheduler: &JobScheduler,
    pool: PgPool,
    config: Arc<AppConfig>,
) -> Result<(), JobSchedulerError> {
    let pool = Arc::new(pool);
    let running = Arc::new(Mutex::new(()));
    let schedule = config.refresh_cron.clone();

    let job = Job::new_async(schedule.as_str(), move |_uuid, _lock| {
        let pool = Arc::clone(&pool);
        let config = Arc::clone(&config);
        let running = Arc::clone(&running);

        Box::pin(async move {
            let Ok(_guard) = running.try_lock() else {
                tracing::warn!("scheduler: previous refresh still running; skipping tick");
                return;
            };
            tracing::info!("scheduler: starting activity refresh");
            run_refresh(&pool, &config).await;
            tracing::info!("scheduler: activity refresh complete");
        })
    })?;

    scheduler.add(job).await?;
    tracing::info!(cron = %schedule, "scheduler: activity refresh registered");
    Ok(())
}

fn refresh_options() -> CycleOptions {
    CycleOptions {
        skip_sync: false,
        activity_only: true,
        execute: false,
        dry_run: true,
        trigger_source: "scheduler".to_string(),
    }
}

async fn run_refresh(pool: &PgPool, config: &AppConfig) {
    let client = match XClient::from_app_config(config) {
        Ok(client) => client,
        Err(e) => {
            tracing::warn!(error = %e, "scheduler: X credentials unavailable; skipping refresh");
            return;
        }
    };

    let summary = match xgrowth_cleaner::run_cleaning_cycle(
        pool,
        &client,
        &config.cleaner,
        &refresh_options(),
        &StopSignal::new(),
    )
    .await
    {
        Ok(summary) => summary,
        Err(e) => {
            tracing::error!(error = %e, "scheduler: activity refresh failed");
            return;
        }
    };

    if let Some(sync) = &summary.sync {
        tracing::info!(
            pages = sync.pages,
            upserted = sync.upserted,
            inserted = sync.inserted,
            stopped = sync.stopped.is_some(),
            "scheduler: following list synced"
        );
    }
    tracing::info!(
        processed = summary.probe.processed,
        requested = summary.probe.requested,
        rate_limited = summary.probe.rate_limited,
        scored = summary.scored,
        "scheduler: probe and rescore finished"
    );
}
