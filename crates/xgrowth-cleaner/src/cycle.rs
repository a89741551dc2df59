//! Full cleaning cycle and the summary report.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use xgrowth_core::CleanerConfig;
use xgrowth_db::CleanerStats;
use xgrowth_x::Gateway;

use crate::error::CleanerError;
use crate::executor::{RunSummary, UnfollowExecutor};
use crate::prober::{ActivityProber, ProbeSummary};
use crate::ranker::CandidateRanker;
use crate::scorer::recompute_all;
use crate::stop::StopSignal;
use crate::sync::{FollowingSync, SyncSummary};

const HEAVY_CANDIDATE_LOAD: i64 = 100;

#[derive(Debug, Clone)]
pub struct CycleOptions {
    /// Skip reading the following list and work from what is stored.
    pub skip_sync: bool,
    /// Stop after scoring; never rank or execute.
    pub activity_only: bool,
    /// Run the executor on the ranked candidates.
    pub execute: bool,
    pub dry_run: bool,
    pub trigger_source: String,
}

impl Default for CycleOptions {
    fn default() -> Self {
        Self {
            skip_sync: false,
            activity_only: false,
            execute: false,
            dry_run: true,
            trigger_source: "cli".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CycleSummary {
    pub sync: Option<SyncSummary>,
    pub probe: ProbeSummary,
    pub scored: u64,
    pub candidates: usize,
    pub run: Option<RunSummary>,
    pub cancelled: bool,
}

/// Sync, probe stale accounts, rescore, rank, and (when asked) execute.
///
/// Each stage works with whatever the previous stages stored, so a
/// rate-limited sync or probe still lets scoring and ranking run.
///
/// # Errors
///
/// Returns [`CleanerError::Db`] when a store operation fails.
pub async fn run_cleaning_cycle<G: Gateway>(
    pool: &PgPool,
    gateway: &G,
    config: &CleanerConfig,
    options: &CycleOptions,
    stop: &StopSignal,
) -> Result<CycleSummary, CleanerError> {
    let sync = if options.skip_sync {
        None
    } else {
        let summary = FollowingSync::new(pool, gateway, config)
            .with_stop_signal(stop.clone())
            .run()
            .await?;
        Some(summary)
    };

    let probe = ActivityProber::new(pool, gateway, config)
        .with_stop_signal(stop.clone())
        .probe_stale(None)
        .await?;
    let scored = recompute_all(pool).await?;

    let mut summary = CycleSummary {
        sync,
        probe,
        scored,
        candidates: 0,
        run: None,
        cancelled: stop.is_raised(),
    };
    if options.activity_only || summary.cancelled {
        return Ok(summary);
    }

    let candidates = CandidateRanker::new(pool, config).rank(None, None).await?;
    summary.candidates = candidates.len();
    tracing::info!(candidates = candidates.len(), "cleaning cycle ranked candidates");

    if options.execute {
        let run = UnfollowExecutor::new(pool, gateway, config)
            .with_stop_signal(stop.clone())
            .with_trigger_source(options.trigger_source.clone())
            .execute(candidates, options.dry_run)
            .await?;
        summary.run = Some(run);
    }
    summary.cancelled = stop.is_raised();
    Ok(summary)
}

#[derive(Debug, Clone, Serialize)]
pub struct CleanerReport {
    pub timestamp: DateTime<Utc>,
    pub mode: &'static str,
    pub configuration: CleanerConfig,
    pub statistics: CleanerStats,
    pub recommendations: Vec<String>,
}

/// Current statistics plus suggested next steps.
///
/// # Errors
///
/// Returns [`CleanerError::Db`] if the statistics query fails.
pub async fn build_report(
    pool: &PgPool,
    config: &CleanerConfig,
    dry_run: bool,
) -> Result<CleanerReport, CleanerError> {
    let statistics = xgrowth_db::get_cleaner_stats(
        pool,
        config.min_unfollow_score,
        config.protection_policy(),
    )
    .await?;
    Ok(CleanerReport {
        timestamp: Utc::now(),
        mode: if dry_run { "dry_run" } else { "live" },
        configuration: config.clone(),
        recommendations: recommendations(&statistics),
        statistics,
    })
}

#[must_use]
pub fn recommendations(stats: &CleanerStats) -> Vec<String> {
    let mut out = Vec::new();
    if stats.dead_1year > 0 {
        out.push(format!(
            "Consider unfollowing {} accounts inactive for 1+ years",
            stats.dead_1year
        ));
    }
    if stats.unchecked > 0 {
        out.push(format!(
            "Run activity check on {} unchecked accounts",
            stats.unchecked
        ));
    }
    if stats.unfollow_candidates > HEAVY_CANDIDATE_LOAD {
        out.push(
            "High number of unfollow candidates - consider multiple cleaning sessions".to_string(),
        );
    }
    out
}
