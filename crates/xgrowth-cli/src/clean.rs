//! Pipeline command handlers: sync, probe, score, plan, unfollow, clean.

use std::io::Write;

use xgrowth_cleaner::{
    run_cleaning_cycle, ActivityProber, Candidate, CandidateRanker, CycleOptions,
    FollowingSync, OutcomeKind, ProbeSummary, RunSummary, StopSignal, SyncStop, SyncSummary,
    UnfollowExecutor,
};
use xgrowth_core::AppConfig;
use xgrowth_x::XClient;

#[derive(Debug, Clone, Copy)]
pub(crate) struct UnfollowArgs {
    pub dry_run: bool,
    pub limit: Option<u32>,
    pub min_score: Option<i32>,
    pub yes: bool,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct CleanArgs {
    pub dry_run: bool,
    pub activity_only: bool,
    pub skip_sync: bool,
    pub yes: bool,
}

pub(crate) fn build_client(config: &AppConfig) -> anyhow::Result<XClient> {
    XClient::from_app_config(config).map_err(|e| anyhow::anyhow!("cannot build X API client: {e}"))
}

pub(crate) fn fmt_opt<T: std::fmt::Display>(value: Option<T>) -> String {
    value.map_or_else(|| "\u{2014}".to_string(), |v| v.to_string())
}

/// # Errors
///
/// Returns an error if credentials are missing or a store write fails.
pub(crate) async fn run_sync(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    stop: &StopSignal,
) -> anyhow::Result<()> {
    let client = build_client(config)?;
    let summary = FollowingSync::new(pool, &client, &config.cleaner)
        .with_stop_signal(stop.clone())
        .run()
        .await?;
    print_sync(&summary);
    Ok(())
}

/// # Errors
///
/// Returns an error if credentials are missing or a store write fails.
pub(crate) async fn run_probe(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    limit: Option<u32>,
    stop: &StopSignal,
) -> anyhow::Result<()> {
    let client = build_client(config)?;
    let summary = ActivityProber::new(pool, &client, &config.cleaner)
        .with_stop_signal(stop.clone())
        .probe_stale(limit)
        .await?;
    print_probe(&summary);
    Ok(())
}

/// # Errors
///
/// Returns an error if the store cannot be read or written.
pub(crate) async fn run_score(pool: &sqlx::PgPool) -> anyhow::Result<()> {
    let updated = xgrowth_cleaner::recompute_all(pool).await?;
    println!("scored {updated} account(s)");
    Ok(())
}

/// # Errors
///
/// Returns an error if the candidate query fails.
pub(crate) async fn run_plan(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    limit: Option<u32>,
    min_score: Option<i32>,
) -> anyhow::Result<()> {
    let candidates = CandidateRanker::new(pool, &config.cleaner)
        .rank(limit, min_score)
        .await?;
    if candidates.is_empty() {
        println!("no unfollow candidates; run `xgrowth score` after probing");
        return Ok(());
    }
    print_candidates(&candidates);
    Ok(())
}

/// # Errors
///
/// Returns an error if credentials are missing, the operator declines, or a
/// store operation fails.
pub(crate) async fn run_unfollow(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    args: UnfollowArgs,
    stop: &StopSignal,
) -> anyhow::Result<()> {
    let candidates = CandidateRanker::new(pool, &config.cleaner)
        .rank(args.limit, args.min_score)
        .await?;
    if candidates.is_empty() {
        println!("no unfollow candidates");
        return Ok(());
    }
    print_candidates(&candidates);

    if !args.dry_run
        && !args.yes
        && !confirm(&format!("Unfollow {} account(s)?", candidates.len()))?
    {
        println!("cancelled");
        return Ok(());
    }

    let client = build_client(config)?;
    let summary = UnfollowExecutor::new(pool, &client, &config.cleaner)
        .with_stop_signal(stop.clone())
        .execute(candidates, args.dry_run)
        .await?;
    print_run(&summary);
    Ok(())
}

/// # Errors
///
/// Returns an error if credentials are missing, the operator declines, or a
/// store operation fails.
pub(crate) async fn run_clean(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    args: CleanArgs,
    stop: &StopSignal,
) -> anyhow::Result<()> {
    let live = !args.dry_run && !args.activity_only;
    if live && !args.yes && !confirm("Run a LIVE cleaning cycle? Accounts will be unfollowed.")? {
        println!("cancelled");
        return Ok(());
    }

    let client = build_client(config)?;
    let options = CycleOptions {
        skip_sync: args.skip_sync,
        activity_only: args.activity_only,
        execute: !args.activity_only,
        dry_run: args.dry_run,
        trigger_source: "cli".to_string(),
    };
    let summary = run_cleaning_cycle(pool, &client, &config.cleaner, &options, stop).await?;

    if let Some(sync) = &summary.sync {
        print_sync(sync);
    }
    print_probe(&summary.probe);
    println!("scored {} account(s)", summary.scored);
    if !args.activity_only {
        println!("{} candidate(s) ranked", summary.candidates);
    }
    if let Some(run) = &summary.run {
        print_run(run);
    }
    if summary.cancelled {
        println!("cycle stopped early by interrupt");
    }
    Ok(())
}

fn confirm(prompt: &str) -> anyhow::Result<bool> {
    print!("{prompt} Type 'yes' to continue: ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer)?;
    Ok(answer.trim().eq_ignore_ascii_case("yes"))
}

fn print_sync(summary: &SyncSummary) {
    println!(
        "sync: {} page(s), {} account(s) stored, {} new",
        summary.pages, summary.upserted, summary.inserted
    );
    match &summary.stopped {
        None => {}
        Some(SyncStop::RateLimited { reset_at }) => println!(
            "sync stopped: rate limited (resets {})",
            fmt_opt(reset_at.map(|t| t.format("%H:%M:%S UTC")))
        ),
        Some(SyncStop::Failed { message }) => println!("sync stopped: {message}"),
        Some(SyncStop::Cancelled) => println!("sync stopped: interrupted"),
    }
}

fn print_probe(summary: &ProbeSummary) {
    println!(
        "probe: {}/{} processed | {} active | {} no posts | {} not found | {} private | {} failed",
        summary.processed,
        summary.requested,
        summary.updated,
        summary.no_posts,
        summary.not_found,
        summary.unauthorized,
        summary.failed
    );
    if summary.rate_limited {
        println!(
            "probe stopped: rate limited at item {} (resets {})",
            fmt_opt(summary.resume_index.map(|i| i + 1)),
            fmt_opt(summary.reset_at.map(|t| t.format("%H:%M:%S UTC")))
        );
    }
    if summary.cancelled {
        println!("probe stopped: interrupted");
    }
}

fn print_candidates(candidates: &[Candidate]) {
    println!(
        "{:<22}{:<18}{:>7}{:>15}{:>12}",
        "USER ID", "USERNAME", "SCORE", "DAYS INACTIVE", "FOLLOWERS"
    );
    for c in candidates {
        println!(
            "{:<22}{:<18}{:>7}{:>15}{:>12}",
            c.user_id,
            format!("@{}", c.username),
            c.unfollow_score,
            fmt_opt(c.days_inactive),
            fmt_opt(c.follower_count)
        );
    }
}

fn print_run(summary: &RunSummary) {
    let mode = if summary.dry_run { "dry run" } else { "live" };
    println!(
        "{mode} {}: {} succeeded | {} failed | {} whitelisted | {} not reached",
        summary.batch_id, summary.succeeded, summary.failed, summary.vetoed, summary.unprocessed
    );
    if summary.deferred_by_daily_cap > 0 {
        println!(
            "{} candidate(s) deferred by the daily unfollow cap",
            summary.deferred_by_daily_cap
        );
    }
    if let Some(reason) = summary.abort_reason {
        println!("run aborted: {}", reason.as_str());
    }
    for outcome in summary
        .outcomes
        .iter()
        .filter(|o| o.kind == OutcomeKind::Failed)
    {
        println!(
            "  failed @{}: {}",
            outcome.username,
            outcome.error.as_deref().unwrap_or("unknown error")
        );
    }
}
