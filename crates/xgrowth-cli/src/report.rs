//! Read-only reporting commands.

use std::path::Path;

use xgrowth_core::AppConfig;

use crate::clean::fmt_opt;

/// # Errors
///
/// Returns an error if the statistics query fails.
pub(crate) async fn run_stats(pool: &sqlx::PgPool, config: &AppConfig) -> anyhow::Result<()> {
    let stats = xgrowth_db::get_cleaner_stats(
        pool,
        config.cleaner.min_unfollow_score,
        config.cleaner.protection_policy(),
    )
    .await?;

    println!("Following:              {}", stats.total_following);
    println!("  dead (1+ years):      {}", stats.dead_1year);
    println!("  inactive 6-12 months: {}", stats.inactive_6months);
    println!("  inactive 3-6 months:  {}", stats.inactive_3months);
    println!("  active (< 3 months):  {}", stats.active);
    println!("  unchecked:            {}", stats.unchecked);
    println!(
        "Unfollow candidates:    {} (score >= {})",
        stats.unfollow_candidates, config.cleaner.min_unfollow_score
    );
    println!("Whitelisted:            {}", stats.whitelisted_accounts);
    println!("Unfollowed (all time):  {}", stats.total_unfollowed);
    println!("Checks (last 24h):      {}", stats.checks_last_24h);
    Ok(())
}

/// # Errors
///
/// Returns an error if the statistics query fails or the output file cannot
/// be written.
pub(crate) async fn run_report(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    output: Option<&Path>,
    dry_run: bool,
) -> anyhow::Result<()> {
    let report = xgrowth_cleaner::build_report(pool, &config.cleaner, dry_run).await?;
    let json = serde_json::to_string_pretty(&report)?;

    match output {
        Some(path) => {
            tokio::fs::write(path, &json).await?;
            println!("report written to {}", path.display());
            for line in &report.recommendations {
                println!("  - {line}");
            }
        }
        None => println!("{json}"),
    }
    Ok(())
}

/// # Errors
///
/// Returns an error if the query fails.
pub(crate) async fn run_runs(pool: &sqlx::PgPool, limit: i64) -> anyhow::Result<()> {
    let runs = xgrowth_db::list_cleaner_runs(pool, limit).await?;
    if runs.is_empty() {
        println!("no unfollow runs recorded");
        return Ok(());
    }

    println!(
        "{:<38}{:<11}{:<11}{:>6}{:>6}{:>6}{:>6}  {:<18}ABORT",
        "BATCH", "STATUS", "TRIGGER", "PLAN", "OK", "FAIL", "VETO", "STARTED"
    );
    for run in &runs {
        println!(
            "{:<38}{:<11}{:<11}{:>6}{:>6}{:>6}{:>6}  {:<18}{}",
            run.batch_id,
            run.status,
            run.trigger_source,
            run.candidate_count,
            run.succeeded,
            run.failed,
            run.vetoed,
            fmt_opt(run.started_at.map(|t| t.format("%Y-%m-%d %H:%M"))),
            run.abort_reason.as_deref().unwrap_or("")
        );
    }
    Ok(())
}
