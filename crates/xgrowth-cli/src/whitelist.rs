//! `whitelist` sub-commands.

use std::path::PathBuf;

use chrono::Utc;
use clap::Subcommand;
use xgrowth_cleaner::{AddOutcome, RemoveOutcome, WhitelistGuard};
use xgrowth_core::{AppConfig, AutoWhitelistRule};
use xgrowth_x::XClient;

use crate::clean::fmt_opt;

#[derive(Debug, Subcommand)]
pub enum WhitelistCommands {
    /// Protect an account (user id, @username or username)
    Add {
        identifier: String,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Remove protection from an account
    Remove { identifier: String },
    List,
    /// Protect every verified account currently followed
    AutoVerified,
    /// Protect every followed account with at least `min_followers` followers
    AutoInfluencers {
        #[arg(long, default_value = "100000")]
        min_followers: i64,
    },
    /// Import identifiers from a JSON array or a text file (one per line)
    Import { path: PathBuf },
    /// Export the whitelist as JSON
    Export {
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Suggest accounts worth protecting
    Suggest,
}

/// # Errors
///
/// Returns an error if a store operation, lookup, or file operation fails.
pub(crate) async fn run(
    pool: &sqlx::PgPool,
    config: &AppConfig,
    command: WhitelistCommands,
) -> anyhow::Result<()> {
    // Lookups are optional; without credentials only stored accounts resolve.
    let client = match XClient::from_app_config(config) {
        Ok(client) => Some(client),
        Err(e) => {
            tracing::debug!(error = %e, "whitelist running without username lookup");
            None
        }
    };
    let guard = match &client {
        Some(client) => WhitelistGuard::new(pool, client),
        None => WhitelistGuard::offline(pool),
    };

    match command {
        WhitelistCommands::Add { identifier, reason } => {
            match guard.add(&identifier, reason.as_deref()).await? {
                AddOutcome::Added(row) => println!(
                    "whitelisted @{} ({}): {}",
                    row.username,
                    row.user_id,
                    row.reason.as_deref().unwrap_or_default()
                ),
                AddOutcome::Invalid => println!("'{identifier}' is not a user id or username"),
                AddOutcome::Unresolved => println!("could not find account '{identifier}'"),
            }
        }
        WhitelistCommands::Remove { identifier } => match guard.remove(&identifier).await? {
            RemoveOutcome::Removed(row) => {
                println!("removed @{} ({}) from whitelist", row.username, row.user_id);
            }
            RemoveOutcome::NotMember => println!("'{identifier}' was not whitelisted"),
            RemoveOutcome::Invalid => println!("'{identifier}' is not a user id or username"),
        },
        WhitelistCommands::List => {
            let rows = guard.list().await?;
            if rows.is_empty() {
                println!("whitelist is empty");
                return Ok(());
            }
            println!("{:<22}{:<18}{:<12}{:<8}REASON", "USER ID", "USERNAME", "ADDED", "BY");
            for row in &rows {
                println!(
                    "{:<22}{:<18}{:<12}{:<8}{}",
                    row.user_id,
                    format!("@{}", row.username),
                    row.added_date.format("%Y-%m-%d"),
                    row.added_by,
                    row.reason.as_deref().unwrap_or("No reason provided")
                );
            }
            println!("{} protected account(s)", rows.len());
        }
        WhitelistCommands::AutoVerified => {
            let added = guard.auto(AutoWhitelistRule::Verified).await?;
            println!("whitelisted {added} verified account(s)");
        }
        WhitelistCommands::AutoInfluencers { min_followers } => {
            let added = guard
                .auto(AutoWhitelistRule::MinFollowers(min_followers))
                .await?;
            println!("whitelisted {added} account(s) with {min_followers}+ followers");
        }
        WhitelistCommands::Import { path } => {
            let summary = guard.import(&path).await?;
            println!(
                "imported {} | {} invalid | {} not found | {} failed",
                summary.added, summary.invalid, summary.unresolved, summary.failed
            );
        }
        WhitelistCommands::Export { output } => {
            let path = output.unwrap_or_else(|| {
                PathBuf::from(format!(
                    "whitelist_export_{}.json",
                    Utc::now().format("%Y%m%d_%H%M%S")
                ))
            });
            let written = guard.export(&path).await?;
            println!("exported {written} account(s) to {}", path.display());
        }
        WhitelistCommands::Suggest => {
            let rows = guard.suggest().await?;
            if rows.is_empty() {
                println!("no suggestions");
                return Ok(());
            }
            println!("{:<22}{:<18}{:>12}  WHY", "USER ID", "USERNAME", "FOLLOWERS");
            for row in &rows {
                let mut why = Vec::new();
                if row.verified {
                    why.push("verified");
                }
                if row.follower_count.unwrap_or(0) > 50_000 {
                    why.push("high influence");
                }
                if row.days_inactive.is_some_and(|d| d < 30) {
                    why.push("active");
                }
                println!(
                    "{:<22}{:<18}{:>12}  {}",
                    row.user_id,
                    format!("@{}", row.username),
                    fmt_opt(row.follower_count),
                    why.join(", ")
                );
            }
        }
    }
    Ok(())
}
