mod clean;
mod report;
mod whitelist;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use xgrowth_cleaner::StopSignal;

use crate::whitelist::WhitelistCommands;

#[derive(Debug, Parser)]
#[command(name = "xgrowth")]
#[command(about = "Inactive-follower cleaner for an X account")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Database maintenance
    Db {
        #[command(subcommand)]
        command: DbCommands,
    },
    /// Read the following list into the account store
    Sync,
    /// Check recent activity of accounts not probed lately
    Probe {
        /// Maximum accounts to probe (capped at XGROWTH_PROBE_BATCH_SIZE)
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Recompute unfollow scores
    Score,
    /// Show the ranked unfollow candidates
    Plan {
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        min_score: Option<i32>,
    },
    /// Unfollow the ranked candidates
    Unfollow {
        /// Report what would happen without unfollowing anyone
        #[arg(long)]
        dry_run: bool,
        #[arg(long)]
        limit: Option<u32>,
        #[arg(long)]
        min_score: Option<i32>,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Sync, probe, score, rank, and unfollow in one pass
    Clean {
        #[arg(long)]
        dry_run: bool,
        /// Stop after scoring
        #[arg(long)]
        activity_only: bool,
        /// Work from the stored following list
        #[arg(long)]
        skip_sync: bool,
        #[arg(long)]
        yes: bool,
    },
    /// Manage protected accounts
    Whitelist {
        #[command(subcommand)]
        command: WhitelistCommands,
    },
    /// Print inactivity and pipeline statistics
    Stats,
    /// Write the cleaning report as JSON
    Report {
        /// Output file (stdout when omitted)
        #[arg(long)]
        output: Option<std::path::PathBuf>,
        /// Describe the next run as a rehearsal
        #[arg(long)]
        dry_run: bool,
    },
    /// List recent unfollow runs
    Runs {
        #[arg(long, default_value = "20")]
        limit: i64,
    },
}

#[derive(Debug, Subcommand)]
enum DbCommands {
    Ping,
    Migrate,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let Some(command) = cli.command else {
        println!("xgrowth: run `xgrowth --help` for commands");
        return Ok(());
    };

    let config = xgrowth_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = xgrowth_db::PoolConfig::from_app_config(&config);
    let pool = xgrowth_db::connect_pool(&config.database_url, pool_config).await?;

    match command {
        Commands::Db { command } => match command {
            DbCommands::Ping => {
                xgrowth_db::health_check(&pool).await?;
                println!("database ok");
            }
            DbCommands::Migrate => {
                let applied = xgrowth_db::run_migrations(&pool).await?;
                println!("applied {applied} migration(s)");
            }
        },
        Commands::Sync => clean::run_sync(&pool, &config, &stop_on_ctrl_c()).await?,
        Commands::Probe { limit } => {
            clean::run_probe(&pool, &config, limit, &stop_on_ctrl_c()).await?;
        }
        Commands::Score => clean::run_score(&pool).await?,
        Commands::Plan { limit, min_score } => {
            clean::run_plan(&pool, &config, limit, min_score).await?;
        }
        Commands::Unfollow {
            dry_run,
            limit,
            min_score,
            yes,
        } => {
            let args = clean::UnfollowArgs {
                dry_run,
                limit,
                min_score,
                yes,
            };
            clean::run_unfollow(&pool, &config, args, &stop_on_ctrl_c()).await?;
        }
        Commands::Clean {
            dry_run,
            activity_only,
            skip_sync,
            yes,
        } => {
            let args = clean::CleanArgs {
                dry_run,
                activity_only,
                skip_sync,
                yes,
            };
            clean::run_clean(&pool, &config, args, &stop_on_ctrl_c()).await?;
        }
        Commands::Whitelist { command } => whitelist::run(&pool, &config, command).await?,
        Commands::Stats => report::run_stats(&pool, &config).await?,
        Commands::Report { output, dry_run } => {
            report::run_report(&pool, &config, output.as_deref(), dry_run).await?;
        }
        Commands::Runs { limit } => report::run_runs(&pool, limit).await?,
    }

    Ok(())
}

/// A stop signal raised by the first Ctrl-C. Work already committed is kept.
fn stop_on_ctrl_c() -> StopSignal {
    let stop = StopSignal::new();
    let handle = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received; stopping after the current request");
            handle.raise();
        }
    });
    stop
}
