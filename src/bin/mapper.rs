use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use player_mapper::cli::{bulk_map, report, review};
use player_mapper::logging::{init_tracing, DEFAULT_FILTER};
use player_mapper::util::env;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "mapper", version, about = "Player id mapping admin CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Resolve every unmapped stats player against the draft provider
    BulkMap {
        /// Optional override for the database URL
        #[arg(long)]
        db_url: Option<String>,
        /// Resolve and print counts without writing anything
        #[arg(long, default_value_t = false)]
        dry_run: bool,
    },
    /// Print the manual review queue with live suggestions
    ReviewList {
        #[arg(long)]
        db_url: Option<String>,
        /// Entries to show (defaults to MAPPER_REVIEW_DEFAULT_LIMIT)
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Print a mapping health report as JSON
    Report {
        #[arg(long)]
        db_url: Option<String>,
        /// summary | unmapped | low-confidence
        #[arg(long)]
        report: Option<String>,
        #[arg(long)]
        limit: Option<i64>,
    },
    /// Apply pending SQL migrations
    Migrate {
        #[arg(long)]
        db_url: Option<String>,
        #[arg(long, default_value = "./migrations")]
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    env::init_env();
    init_tracing(DEFAULT_FILTER)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::BulkMap { db_url, dry_run } => {
            bulk_map::run(bulk_map::BulkMapConfig {
                database_url: db_url,
                dry_run,
            })
            .await?;
        }
        Commands::ReviewList { db_url, limit } => {
            review::run(review::ReviewListConfig {
                database_url: db_url,
                limit,
            })
            .await?;
        }
        Commands::Report {
            db_url,
            report: kind,
            limit,
        } => {
            report::run(report::ReportConfig {
                database_url: db_url,
                report: kind,
                limit,
            })
            .await?;
        }
        Commands::Migrate { db_url, dir } => {
            let db = player_mapper::cli::connect(db_url, 2).await?;
            let applied = db.run_migrations(&dir).await?;
            info!(applied = ?applied, "migrate: done");
        }
    }

    Ok(())
}
