mod commands;
mod render;
mod utils;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Log filter, e.g. `ECONCAL_LOG=econcal_core=debug`.
const LOG_ENV: &str = "ECONCAL_LOG";

#[derive(Parser)]
#[command(name = "econcal")]
#[command(about = "Ingest economic-calendar feeds and browse the canonical event set")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a feed file, match it against known events and submit it
    Ingest {
        /// JSON file: an array of events, or {"events": [...]}
        file: PathBuf,

        /// Feed name recorded on every submitted event
        #[arg(short, long)]
        source: Option<String>,

        /// Events per bulk-ingest request
        #[arg(long)]
        batch_size: Option<usize>,

        /// Only submit records that matched nothing
        #[arg(long)]
        new_only: bool,

        /// Classify only, submit nothing
        #[arg(long)]
        dry_run: bool,

        /// Show every record and field differences for matches
        #[arg(short, long)]
        verbose: bool,
    },
    /// List events grouped by day
    Events {
        /// Show events from this local date (YYYY-MM-DD, or e.g. "last monday")
        #[arg(long)]
        from: Option<String>,

        /// Show events until this local date (YYYY-MM-DD, or e.g. "next friday")
        #[arg(long)]
        to: Option<String>,

        /// Only these impact tiers (repeatable)
        #[arg(long = "impact")]
        impacts: Vec<String>,

        /// Only these currencies (repeatable)
        #[arg(long = "currency")]
        currencies: Vec<String>,
    },
    /// Show configuration
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();
    let cli = Cli::parse();

    match cli.command {
        Commands::Ingest {
            file,
            source,
            batch_size,
            new_only,
            dry_run,
            verbose,
        } => {
            commands::ingest::run(commands::ingest::IngestArgs {
                file,
                source,
                batch_size,
                new_only,
                dry_run,
                verbose,
            })
            .await
        }
        Commands::Events {
            from,
            to,
            impacts,
            currencies,
        } => commands::events::run(from.as_deref(), to.as_deref(), &impacts, &currencies).await,
        Commands::Config => commands::config::run(),
    }
}

fn init_logging() {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}
