//! # Buzzboard CLI (`buzz`)
//!
//! ## Usage
//!
//! ```bash
//! buzz --config ./config/buzz.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `buzz sync` | Fetch new mentions, merge them, and rebuild this week's snapshot |
//! | `buzz aggregate` | Rebuild this week's snapshot from stored mentions |
//! | `buzz leaderboard` | Show the latest (or a named) weekly leaderboard |
//! | `buzz history` | List retained weekly snapshots |
//! | `buzz stats` | Summarize the store |
//! | `buzz watch` | Run `sync` on a fixed interval until interrupted |
//!
//! Logs go to stderr; set `RUST_LOG` or pass `--verbose` for more detail.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use buzzboard::aggregate::{AggregateOutcome, Aggregator, CycleOptions, CycleReport};
use buzzboard::config::{self, Config};
use buzzboard::fetch::MentionFetcher;
use buzzboard::report;
use buzzboard::search_api::HttpSearchSource;
use buzzboard::store::{JsonFileStore, Store};

/// Buzzboard CLI: mention ingestion and weekly engagement leaderboards.
#[derive(Parser)]
#[command(
    name = "buzz",
    about = "Buzzboard: mention ingestion and weekly engagement leaderboards",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/buzz.toml")]
    config: PathBuf,

    /// Log at debug level (overridden by RUST_LOG).
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch, merge, and aggregate once.
    ///
    /// The fetch range defaults to everything since the last fetch, capped
    /// at the configured lookback.
    Sync {
        /// Start of the fetch range (RFC 3339 or YYYY-MM-DD).
        #[arg(long)]
        since: Option<String>,

        /// End of the fetch range, exclusive (RFC 3339 or YYYY-MM-DD).
        #[arg(long)]
        until: Option<String>,

        /// Results requested per page (clamped to 10..=100).
        #[arg(long)]
        max_results: Option<u32>,

        /// Rebuild the snapshot even if nothing new was fetched.
        #[arg(long)]
        force_aggregate: bool,
    },

    /// Rebuild this week's snapshot from stored mentions.
    Aggregate,

    /// Show a weekly leaderboard.
    Leaderboard {
        /// Week key (YYYY-MM-DD of the week's Sunday). Defaults to the newest.
        #[arg(long)]
        week: Option<String>,

        /// Maximum number of users to show.
        #[arg(long)]
        limit: Option<usize>,

        /// Print the snapshot as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List retained weekly snapshots, newest first.
    History {
        #[arg(long)]
        json: bool,
    },

    /// Summarize the store.
    Stats,

    /// Run sync cycles on a fixed interval until Ctrl-C.
    Watch {
        /// Seconds between cycles. Defaults to `[watch].interval_secs`.
        #[arg(long)]
        interval_secs: Option<u64>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "buzzboard=debug,buzz=debug" } else { "buzzboard=info,buzz=info" };
    let filter = match std::env::var("RUST_LOG") {
        Ok(v) if !v.is_empty() => EnvFilter::from_default_env(),
        _ => EnvFilter::new(default),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Parse an RFC 3339 timestamp or a bare `YYYY-MM-DD` (midnight UTC).
fn parse_ts(value: &str) -> Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Ok(dt.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("Invalid timestamp '{}': expected RFC 3339 or YYYY-MM-DD", value))?;
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .with_context(|| format!("Invalid date '{}'", value))
}

fn build_aggregator(cfg: &Config) -> Result<Aggregator> {
    let store: Arc<dyn Store> = Arc::new(JsonFileStore::from_config(cfg));
    let source = HttpSearchSource::new(&cfg.search).context("Failed to build search client")?;
    let fetcher = MentionFetcher::new(Arc::new(source), cfg);
    Ok(Aggregator::new(store, fetcher, cfg))
}

fn print_aggregate(outcome: &AggregateOutcome) {
    match outcome {
        AggregateOutcome::NoData => println!("  leaderboard: no data this week"),
        AggregateOutcome::Snapshot {
            week_key,
            ranked_users,
            total_mentions,
            replaced,
            persisted,
        } => {
            println!(
                "  leaderboard: {} ({} users, {} mentions, {})",
                week_key,
                ranked_users,
                total_mentions,
                if *replaced { "replaced" } else { "new" }
            );
            if !persisted {
                println!("  warning: snapshot was not saved");
            }
        }
    }
}

fn print_cycle(report: &CycleReport) {
    println!("sync");
    println!("  range: {} .. {}", report.start.to_rfc3339(), report.end.to_rfc3339());
    println!("  fetched: {} mentions", report.fetched);
    println!("  new: {}", report.merge.added);
    println!("  total stored: {}", report.merge.total);
    if !report.merge.persisted {
        println!("  warning: merged mentions were not saved");
    }
    match &report.aggregate {
        Some(outcome) => print_aggregate(outcome),
        None => println!("  leaderboard: unchanged (nothing new)"),
    }
    println!("ok");
}

async fn run_watch(cfg: &Config, interval_secs: Option<u64>) -> Result<()> {
    let aggregator = build_aggregator(cfg)?;
    let interval = Duration::from_secs(interval_secs.unwrap_or(cfg.watch.interval_secs).max(1));
    tracing::info!(interval_secs = interval.as_secs(), "watching for mentions");

    loop {
        let report = aggregator.run_cycle(&CycleOptions::default(), Utc::now()).await;
        print_cycle(&report);

        // A cycle always runs to completion; Ctrl-C is only honoured while idle.
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, stopping watch");
                return Ok(());
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Sync {
            since,
            until,
            max_results,
            force_aggregate,
        } => {
            let options = CycleOptions {
                since: since.as_deref().map(parse_ts).transpose()?,
                until: until.as_deref().map(parse_ts).transpose()?,
                max_results,
                force_aggregate,
            };
            let aggregator = build_aggregator(&cfg)?;
            let report = aggregator.run_cycle(&options, Utc::now()).await;
            print_cycle(&report);
        }
        Commands::Aggregate => {
            let aggregator = build_aggregator(&cfg)?;
            let outcome = aggregator.aggregate(Utc::now());
            println!("aggregate");
            print_aggregate(&outcome);
            println!("ok");
        }
        Commands::Leaderboard { week, limit, json } => {
            report::run_leaderboard(&cfg, week.as_deref(), limit, json)?;
        }
        Commands::History { json } => {
            report::run_history(&cfg, json)?;
        }
        Commands::Stats => {
            report::run_stats(&cfg)?;
        }
        Commands::Watch { interval_secs } => {
            run_watch(&cfg, interval_secs).await?;
        }
    }

    Ok(())
}
