//! Wattcast CLI — sync, backfill, status, and feature export commands.
//!
//! Commands:
//! - `sync` — run one synchronization cycle against all remote sources
//! - `backfill` — bulk-fetch historical spot prices tick by tick
//! - `status` — report per-source row counts, ranges, and freshness
//! - `features` — build the feature matrix and export it as CSV
//!
//! The Fingrid API key is read from the `FINGRID_API_KEY` environment
//! variable here, once, and handed to the client as explicit configuration.

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use wattcast_core::data::{write_series_csv, SeriesStore, Source};
use wattcast_core::features::{build_feature_matrix, INFERENCE_ROWS};
use wattcast_core::policy::SyncPolicy;
use wattcast_core::sources::{FingridAuth, FingridClient, FmiClient, PorssisahkoClient};
use wattcast_core::sync::backfill::DEFAULT_WORKERS;
use wattcast_core::sync::{
    backfill_ticks, decide, run_cycle, FetchWindow, FreshnessDecision, RetrySchedule,
    SourceClient, StdoutProgress,
};

#[derive(Parser)]
#[command(
    name = "wattcast",
    about = "Wattcast CLI — electricity price data sync and feature pipeline"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one synchronization cycle against all remote sources.
    Sync {
        /// Store directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
    },
    /// Bulk-fetch historical spot prices, one request per quarter-hour tick.
    Backfill {
        /// Start date (YYYY-MM-DD), inclusive.
        #[arg(long)]
        start: String,

        /// End date (YYYY-MM-DD), exclusive.
        #[arg(long)]
        end: String,

        /// Output CSV path.
        #[arg(long, default_value = "prices_backfill.csv")]
        out: PathBuf,

        /// Concurrent fetch workers.
        #[arg(long, default_value_t = DEFAULT_WORKERS)]
        workers: usize,
    },
    /// Report per-source row counts, covered ranges, and freshness.
    Status {
        /// Store directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
    },
    /// Build the feature matrix from the stores and export it as CSV.
    Features {
        /// Store directory. Defaults to ./data.
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,

        /// Output CSV path.
        #[arg(long, default_value = "features.csv")]
        out: PathBuf,

        /// Number of trailing rows to export.
        #[arg(long, default_value_t = INFERENCE_ROWS)]
        rows: usize,

        /// Export every row instead of the trailing inference slice.
        #[arg(long, default_value_t = false)]
        all: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Sync { data_dir } => run_sync(data_dir),
        Commands::Backfill {
            start,
            end,
            out,
            workers,
        } => run_backfill(&start, &end, out, workers),
        Commands::Status { data_dir } => run_status(data_dir),
        Commands::Features {
            data_dir,
            out,
            rows,
            all,
        } => run_features(data_dir, out, rows, all),
    }
}

fn run_sync(data_dir: PathBuf) -> Result<()> {
    let store = SeriesStore::new(data_dir);
    let policy = SyncPolicy::default();
    let schedule = RetrySchedule::default();

    let auth = FingridAuth::new(std::env::var("FINGRID_API_KEY").ok());
    let prices = PorssisahkoClient::new();
    let weather = FmiClient::new();
    let fingrid = FingridClient::new(auth);
    let clients: [&dyn SourceClient; 3] = [&prices, &weather, &fingrid];

    let summary = run_cycle(
        &store,
        &clients,
        &policy,
        &schedule,
        Utc::now(),
        &StdoutProgress,
    );

    if !summary.all_ok() {
        std::process::exit(1);
    }
    Ok(())
}

fn run_backfill(start: &str, end: &str, out: PathBuf, workers: usize) -> Result<()> {
    let (from, to) = (parse_day(start)?, parse_day(end)?);
    if from >= to {
        anyhow::bail!("--end must be after --start");
    }
    let window = FetchWindow::new(from, to);
    let policy = SyncPolicy::default();
    let client = PorssisahkoClient::new();

    println!("[INFO] backfilling prices for {window} on {workers} workers");

    let (series, report) = backfill_ticks(
        Source::Prices,
        &window,
        policy.tick(),
        workers,
        |ts| client.fetch_tick(ts),
    )
    .map_err(|e| anyhow::anyhow!("backfill aborted: {e}"))?;

    write_series_csv(&series, &out)
        .with_context(|| format!("writing backfill output to {}", out.display()))?;

    println!(
        "[INFO] backfill complete: {} ticks requested, {} missing, written to {}",
        report.requested,
        report.missing,
        out.display()
    );
    Ok(())
}

fn run_status(data_dir: PathBuf) -> Result<()> {
    let store = SeriesStore::new(data_dir);
    let policy = SyncPolicy::default();
    let now = Utc::now();

    println!("Store: {}", store.data_dir().display());
    println!();
    println!(
        "{:<10} {:>8} {:<22} {:<22} {:<10}",
        "Source", "Rows", "First", "Last", "Freshness"
    );
    println!("{}", "-".repeat(76));

    for source in Source::ALL {
        match store.status(source) {
            Ok(status) => {
                let verdict = match decide(status.last, now, &policy) {
                    FreshnessDecision::SkipFresh => "fresh".to_string(),
                    FreshnessDecision::SkipGuarded => "guarded".to_string(),
                    FreshnessDecision::Fetch(window) => format!("stale {window}"),
                };
                println!(
                    "{:<10} {:>8} {:<22} {:<22} {:<10}",
                    status.source.name(),
                    status.rows,
                    fmt_ts(status.first),
                    fmt_ts(status.last),
                    verdict
                );
            }
            Err(e) => println!("{:<10} CORRUPT: {e}", source.name()),
        }
    }

    Ok(())
}

fn run_features(data_dir: PathBuf, out: PathBuf, rows: usize, all: bool) -> Result<()> {
    let store = SeriesStore::new(data_dir);
    let policy = SyncPolicy::default();

    let prices = store.load(Source::Prices)?;
    let weather = store.load(Source::Weather)?;
    let fingrid = store.load(Source::Fingrid)?;

    let matrix = build_feature_matrix(&prices, &weather, &fingrid, policy.tick());
    let export = if all {
        matrix
    } else {
        matrix
            .extract_latest(rows)
            .context("not enough complete history for the requested row count")?
    };

    export
        .write_csv(&out)
        .with_context(|| format!("writing feature matrix to {}", out.display()))?;

    let labelled = export.training_rows().count();
    println!(
        "[INFO] wrote {} rows ({} with target, {} features) to {}",
        export.len(),
        labelled,
        export.feature_names.len(),
        out.display()
    );
    Ok(())
}

fn parse_day(s: &str) -> Result<DateTime<Utc>> {
    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("invalid date '{s}', expected YYYY-MM-DD"))?;
    let midnight = date
        .and_hms_opt(0, 0, 0)
        .with_context(|| format!("invalid date '{s}'"))?;
    Ok(DateTime::from_naive_utc_and_offset(midnight, Utc))
}

fn fmt_ts(ts: Option<DateTime<Utc>>) -> String {
    match ts {
        Some(t) => t.to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        None => "-".to_string(),
    }
}
