//! One synchronization cycle over all sources.
//!
//! Sources are processed sequentially and independently: a corrupt store,
//! a configuration error, or an empty fetch on one source never blocks the
//! others. The orchestrator owns no timing logic — an external scheduler
//! (cron, timer, CLI invocation) calls `run_cycle` once per cadence.

use super::fetch::{fetch_with_retry, FetchError, RetrySchedule, SourceClient};
use super::freshness::{decide, FreshnessDecision};
use crate::data::{merge_and_trim, SeriesStore, Source};
use crate::policy::SyncPolicy;
use chrono::{DateTime, Utc};

/// What happened to one source during a cycle.
#[derive(Debug)]
pub enum SourceOutcome {
    /// A fetch ran; the store was merged, trimmed, and persisted.
    Fetched {
        rows_fetched: usize,
        rows_after_merge: usize,
    },
    /// Latest record younger than the freshness threshold.
    SkippedFresh,
    /// Latest record younger than the guard interval.
    SkippedGuarded,
    /// Corrupt store or configuration error; other sources continued.
    Failed(String),
}

#[derive(Debug)]
pub struct SourceReport {
    pub source: Source,
    pub outcome: SourceOutcome,
}

/// Summary of one full cycle.
#[derive(Debug)]
pub struct CycleSummary {
    pub reports: Vec<SourceReport>,
}

impl CycleSummary {
    pub fn failed_count(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r.outcome, SourceOutcome::Failed(_)))
            .count()
    }

    pub fn all_ok(&self) -> bool {
        self.failed_count() == 0
    }
}

/// Observer for per-source cycle events.
pub trait CycleProgress: Send {
    fn on_decision(&self, source: Source, decision: &FreshnessDecision);
    fn on_complete(&self, source: Source, outcome: &SourceOutcome);
    fn on_cycle_complete(&self, summary: &CycleSummary);
}

/// Progress reporter that prints cycle-level log lines to stdout.
pub struct StdoutProgress;

impl CycleProgress for StdoutProgress {
    fn on_decision(&self, source: Source, decision: &FreshnessDecision) {
        match decision {
            FreshnessDecision::SkipFresh => {
                println!("[INFO] {source} data is fresh, skipping fetch.");
            }
            FreshnessDecision::SkipGuarded => {
                println!("[INFO] last {source} fetch window is recent, skipping fetch.");
            }
            FreshnessDecision::Fetch(window) => {
                println!("[INFO] {source} fetch window: {window}");
            }
        }
    }

    fn on_complete(&self, source: Source, outcome: &SourceOutcome) {
        match outcome {
            SourceOutcome::Fetched {
                rows_fetched,
                rows_after_merge,
            } => println!(
                "[INFO] {source}: fetched {rows_fetched} rows, store now holds {rows_after_merge}"
            ),
            SourceOutcome::Failed(reason) => eprintln!("[WARN] {source}: {reason}"),
            SourceOutcome::SkippedFresh | SourceOutcome::SkippedGuarded => {}
        }
    }

    fn on_cycle_complete(&self, summary: &CycleSummary) {
        let failed = summary.failed_count();
        if failed == 0 {
            println!("[INFO] sync cycle complete, all sources ok");
        } else {
            println!("[INFO] sync cycle complete, {failed} source(s) failed");
        }
    }
}

/// Silent progress observer for tests and embedding.
pub struct NullProgress;

impl CycleProgress for NullProgress {
    fn on_decision(&self, _: Source, _: &FreshnessDecision) {}
    fn on_complete(&self, _: Source, _: &SourceOutcome) {}
    fn on_cycle_complete(&self, _: &CycleSummary) {}
}

/// Run one synchronization cycle for every client against the store.
///
/// Idempotent for a given `now`: rerunning yields skip decisions or
/// merges that change nothing.
pub fn run_cycle(
    store: &SeriesStore,
    clients: &[&dyn SourceClient],
    policy: &SyncPolicy,
    schedule: &RetrySchedule,
    now: DateTime<Utc>,
    progress: &dyn CycleProgress,
) -> CycleSummary {
    let mut reports = Vec::with_capacity(clients.len());

    for client in clients {
        let source = client.source();
        let outcome = sync_source(store, *client, policy, schedule, now, progress);
        progress.on_complete(source, &outcome);
        reports.push(SourceReport { source, outcome });
    }

    let summary = CycleSummary { reports };
    progress.on_cycle_complete(&summary);
    summary
}

fn sync_source(
    store: &SeriesStore,
    client: &dyn SourceClient,
    policy: &SyncPolicy,
    schedule: &RetrySchedule,
    now: DateTime<Utc>,
    progress: &dyn CycleProgress,
) -> SourceOutcome {
    let source = client.source();

    let existing = match store.load(source) {
        Ok(series) => series,
        Err(e) => return SourceOutcome::Failed(e.to_string()),
    };

    let decision = decide(existing.latest_timestamp(), now, policy);
    progress.on_decision(source, &decision);

    let window = match decision {
        FreshnessDecision::SkipFresh => return SourceOutcome::SkippedFresh,
        FreshnessDecision::SkipGuarded => return SourceOutcome::SkippedGuarded,
        FreshnessDecision::Fetch(window) => window,
    };

    let rows = match fetch_with_retry(client, &window, schedule) {
        Ok(rows) => rows,
        Err(FetchError::Configuration(msg)) => {
            return SourceOutcome::Failed(format!("configuration error: {msg}"));
        }
        // fetch_with_retry degrades throttled/transient failures itself.
        Err(e) => return SourceOutcome::Failed(e.to_string()),
    };

    let merged = merge_and_trim(&existing, &rows, policy.days_backlog);
    if let Err(e) = store.persist(&merged) {
        return SourceOutcome::Failed(e.to_string());
    }

    SourceOutcome::Fetched {
        rows_fetched: rows.len(),
        rows_after_merge: merged.len(),
    }
}
