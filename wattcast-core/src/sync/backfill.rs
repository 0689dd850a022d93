//! Bulk one-off backfill with a bounded worker pool.
//!
//! Unlike the steady-state cycle this issues one request per grid tick,
//! concurrently. Each tick fetch is independent and idempotent (keyed by
//! timestamp), so completion order does not matter: results are sorted and
//! deduplicated by timestamp before any downstream use. Concurrency is
//! bounded to respect upstream rate limits.

use super::fetch::FetchError;
use super::freshness::FetchWindow;
use crate::data::{Record, Series, Source};
use chrono::{DateTime, Duration, Utc};
use rayon::prelude::*;

pub const DEFAULT_WORKERS: usize = 8;

/// Outcome counters for a backfill run.
#[derive(Debug)]
pub struct BackfillReport {
    pub requested: usize,
    pub missing: usize,
}

/// Enumerate the grid ticks of a half-open window.
pub fn window_ticks(window: &FetchWindow, tick: Duration) -> Vec<DateTime<Utc>> {
    let mut ticks = Vec::new();
    let mut current = window.start;
    while current < window.end {
        ticks.push(current);
        current += tick;
    }
    ticks
}

/// Fetch every tick of `window` through `fetch_tick` on a pool of
/// `workers` threads and assemble a sorted, deduplicated series.
///
/// Throttled and transient tick failures degrade to missing values;
/// configuration errors abort the whole run.
pub fn backfill_ticks<F>(
    source: Source,
    window: &FetchWindow,
    tick: Duration,
    workers: usize,
    fetch_tick: F,
) -> Result<(Series, BackfillReport), FetchError>
where
    F: Fn(DateTime<Utc>) -> Result<Record, FetchError> + Sync,
{
    let ticks = window_ticks(window, tick);
    let width = source.schema().width();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
        .map_err(|e| FetchError::Configuration(format!("worker pool: {e}")))?;

    let records: Result<Vec<Record>, FetchError> = pool.install(|| {
        ticks
            .par_iter()
            .map(|ts| match fetch_tick(*ts) {
                Ok(record) => Ok(record),
                Err(FetchError::Configuration(msg)) => Err(FetchError::Configuration(msg)),
                // Best-effort: a failed tick becomes a missing value.
                Err(_) => Ok(Record::new(*ts, vec![None; width])),
            })
            .collect()
    });
    let records = records?;

    let missing = records
        .iter()
        .filter(|r| r.values.iter().all(Option::is_none))
        .count();
    let report = BackfillReport {
        requested: ticks.len(),
        missing,
    };

    // from_records sorts and dedups: completion order is not chronological.
    Ok((Series::from_records(source, records), report))
}
