//! Resampling onto the common fixed-interval grid and the outer join.
//!
//! Price is forward-filled: the quarter-hour step function is a structural
//! property of the tariff, not noise. Weather and grid measurements are
//! averaged per tick first (several stations/instants fold into one value)
//! and then forward-filled through gaps.
//!
//! Everything a tick sees lies at or before its own timestamp: forward
//! fill looks backward, and a tick's mean bucket is `(t - tick, t]`.

use super::table::FeatureTable;
use crate::data::{Series, Source};
use chrono::{DateTime, Duration, DurationRound, Utc};

/// How one source's observations fold onto the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregation {
    /// Step function: last known value at or before the tick.
    ForwardFill,
    /// Mean of the tick's bucket, then forward-fill through empty buckets.
    MeanThenFill,
}

pub fn aggregation_for(source: Source) -> Aggregation {
    match source {
        Source::Prices => Aggregation::ForwardFill,
        Source::Weather | Source::Fingrid => Aggregation::MeanThenFill,
    }
}

/// Inclusive tick axis from `start` to `end`, both floored to the tick.
pub fn tick_grid(start: DateTime<Utc>, end: DateTime<Utc>, tick: Duration) -> Vec<DateTime<Utc>> {
    let start = start.duration_trunc(tick).expect("tick truncation");
    let end = end.duration_trunc(tick).expect("tick truncation");
    let mut grid = Vec::new();
    let mut current = start;
    while current <= end {
        grid.push(current);
        current += tick;
    }
    grid
}

/// Resample one series onto `grid`, one output vector per schema column.
pub fn resample_series(
    series: &Series,
    grid: &[DateTime<Utc>],
    tick: Duration,
    agg: Aggregation,
) -> Vec<Vec<Option<f64>>> {
    let width = series.source.schema().width();
    (0..width)
        .map(|col| {
            let observations: Vec<(DateTime<Utc>, Option<f64>)> = series
                .records
                .iter()
                .map(|r| (r.timestamp, r.values[col]))
                .collect();
            match agg {
                Aggregation::ForwardFill => forward_fill(&observations, grid),
                Aggregation::MeanThenFill => mean_then_fill(&observations, grid, tick),
            }
        })
        .collect()
}

/// Outer join: every tick present in any source appears on the axis.
///
/// The axis spans from the earliest to the latest observation across all
/// series; each series contributes its schema columns, resampled per its
/// aggregation. Ticks a source cannot cover stay `None`. Every schema
/// column is always present, even over an empty axis, so downstream
/// derivation never has to probe for columns.
pub fn align(series_list: &[&Series], tick: Duration) -> FeatureTable {
    let start = series_list.iter().filter_map(|s| s.first_timestamp()).min();
    let end = series_list.iter().filter_map(|s| s.latest_timestamp()).max();

    let grid = match (start, end) {
        (Some(start), Some(end)) => tick_grid(start, end, tick),
        _ => Vec::new(),
    };
    let mut table = FeatureTable::new(grid.clone());

    for series in series_list {
        let agg = aggregation_for(series.source);
        let resampled = resample_series(series, &grid, tick, agg);
        for (col, values) in series.source.schema().columns.iter().zip(resampled) {
            table.push_column(*col, values);
        }
    }

    table
}

/// Last known (`Some`) value at or before each grid tick. Explicit missing
/// observations are gaps and are carried through.
fn forward_fill(
    observations: &[(DateTime<Utc>, Option<f64>)],
    grid: &[DateTime<Utc>],
) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(grid.len());
    let mut idx = 0;
    let mut last_known = None;

    for &t in grid {
        while idx < observations.len() && observations[idx].0 <= t {
            if let Some(v) = observations[idx].1 {
                last_known = Some(v);
            }
            idx += 1;
        }
        out.push(last_known);
    }
    out
}

/// Mean of known values in the bucket `(t - tick, t]` per tick, then
/// forward-fill ticks whose bucket held nothing.
fn mean_then_fill(
    observations: &[(DateTime<Utc>, Option<f64>)],
    grid: &[DateTime<Utc>],
    tick: Duration,
) -> Vec<Option<f64>> {
    let mut out = Vec::with_capacity(grid.len());
    let mut idx = 0;
    let mut last_known = None;

    for &t in grid {
        // Skip observations at or before the start of this bucket.
        while idx < observations.len() && observations[idx].0 <= t - tick {
            idx += 1;
        }

        let mut sum = 0.0;
        let mut count = 0u32;
        let mut scan = idx;
        while scan < observations.len() && observations[scan].0 <= t {
            if let Some(v) = observations[scan].1 {
                sum += v;
                count += 1;
            }
            scan += 1;
        }
        idx = scan;

        if count > 0 {
            last_known = Some(sum / f64::from(count));
        }
        out.push(last_known);
    }
    out
}
