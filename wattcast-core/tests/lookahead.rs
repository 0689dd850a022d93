//! Look-ahead contamination tests for the feature pipeline.
//!
//! Invariant: no feature value at tick t may depend on observations from
//! tick t+1 or later. Only the target column is allowed to look forward.
//!
//! Method: build the matrix on a truncated history (ticks 0..400) and on
//! the full history (ticks 0..800), then assert the shared prefix carries
//! identical feature vectors. Any difference means resampling, lags, or
//! rolling means are leaking future data into past rows.

use chrono::{DateTime, Duration, TimeZone, Utc};
use std::collections::BTreeMap;
use wattcast_core::data::{Record, Series, Source};
use wattcast_core::features::{build_feature_matrix, FeatureMatrix};
use wattcast_core::policy;

fn base() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
}

fn tick() -> Duration {
    Duration::minutes(policy::TICK_MINUTES)
}

/// Deterministic pseudo-random walk on the quarter-hour grid, one record
/// per tick, `width` values per record.
fn make_series(source: Source, n_ticks: usize, salt: u64) -> Series {
    let width = source.schema().width();
    let mut level = 50.0;
    let mut records = Vec::with_capacity(n_ticks);

    for i in 0..n_ticks {
        let seed = (i as u64)
            .wrapping_mul(6364136223846793005)
            .wrapping_add(salt);
        let change = ((seed % 200) as f64 - 100.0) * 0.02;
        level = (level + change).max(1.0);

        let values = (0..width)
            .map(|c| Some(level + c as f64 * 10.0))
            .collect();
        records.push(Record::new(base() + tick() * i as i32, values));
    }

    Series::from_records(source, records)
}

fn build(n_ticks: usize) -> FeatureMatrix {
    let prices = make_series(Source::Prices, n_ticks, 1);
    let weather = make_series(Source::Weather, n_ticks, 2);
    let fingrid = make_series(Source::Fingrid, n_ticks, 3);
    build_feature_matrix(&prices, &weather, &fingrid, tick())
}

fn by_timestamp(matrix: &FeatureMatrix) -> BTreeMap<DateTime<Utc>, Vec<f64>> {
    matrix
        .rows
        .iter()
        .map(|r| (r.timestamp, r.features.clone()))
        .collect()
}

#[test]
fn features_on_a_prefix_match_the_full_run() {
    let truncated = build(400);
    let full = build(800);

    assert_eq!(truncated.feature_names, full.feature_names);
    assert!(!truncated.is_empty(), "warmup must leave rows behind");

    let full_rows = by_timestamp(&full);
    for row in &truncated.rows {
        let reference = full_rows
            .get(&row.timestamp)
            .unwrap_or_else(|| panic!("full run lost the row at {}", row.timestamp));

        for (name, (t, f)) in full
            .feature_names
            .iter()
            .zip(row.features.iter().zip(reference.iter()))
        {
            assert!(
                (t - f).abs() < 1e-10,
                "look-ahead contamination in {name} at {}: truncated={t}, full={f}",
                row.timestamp
            );
        }
    }
}

#[test]
fn only_the_trailing_horizon_lacks_a_target() {
    let matrix = build(400);
    let horizon = policy::TARGET_HORIZON_TICKS;

    let (head, tail) = matrix.rows.split_at(matrix.len() - horizon);
    assert!(head.iter().all(|r| r.target.is_some()));
    assert!(tail.iter().all(|r| r.target.is_none()));
}

#[test]
fn rewriting_the_future_leaves_past_features_untouched() {
    let n = 400;
    let cut = 300;

    let weather = make_series(Source::Weather, n, 2);
    let fingrid = make_series(Source::Fingrid, n, 3);
    let prices = make_series(Source::Prices, n, 1);

    // Same price history up to the cut, wildly different afterwards.
    let mut rewritten: Vec<Record> = prices.records.clone();
    for record in rewritten.iter_mut().skip(cut) {
        record.values = vec![Some(999.0)];
    }
    let rewritten = Series::from_records(Source::Prices, rewritten);

    let original = build_feature_matrix(&prices, &weather, &fingrid, tick());
    let altered = build_feature_matrix(&rewritten, &weather, &fingrid, tick());

    let cut_ts = base() + tick() * cut as i32;
    let altered_rows = by_timestamp(&altered);
    let mut compared = 0;
    for row in original.rows.iter().filter(|r| r.timestamp < cut_ts) {
        assert_eq!(
            altered_rows.get(&row.timestamp),
            Some(&row.features),
            "features at {} changed when only the future did",
            row.timestamp
        );
        compared += 1;
    }
    assert!(compared > 100, "comparison covered too few rows");

    // The target does look forward, so it must change near the cut.
    let horizon = policy::TARGET_HORIZON_TICKS;
    let boundary = cut_ts - tick() * horizon as i32;
    let original_boundary = original
        .rows
        .iter()
        .find(|r| r.timestamp == boundary)
        .unwrap();
    let altered_boundary = altered
        .rows
        .iter()
        .find(|r| r.timestamp == boundary)
        .unwrap();
    assert_ne!(original_boundary.target, altered_boundary.target);
}
