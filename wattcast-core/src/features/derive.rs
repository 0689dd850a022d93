//! Lag, rolling, calendar, and target derivation over the joined table.
//!
//! Lag and rolling columns only ever look backward; calendar columns come
//! from the tick's own timestamp. The forward target is the single
//! deliberate exception and must only ever serve as the training label.

use super::table::FeatureTable;
use crate::policy::TARGET_HORIZON_TICKS;
use chrono::{Datelike, Timelike};

/// Lag offsets applied to every base column, in ticks.
pub const LAG_TICKS: &[usize] = &[1];

/// Rolling-mean window sizes applied to every base column, in ticks.
pub const ROLLING_WINDOWS: &[usize] = &[4, 12];

/// Name of the label column. Look-ahead by construction; never a feature.
pub const TARGET_COLUMN: &str = "target_price_1h_ahead";

/// The price column the target derives from.
pub const PRICE_COLUMN: &str = "price_ct_per_kwh";

/// Values shifted forward by `k` ticks: `out[i] = values[i - k]`.
pub fn lag(values: &[Option<f64>], k: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    for i in k..values.len() {
        out[i] = values[i - k];
    }
    out
}

/// Backward rolling mean over a full window of `window` ticks ending at
/// each position. Incomplete windows and windows containing a missing
/// value yield `None`.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    assert!(window >= 1, "rolling window must be >= 1");
    let mut out = vec![None; values.len()];
    for i in (window - 1)..values.len() {
        let slice = &values[i + 1 - window..=i];
        if slice.iter().all(Option::is_some) {
            let sum: f64 = slice.iter().map(|v| v.unwrap_or(0.0)).sum();
            out[i] = Some(sum / window as f64);
        }
    }
    out
}

/// Values shifted backward by `k` ticks: `out[i] = values[i + k]`.
/// This is the look-ahead primitive used only for the target.
pub fn shift_back(values: &[Option<f64>], k: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    for i in 0..values.len().saturating_sub(k) {
        out[i] = values[i + k];
    }
    out
}

/// Add lag and rolling-mean columns for every base column already in the
/// table, then the calendar columns.
pub fn derive_features(table: &mut FeatureTable) {
    let base_columns: Vec<String> = table
        .column_names()
        .iter()
        .map(|s| s.to_string())
        .collect();

    for name in &base_columns {
        let values = table
            .column(name)
            .expect("base column listed from the table itself")
            .to_vec();

        for &k in LAG_TICKS {
            table.push_column(format!("{name}_lag{k}"), lag(&values, k));
        }
        for &w in ROLLING_WINDOWS {
            table.push_column(format!("{name}_roll{w}mean"), rolling_mean(&values, w));
        }
    }

    push_calendar_columns(table);
}

/// Calendar features taken from each tick's own timestamp.
fn push_calendar_columns(table: &mut FeatureTable) {
    let timestamps = table.timestamps().to_vec();

    let hour = timestamps
        .iter()
        .map(|t| Some(f64::from(t.hour())))
        .collect();
    let weekday: Vec<Option<f64>> = timestamps
        .iter()
        .map(|t| Some(f64::from(t.weekday().num_days_from_monday())))
        .collect();
    let month = timestamps
        .iter()
        .map(|t| Some(f64::from(t.month())))
        .collect();
    let is_weekend = timestamps
        .iter()
        .map(|t| Some(if t.weekday().num_days_from_monday() >= 5 { 1.0 } else { 0.0 }))
        .collect();

    table.push_column("hour", hour);
    table.push_column("weekday", weekday);
    table.push_column("month", month);
    table.push_column("is_weekend", is_weekend);
}

/// Forward target: rolling mean of price over the next `TARGET_HORIZON_TICKS`
/// ticks, realized as a backward rolling mean shifted back by the horizon.
pub fn derive_target(table: &mut FeatureTable) {
    let price = table
        .column(PRICE_COLUMN)
        .expect("price column is part of the fixed schema")
        .to_vec();

    let backward = rolling_mean(&price, TARGET_HORIZON_TICKS);
    let target = shift_back(&backward, TARGET_HORIZON_TICKS);
    table.push_column(TARGET_COLUMN, target);
}
