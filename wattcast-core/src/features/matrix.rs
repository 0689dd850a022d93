//! Final feature matrix: the only place rows are discarded.

use super::derive::TARGET_COLUMN;
use super::table::FeatureTable;
use chrono::{DateTime, SecondsFormat, Utc};
use std::path::Path;
use thiserror::Error;

/// Trailing rows handed to inference.
pub const INFERENCE_ROWS: usize = 24;

#[derive(Debug, Error)]
pub enum FeatureError {
    /// Not enough complete trailing rows; more data must accumulate first.
    #[error("insufficient history: need {required} complete rows, have {available}")]
    InsufficientHistory { required: usize, available: usize },
}

/// One model-ready row: features are complete by construction, the target
/// is absent only on the newest horizon ticks whose future is unknown.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    pub timestamp: DateTime<Utc>,
    pub target: Option<f64>,
    pub features: Vec<f64>,
}

/// Fixed-width matrix over a named feature list.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub feature_names: Vec<String>,
    pub rows: Vec<FeatureRow>,
}

/// Collapse the derived table into a matrix, dropping every row that is
/// missing any feature value. This happens after all lag/rolling
/// computations, so dropping a row never invalidates another row's
/// features. Rows complete in features but without a target (the trailing
/// horizon) are kept for inference; `training_rows` excludes them.
pub fn finalize(table: &FeatureTable) -> FeatureMatrix {
    let feature_names: Vec<String> = table
        .column_names()
        .iter()
        .filter(|n| **n != TARGET_COLUMN)
        .map(|n| n.to_string())
        .collect();

    let feature_columns: Vec<&[Option<f64>]> = feature_names
        .iter()
        .map(|n| table.column(n).expect("name listed from the table itself"))
        .collect();
    let target_column = table.column(TARGET_COLUMN);

    let mut rows = Vec::new();
    for (i, &timestamp) in table.timestamps().iter().enumerate() {
        let features: Option<Vec<f64>> = feature_columns.iter().map(|col| col[i]).collect();
        let Some(features) = features else {
            continue;
        };
        let target = target_column.and_then(|col| col[i]);
        rows.push(FeatureRow {
            timestamp,
            target,
            features,
        });
    }

    FeatureMatrix {
        feature_names,
        rows,
    }
}

impl FeatureMatrix {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Rows carrying a label. This is the training/evaluation matrix.
    pub fn training_rows(&self) -> impl Iterator<Item = &FeatureRow> {
        self.rows.iter().filter(|r| r.target.is_some())
    }

    /// The last `n` complete rows, target not required — this is what
    /// feeds inference.
    pub fn extract_latest(&self, n: usize) -> Result<FeatureMatrix, FeatureError> {
        if self.rows.len() < n {
            return Err(FeatureError::InsufficientHistory {
                required: n,
                available: self.rows.len(),
            });
        }
        Ok(FeatureMatrix {
            feature_names: self.feature_names.clone(),
            rows: self.rows[self.rows.len() - n..].to_vec(),
        })
    }

    /// Write the matrix as CSV: timestamp, target, then the feature columns.
    pub fn write_csv(&self, path: &Path) -> std::io::Result<()> {
        let mut writer = csv::Writer::from_path(path).map_err(std::io::Error::other)?;

        let mut header = vec!["timestamp_utc".to_string(), TARGET_COLUMN.to_string()];
        header.extend(self.feature_names.iter().cloned());
        writer
            .write_record(&header)
            .map_err(std::io::Error::other)?;

        for row in &self.rows {
            let mut out = Vec::with_capacity(2 + row.features.len());
            out.push(row.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true));
            out.push(row.target.map(|t| format!("{t}")).unwrap_or_default());
            out.extend(row.features.iter().map(|v| format!("{v}")));
            writer.write_record(&out).map_err(std::io::Error::other)?;
        }

        writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn table() -> FeatureTable {
        let axis: Vec<DateTime<Utc>> = (0..5)
            .map(|i| {
                Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
                    + chrono::Duration::minutes(15 * i)
            })
            .collect();
        let mut t = FeatureTable::new(axis);
        t.push_column("a", vec![None, Some(1.0), Some(2.0), Some(3.0), Some(4.0)]);
        t.push_column("b", vec![Some(9.0), Some(9.0), None, Some(9.0), Some(9.0)]);
        t.push_column(
            TARGET_COLUMN,
            vec![Some(5.0), Some(5.0), Some(5.0), None, None],
        );
        t
    }

    #[test]
    fn finalize_drops_rows_with_missing_features() {
        let matrix = finalize(&table());

        // Row 0 misses `a`, row 2 misses `b`.
        assert_eq!(matrix.len(), 3);
        assert_eq!(matrix.rows[0].features, vec![1.0, 9.0]);
        assert_eq!(matrix.feature_names, vec!["a", "b"]);
    }

    #[test]
    fn training_rows_require_a_target() {
        let matrix = finalize(&table());
        let training: Vec<_> = matrix.training_rows().collect();

        // Of the 3 complete rows, the last two have no target yet.
        assert_eq!(training.len(), 1);
        assert_eq!(training[0].target, Some(5.0));
    }

    #[test]
    fn extract_latest_takes_the_tail() {
        let matrix = finalize(&table());
        let latest = matrix.extract_latest(2).unwrap();

        assert_eq!(latest.len(), 2);
        assert_eq!(latest.rows[1], matrix.rows[2]);
        // Target is not required for inference rows.
        assert_eq!(latest.rows[1].target, None);
    }

    #[test]
    fn extract_latest_fails_on_short_history() {
        let matrix = finalize(&table());
        let err = matrix.extract_latest(10).unwrap_err();

        assert!(matches!(
            err,
            FeatureError::InsufficientHistory {
                required: 10,
                available: 3,
            }
        ));
    }

    #[test]
    fn csv_export_has_timestamp_target_then_features() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("features.csv");
        finalize(&table()).write_csv(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        let mut lines = raw.lines();
        assert_eq!(lines.next().unwrap(), "timestamp_utc,target_price_1h_ahead,a,b");
        assert_eq!(lines.next().unwrap(), "2025-01-01T00:15:00Z,5,1,9");
    }
}
