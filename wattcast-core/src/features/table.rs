//! Column-oriented joined table on the common tick grid.

use chrono::{DateTime, Utc};

/// Timestamp-indexed table of named `Option<f64>` columns, all the same
/// length as the tick axis. Missing stays `None`; nothing is invented here.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    timestamps: Vec<DateTime<Utc>>,
    columns: Vec<(String, Vec<Option<f64>>)>,
}

impl FeatureTable {
    pub fn new(timestamps: Vec<DateTime<Utc>>) -> Self {
        Self {
            timestamps,
            columns: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn timestamps(&self) -> &[DateTime<Utc>] {
        &self.timestamps
    }

    /// Add a column. The name must be new and the length must match the
    /// tick axis; both are structural invariants of the fixed schema.
    pub fn push_column(&mut self, name: impl Into<String>, values: Vec<Option<f64>>) {
        let name = name.into();
        assert_eq!(
            values.len(),
            self.timestamps.len(),
            "column {name} length must match the tick axis"
        );
        assert!(
            self.column(&name).is_none(),
            "duplicate column name {name}"
        );
        self.columns.push((name, values));
    }

    pub fn column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|(n, _)| n.as_str()).collect()
    }
}
