//! In-memory series representation and the merge-and-trim operation.
//!
//! A `Series` is ordered ascending by timestamp and timestamp-unique after
//! a merge. Missing values are a first-class `None` — upstream gaps, 404s
//! and parse failures all normalize to it and survive persistence.

use super::schema::Source;
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;

/// One row of a series: a UTC instant plus the source's value columns.
///
/// `values[i]` pairs with `source.schema().columns[i]`.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub timestamp: DateTime<Utc>,
    pub values: Vec<Option<f64>>,
}

impl Record {
    pub fn new(timestamp: DateTime<Utc>, values: Vec<Option<f64>>) -> Self {
        Self { timestamp, values }
    }
}

/// Timestamp-ordered records for one source.
#[derive(Debug, Clone, PartialEq)]
pub struct Series {
    pub source: Source,
    pub records: Vec<Record>,
}

impl Series {
    pub fn empty(source: Source) -> Self {
        Self {
            source,
            records: Vec::new(),
        }
    }

    /// Build a series from records, sorting ascending and collapsing
    /// duplicate timestamps (later-listed record wins).
    pub fn from_records(source: Source, records: Vec<Record>) -> Self {
        let mut by_ts: BTreeMap<DateTime<Utc>, Record> = BTreeMap::new();
        for rec in records {
            by_ts.insert(rec.timestamp, rec);
        }
        Self {
            source,
            records: by_ts.into_values().collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn first_timestamp(&self) -> Option<DateTime<Utc>> {
        self.records.first().map(|r| r.timestamp)
    }

    pub fn latest_timestamp(&self) -> Option<DateTime<Utc>> {
        self.records.last().map(|r| r.timestamp)
    }

    /// Check the at-rest invariants: strictly ascending timestamps and
    /// record width matching the source schema.
    pub fn is_well_formed(&self) -> bool {
        let width = self.source.schema().width();
        if self.records.iter().any(|r| r.values.len() != width) {
            return false;
        }
        self.records
            .windows(2)
            .all(|w| w[0].timestamp < w[1].timestamp)
    }
}

/// Merge a freshly fetched batch into an existing series and trim to the
/// retention window. Pure function, no I/O.
///
/// Duplicate timestamps keep the incoming record — the newer fetch is
/// assumed more authoritative (e.g. revised grid figures). After the merge
/// every record older than `max(timestamp) - retention_days` is dropped.
pub fn merge_and_trim(existing: &Series, incoming: &[Record], retention_days: i64) -> Series {
    let mut by_ts: BTreeMap<DateTime<Utc>, Record> = BTreeMap::new();
    for rec in &existing.records {
        by_ts.insert(rec.timestamp, rec.clone());
    }
    for rec in incoming {
        by_ts.insert(rec.timestamp, rec.clone());
    }

    let records: Vec<Record> = match by_ts.keys().next_back().copied() {
        Some(max_ts) => {
            let cutoff = max_ts - Duration::days(retention_days);
            by_ts.into_values().filter(|r| r.timestamp >= cutoff).collect()
        }
        None => Vec::new(),
    };

    Series {
        source: existing.source,
        records,
    }
}
