//! On-disk series store: one flat CSV per source.
//!
//! Layout: `{data_dir}/{source}.csv` with a `timestamp_utc` column
//! (ISO-8601 UTC, ascending) followed by the source's schema columns.
//! Empty cells are missing values.
//!
//! Writes are atomic: write to `.tmp`, rename into place. A crash mid-write
//! never corrupts the previously persisted state, and concurrent readers
//! see either the old or the new complete file.

use super::schema::Source;
use super::series::{Record, Series};
use chrono::{DateTime, SecondsFormat, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The persisted file exists but cannot be parsed against the schema.
    /// Fatal for that source's cycle — manual intervention required, the
    /// store is never silently truncated.
    #[error("corrupt series file {path}: {reason}")]
    Corrupt { path: PathBuf, reason: String },

    #[error("store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl StoreError {
    fn corrupt(path: &Path, reason: impl Into<String>) -> Self {
        StoreError::Corrupt {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }

    fn io(path: &Path, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Row count and covered range for one persisted source.
#[derive(Debug, Clone)]
pub struct StoreStatus {
    pub source: Source,
    pub rows: usize,
    pub first: Option<DateTime<Utc>>,
    pub last: Option<DateTime<Utc>>,
}

/// The per-source CSV store.
pub struct SeriesStore {
    data_dir: PathBuf,
}

impl SeriesStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn path(&self, source: Source) -> PathBuf {
        self.data_dir.join(source.file_name())
    }

    /// Load the persisted series for a source. A missing file is a normal
    /// first-run state and yields an empty series.
    pub fn load(&self, source: Source) -> Result<Series, StoreError> {
        let path = self.path(source);
        if !path.exists() {
            return Ok(Series::empty(source));
        }
        read_series_csv(source, &path)
    }

    /// Persist a series with the scoped-write contract: write to a
    /// temporary sibling, then atomically replace the destination.
    pub fn persist(&self, series: &Series) -> Result<(), StoreError> {
        fs::create_dir_all(&self.data_dir).map_err(|e| StoreError::io(&self.data_dir, e))?;

        let path = self.path(series.source);
        let tmp_path = path.with_extension("csv.tmp");

        write_series_csv(series, &tmp_path)?;

        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            StoreError::io(&path, e)
        })
    }

    /// Row count and covered range, from the persisted file.
    pub fn status(&self, source: Source) -> Result<StoreStatus, StoreError> {
        let series = self.load(source)?;
        Ok(StoreStatus {
            source,
            rows: series.len(),
            first: series.first_timestamp(),
            last: series.latest_timestamp(),
        })
    }
}

/// Write a series as CSV to an explicit path. Also used by the backfill
/// path, which writes outside the rolling store.
pub fn write_series_csv(series: &Series, path: &Path) -> Result<(), StoreError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| StoreError::io(path, std::io::Error::other(e)))?;

    let schema = series.source.schema();
    let mut header = Vec::with_capacity(1 + schema.width());
    header.push("timestamp_utc");
    header.extend_from_slice(schema.columns);
    writer
        .write_record(&header)
        .map_err(|e| StoreError::io(path, std::io::Error::other(e)))?;

    for rec in &series.records {
        let mut row = Vec::with_capacity(1 + schema.width());
        row.push(rec.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true));
        for value in &rec.values {
            row.push(match value {
                Some(v) => format!("{v}"),
                None => String::new(),
            });
        }
        writer
            .write_record(&row)
            .map_err(|e| StoreError::io(path, std::io::Error::other(e)))?;
    }

    writer
        .flush()
        .map_err(|e| StoreError::io(path, e))
}

/// Read and validate a persisted series. Any parse failure, schema
/// mismatch, or ordering violation is `StoreError::Corrupt`.
pub fn read_series_csv(source: Source, path: &Path) -> Result<Series, StoreError> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| StoreError::corrupt(path, format!("unreadable csv: {e}")))?;

    let schema = source.schema();
    let headers = reader
        .headers()
        .map_err(|e| StoreError::corrupt(path, format!("missing header: {e}")))?
        .clone();

    let mut expected = vec!["timestamp_utc"];
    expected.extend_from_slice(schema.columns);
    let actual: Vec<&str> = headers.iter().collect();
    if actual != expected {
        return Err(StoreError::corrupt(
            path,
            format!("header mismatch: expected {expected:?}, got {actual:?}"),
        ));
    }

    let mut records = Vec::new();
    let mut prev_ts: Option<DateTime<Utc>> = None;

    for (line, result) in reader.records().enumerate() {
        let row = result.map_err(|e| StoreError::corrupt(path, format!("row {line}: {e}")))?;
        if row.len() != expected.len() {
            return Err(StoreError::corrupt(
                path,
                format!("row {line}: expected {} fields, got {}", expected.len(), row.len()),
            ));
        }

        let timestamp = DateTime::parse_from_rfc3339(&row[0])
            .map_err(|e| StoreError::corrupt(path, format!("row {line}: bad timestamp: {e}")))?
            .with_timezone(&Utc);

        if let Some(prev) = prev_ts {
            if timestamp <= prev {
                return Err(StoreError::corrupt(
                    path,
                    format!("row {line}: timestamps not strictly ascending ({prev} then {timestamp})"),
                ));
            }
        }
        prev_ts = Some(timestamp);

        let mut values = Vec::with_capacity(schema.width());
        for (i, cell) in row.iter().skip(1).enumerate() {
            if cell.is_empty() {
                values.push(None);
            } else {
                let v = cell.parse::<f64>().map_err(|e| {
                    StoreError::corrupt(
                        path,
                        format!("row {line}, column {}: bad float: {e}", schema.columns[i]),
                    )
                })?;
                values.push(Some(v));
            }
        }

        records.push(Record::new(timestamp, values));
    }

    Ok(Series { source, records })
}
