//! FMI weather observation client.
//!
//! One windowed query returns 10-minute observations for several stations.
//! Stations are averaged per timestamp before the rows leave this module,
//! keeping the persisted series timestamp-unique; fields a station did not
//! report stay missing and are ignored by the average.

use crate::data::{Record, Source};
use crate::sync::{FetchError, FetchWindow, SourceClient};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration as StdDuration;

const DEFAULT_BASE_URL: &str = "https://opendata.fmi.fi/timeseries";

const DEFAULT_PLACES: &[&str] = &["Helsinki", "Tampere", "Oulu"];

/// One observation row as returned by the timeseries endpoint.
#[derive(Debug, Deserialize)]
struct ObservationRow {
    utctime: String,
    temperature: Option<f64>,
    windspeedms: Option<f64>,
    precipitation1h: Option<f64>,
}

pub struct FmiClient {
    http: reqwest::blocking::Client,
    base_url: String,
    places: Vec<String>,
}

impl FmiClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let http = reqwest::blocking::Client::builder()
            .timeout(StdDuration::from_secs(30))
            .user_agent("wattcast/0.1")
            .build()
            .expect("failed to build HTTP client");
        Self {
            http,
            base_url: base_url.into(),
            places: DEFAULT_PLACES.iter().map(|s| s.to_string()).collect(),
        }
    }

    pub fn with_places(mut self, places: Vec<String>) -> Self {
        self.places = places;
        self
    }
}

impl Default for FmiClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceClient for FmiClient {
    fn source(&self) -> Source {
        Source::Weather
    }

    fn max_span(&self) -> Duration {
        Duration::days(7)
    }

    fn fetch_window(&self, window: &FetchWindow) -> Result<Vec<Record>, FetchError> {
        let start = window.start.to_rfc3339_opts(SecondsFormat::Secs, true);
        let end = window.end.to_rfc3339_opts(SecondsFormat::Secs, true);

        let resp = self
            .http
            .get(&self.base_url)
            .query(&[
                ("format", "json"),
                ("timeformat", "xml"),
                ("precision", "double"),
                ("param", "utctime,temperature,windspeedms,precipitation1h"),
                ("places", &self.places.join(",")),
                ("starttime", &start),
                ("endtime", &end),
            ])
            .send()
            .map_err(|e| FetchError::Transient(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::Throttled);
        }
        if !status.is_success() {
            return Err(FetchError::Transient(format!("HTTP {status} for {window}")));
        }

        let rows: Vec<ObservationRow> = resp
            .json()
            .map_err(|e| FetchError::Transient(format!("malformed weather payload: {e}")))?;

        aggregate_stations(rows)
    }
}

/// Average multi-station rows into one record per timestamp.
fn aggregate_stations(rows: Vec<ObservationRow>) -> Result<Vec<Record>, FetchError> {
    // Per timestamp: (sum, count) per field.
    let mut buckets: BTreeMap<DateTime<Utc>, [(f64, u32); 3]> = BTreeMap::new();

    for row in rows {
        let ts = DateTime::parse_from_rfc3339(&row.utctime)
            .map_err(|e| FetchError::Transient(format!("bad utctime {}: {e}", row.utctime)))?
            .with_timezone(&Utc);

        let bucket = buckets.entry(ts).or_insert([(0.0, 0); 3]);
        for (slot, value) in bucket
            .iter_mut()
            .zip([row.temperature, row.windspeedms, row.precipitation1h])
        {
            if let Some(v) = value {
                slot.0 += v;
                slot.1 += 1;
            }
        }
    }

    Ok(buckets
        .into_iter()
        .map(|(ts, fields)| {
            let values = fields
                .iter()
                .map(|(sum, count)| {
                    if *count > 0 {
                        Some(sum / f64::from(*count))
                    } else {
                        None
                    }
                })
                .collect();
            Record::new(ts, values)
        })
        .collect())
}
