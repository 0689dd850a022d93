//! Fingrid open data client: grid consumption and production.
//!
//! The only credentialed source. The API key arrives as an explicit
//! configuration value constructed at process start — this module never
//! reads the environment. A missing or rejected key is a configuration
//! error: fatal for this source's cycle, never retried.

use crate::data::{Record, Source};
use crate::sync::{FetchError, FetchWindow, SourceClient};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration as StdDuration;

const DEFAULT_BASE_URL: &str = "https://data.fingrid.fi/api";

/// Real-time electricity consumption in Finland.
const CONSUMPTION_DATASET: u32 = 193;
/// Real-time electricity production in Finland.
const PRODUCTION_DATASET: u32 = 192;

const PAGE_SIZE: u32 = 20000;

/// Explicit credential holder, filled in by the process entry point.
#[derive(Debug, Clone)]
pub struct FingridAuth {
    api_key: Option<String>,
}

impl FingridAuth {
    pub fn new(api_key: Option<String>) -> Self {
        Self { api_key }
    }

    fn key(&self) -> Result<&str, FetchError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| FetchError::Configuration("Fingrid API key is not set".into()))
    }
}

#[derive(Debug, Deserialize)]
struct DatasetResponse {
    data: Vec<DataPoint>,
}

#[derive(Debug, Deserialize)]
struct DataPoint {
    #[serde(rename = "startTime")]
    start_time: String,
    value: Option<f64>,
}

pub struct FingridClient {
    http: reqwest::blocking::Client,
    base_url: String,
    auth: FingridAuth,
}

impl FingridClient {
    pub fn new(auth: FingridAuth) -> Self {
        Self::with_base_url(DEFAULT_BASE_URL, auth)
    }

    pub fn with_base_url(base_url: impl Into<String>, auth: FingridAuth) -> Self {
        let http = reqwest::blocking::Client::builder()
            .timeout(StdDuration::from_secs(30))
            .user_agent("wattcast/0.1")
            .build()
            .expect("failed to build HTTP client");
        Self {
            http,
            base_url: base_url.into(),
            auth,
        }
    }

    fn fetch_dataset(
        &self,
        dataset: u32,
        window: &FetchWindow,
    ) -> Result<Vec<(DateTime<Utc>, Option<f64>)>, FetchError> {
        let key = self.auth.key()?;
        let url = format!("{}/datasets/{dataset}/data", self.base_url);

        let resp = self
            .http
            .get(&url)
            .header("x-api-key", key)
            .query(&[
                ("startTime", window.start.to_rfc3339_opts(SecondsFormat::Secs, true)),
                ("endTime", window.end.to_rfc3339_opts(SecondsFormat::Secs, true)),
                ("format", "json".into()),
                ("pageSize", PAGE_SIZE.to_string()),
            ])
            .send()
            .map_err(|e| FetchError::Transient(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::Throttled);
        }
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
            return Err(FetchError::Configuration(format!(
                "Fingrid API key rejected (HTTP {status})"
            )));
        }
        if !status.is_success() {
            return Err(FetchError::Transient(format!(
                "HTTP {status} for dataset {dataset} {window}"
            )));
        }

        let body: DatasetResponse = resp
            .json()
            .map_err(|e| FetchError::Transient(format!("malformed dataset payload: {e}")))?;

        body.data
            .into_iter()
            .map(|p| {
                let ts = DateTime::parse_from_rfc3339(&p.start_time)
                    .map_err(|e| {
                        FetchError::Transient(format!("bad startTime {}: {e}", p.start_time))
                    })?
                    .with_timezone(&Utc);
                Ok((ts, p.value))
            })
            .collect()
    }
}

impl SourceClient for FingridClient {
    fn source(&self) -> Source {
        Source::Fingrid
    }

    fn max_span(&self) -> Duration {
        Duration::days(7)
    }

    fn fetch_window(&self, window: &FetchWindow) -> Result<Vec<Record>, FetchError> {
        let consumption = self.fetch_dataset(CONSUMPTION_DATASET, window)?;
        let production = self.fetch_dataset(PRODUCTION_DATASET, window)?;
        Ok(join_datasets(consumption, production))
    }
}

/// Outer-join the two dataset streams on timestamp. A timestamp present in
/// only one stream keeps the other column missing.
fn join_datasets(
    consumption: Vec<(DateTime<Utc>, Option<f64>)>,
    production: Vec<(DateTime<Utc>, Option<f64>)>,
) -> Vec<Record> {
    let mut merged: BTreeMap<DateTime<Utc>, [Option<f64>; 2]> = BTreeMap::new();

    for (ts, value) in consumption {
        merged.entry(ts).or_default()[0] = value;
    }
    for (ts, value) in production {
        merged.entry(ts).or_default()[1] = value;
    }

    merged
        .into_iter()
        .map(|(ts, [c, p])| Record::new(ts, vec![c, p]))
        .collect()
}
