//! Pörssisähkö spot price client.
//!
//! The upstream exposes one price per quarter-hour timestamp, queried
//! point by point. A 404 or a null price means the value is not published
//! (yet, or ever) and normalizes to an explicit missing value — absence of
//! data is state, not an error.

use crate::data::{Record, Source};
use crate::policy::TICK_MINUTES;
use crate::sync::{FetchError, FetchWindow, SourceClient};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use serde::Deserialize;
use std::time::Duration as StdDuration;

const DEFAULT_BASE_URL: &str = "https://api.porssisahko.net/v2/price.json";

#[derive(Debug, Deserialize)]
struct PriceResponse {
    price: Option<f64>,
}

pub struct PorssisahkoClient {
    http: reqwest::blocking::Client,
    base_url: String,
}

impl PorssisahkoClient {
    pub fn new() -> Self {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        let http = reqwest::blocking::Client::builder()
            .timeout(StdDuration::from_secs(10))
            .user_agent("wattcast/0.1")
            .build()
            .expect("failed to build HTTP client");
        Self {
            http,
            base_url: base_url.into(),
        }
    }

    /// Fetch the price for a single quarter-hour tick.
    pub fn fetch_tick(&self, ts: DateTime<Utc>) -> Result<Record, FetchError> {
        let iso = ts.to_rfc3339_opts(SecondsFormat::Secs, true);
        let resp = self
            .http
            .get(&self.base_url)
            .query(&[("date", iso.as_str())])
            .send()
            .map_err(|e| FetchError::Transient(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::Throttled);
        }
        if status == reqwest::StatusCode::NOT_FOUND {
            // No price for this instant — too far in the past or future.
            return Ok(Record::new(ts, vec![None]));
        }
        if !status.is_success() {
            return Err(FetchError::Transient(format!("HTTP {status} at {iso}")));
        }

        let body: PriceResponse = resp
            .json()
            .map_err(|e| FetchError::Transient(format!("malformed price payload: {e}")))?;

        Ok(Record::new(ts, vec![body.price]))
    }
}

impl Default for PorssisahkoClient {
    fn default() -> Self {
        Self::new()
    }
}

impl SourceClient for PorssisahkoClient {
    fn source(&self) -> Source {
        Source::Prices
    }

    fn max_span(&self) -> Duration {
        Duration::days(1)
    }

    fn fetch_window(&self, window: &FetchWindow) -> Result<Vec<Record>, FetchError> {
        let mut records = Vec::new();
        let mut ts = window.start;
        while ts < window.end {
            records.push(self.fetch_tick(ts)?);
            ts += Duration::minutes(TICK_MINUTES);
        }
        Ok(records)
    }
}
