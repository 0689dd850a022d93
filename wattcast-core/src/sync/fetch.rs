//! Rate-limit-aware fetch orchestration around the per-source clients.
//!
//! A large window is split into source-specific sub-windows (upstream APIs
//! cap the queryable span) and fetched sequentially. Throttling and
//! transient failures are retried with exponential backoff; an exhausted
//! sub-window degrades to an empty batch so a single failed day never
//! aborts the whole sync. Only configuration errors propagate.

use super::freshness::FetchWindow;
use crate::data::{Record, Source};
use chrono::Duration;
use std::time::Duration as StdDuration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FetchError {
    /// Programmer/deployment error (e.g. missing API key). Fatal,
    /// surfaces immediately, never retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Explicit "too many requests" from the upstream.
    #[error("throttled by upstream")]
    Throttled,

    /// Network error, timeout, or malformed payload. Retried, then the
    /// sub-window degrades to an empty batch.
    #[error("transient fetch failure: {0}")]
    Transient(String),
}

/// Normalized remote-fetch primitive, one implementation per source.
///
/// Implementations own request construction, pagination, and response
/// parsing; the orchestration layer only sees `(timestamp, values)` rows.
pub trait SourceClient: Send + Sync {
    fn source(&self) -> Source;

    /// Maximum span the upstream allows per request window.
    fn max_span(&self) -> Duration;

    /// Fetch one window, returning rows in chronological order. Upstream
    /// gaps come back as records with `None` values, not as errors.
    fn fetch_window(&self, window: &FetchWindow) -> Result<Vec<Record>, FetchError>;
}

/// Exponential backoff schedule: `base * 2^attempt`, with the per-window
/// attempt budgets from the sync contract.
#[derive(Debug, Clone)]
pub struct RetrySchedule {
    pub base_delay: StdDuration,
    /// Total attempts for a throttled sub-window.
    pub throttle_attempts: u32,
    /// Retries (after the first attempt) for transient failures.
    pub transient_retries: u32,
}

impl RetrySchedule {
    pub fn delay(&self, attempt: u32) -> StdDuration {
        self.base_delay * 2u32.saturating_pow(attempt)
    }
}

impl Default for RetrySchedule {
    fn default() -> Self {
        Self {
            base_delay: StdDuration::from_secs(2),
            throttle_attempts: 5,
            transient_retries: 4,
        }
    }
}

/// Split a window into consecutive half-open sub-windows of at most
/// `max_span` each.
pub fn split_window(window: &FetchWindow, max_span: Duration) -> Vec<FetchWindow> {
    let mut sub_windows = Vec::new();
    let mut start = window.start;
    while start < window.end {
        let end = (start + max_span).min(window.end);
        sub_windows.push(FetchWindow::new(start, end));
        start = end;
    }
    sub_windows
}

/// Fetch a window through `client` with the retry contract applied per
/// sub-window. Returns all successfully fetched rows in chronological
/// order; errors other than configuration never cross this boundary.
pub fn fetch_with_retry(
    client: &dyn SourceClient,
    window: &FetchWindow,
    schedule: &RetrySchedule,
) -> Result<Vec<Record>, FetchError> {
    let mut rows = Vec::new();

    for sub in split_window(window, client.max_span()) {
        match fetch_sub_window(client, &sub, schedule)? {
            Some(batch) => rows.extend(batch),
            None => {
                eprintln!(
                    "[WARN] {}: giving up on window {sub} after retries; continuing with empty batch",
                    client.source()
                );
            }
        }
    }

    // Concurrent or out-of-order upstreams notwithstanding, the contract
    // is chronological output.
    rows.sort_by_key(|r| r.timestamp);
    Ok(rows)
}

/// One sub-window with backoff. `Ok(None)` means the retry budget is
/// exhausted and the sub-window degrades to empty.
fn fetch_sub_window(
    client: &dyn SourceClient,
    window: &FetchWindow,
    schedule: &RetrySchedule,
) -> Result<Option<Vec<Record>>, FetchError> {
    let mut throttle_attempts = 0u32;
    let mut transient_attempts = 0u32;

    loop {
        match client.fetch_window(window) {
            Ok(batch) => return Ok(Some(batch)),
            Err(FetchError::Configuration(msg)) => {
                return Err(FetchError::Configuration(msg));
            }
            Err(FetchError::Throttled) => {
                throttle_attempts += 1;
                if throttle_attempts >= schedule.throttle_attempts {
                    // Budget exhausted: degrade like a transient failure,
                    // never silently past the log line above.
                    return Ok(None);
                }
                let delay = schedule.delay(throttle_attempts - 1);
                eprintln!(
                    "[WARN] {}: throttled on {window}, backing off {delay:?} (attempt {throttle_attempts})",
                    client.source()
                );
                std::thread::sleep(delay);
            }
            Err(FetchError::Transient(msg)) => {
                if transient_attempts >= schedule.transient_retries {
                    return Ok(None);
                }
                let delay = schedule.delay(transient_attempts);
                transient_attempts += 1;
                eprintln!(
                    "[WARN] {}: transient failure on {window}: {msg}; retrying in {delay:?}",
                    client.source()
                );
                std::thread::sleep(delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, TimeZone, Utc};
    use std::sync::Mutex;

    fn ts(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, day, hour, 0, 0).unwrap()
    }

    /// Scripted client: pops one result per call.
    struct ScriptedClient {
        source: Source,
        max_span: Duration,
        script: Mutex<Vec<Result<Vec<Record>, FetchError>>>,
        calls: Mutex<Vec<FetchWindow>>,
    }

    impl ScriptedClient {
        fn new(script: Vec<Result<Vec<Record>, FetchError>>) -> Self {
            Self {
                source: Source::Prices,
                max_span: Duration::days(1),
                script: Mutex::new(script),
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    impl SourceClient for ScriptedClient {
        fn source(&self) -> Source {
            self.source
        }

        fn max_span(&self) -> Duration {
            self.max_span
        }

        fn fetch_window(&self, window: &FetchWindow) -> Result<Vec<Record>, FetchError> {
            self.calls.lock().unwrap().push(*window);
            let mut script = self.script.lock().unwrap();
            if script.is_empty() {
                Ok(Vec::new())
            } else {
                script.remove(0)
            }
        }
    }

    fn fast_schedule() -> RetrySchedule {
        RetrySchedule {
            base_delay: StdDuration::from_millis(1),
            ..RetrySchedule::default()
        }
    }

    fn rec(day: u32, hour: u32) -> Record {
        Record::new(ts(day, hour), vec![Some(1.0)])
    }

    #[test]
    fn splits_into_max_span_sub_windows() {
        let window = FetchWindow::new(ts(1, 0), ts(4, 12));
        let subs = split_window(&window, Duration::days(1));

        assert_eq!(subs.len(), 4);
        assert_eq!(subs[0], FetchWindow::new(ts(1, 0), ts(2, 0)));
        assert_eq!(subs[3], FetchWindow::new(ts(4, 0), ts(4, 12)));
        // Sub-windows tile the original exactly.
        for pair in subs.windows(2) {
            assert_eq!(pair[0].end, pair[1].start);
        }
    }

    #[test]
    fn window_smaller_than_span_is_one_piece() {
        let window = FetchWindow::new(ts(1, 0), ts(1, 6));
        let subs = split_window(&window, Duration::days(7));
        assert_eq!(subs, vec![window]);
    }

    #[test]
    fn backoff_doubles_each_attempt() {
        let schedule = RetrySchedule {
            base_delay: StdDuration::from_secs(2),
            ..RetrySchedule::default()
        };
        assert_eq!(schedule.delay(0), StdDuration::from_secs(2));
        assert_eq!(schedule.delay(1), StdDuration::from_secs(4));
        assert_eq!(schedule.delay(2), StdDuration::from_secs(8));
        assert_eq!(schedule.delay(3), StdDuration::from_secs(16));
    }

    #[test]
    fn transient_failures_retry_then_succeed() {
        let client = ScriptedClient::new(vec![
            Err(FetchError::Transient("boom".into())),
            Err(FetchError::Transient("boom".into())),
            Ok(vec![rec(1, 0)]),
        ]);
        let window = FetchWindow::new(ts(1, 0), ts(1, 12));

        let rows = fetch_with_retry(&client, &window, &fast_schedule()).unwrap();

        assert_eq!(rows.len(), 1);
        assert_eq!(client.calls.lock().unwrap().len(), 3);
    }

    #[test]
    fn exhausted_transient_budget_degrades_to_empty() {
        let script: Vec<_> = (0..10)
            .map(|_| Err(FetchError::Transient("down".into())))
            .collect();
        let client = ScriptedClient::new(script);
        let window = FetchWindow::new(ts(1, 0), ts(1, 12));

        let rows = fetch_with_retry(&client, &window, &fast_schedule()).unwrap();

        assert!(rows.is_empty());
        // 1 initial attempt + 4 retries.
        assert_eq!(client.calls.lock().unwrap().len(), 5);
    }

    #[test]
    fn throttle_budget_is_five_attempts() {
        let script: Vec<_> = (0..10).map(|_| Err(FetchError::Throttled)).collect();
        let client = ScriptedClient::new(script);
        let window = FetchWindow::new(ts(1, 0), ts(1, 12));

        let rows = fetch_with_retry(&client, &window, &fast_schedule()).unwrap();

        assert!(rows.is_empty());
        assert_eq!(client.calls.lock().unwrap().len(), 5);
    }

    #[test]
    fn failed_sub_window_does_not_abort_later_ones() {
        // Day 1 exhausts its transient budget, day 2 succeeds.
        let mut script: Vec<Result<Vec<Record>, FetchError>> = (0..5)
            .map(|_| Err(FetchError::Transient("day one is broken".into())))
            .collect();
        script.push(Ok(vec![rec(2, 3)]));
        let client = ScriptedClient::new(script);
        let window = FetchWindow::new(ts(1, 0), ts(3, 0));

        let rows = fetch_with_retry(&client, &window, &fast_schedule()).unwrap();

        assert_eq!(rows, vec![rec(2, 3)]);
    }

    #[test]
    fn configuration_error_surfaces_immediately() {
        let client = ScriptedClient::new(vec![Err(FetchError::Configuration(
            "missing api key".into(),
        ))]);
        let window = FetchWindow::new(ts(1, 0), ts(3, 0));

        let err = fetch_with_retry(&client, &window, &fast_schedule()).unwrap_err();

        assert!(matches!(err, FetchError::Configuration(_)));
        // No retry, no further sub-windows.
        assert_eq!(client.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn result_is_chronological_across_sub_windows() {
        let client = ScriptedClient::new(vec![
            Ok(vec![rec(1, 6), rec(1, 3)]),
            Ok(vec![rec(2, 1)]),
        ]);
        let window = FetchWindow::new(ts(1, 0), ts(3, 0));

        let rows = fetch_with_retry(&client, &window, &fast_schedule()).unwrap();

        assert_eq!(rows, vec![rec(1, 3), rec(1, 6), rec(2, 1)]);
    }
}
