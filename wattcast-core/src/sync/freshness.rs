//! Freshness evaluation: decide whether a source needs a fetch at all.
//!
//! Pure function of the store's latest timestamp and wall-clock `now` — no
//! hidden state. The guard check runs before the freshness check, so a
//! store can be simultaneously stale and guarded; that precedence comes
//! from the upstream lag this is protecting against and is locked in by
//! tests here.

use crate::policy::SyncPolicy;
use chrono::{DateTime, Duration, DurationRound, Utc};

/// Half-open fetch window `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl FetchWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        debug_assert!(start < end, "fetch window must be non-empty");
        Self { start, end }
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

impl std::fmt::Display for FetchWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Outcome of the freshness evaluation for one source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FreshnessDecision {
    /// Latest record is younger than `freshness_hours`.
    SkipFresh,
    /// Latest record is younger than `daily_guard_hours`; skip even if the
    /// data is not fresh, to avoid hammering the API.
    SkipGuarded,
    /// Fetch the given window.
    Fetch(FetchWindow),
}

/// Decide whether and what to fetch for a store whose newest record is
/// `latest` (`None` for an empty store).
pub fn decide(
    latest: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
    policy: &SyncPolicy,
) -> FreshnessDecision {
    let end = now
        .duration_trunc(Duration::hours(1))
        .expect("hour truncation cannot fail for valid instants");

    let latest = match latest {
        None => {
            // First run: pull the whole backlog window.
            let start = end - Duration::days(policy.days_backlog);
            return FreshnessDecision::Fetch(FetchWindow::new(start, end));
        }
        Some(ts) => ts,
    };

    let age = end - latest;
    if age < Duration::hours(policy.daily_guard_hours) {
        return FreshnessDecision::SkipGuarded;
    }
    if age < Duration::hours(policy.freshness_hours) {
        return FreshnessDecision::SkipFresh;
    }

    // Stale: fetch only the gap, capped at the retention window. Anything
    // older than the backlog would be trimmed away on merge anyway.
    let backlog_start = end - Duration::days(policy.days_backlog);
    let start = (latest + policy.tick()).max(backlog_start);
    FreshnessDecision::Fetch(FetchWindow::new(start, end))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn policy() -> SyncPolicy {
        SyncPolicy::default()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap()
    }

    #[test]
    fn empty_store_fetches_full_backlog() {
        let decision = decide(None, now(), &policy());
        assert_eq!(
            decision,
            FreshnessDecision::Fetch(FetchWindow::new(
                Utc.with_ymd_and_hms(2024, 12, 27, 0, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap(),
            ))
        );
    }

    #[test]
    fn now_is_floored_to_the_hour() {
        let late_now = Utc.with_ymd_and_hms(2025, 1, 10, 0, 42, 17).unwrap();
        let decision = decide(None, late_now, &policy());
        let FreshnessDecision::Fetch(window) = decision else {
            panic!("expected fetch");
        };
        assert_eq!(window.end, Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap());
    }

    #[test]
    fn one_hour_gap_is_guarded() {
        let latest = Utc.with_ymd_and_hms(2025, 1, 9, 23, 0, 0).unwrap();
        assert_eq!(decide(Some(latest), now(), &policy()), FreshnessDecision::SkipGuarded);
    }

    #[test]
    fn five_hour_gap_is_guarded() {
        let latest = now() - Duration::hours(5);
        assert_eq!(decide(Some(latest), now(), &policy()), FreshnessDecision::SkipGuarded);
    }

    #[test]
    fn fifteen_hour_gap_is_still_guarded_not_merely_stale() {
        // Guard check (< 20h) runs before the freshness check, so 15h of
        // staleness is swallowed by the guard even though 15h >= 12h.
        let latest = now() - Duration::hours(15);
        assert_eq!(decide(Some(latest), now(), &policy()), FreshnessDecision::SkipGuarded);
    }

    #[test]
    fn twenty_five_hour_gap_fetches_from_latest_plus_one_tick() {
        let latest = now() - Duration::hours(25);
        let decision = decide(Some(latest), now(), &policy());
        assert_eq!(
            decision,
            FreshnessDecision::Fetch(FetchWindow::new(
                latest + Duration::minutes(15),
                now(),
            ))
        );
    }

    #[test]
    fn gap_fetch_never_requests_the_full_backlog() {
        let latest = now() - Duration::hours(30);
        let FreshnessDecision::Fetch(window) = decide(Some(latest), now(), &policy()) else {
            panic!("expected fetch");
        };
        assert!(window.start > now() - Duration::days(14));
        assert_eq!(window.start, latest + Duration::minutes(15));
    }

    #[test]
    fn ancient_store_is_capped_at_the_backlog_window() {
        // Latest record predates the whole retention window: requesting
        // the true gap would span weeks of data the merge would trim.
        let latest = now() - Duration::days(20);
        let decision = decide(Some(latest), now(), &policy());
        assert_eq!(
            decision,
            FreshnessDecision::Fetch(FetchWindow::new(now() - Duration::days(14), now()))
        );
    }

    #[test]
    fn exactly_guard_age_fetches() {
        let latest = now() - Duration::hours(20);
        assert!(matches!(
            decide(Some(latest), now(), &policy()),
            FreshnessDecision::Fetch(_)
        ));
    }
}
