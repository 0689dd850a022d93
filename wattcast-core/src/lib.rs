//! Wattcast Core — rolling series stores, sync scheduling, and the feature
//! pipeline for short-term electricity price forecasting.
//!
//! The crate keeps three independently sourced time series (spot price,
//! weather, grid consumption/production) synchronized against their remote
//! APIs and derives a fixed-width, leakage-free feature matrix from them:
//! - Per-source CSV stores with atomic replace-on-write
//! - Freshness/guard decisions (fetch only when stale, only the gap)
//! - Rate-limit-aware fetch with bounded exponential backoff
//! - One-cycle orchestration, sources isolated from each other's failures
//! - Resample → align → lag/rolling/calendar features → forward target

pub mod data;
pub mod features;
pub mod policy;
pub mod sources;
pub mod sync;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: the types crossing the orchestrator boundary
    /// are Send + Sync, so a future threaded scheduler needs no retrofit.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<data::Record>();
        require_sync::<data::Record>();
        require_send::<data::Series>();
        require_sync::<data::Series>();
        require_send::<data::Source>();
        require_sync::<data::Source>();

        require_send::<sync::FetchWindow>();
        require_sync::<sync::FetchWindow>();
        require_send::<sync::FreshnessDecision>();
        require_sync::<sync::FreshnessDecision>();
        require_send::<sync::RetrySchedule>();
        require_sync::<sync::RetrySchedule>();

        require_send::<features::FeatureMatrix>();
        require_sync::<features::FeatureMatrix>();
        require_send::<policy::SyncPolicy>();
        require_sync::<policy::SyncPolicy>();
    }
}
