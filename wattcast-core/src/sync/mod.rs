//! Synchronization: freshness decisions, retrying fetches, cycle orchestration.

pub mod backfill;
pub mod fetch;
pub mod freshness;
pub mod orchestrator;

pub use backfill::{backfill_ticks, BackfillReport};
pub use fetch::{fetch_with_retry, FetchError, RetrySchedule, SourceClient};
pub use freshness::{decide, FetchWindow, FreshnessDecision};
pub use orchestrator::{
    run_cycle, CycleProgress, CycleSummary, NullProgress, SourceOutcome, SourceReport,
    StdoutProgress,
};
