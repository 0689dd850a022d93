//! Synchronization policy constants and validation.

use chrono::Duration;
use thiserror::Error;

/// Rolling backlog retained per source, in days.
pub const DAYS_BACKLOG: i64 = 14;

/// Data younger than this is "fresh": no fetch needed.
pub const FRESHNESS_HOURS: i64 = 12;

/// Minimum age of the latest record before another fetch is attempted,
/// regardless of freshness. Prevents hammering an upstream that is simply
/// lagging behind wall clock.
pub const DAILY_GUARD_HOURS: i64 = 20;

/// Resampling grid step, in minutes.
pub const TICK_MINUTES: i64 = 15;

/// Forward target horizon, in ticks (1 hour).
pub const TARGET_HORIZON_TICKS: usize = 4;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PolicyError {
    /// With `freshness_hours > daily_guard_hours` the guard would mask
    /// every legitimate fetch window.
    #[error("freshness_hours ({freshness_hours}) must not exceed daily_guard_hours ({daily_guard_hours})")]
    GuardMasksFreshness {
        freshness_hours: i64,
        daily_guard_hours: i64,
    },
}

/// Per-source scheduling parameters for the freshness evaluator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPolicy {
    pub days_backlog: i64,
    pub freshness_hours: i64,
    pub daily_guard_hours: i64,
}

impl SyncPolicy {
    pub fn new(
        days_backlog: i64,
        freshness_hours: i64,
        daily_guard_hours: i64,
    ) -> Result<Self, PolicyError> {
        if freshness_hours > daily_guard_hours {
            return Err(PolicyError::GuardMasksFreshness {
                freshness_hours,
                daily_guard_hours,
            });
        }
        Ok(Self {
            days_backlog,
            freshness_hours,
            daily_guard_hours,
        })
    }

    /// One step of the resampling grid.
    pub fn tick(&self) -> Duration {
        Duration::minutes(TICK_MINUTES)
    }
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            days_backlog: DAYS_BACKLOG,
            freshness_hours: FRESHNESS_HOURS,
            daily_guard_hours: DAILY_GUARD_HOURS,
        }
    }
}
