//! Time window and page-size validation.

use chrono::{DateTime, Duration, Utc};

use crate::error::{PipelineError, PipelineResult};

/// How far back the mention timeline can be queried, in seconds (7 days).
pub const DEFAULT_LOOKBACK_SECS: i64 = 604_800;

/// Smallest page size the feed accepts.
pub const MIN_MAX_RESULTS: u32 = 5;

/// Largest page size the feed accepts.
pub const MAX_MAX_RESULTS: u32 = 100;

/// The feed's lookback bound as a duration.
#[must_use]
pub fn default_lookback() -> Duration {
    Duration::seconds(DEFAULT_LOOKBACK_SECS)
}

/// Window of mentions to analyse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Create a window; validation happens at run time against the clock.
    #[must_use]
    pub const fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Check `start <= end <= now` and `now - start <= lookback`.
    pub fn validate_at(&self, now: DateTime<Utc>, lookback: Duration) -> PipelineResult<()> {
        if self.start > self.end {
            return Err(self.invalid("start is after end".to_string()));
        }
        if self.end > now {
            return Err(self.invalid(format!("end is in the future (now {now})")));
        }
        if now - self.start > lookback {
            return Err(self.invalid(format!(
                "start is more than {}s in the past",
                lookback.num_seconds()
            )));
        }
        Ok(())
    }

    /// Check the page size requested for this window against the feed's accepted range.
    pub fn validate_max_results(&self, value: u32) -> PipelineResult<u32> {
        if (MIN_MAX_RESULTS..=MAX_MAX_RESULTS).contains(&value) {
            Ok(value)
        } else {
            Err(self.invalid(format!(
                "max results {value} outside {MIN_MAX_RESULTS}..={MAX_MAX_RESULTS}"
            )))
        }
    }

    fn invalid(&self, reason: String) -> PipelineError {
        PipelineError::InvalidWindow {
            start: self.start,
            end: self.end,
            reason,
        }
    }
}
