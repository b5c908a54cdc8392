//! Download time window computation.
//!
//! A segment's window is anchored on the theoretical arrival time (event
//! origin time + modeled travel time) and widened by the configured pre/post
//! margins. Both bounds are rounded to the nearest whole second *before* the
//! window is ever compared against stored rows, so that floating point jitter
//! in the travel time computation can never produce two rows for what is
//! logically the same request.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// A half-open absolute time interval `[start, end)`, second-aligned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    /// Whether this window intersects `other` (half-open semantics).
    pub fn intersects(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }
}

impl std::fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "[{}, {})",
            self.start.format("%Y-%m-%dT%H:%M:%S"),
            self.end.format("%Y-%m-%dT%H:%M:%S")
        )
    }
}

/// Round a timestamp to the nearest whole second (>= .5s rounds up).
pub fn round_to_second(t: DateTime<Utc>) -> DateTime<Utc> {
    let micros = t.timestamp_subsec_micros() as i64;
    let truncated = t - Duration::microseconds(micros);
    if micros >= 500_000 {
        truncated + Duration::seconds(1)
    } else {
        truncated
    }
}

/// Builds segment download windows from arrival times and configured margins.
#[derive(Debug, Clone, Copy)]
pub struct WindowBuilder {
    pre: Duration,
    post: Duration,
}

impl WindowBuilder {
    /// Create a builder from the configured `timespan` pair, in minutes.
    pub fn new(pre_minutes: f64, post_minutes: f64) -> Self {
        Self {
            pre: Duration::seconds((pre_minutes * 60.0).round() as i64),
            post: Duration::seconds((post_minutes * 60.0).round() as i64),
        }
    }

    /// Compute the arrival time for an event origin and travel time in seconds.
    pub fn arrival_time(origin: DateTime<Utc>, travel_time_secs: f64) -> DateTime<Utc> {
        origin + Duration::microseconds((travel_time_secs * 1_000_000.0).round() as i64)
    }

    /// Build the rounded window around an arrival time.
    ///
    /// Deterministic and idempotent: identical inputs always yield
    /// byte-identical bounds, and rounding never accumulates across calls.
    pub fn window(&self, arrival: DateTime<Utc>) -> TimeWindow {
        TimeWindow {
            start: round_to_second(arrival - self.pre),
            end: round_to_second(arrival + self.post),
        }
    }

    /// Convenience: arrival + window in one step.
    pub fn window_for(
        &self,
        origin: DateTime<Utc>,
        travel_time_secs: f64,
    ) -> (DateTime<Utc>, TimeWindow) {
        let arrival = Self::arrival_time(origin, travel_time_secs);
        (arrival, self.window(arrival))
    }
}
