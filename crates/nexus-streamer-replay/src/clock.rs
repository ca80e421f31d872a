//! Run timing.
//!
//! A [`RunClock`] fixes, once per run, the offset between the recorded
//! timeline and live wall-clock time. Every scheduler of the run shares it.

use std::fmt::{Debug, Display};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

/// How recorded time maps onto wall-clock time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PacingMode {
    /// Replay at the recorded pace; the run starts now.
    Slow,
    /// Replay as fast as the sink allows; the run ended now.
    #[default]
    Fast,
}

impl Display for PacingMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PacingMode::Slow => write!(f, "slow"),
            PacingMode::Fast => write!(f, "fast"),
        }
    }
}

/// Wall-clock window of one replayed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunClock {
    pub mode: PacingMode,
    /// Live run start, nanoseconds since the Unix epoch.
    pub start_ns: i64,
    /// Live run stop, nanoseconds since the Unix epoch.
    pub stop_ns: i64,
    /// Added to recorded timestamps to place them in live time.
    pub start_time_delta_ns: i64,
}

impl RunClock {
    /// Computes the run window.
    ///
    /// Slow mode starts the run at `now_ns` so records come due at their
    /// recorded pace. Fast mode ends the run at `now_ns`, putting the whole
    /// recorded timeline in the past so every record is due immediately.
    pub fn new(
        mode: PacingMode,
        now_ns: i64,
        recorded_start_ns: i64,
        last_timestamp_ns: i64,
    ) -> Self {
        match mode {
            PacingMode::Slow => {
                let start_ns = now_ns;
                let start_time_delta_ns = start_ns.saturating_sub(recorded_start_ns);
                Self {
                    mode,
                    start_ns,
                    stop_ns: last_timestamp_ns.saturating_add(start_time_delta_ns),
                    start_time_delta_ns,
                }
            }
            PacingMode::Fast => {
                let stop_ns = now_ns;
                let duration = last_timestamp_ns.saturating_sub(recorded_start_ns);
                let start_ns = stop_ns.saturating_sub(duration);
                Self {
                    mode,
                    start_ns,
                    stop_ns,
                    start_time_delta_ns: start_ns.saturating_sub(recorded_start_ns),
                }
            }
        }
    }

    pub fn duration_ns(&self) -> i64 {
        self.stop_ns.saturating_sub(self.start_ns)
    }

    /// The point of the recorded timeline that is due at `wall_ns`.
    pub fn virtual_now(&self, wall_ns: i64) -> i64 {
        wall_ns.saturating_sub(self.start_time_delta_ns)
    }

    /// Places a recorded timestamp in live time.
    pub fn to_live(&self, recorded_ns: i64) -> i64 {
        recorded_ns.saturating_add(self.start_time_delta_ns)
    }
}

/// Source of "now" for schedulers.
pub trait TimeSource: Send + Sync + Debug {
    /// Nanoseconds since the Unix epoch.
    fn now_ns(&self) -> i64;
}

/// Reads the system clock directly.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemTimeSource;

impl TimeSource for SystemTimeSource {
    fn now_ns(&self) -> i64 {
        system_now_ns()
    }
}

/// Wall-clock time that advances with tokio's monotonic clock.
///
/// Anchored to the system clock once, so wall-clock adjustments during a
/// run do not make pacing jump. Follows tokio's paused clock in tests.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicTimeSource {
    anchor_ns: i64,
    anchor: tokio::time::Instant,
}

impl MonotonicTimeSource {
    pub fn new() -> Self {
        Self::anchored_at(system_now_ns())
    }

    /// Reports `anchor_ns` now and advances from there.
    pub fn anchored_at(anchor_ns: i64) -> Self {
        Self {
            anchor_ns,
            anchor: tokio::time::Instant::now(),
        }
    }
}

impl Default for MonotonicTimeSource {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for MonotonicTimeSource {
    fn now_ns(&self) -> i64 {
        let elapsed = i64::try_from(self.anchor.elapsed().as_nanos()).unwrap_or(i64::MAX);
        self.anchor_ns.saturating_add(elapsed)
    }
}

/// Current system time in nanoseconds since the Unix epoch.
pub fn system_now_ns() -> i64 {
    match SystemTime::now().duration_since(UNIX_EPOCH) {
        Ok(since) => i64::try_from(since.as_nanos()).unwrap_or(i64::MAX),
        Err(before) => -i64::try_from(before.duration().as_nanos()).unwrap_or(i64::MAX),
    }
}
