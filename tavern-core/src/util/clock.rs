use std::{fmt::Debug, sync::Arc};

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

pub type SharedClock = Arc<dyn Clock>;

/// A source of wall-clock time. Playback positions are derived from it, never stored.
pub trait Clock: Debug + Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to. Mostly useful in tests.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self { now: start.into() }
    }

    /// Creates a clock starting at the current wall-clock time
    pub fn starting_now() -> Arc<Self> {
        Arc::new(Self::new(Utc::now()))
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    pub fn advance_seconds(&self, seconds: f64) {
        self.advance(Duration::milliseconds((seconds * 1000.).round() as i64))
    }

}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Converts a number of seconds into a millisecond-precision [Duration].
/// Values out of range saturate to the largest representable duration.
pub fn seconds_to_duration(seconds: f64) -> Duration {
    Duration::try_milliseconds((seconds * 1000.).round() as i64).unwrap_or(if seconds < 0. {
        Duration::min_value()
    } else {
        Duration::max_value()
    })
}

/// Converts a [Duration] into fractional seconds.
pub fn duration_to_seconds(duration: Duration) -> f64 {
    duration.num_milliseconds() as f64 / 1000.
}
