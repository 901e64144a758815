//! # Time Sources
//!
//! The economy never reads the system clock directly. Everything that
//! compares against "now" goes through a [`TimeSource`], so tests can move
//! time forward deterministically.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Provider of the current UTC time.
pub trait TimeSource: Send + Sync {
    /// Returns the current time.
    fn utc_now(&self) -> DateTime<Utc>;
}

/// Wall clock - uses real time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl SystemClock {
    /// Creates a wall clock.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl TimeSource for SystemClock {
    fn utc_now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Hand-driven clock for tests and replays.
///
/// Time only moves when [`set`](Self::set) or [`advance`](Self::advance)
/// is called.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Creates a clock frozen at `start`.
    #[must_use]
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Jumps to an absolute time.
    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    /// Moves time forward (or back, with a negative delta).
    pub fn advance(&self, delta: Duration) {
        let mut now = self.now.lock();
        *now += delta;
    }
}

impl TimeSource for ManualClock {
    fn utc_now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}
