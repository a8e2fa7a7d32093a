//! Simulated time: [`Timestamp`] and the [`Clock`] trait.
//!
//! All deadlines in the engine are absolute timestamps compared against
//! the `now` read at the start of each tick. The clock decides how that
//! `now` moves: [`ManualClock`] advances only by the elapsed delta the
//! driver passes to the tick, [`WallClock`] follows a monotonic
//! [`Instant`] and ignores the delta.

use std::fmt;
use std::time::Instant;

/// A point in simulated time, in whole milliseconds since the clock's origin.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Timestamp(pub u64);

impl Timestamp {
    /// The clock origin.
    pub const ZERO: Timestamp = Timestamp(0);

    /// Timestamp `ms` milliseconds after `self`, saturating at `u64::MAX`.
    pub fn after(self, ms: u64) -> Timestamp {
        Timestamp(self.0.saturating_add(ms))
    }

    /// Milliseconds elapsed from `earlier` to `self`, or 0 if `earlier`
    /// is in the future.
    pub fn saturating_since(self, earlier: Timestamp) -> u64 {
        self.0.saturating_sub(earlier.0)
    }

    /// Raw millisecond value.
    pub fn as_millis(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

impl From<u64> for Timestamp {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

/// Source of the current simulated time.
///
/// Implementations must be monotonic: `now()` never decreases.
pub trait Clock: Send {
    /// Current time.
    fn now(&self) -> Timestamp;

    /// Called once per tick with the driver's elapsed delta, before
    /// `now()` is read.
    fn advance(&mut self, elapsed_ms: u64);
}

/// Virtual clock driven entirely by tick deltas.
///
/// Deterministic: the same sequence of deltas always yields the same
/// sequence of timestamps. This is the default clock of a simulation.
#[derive(Clone, Debug, Default)]
pub struct ManualClock {
    now: Timestamp,
}

impl ManualClock {
    /// Create a clock starting at `start`.
    pub fn starting_at(start: Timestamp) -> Self {
        Self { now: start }
    }

    /// Jump forward to `t`. Earlier timestamps are ignored.
    pub fn set(&mut self, t: Timestamp) {
        if t > self.now {
            self.now = t;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        self.now
    }

    fn advance(&mut self, elapsed_ms: u64) {
        self.now = self.now.after(elapsed_ms);
    }
}

/// Monotonic wall clock measured from its construction.
#[derive(Clone, Debug)]
pub struct WallClock {
    origin: Instant,
}

impl WallClock {
    /// Start a wall clock at the current instant.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for WallClock {
    fn now(&self) -> Timestamp {
        let ms = self.origin.elapsed().as_millis();
        Timestamp(u64::try_from(ms).unwrap_or(u64::MAX))
    }

    fn advance(&mut self, _elapsed_ms: u64) {}
}
