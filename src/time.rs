//! Simulated time.
//!
//! The kernel keeps simulated time in a single canonical unit and never
//! scales it (see the Design Notes on `baseTimeUnit`): a [`SimTime`] is
//! "however many abstract ticks the embedding application decides they
//! are"; unit conversion is entirely the caller's business.

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Sub};

/// A point (or duration) in simulated time.
///
/// Backed by `f64` so that replication length, generator ending time, and
/// schedule length can all represent "+∞" (see [`SimTime::INFINITE`]).
/// Unlike a raw `f64`, `SimTime` provides a genuine total order: the
/// calendar's ordering invariant requires one, and native `f64` comparison
/// cannot provide it once NaN enters the picture. The kernel never
/// constructs a NaN `SimTime`; the total order exists so the invariant is
/// enforceable in the type system rather than merely by convention.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimTime(f64);

impl SimTime {
    /// The zero point of simulated time.
    pub const ZERO: SimTime = SimTime(0.0);

    /// A time that is later than any finite time. Used for "replication
    /// length may be +∞" and "generator ending time may be +∞".
    pub const INFINITE: SimTime = SimTime(f64::INFINITY);

    /// Constructs a `SimTime` from a non-negative number of ticks.
    ///
    /// # Panics
    ///
    /// Panics if `ticks` is negative or NaN; callers that need to validate
    /// user input should check before calling this constructor and return a
    /// [`crate::SimError`] instead.
    #[must_use]
    pub fn new(ticks: f64) -> Self {
        assert!(
            !ticks.is_nan() && ticks >= 0.0,
            "SimTime must be non-negative and not NaN, got {ticks}"
        );
        SimTime(ticks)
    }

    /// Returns the underlying tick value as `f64`.
    #[must_use]
    pub fn as_f64(self) -> f64 {
        self.0
    }

    /// Returns `true` if this time is [`SimTime::INFINITE`].
    #[must_use]
    pub fn is_infinite(self) -> bool {
        self.0.is_infinite()
    }

    /// Saturating addition: `INFINITE + anything == INFINITE`.
    #[must_use]
    pub fn saturating_add(self, rhs: SimTime) -> SimTime {
        SimTime(self.0 + rhs.0)
    }
}

impl Default for SimTime {
    fn default() -> Self {
        SimTime::ZERO
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Eq for SimTime {}

impl PartialOrd for SimTime {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SimTime {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Add for SimTime {
    type Output = SimTime;

    fn add(self, rhs: SimTime) -> SimTime {
        self.saturating_add(rhs)
    }
}

impl Sub for SimTime {
    type Output = SimTime;

    fn sub(self, rhs: SimTime) -> SimTime {
        SimTime(self.0 - rhs.0)
    }
}

impl From<f64> for SimTime {
    fn from(ticks: f64) -> Self {
        SimTime::new(ticks)
    }
}
