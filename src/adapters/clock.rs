//! Wall-clock time, used only for the per-replication max-wall-time
//! timeout check. Simulated time (`SimTime`) is unrelated and never
//! passes through this trait.

use std::time::{Duration, Instant};

/// A source of monotonic wall-clock time. The production implementation
/// wraps `std::time::Instant`; tests use [`ManualWallClock`] to make the
/// `ExceededExecutionTime` path deterministic without a real sleeping
/// clock.
pub trait WallClock {
    /// Elapsed wall time since this clock was created or last reset.
    fn elapsed(&self) -> Duration;
}

/// Real wall-clock time, backed by `std::time::Instant`.
#[derive(Debug, Clone)]
pub struct SystemWallClock {
    start: Instant,
}

impl SystemWallClock {
    /// Creates a clock anchored to the current instant.
    #[must_use]
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Default for SystemWallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl WallClock for SystemWallClock {
    fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

/// A fake wall clock whose elapsed time is set explicitly, for
/// deterministically testing the wall-time timeout path.
#[derive(Debug, Clone, Default)]
pub struct ManualWallClock {
    elapsed: Duration,
}

impl ManualWallClock {
    /// Creates a manual clock starting at zero elapsed time.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Advances the clock's reported elapsed time by `delta`.
    pub fn advance(&mut self, delta: Duration) {
        self.elapsed += delta;
    }
}

impl WallClock for ManualWallClock {
    fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_starts_at_zero() {
        let clock = ManualWallClock::new();
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }

    #[test]
    fn manual_clock_advances_explicitly() {
        let mut clock = ManualWallClock::new();
        clock.advance(Duration::from_secs(2));
        clock.advance(Duration::from_millis(500));
        assert_eq!(clock.elapsed(), Duration::from_millis(2500));
    }

    #[test]
    fn system_clock_elapsed_is_monotonic_and_nonzero_eventually() {
        let clock = SystemWallClock::new();
        std::thread::sleep(Duration::from_millis(1));
        assert!(clock.elapsed() >= Duration::from_millis(1));
    }

    #[test]
    fn trait_object_works() {
        let clock: Box<dyn WallClock> = Box::new(ManualWallClock::new());
        assert_eq!(clock.elapsed(), Duration::ZERO);
    }
}
