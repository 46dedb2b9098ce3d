//! Time source used by the sweep sequencer.
//!
//! Settling waits and elapsed-time checks go through [`Clock`] so that sequencing
//! can be exercised without real waiting. [`SystemClock`] is the wall clock;
//! [`ManualClock`] only moves when told to.

use std::cell::Cell;
use std::time::{Duration, Instant};

pub trait Clock {
    /// Time since the clock was created.
    fn now(&self) -> Duration;

    /// Block for `duration`.
    fn sleep(&self, duration: Duration);
}

/// Monotonic wall clock.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep(&self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Simulated clock for tests and dry runs.
///
/// `sleep` advances time instantly. With [`ManualClock::with_tick`], every call to
/// `now` also advances the clock by a fixed step, which models time passing while
/// the devices are busy.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
    tick: Duration,
    slept: Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by `tick` after each `now()` call.
    pub fn with_tick(tick: Duration) -> Self {
        Self {
            tick,
            ..Self::default()
        }
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    /// Total time spent in `sleep`.
    pub fn total_slept(&self) -> Duration {
        self.slept.get()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        let now = self.now.get();
        self.now.set(now + self.tick);
        now
    }

    fn sleep(&self, duration: Duration) {
        self.slept.set(self.slept.get() + duration);
        self.advance(duration);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_clock_sleep_advances() {
        let clock = ManualClock::new();
        assert_eq!(clock.now(), Duration::ZERO);
        clock.sleep(Duration::from_secs(10));
        clock.sleep(Duration::from_secs(2));
        assert_eq!(clock.now(), Duration::from_secs(12));
        assert_eq!(clock.total_slept(), Duration::from_secs(12));
    }

    #[test]
    fn test_manual_clock_tick() {
        let clock = ManualClock::with_tick(Duration::from_millis(500));
        assert_eq!(clock.now(), Duration::ZERO);
        assert_eq!(clock.now(), Duration::from_millis(500));
        clock.advance(Duration::from_secs(1));
        assert_eq!(clock.now(), Duration::from_millis(2000));
        assert_eq!(clock.total_slept(), Duration::ZERO);
    }

    #[test]
    fn test_system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let a = clock.now();
        clock.sleep(Duration::ZERO);
        assert!(clock.now() >= a);
    }
}
