use std::thread;
use std::time::{Duration, Instant};

/// Monotonic time source used by every polling loop and actuator pulse.
///
/// - now(): returns a monotonic Instant
/// - sleep(): blocks for the provided duration (test clocks advance instead)
/// - ms_since(): elapsed milliseconds from an epoch Instant
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, d: Duration);

    /// Milliseconds elapsed since `epoch`, saturating at 0 on underflow.
    fn ms_since(&self, epoch: Instant) -> u64 {
        let dur = self.now().saturating_duration_since(epoch);
        u64::try_from(dur.as_millis()).unwrap_or(u64::MAX)
    }

    /// Seconds elapsed since `epoch` as a float, for rate computations.
    fn secs_since(&self, epoch: Instant) -> f32 {
        self.now().saturating_duration_since(epoch).as_secs_f32()
    }
}

/// Real-time monotonic clock backed by std::time::Instant.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    #[inline]
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    #[inline]
    fn now(&self) -> Instant {
        Instant::now()
    }

    #[inline]
    fn sleep(&self, d: Duration) {
        if d.is_zero() {
            return;
        }
        thread::sleep(d);
    }
}

#[cfg(any(test, feature = "test-clock"))]
pub mod test_clock {
    use super::*;
    use std::sync::{Arc, Mutex};

    /// Deterministic clock whose time only moves when asked to.
    ///
    /// now() = origin + offset
    /// sleep(d) advances internal time by d without blocking, so a 2 s servo
    /// pulse costs nothing in a test run. Clones share the same timeline.
    #[derive(Debug, Clone)]
    pub struct TestClock {
        origin: Instant,
        offset: Arc<Mutex<Duration>>,
    }

    impl Default for TestClock {
        fn default() -> Self {
            Self::new()
        }
    }

    impl TestClock {
        pub fn new() -> Self {
            Self {
                origin: Instant::now(),
                offset: Arc::new(Mutex::new(Duration::ZERO)),
            }
        }

        /// Advance the clock by the given duration.
        pub fn advance(&self, d: Duration) {
            if let Ok(mut off) = self.offset.lock() {
                *off = off.saturating_add(d);
            }
        }

        /// Advance the clock by whole milliseconds.
        pub fn advance_ms(&self, ms: u64) {
            self.advance(Duration::from_millis(ms));
        }

        /// Total simulated time elapsed since construction.
        pub fn elapsed(&self) -> Duration {
            self.offset.lock().map(|g| *g).unwrap_or(Duration::ZERO)
        }
    }

    impl Clock for TestClock {
        fn now(&self) -> Instant {
            self.origin + self.elapsed()
        }

        fn sleep(&self, d: Duration) {
            self.advance(d);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_clock::TestClock;
    use super::*;

    #[test]
    fn test_clock_sleep_advances_without_blocking() {
        let clock = TestClock::new();
        let epoch = clock.now();
        clock.sleep(Duration::from_secs(2));
        clock.sleep(Duration::from_millis(500));
        assert_eq!(clock.ms_since(epoch), 2_500);
    }

    #[test]
    fn clones_share_timeline() {
        let a = TestClock::new();
        let b = a.clone();
        let epoch = a.now();
        b.advance_ms(20);
        assert_eq!(a.ms_since(epoch), 20);
        assert!((a.secs_since(epoch) - 0.02).abs() < 1e-6);
    }

    #[test]
    fn ms_since_saturates_for_future_epoch() {
        let clock = TestClock::new();
        let later = clock.now() + Duration::from_secs(1);
        assert_eq!(clock.ms_since(later), 0);
    }
}
