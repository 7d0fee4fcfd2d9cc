use std::time::{Duration, Instant};

/// Monotonic time source for the control tasks.
///
/// The stepper paces pulses with `sleep`, so a test implementation that
/// advances instead of blocking makes every loop deterministic.
pub trait Clock {
    fn now(&self) -> Instant;
    fn sleep(&self, d: Duration);

    /// Whole milliseconds since `epoch`; 0 if `epoch` lies in the future.
    fn ms_since(&self, epoch: Instant) -> u64 {
        let ms = self.now().saturating_duration_since(epoch).as_millis();
        u64::try_from(ms).unwrap_or(u64::MAX)
    }
}

/// `Instant::now` and `thread::sleep`.
#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl MonotonicClock {
    pub fn new() -> Self {
        Self
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn sleep(&self, d: Duration) {
        if !d.is_zero() {
            std::thread::sleep(d);
        }
    }
}

#[cfg(any(test, feature = "test-util"))]
pub mod test_clock {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Manually driven clock. Clones share one timeline; `sleep` advances it.
    #[derive(Debug, Clone)]
    pub struct TestClock {
        origin: Instant,
        elapsed_us: Arc<AtomicU64>,
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
                elapsed_us: Arc::new(AtomicU64::new(0)),
            }
        }

        pub fn origin(&self) -> Instant {
            self.origin
        }

        /// Time advanced so far.
        pub fn elapsed(&self) -> Duration {
            Duration::from_micros(self.elapsed_us.load(Ordering::Acquire))
        }

        pub fn advance(&self, d: Duration) {
            let us = u64::try_from(d.as_micros()).unwrap_or(u64::MAX);
            self.elapsed_us.fetch_add(us, Ordering::AcqRel);
        }

        pub fn advance_ms(&self, ms: u64) {
            self.advance(Duration::from_millis(ms));
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

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn sleep_advances_without_blocking() {
            let clock = TestClock::new();
            clock.sleep(Duration::from_secs(3600));
            assert_eq!(clock.ms_since(clock.origin()), 3_600_000);
        }

        #[test]
        fn clones_share_the_timeline() {
            let a = TestClock::new();
            let b = a.clone();
            b.advance(Duration::from_micros(2010));
            assert_eq!(a.elapsed(), Duration::from_micros(2010));
            assert_eq!(a.ms_since(a.origin()), 2);
        }
    }
}
