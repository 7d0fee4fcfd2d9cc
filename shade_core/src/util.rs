//! Shared time base and formatting helpers.
use std::sync::Arc;
use std::time::{Duration, Instant};

use shade_traits::clock::Clock;

/// Clock plus the epoch every task measures milliseconds from.
#[derive(Clone)]
pub struct Timebase {
    clock: Arc<dyn Clock + Send + Sync>,
    epoch: Instant,
}

impl core::fmt::Debug for Timebase {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Timebase").field("epoch", &self.epoch).finish()
    }
}

impl Timebase {
    pub fn new(clock: Arc<dyn Clock + Send + Sync>) -> Self {
        let epoch = clock.now();
        Self { clock, epoch }
    }

    /// Milliseconds since the epoch.
    #[inline]
    pub fn now_ms(&self) -> u64 {
        self.clock.ms_since(self.epoch)
    }

    #[inline]
    pub fn sleep(&self, d: Duration) {
        self.clock.sleep(d);
    }

    #[inline]
    pub fn sleep_ms(&self, ms: u64) {
        self.clock.sleep(Duration::from_millis(ms));
    }

    #[inline]
    pub fn sleep_us(&self, us: u64) {
        self.clock.sleep(Duration::from_micros(us));
    }
}

/// `1234` -> `"12.34%"`.
pub fn fmt_percent100ths(position: u16) -> String {
    format!("{}.{:02}%", position / 100, position % 100)
}
