//! Status LED: blink codes and steady on/off.
//!
//! Callers publish a schedule into `LedSignal`; the LED task polls it and
//! drives the pin. Steady mode wins over a blink schedule.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use eyre::WrapErr;
use shade_traits::OutputPin;

use crate::config::LedCfg;
use crate::error::Result;
use crate::hw_error::map_hw_error;
use crate::util::Timebase;

/// One published LED request. Every write bumps `seq`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LedSchedule {
    pub seq: u16,
    pub continuous: bool,
    pub count: u16,
    /// Saturates at `u16::MAX` milliseconds.
    pub period_ms: u16,
}

impl LedSchedule {
    // seq:16 | continuous:16 | count:16 | period_ms:16
    fn pack(self) -> u64 {
        (u64::from(self.seq) << 48)
            | (u64::from(self.continuous) << 32)
            | (u64::from(self.count) << 16)
            | u64::from(self.period_ms)
    }

    fn unpack(word: u64) -> Self {
        Self {
            seq: (word >> 48) as u16,
            continuous: (word >> 32) & 1 == 1,
            count: (word >> 16) as u16,
            period_ms: word as u16,
        }
    }
}

/// The current LED schedule, held in a single atomic word so readers never
/// see a count from one request paired with the sequence of another.
#[derive(Debug, Default)]
pub struct LedSignal {
    word: AtomicU64,
}

impl LedSignal {
    pub fn new() -> Self {
        Self::default()
    }

    fn publish(&self, f: impl Fn(&mut LedSchedule)) {
        let _ = self
            .word
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |w| {
                let mut sched = LedSchedule::unpack(w);
                f(&mut sched);
                sched.seq = sched.seq.wrapping_add(1);
                Some(sched.pack())
            });
    }

    /// `count` on/off cycles of `period` each, then off.
    pub fn blink(&self, count: u16, period: Duration) {
        let ms = u16::try_from(period.as_millis()).unwrap_or(u16::MAX);
        self.publish(|s| {
            s.count = count;
            s.period_ms = ms;
        });
    }

    /// Steady on or off; drops any pending blinks.
    pub fn set_continuous(&self, on: bool) {
        self.publish(|s| {
            s.continuous = on;
            s.count = 0;
        });
    }

    pub fn schedule(&self) -> LedSchedule {
        LedSchedule::unpack(self.word.load(Ordering::Acquire))
    }

    /// Clear the blink count of schedule `seq` once it has played out.
    /// Returns false when a newer schedule has replaced it.
    pub fn retire(&self, seq: u16) -> bool {
        let current = self.word.load(Ordering::Acquire);
        let sched = LedSchedule::unpack(current);
        if sched.seq != seq {
            return false;
        }
        let done = LedSchedule { count: 0, ..sched };
        self.word
            .compare_exchange(current, done.pack(), Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn is_continuous(&self) -> bool {
        self.schedule().continuous
    }

    /// Blink cycles still scheduled (0 once a schedule has run out).
    pub fn pending_blinks(&self) -> u16 {
        self.schedule().count
    }

    /// Last requested blink period.
    pub fn period(&self) -> Duration {
        Duration::from_millis(u64::from(self.schedule().period_ms))
    }
}

/// The blink codes used during calibration, bound to their timings.
#[derive(Debug, Clone)]
pub struct LedHandle {
    signal: Arc<LedSignal>,
    cfg: LedCfg,
}

impl LedHandle {
    pub fn new(signal: Arc<LedSignal>, cfg: LedCfg) -> Self {
        Self { signal, cfg }
    }

    pub fn signal(&self) -> &Arc<LedSignal> {
        &self.signal
    }

    pub fn on(&self) {
        self.signal.set_continuous(true);
    }

    pub fn off(&self) {
        self.signal.set_continuous(false);
    }

    /// `count` slow blinks (2 = home set, 3 = calibration stored).
    pub fn success(&self, count: u16) {
        self.signal.set_continuous(false);
        self.signal.blink(count, self.cfg.success_period);
    }

    /// Fast error burst.
    pub fn error(&self) {
        self.signal.set_continuous(false);
        self.signal.blink(self.cfg.error_count, self.cfg.error_period);
    }
}

pub struct LedController<P: OutputPin> {
    pin: P,
    signal: Arc<LedSignal>,
    seen_seq: Option<u16>,
    cycle_start_ms: u64,
    level: Option<bool>,
}

impl<P: OutputPin> LedController<P> {
    pub fn new(pin: P, signal: Arc<LedSignal>) -> Self {
        Self {
            pin,
            signal,
            seen_seq: None,
            cycle_start_ms: 0,
            level: None,
        }
    }

    fn drive(&mut self, on: bool) -> Result<()> {
        if self.level == Some(on) {
            return Ok(());
        }
        self.pin
            .set_level(on)
            .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
            .wrap_err("driving LED")?;
        self.level = Some(on);
        Ok(())
    }

    /// Compute and drive the LED level for `now_ms`. Returns the level.
    pub fn tick(&mut self, now_ms: u64) -> Result<bool> {
        let sched = self.signal.schedule();
        if sched.continuous {
            self.drive(true)?;
            return Ok(true);
        }

        if self.seen_seq != Some(sched.seq) {
            self.seen_seq = Some(sched.seq);
            self.cycle_start_ms = now_ms;
        }
        if sched.count == 0 {
            self.drive(false)?;
            return Ok(false);
        }

        let period = u64::from(sched.period_ms.max(2));
        let elapsed = now_ms.saturating_sub(self.cycle_start_ms);
        if elapsed / period >= u64::from(sched.count) {
            self.signal.retire(sched.seq);
            self.drive(false)?;
            return Ok(false);
        }
        let on = elapsed % period < period / 2;
        self.drive(on)?;
        Ok(on)
    }

    /// Poll until `shutdown` is set, then switch the LED off.
    ///
    /// Pin errors are logged once per run of failures and the loop keeps going.
    pub fn run(&mut self, time: &Timebase, poll_ms: u64, shutdown: &AtomicBool) -> Result<()> {
        let mut failing = false;
        while !shutdown.load(Ordering::Relaxed) {
            match self.tick(time.now_ms()) {
                Ok(_) if failing => {
                    failing = false;
                    tracing::info!(target: "shade::led", "LED pin recovered");
                }
                Ok(_) => {}
                Err(e) => {
                    if !failing {
                        failing = true;
                        tracing::warn!(target: "shade::led", error = ?e, "LED update failed");
                    }
                }
            }
            time.sleep_ms(poll_ms);
        }
        self.drive(false)
    }

    pub fn level(&self) -> Option<bool> {
        self.level
    }
}
