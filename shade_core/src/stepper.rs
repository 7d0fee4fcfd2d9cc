//! The stepping task: one pulse per iteration, accounted under the state lock.
//!
//! Each iteration snapshots the motor record, releases the lock, drives the
//! STEP/DIR/ENABLE lines, then re-locks once to count the step. The lock is
//! never held across a pulse.

use std::sync::atomic::{AtomicBool, Ordering};

use eyre::WrapErr;
use shade_traits::OutputPin;

use crate::config::StepperCfg;
use crate::error::Result;
use crate::hw_error::map_hw_error;
use crate::state::{Direction, SharedState, StepOutcome};
use crate::util::{Timebase, fmt_percent100ths};

/// STEP, DIR and ENABLE outputs of the driver chip.
pub struct StepperPins<P> {
    pub step: P,
    pub dir: P,
    pub enable: P,
}

pub struct StepperLoop<P: OutputPin> {
    pins: StepperPins<P>,
    state: SharedState,
    cfg: StepperCfg,
    time: Timebase,
    // last levels written, so idle iterations don't re-drive the lines
    enabled: Option<bool>,
    dir_level: Option<bool>,
    since_yield: u16,
}

fn set_pin<P: OutputPin>(pin: &mut P, high: bool, what: &'static str) -> Result<()> {
    pin.set_level(high)
        .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
        .wrap_err(what)
}

impl<P: OutputPin> StepperLoop<P> {
    pub fn new(pins: StepperPins<P>, state: SharedState, cfg: StepperCfg, time: Timebase) -> Self {
        Self {
            pins,
            state,
            cfg,
            time,
            enabled: None,
            dir_level: None,
            since_yield: 0,
        }
    }

    /// Put the lines into their resting levels: STEP low, DIR high, driver disabled.
    pub fn init_pins(&mut self) -> Result<()> {
        set_pin(&mut self.pins.step, false, "init STEP")?;
        self.set_dir(Direction::Positive)?;
        self.set_enabled(false)
    }

    fn set_enabled(&mut self, on: bool) -> Result<()> {
        if self.enabled == Some(on) {
            return Ok(());
        }
        let level = on != self.cfg.enable_active_low;
        set_pin(&mut self.pins.enable, level, "driving ENABLE")?;
        self.enabled = Some(on);
        Ok(())
    }

    fn set_dir(&mut self, dir: Direction) -> Result<()> {
        let level = dir.dir_level();
        if self.dir_level == Some(level) {
            return Ok(());
        }
        set_pin(&mut self.pins.dir, level, "driving DIR")?;
        self.dir_level = Some(level);
        Ok(())
    }

    fn pulse(&mut self) -> Result<()> {
        set_pin(&mut self.pins.step, true, "raising STEP")?;
        self.time.sleep_us(u64::from(self.cfg.pulse_us));
        set_pin(&mut self.pins.step, false, "lowering STEP")?;
        self.time.sleep_us(u64::from(self.cfg.step_delay_us));
        Ok(())
    }

    fn drive_step(&mut self, dir: Direction) -> Result<()> {
        self.set_enabled(true)?;
        self.set_dir(dir)?;
        self.pulse()
    }

    /// One iteration: idle (driver disabled) or exactly one pulse plus its accounting.
    ///
    /// A line that fails mid-move halts the motion, so a new target is needed
    /// before stepping resumes.
    pub fn step_once(&mut self) -> Result<StepOutcome> {
        let snap = self.state.snapshot();
        if !snap.moving || snap.direction == Direction::None {
            self.set_enabled(false)?;
            return Ok(StepOutcome::Idle);
        }

        if let Err(e) = self.drive_step(snap.direction) {
            self.state.update(|s| s.halt());
            // levels are unknown now; rewrite them on the next attempt
            self.enabled = None;
            self.dir_level = None;
            let _ = set_pin(&mut self.pins.step, false, "lowering STEP");
            let _ = self.set_enabled(false);
            return Err(e);
        }

        let (outcome, after) = self.state.update(|s| (s.advance(snap.direction), *s));
        match outcome {
            StepOutcome::Reached => tracing::info!(
                target: "shade::state",
                steps = after.current_steps,
                position = %fmt_percent100ths(after.current_position),
                "reached target"
            ),
            StepOutcome::Overflow => tracing::error!(
                target: "shade::motor",
                steps = after.current_steps,
                "step counter overflow during limit search; motion force-stopped"
            ),
            StepOutcome::Idle | StepOutcome::Stepped => {}
        }

        self.since_yield += 1;
        if self.since_yield >= self.cfg.yield_every_steps.max(1) {
            self.since_yield = 0;
            self.time.sleep_ms(1);
        }
        Ok(outcome)
    }

    /// Step until `shutdown` is set. The driver is disabled on the way out.
    ///
    /// Pin errors are logged once per run of failures and the loop keeps going.
    pub fn run(&mut self, shutdown: &AtomicBool) -> Result<()> {
        let mut failing = false;
        while !shutdown.load(Ordering::Relaxed) {
            match self.step_once() {
                Ok(outcome) => {
                    if failing {
                        failing = false;
                        tracing::info!(target: "shade::motor", "stepper lines recovered");
                    }
                    if outcome == StepOutcome::Idle {
                        self.time.sleep_ms(self.cfg.idle_poll_ms);
                    }
                }
                Err(e) => {
                    if !failing {
                        failing = true;
                        tracing::error!(target: "shade::motor", error = ?e, "step failed; motion halted");
                    }
                    self.time.sleep_ms(self.cfg.idle_poll_ms);
                }
            }
        }
        tracing::trace!(target: "shade::motor", "stepper loop exiting");
        self.set_enabled(false)
    }
}
