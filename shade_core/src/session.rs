//! Manual calibration: the button-driven state machine.
//!
//! ```text
//! Idle --hold STOP--> Ready --UP--> MovingToHome --STOP--> HomeSet
//!   ^                                                       |  ^
//!   |                                                     DOWN |  travel out of range
//!   |                                                       v  |  or counter overflow
//!   +--STOP,STOP (within window)-- Complete <--STOP-- MovingToBottom
//! ```
//!
//! Every phase except `Idle` blocks external commands and falls back to
//! `Idle` after a period without button activity.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use shade_traits::{InputPin, KeyValueStore};

use crate::button::{Button, ButtonEvent, ButtonPanel};
use crate::calibration::{CalibrationData, CalibrationStore};
use crate::config::CalibrationCfg;
use crate::error::Result;
use crate::led::LedHandle;
use crate::state::{MotionMode, MotorFault, SharedState};
use crate::util::Timebase;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum Phase {
    #[default]
    Idle = 0,
    Ready = 1,
    MovingToHome = 2,
    HomeSet = 3,
    MovingToBottom = 4,
    Complete = 5,
}

impl Phase {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Phase::Ready,
            2 => Phase::MovingToHome,
            3 => Phase::HomeSet,
            4 => Phase::MovingToBottom,
            5 => Phase::Complete,
            _ => Phase::Idle,
        }
    }

    #[inline]
    pub fn blocks_commands(self) -> bool {
        self != Phase::Idle
    }
}

/// Current phase, readable from other threads.
#[derive(Debug, Clone, Default)]
pub struct PhaseCell(Arc<AtomicU8>);

impl PhaseCell {
    pub fn get(&self) -> Phase {
        Phase::from_u8(self.0.load(Ordering::Acquire))
    }

    fn set(&self, p: Phase) {
        self.0.store(p as u8, Ordering::Release);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionOutcome {
    Unchanged,
    Entered(Phase),
    /// Measured travel outside the limits; back to `HomeSet`, nothing stored.
    MeasurementRejected { travel: u16 },
    /// Inactivity timeout; back to `Idle`.
    TimedOut,
    /// Motor fault during the limit search; back to `HomeSet`.
    Faulted(MotorFault),
}

pub struct CalibrationSession<K> {
    phase: Phase,
    cell: PhaseCell,
    state: SharedState,
    store: CalibrationStore<K>,
    led: LedHandle,
    cfg: CalibrationCfg,
    last_activity_ms: u64,
    last_stop_press_ms: Option<u64>,
}

impl<K: KeyValueStore> CalibrationSession<K> {
    pub fn new(
        state: SharedState,
        store: CalibrationStore<K>,
        led: LedHandle,
        cfg: CalibrationCfg,
    ) -> Self {
        Self {
            phase: Phase::Idle,
            cell: PhaseCell::default(),
            state,
            store,
            led,
            cfg,
            last_activity_ms: 0,
            last_stop_press_ms: None,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn phase_cell(&self) -> PhaseCell {
        self.cell.clone()
    }

    pub fn store(&self) -> &CalibrationStore<K> {
        &self.store
    }

    fn enter(&mut self, phase: Phase) -> SessionOutcome {
        tracing::info!(target: "shade::calibration", from = ?self.phase, to = ?phase, "calibration phase");
        self.phase = phase;
        self.cell.set(phase);
        SessionOutcome::Entered(phase)
    }

    fn persist(&mut self, data: CalibrationData) {
        // the in-memory value stays in effect for this boot either way
        if let Err(e) = self.store.save(&data) {
            tracing::error!(
                target: "shade::calibration",
                error = %e,
                travel_steps = data.travel_steps,
                "saving calibration failed; value kept until reboot"
            );
        }
    }

    /// React to one debounced button event.
    pub fn handle(&mut self, event: ButtonEvent, now_ms: u64) -> SessionOutcome {
        self.last_activity_ms = now_ms;
        match (self.phase, event) {
            (Phase::Idle, ButtonEvent::Hold(Button::Stop)) => {
                self.state.update(|s| {
                    s.halt();
                    s.commands_blocked = true;
                });
                self.led.on();
                self.enter(Phase::Ready)
            }
            (Phase::Ready, ButtonEvent::Press(Button::Up)) => {
                self.state.update(|s| s.seek_home());
                self.enter(Phase::MovingToHome)
            }
            (Phase::MovingToHome, ButtonEvent::Press(Button::Stop)) => {
                let travel = self.state.update(|s| {
                    s.set_home();
                    s.mode = MotionMode::Normal;
                    s.travel_steps
                });
                self.persist(CalibrationData::with_travel(travel));
                self.led.success(2);
                self.enter(Phase::HomeSet)
            }
            (Phase::HomeSet, ButtonEvent::Press(Button::Down)) => {
                self.state.update(|s| s.seek_limit());
                self.led.on();
                self.enter(Phase::MovingToBottom)
            }
            (Phase::MovingToBottom, ButtonEvent::Press(Button::Stop)) => self.finish_measurement(),
            (Phase::Complete, ButtonEvent::Press(Button::Stop)) => match self.last_stop_press_ms {
                Some(t) if now_ms.saturating_sub(t) <= self.cfg.double_press_ms => self.exit(),
                _ => {
                    self.last_stop_press_ms = Some(now_ms);
                    SessionOutcome::Unchanged
                }
            },
            _ => SessionOutcome::Unchanged,
        }
    }

    fn finish_measurement(&mut self) -> SessionOutcome {
        let travel = self.state.update(|s| {
            s.halt();
            s.mode = MotionMode::Normal;
            s.current_steps
        });
        let limits = *self.store.limits();
        if !limits.contains(travel) {
            tracing::warn!(
                target: "shade::calibration",
                travel,
                min = limits.min,
                max = limits.max,
                "measured travel out of range; press DOWN to retry"
            );
            self.led.error();
            self.enter(Phase::HomeSet);
            return SessionOutcome::MeasurementRejected { travel };
        }
        self.state.update(|s| s.set_travel(travel));
        self.persist(CalibrationData::with_travel(travel));
        self.led.success(3);
        self.last_stop_press_ms = None;
        self.enter(Phase::Complete)
    }

    fn exit(&mut self) -> SessionOutcome {
        self.state.update(|s| {
            s.end_calibration();
            s.commands_blocked = false;
        });
        self.led.off();
        self.last_stop_press_ms = None;
        self.enter(Phase::Idle)
    }

    /// Time-driven checks: limit-search fault and inactivity timeout.
    pub fn poll(&mut self, now_ms: u64) -> SessionOutcome {
        if self.phase == Phase::Idle {
            return SessionOutcome::Unchanged;
        }
        if self.phase == Phase::MovingToBottom
            && let Some(fault) = self.state.snapshot().fault
        {
            tracing::error!(target: "shade::calibration", %fault, "limit search aborted");
            self.state.update(|s| s.mode = MotionMode::Normal);
            self.led.error();
            self.enter(Phase::HomeSet);
            return SessionOutcome::Faulted(fault);
        }
        if now_ms.saturating_sub(self.last_activity_ms) >= self.cfg.inactivity_timeout_ms {
            tracing::warn!(
                target: "shade::calibration",
                phase = ?self.phase,
                idle_ms = now_ms.saturating_sub(self.last_activity_ms),
                "calibration timed out"
            );
            self.state.update(|s| {
                s.end_calibration();
                s.commands_blocked = false;
            });
            self.led.error();
            self.last_stop_press_ms = None;
            self.enter(Phase::Idle);
            return SessionOutcome::TimedOut;
        }
        SessionOutcome::Unchanged
    }
}

/// Button polling plus the session: the body of the calibration task.
pub struct CalibrationTask<I: InputPin, K> {
    panel: ButtonPanel<I>,
    session: CalibrationSession<K>,
    poll_ms: u64,
}

impl<I: InputPin, K: KeyValueStore> CalibrationTask<I, K> {
    pub fn new(panel: ButtonPanel<I>, session: CalibrationSession<K>, poll_ms: u64) -> Self {
        Self {
            panel,
            session,
            poll_ms,
        }
    }

    pub fn session(&self) -> &CalibrationSession<K> {
        &self.session
    }

    /// Feed debounced button events into the session, then run its timers.
    ///
    /// The timers run even when a button read fails; the read error is
    /// returned after them.
    pub fn tick(&mut self, now_ms: u64) -> Result<Vec<SessionOutcome>> {
        let events = self.panel.poll(now_ms);
        let mut out = Vec::new();
        for &event in events.as_deref().unwrap_or_default() {
            tracing::debug!(target: "shade::calibration", ?event, "button");
            let o = self.session.handle(event, now_ms);
            if o != SessionOutcome::Unchanged {
                out.push(o);
            }
        }
        let o = self.session.poll(now_ms);
        if o != SessionOutcome::Unchanged {
            out.push(o);
        }
        events.map(|_| out)
    }

    /// Poll until `shutdown` is set. Read errors are logged once per run of
    /// failures.
    pub fn run(&mut self, time: &Timebase, shutdown: &AtomicBool) -> Result<()> {
        let mut failing = false;
        while !shutdown.load(Ordering::Relaxed) {
            match self.tick(time.now_ms()) {
                Ok(_) if failing => {
                    failing = false;
                    tracing::info!(target: "shade::calibration", "button inputs recovered");
                }
                Ok(_) => {}
                Err(e) => {
                    if !failing {
                        failing = true;
                        tracing::warn!(target: "shade::calibration", error = ?e, "button read failed");
                    }
                }
            }
            time.sleep_ms(self.poll_ms);
        }
        Ok(())
    }
}
