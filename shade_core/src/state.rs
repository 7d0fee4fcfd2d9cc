//! The shared motor record and the command entry points that mutate it.
//!
//! `MotorState` is plain data with pure transition methods; `SharedState` is
//! the single lock around it that every task and external caller goes through.
//! Critical sections are one snapshot or one transition, never hardware I/O.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use shade_traits::OperationalState;

use crate::position::{POSITION_MAX, clamp_position, position_from_steps, steps_from_position};
use crate::util::fmt_percent100ths;

/// Travel direction in step space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    None,
    /// Increasing steps (closing).
    Positive,
    /// Decreasing steps (opening, toward home).
    Negative,
}

impl Direction {
    /// Level driven on the DIR line while moving this way.
    #[inline]
    pub fn dir_level(self) -> bool {
        !matches!(self, Direction::Negative)
    }
}

/// Who owns the current motion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MotionMode {
    /// Regular command-driven move; stops at the target.
    #[default]
    Normal,
    /// Calibration: run toward home until STOP.
    SeekHome,
    /// Calibration: count up from home until STOP, ceiling raised to `u16::MAX`.
    SeekLimit,
}

impl MotionMode {
    #[inline]
    pub fn is_calibrating(self) -> bool {
        !matches!(self, MotionMode::Normal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MotorFault {
    /// The open-ended limit search ran out of counter range.
    #[error("step counter overflow during limit search (motor stuck or miswired?)")]
    StepOverflow,
}

/// Result of accounting one step pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    /// Nothing to do; no pulse emitted.
    Idle,
    Stepped,
    /// This step landed on the target and motion stopped.
    Reached,
    /// Counter would overflow; motion force-stopped and a fault latched.
    Overflow,
}

/// Externally issued command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Absolute position in hundredths of a percent (clamped).
    SetTarget(u16),
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Accepted,
    /// Calibration owns the motor; nothing changed.
    Blocked,
    /// Addressed to an endpoint this device doesn't serve; nothing changed.
    WrongEndpoint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotorState {
    pub current_position: u16,
    pub target_position: u16,
    pub current_steps: u16,
    pub target_steps: u16,
    pub moving: bool,
    pub direction: Direction,
    /// Steps between home and the far limit; denominator of the position model.
    pub travel_steps: u16,
    pub mode: MotionMode,
    /// Set while a calibration session is active.
    pub commands_blocked: bool,
    pub fault: Option<MotorFault>,
}

impl MotorState {
    /// At home, idle, with the given travel.
    pub fn new(travel_steps: u16) -> Self {
        Self {
            current_position: 0,
            target_position: 0,
            current_steps: 0,
            target_steps: 0,
            moving: false,
            direction: Direction::None,
            travel_steps,
            mode: MotionMode::Normal,
            commands_blocked: false,
            fault: None,
        }
    }

    /// Aim at `position` (clamped) and start moving if it is somewhere else.
    pub fn set_target(&mut self, position: u16) {
        let p = clamp_position(position);
        self.mode = MotionMode::Normal;
        self.target_position = p;
        self.target_steps = steps_from_position(p, self.travel_steps);
        self.direction = match self.target_steps.cmp(&self.current_steps) {
            std::cmp::Ordering::Greater => Direction::Positive,
            std::cmp::Ordering::Less => Direction::Negative,
            std::cmp::Ordering::Equal => Direction::None,
        };
        self.moving = self.direction != Direction::None;
    }

    /// Stop where we are; the target collapses onto the current position.
    pub fn halt(&mut self) {
        self.moving = false;
        self.direction = Direction::None;
        self.target_steps = self.current_steps;
        self.target_position = self.current_position;
    }

    /// Calibration: head for home until told to stop.
    pub fn seek_home(&mut self) {
        self.mode = MotionMode::SeekHome;
        self.target_steps = 0;
        self.target_position = 0;
        self.direction = Direction::Negative;
        self.moving = true;
    }

    /// Calibration: count up toward the far limit until told to stop.
    pub fn seek_limit(&mut self) {
        self.mode = MotionMode::SeekLimit;
        self.fault = None;
        self.target_steps = u16::MAX;
        self.target_position = POSITION_MAX;
        self.direction = Direction::Positive;
        self.moving = true;
    }

    /// Declare the current spot to be home.
    pub fn set_home(&mut self) {
        self.current_steps = 0;
        self.current_position = 0;
        self.halt();
    }

    /// Adopt a new travel; position is recomputed against it.
    pub fn set_travel(&mut self, travel_steps: u16) {
        self.travel_steps = travel_steps;
        self.current_position = position_from_steps(self.current_steps, travel_steps);
        self.halt();
    }

    /// Leave calibration: stop, regular mode, counter back inside the travel.
    pub fn end_calibration(&mut self) {
        self.mode = MotionMode::Normal;
        self.current_steps = self.current_steps.min(self.travel_steps);
        self.current_position = position_from_steps(self.current_steps, self.travel_steps);
        self.halt();
    }

    /// Account for one emitted pulse in `dir` (the direction it was emitted with).
    pub fn advance(&mut self, dir: Direction) -> StepOutcome {
        let ceiling = if self.mode == MotionMode::SeekLimit {
            u16::MAX
        } else {
            self.travel_steps
        };
        match dir {
            Direction::None => return StepOutcome::Idle,
            Direction::Positive => {
                if self.mode == MotionMode::SeekLimit && self.current_steps == u16::MAX {
                    self.halt();
                    self.fault = Some(MotorFault::StepOverflow);
                    return StepOutcome::Overflow;
                }
                self.current_steps = self.current_steps.saturating_add(1).min(ceiling);
            }
            Direction::Negative => {
                self.current_steps = self.current_steps.saturating_sub(1).min(ceiling);
            }
        }
        self.current_position = position_from_steps(self.current_steps, self.travel_steps);

        if !self.moving {
            // stopped while the pulse was out
            self.target_steps = self.current_steps;
            self.target_position = self.current_position;
            return StepOutcome::Stepped;
        }
        if self.mode == MotionMode::Normal && self.current_steps == self.target_steps {
            self.moving = false;
            self.direction = Direction::None;
            return StepOutcome::Reached;
        }
        StepOutcome::Stepped
    }

    pub fn operational_state(&self) -> OperationalState {
        match (self.moving, self.direction) {
            (true, Direction::Positive) => OperationalState::Closing,
            (true, Direction::Negative) => OperationalState::Opening,
            _ => OperationalState::Stall,
        }
    }
}

impl Default for MotorState {
    fn default() -> Self {
        Self::new(crate::position::DEFAULT_TRAVEL_STEPS)
    }
}

/// Handle to the one lock-guarded `MotorState`. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct SharedState {
    inner: Arc<Mutex<MotorState>>,
}

impl SharedState {
    pub fn new(state: MotorState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(state)),
        }
    }

    /// Blocking lock. A poisoned lock still holds a consistent record (every
    /// transition is a single non-panicking method), so it is recovered.
    pub fn lock(&self) -> MutexGuard<'_, MotorState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Non-blocking lock; `None` when another task holds it.
    pub fn try_lock(&self) -> Option<MutexGuard<'_, MotorState>> {
        match self.inner.try_lock() {
            Ok(g) => Some(g),
            Err(TryLockError::Poisoned(p)) => Some(p.into_inner()),
            Err(TryLockError::WouldBlock) => None,
        }
    }

    pub fn snapshot(&self) -> MotorState {
        *self.lock()
    }

    /// Run one transition under the lock.
    pub fn update<R>(&self, f: impl FnOnce(&mut MotorState) -> R) -> R {
        f(&mut self.lock())
    }

    /// Apply an external command unless calibration has blocked them.
    pub fn apply(&self, cmd: Command) -> CommandOutcome {
        let mut s = self.lock();
        if s.commands_blocked {
            tracing::debug!(target: "shade::state", ?cmd, "command rejected during calibration");
            return CommandOutcome::Blocked;
        }
        match cmd {
            Command::SetTarget(p) => {
                s.set_target(p);
                tracing::info!(
                    target: "shade::state",
                    target = %fmt_percent100ths(s.target_position),
                    target_steps = s.target_steps,
                    current_steps = s.current_steps,
                    direction = ?s.direction,
                    "target set"
                );
            }
            Command::Stop => {
                s.halt();
                tracing::info!(
                    target: "shade::state",
                    position = %fmt_percent100ths(s.current_position),
                    steps = s.current_steps,
                    "stopped at"
                );
            }
        }
        CommandOutcome::Accepted
    }

    #[inline]
    pub fn set_target(&self, position: u16) -> CommandOutcome {
        self.apply(Command::SetTarget(position))
    }

    #[inline]
    pub fn stop(&self) -> CommandOutcome {
        self.apply(Command::Stop)
    }
}
