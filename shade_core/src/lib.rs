#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_errors_doc,
    clippy::must_use_candidate
)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Window-covering motor core (hardware-agnostic).
//!
//! All hardware goes through the `shade_traits` seams: output/input pins, a
//! key-value store, a clock and the framework's `CoverReporter`.
//!
//! ## Architecture
//!
//! - **Position model**: percent100ths <-> steps, round-to-nearest (`position`)
//! - **Shared state**: one mutex-guarded `MotorState` plus command entry points (`state`)
//! - **Stepper**: one pulse per iteration, lock never held across a pulse (`stepper`)
//! - **Reporting**: threshold/interval throttling with single-flight hand-off (`report`)
//! - **LED**: blink codes over lock-free scalars (`led`)
//! - **Calibration**: debounced buttons, phase machine, persisted travel
//!   (`button`, `session`, `calibration`)
//! - **Driver**: spawns and owns the tasks (`driver`)
//!
//! Positions are in hundredths of a percent closed (`0..=10000`); steps are
//! raw `u16` motor steps counted from home.

pub mod button;
pub mod calibration;
pub mod config;
pub mod conversions;
pub mod driver;
pub mod error;
pub mod hw_error;
pub mod led;
pub mod mocks;
pub mod position;
pub mod report;
pub mod session;
pub mod state;
pub mod stepper;
pub mod util;

pub use button::{Button, ButtonEvent, ButtonState};
pub use calibration::{CalibrationData, CalibrationStore};
pub use config::{
    ButtonTiming, CalibrationCfg, DriverCfg, LedCfg, ReportCfg, StepperCfg, TravelLimits,
};
pub use driver::{DriverHardware, WindowDriver};
pub use error::{CoreError, Result, StoreError};
pub use position::{POSITION_MAX, clamp_position, position_from_steps, steps_from_position};
pub use session::{Phase, SessionOutcome};
pub use state::{Command, CommandOutcome, Direction, MotorState, SharedState};
