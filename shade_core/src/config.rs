//! Runtime configuration for the control tasks.
//!
//! These are the structs the tasks consume; they are separate from the TOML
//! schema in `shade_config` (see `conversions`).

use std::time::Duration;

use crate::position::DEFAULT_TRAVEL_STEPS;

/// Stepper pulse timing and loop pacing.
#[derive(Debug, Clone)]
pub struct StepperCfg {
    /// STEP high time (µs). Fixed by the driver chip's minimum pulse width.
    pub pulse_us: u32,
    /// STEP low time after each pulse (µs); sets the travel speed.
    pub step_delay_us: u32,
    /// Cooperatively yield every N steps.
    pub yield_every_steps: u16,
    /// Sleep between polls while not moving.
    pub idle_poll_ms: u64,
    /// ENABLE is asserted low (A4988/DRV8825 style).
    pub enable_active_low: bool,
}

impl Default for StepperCfg {
    fn default() -> Self {
        Self {
            pulse_us: 10,
            step_delay_us: 2000,
            yield_every_steps: 200,
            idle_poll_ms: 10,
            enable_active_low: true,
        }
    }
}

/// Report throttling thresholds.
#[derive(Debug, Clone)]
pub struct ReportCfg {
    pub poll_ms: u64,
    /// Minimum time between two in-motion reports.
    pub min_interval_ms: u64,
    /// Minimum step delta between two in-motion reports.
    pub min_steps: u16,
    pub queue_depth: usize,
}

impl Default for ReportCfg {
    fn default() -> Self {
        Self {
            poll_ms: 100,
            min_interval_ms: 200,
            min_steps: 50,
            queue_depth: 4,
        }
    }
}

/// Accepted range of a calibrated travel, and the fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TravelLimits {
    pub min: u16,
    pub max: u16,
    pub default: u16,
}

impl Default for TravelLimits {
    fn default() -> Self {
        Self {
            min: 100,
            max: 20_000,
            default: DEFAULT_TRAVEL_STEPS,
        }
    }
}

impl TravelLimits {
    #[inline]
    pub fn contains(&self, travel: u16) -> bool {
        (self.min..=self.max).contains(&travel)
    }
}

/// Button timing for the debounce/hold logic.
#[derive(Debug, Clone, Copy)]
pub struct ButtonTiming {
    pub debounce_ms: u64,
    pub hold_ms: u64,
}

impl Default for ButtonTiming {
    fn default() -> Self {
        Self {
            debounce_ms: 30,
            hold_ms: 3000,
        }
    }
}

/// Calibration session behaviour.
#[derive(Debug, Clone)]
pub struct CalibrationCfg {
    pub limits: TravelLimits,
    pub buttons: ButtonTiming,
    pub buttons_active_low: bool,
    pub poll_ms: u64,
    /// Any non-idle phase falls back to idle after this long without a button event.
    pub inactivity_timeout_ms: u64,
    /// Window for the two STOP presses that leave `Complete`.
    pub double_press_ms: u64,
}

impl Default for CalibrationCfg {
    fn default() -> Self {
        Self {
            limits: TravelLimits::default(),
            buttons: ButtonTiming::default(),
            buttons_active_low: true,
            poll_ms: 10,
            inactivity_timeout_ms: 120_000,
            double_press_ms: 1500,
        }
    }
}

/// LED blink codes.
#[derive(Debug, Clone)]
pub struct LedCfg {
    pub poll_ms: u64,
    pub success_period: Duration,
    pub error_count: u16,
    pub error_period: Duration,
}

impl Default for LedCfg {
    fn default() -> Self {
        Self {
            poll_ms: 10,
            success_period: Duration::from_millis(400),
            error_count: 6,
            error_period: Duration::from_millis(120),
        }
    }
}

/// Everything `WindowDriver::start` needs besides hardware.
#[derive(Debug, Clone)]
pub struct DriverCfg {
    pub endpoint_id: u16,
    pub stepper: StepperCfg,
    pub report: ReportCfg,
    pub calibration: CalibrationCfg,
    pub led: LedCfg,
}

impl Default for DriverCfg {
    fn default() -> Self {
        Self {
            endpoint_id: 1,
            stepper: StepperCfg::default(),
            report: ReportCfg::default(),
            calibration: CalibrationCfg::default(),
            led: LedCfg::default(),
        }
    }
}
