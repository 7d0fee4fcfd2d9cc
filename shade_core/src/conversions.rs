//! `From` implementations bridging `shade_config` types to `shade_core` types.

use std::time::Duration;

use crate::config::{
    ButtonTiming, CalibrationCfg, DriverCfg, LedCfg, ReportCfg, StepperCfg, TravelLimits,
};

// ── StepperCfg ───────────────────────────────────────────────────────────────

impl From<&shade_config::Stepper> for StepperCfg {
    fn from(c: &shade_config::Stepper) -> Self {
        Self {
            pulse_us: c.pulse_us,
            step_delay_us: c.step_delay_us,
            yield_every_steps: c.yield_every_steps,
            idle_poll_ms: c.idle_poll_ms,
            enable_active_low: c.enable_active_low,
        }
    }
}

// ── ReportCfg ────────────────────────────────────────────────────────────────

impl From<&shade_config::Report> for ReportCfg {
    fn from(c: &shade_config::Report) -> Self {
        Self {
            poll_ms: c.poll_ms,
            min_interval_ms: c.min_interval_ms,
            min_steps: c.min_steps,
            queue_depth: c.queue_depth,
        }
    }
}

// ── CalibrationCfg ───────────────────────────────────────────────────────────

impl From<&shade_config::Calibration> for TravelLimits {
    fn from(c: &shade_config::Calibration) -> Self {
        Self {
            min: c.min_travel,
            max: c.max_travel,
            default: c.default_travel,
        }
    }
}

impl From<&shade_config::Config> for CalibrationCfg {
    fn from(c: &shade_config::Config) -> Self {
        Self {
            limits: (&c.calibration).into(),
            buttons: ButtonTiming {
                debounce_ms: c.calibration.debounce_ms,
                hold_ms: c.calibration.hold_ms,
            },
            buttons_active_low: c.buttons.active_low,
            poll_ms: c.calibration.poll_ms,
            inactivity_timeout_ms: c.calibration.inactivity_timeout_ms,
            double_press_ms: c.calibration.double_press_ms,
        }
    }
}

// ── LedCfg ───────────────────────────────────────────────────────────────────

impl From<&shade_config::Led> for LedCfg {
    fn from(c: &shade_config::Led) -> Self {
        Self {
            poll_ms: c.poll_ms,
            success_period: Duration::from_millis(c.success_period_ms),
            error_count: c.error_count,
            error_period: Duration::from_millis(c.error_period_ms),
        }
    }
}

// ── DriverCfg ────────────────────────────────────────────────────────────────

impl From<&shade_config::Config> for DriverCfg {
    fn from(c: &shade_config::Config) -> Self {
        Self {
            endpoint_id: c.device.endpoint_id,
            stepper: (&c.stepper).into(),
            report: (&c.report).into(),
            calibration: c.into(),
            led: (&c.led).into(),
        }
    }
}
