#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schema for the window-covering controller.
//!
//! - `Config` and its sections are deserialized from TOML; every section has defaults
//!   matching the reference hardware (A4988 driver, 5000-step blind).
//! - `validate()` rejects values the control loops cannot run with.
use serde::Deserialize;
use std::path::Path;

/// Sentinel the bottom search counts towards; a calibrated travel must stay below it.
pub const TRAVEL_SENTINEL: u16 = u16::MAX;

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Device {
    /// Endpoint id the external command layer addresses this covering with.
    pub endpoint_id: u16,
}

impl Default for Device {
    fn default() -> Self {
        Self { endpoint_id: 1 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Pins {
    pub step: u8,
    pub dir: u8,
    pub enable: u8,
    pub led: u8,
    pub button_up: u8,
    pub button_down: u8,
    pub button_stop: u8,
}

impl Default for Pins {
    fn default() -> Self {
        Self {
            step: 4,
            dir: 5,
            enable: 6,
            led: 7,
            button_up: 8,
            button_down: 9,
            button_stop: 10,
        }
    }
}

impl Pins {
    fn all(&self) -> [(&'static str, u8); 7] {
        [
            ("step", self.step),
            ("dir", self.dir),
            ("enable", self.enable),
            ("led", self.led),
            ("button_up", self.button_up),
            ("button_down", self.button_down),
            ("button_stop", self.button_stop),
        ]
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Stepper {
    /// STEP high time in microseconds.
    pub pulse_us: u32,
    /// STEP low time after each pulse in microseconds; sets the travel speed.
    pub step_delay_us: u32,
    /// Yield to other tasks every N steps.
    pub yield_every_steps: u16,
    /// Sleep between polls while idle.
    pub idle_poll_ms: u64,
    /// ENABLE asserted by driving the line low (A4988/DRV8825).
    pub enable_active_low: bool,
    /// Optional SCHED_FIFO priority for the stepper thread.
    pub realtime_priority: Option<i32>,
}

impl Default for Stepper {
    fn default() -> Self {
        Self {
            pulse_us: 10,
            step_delay_us: 2000,
            yield_every_steps: 200,
            idle_poll_ms: 10,
            enable_active_low: true,
            realtime_priority: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Report {
    pub poll_ms: u64,
    pub min_interval_ms: u64,
    pub min_steps: u16,
    /// Capacity of the report work queue.
    pub queue_depth: usize,
}

impl Default for Report {
    fn default() -> Self {
        Self {
            poll_ms: 100,
            min_interval_ms: 200,
            min_steps: 50,
            queue_depth: 4,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Calibration {
    pub min_travel: u16,
    pub max_travel: u16,
    pub default_travel: u16,
    pub poll_ms: u64,
    pub debounce_ms: u64,
    pub hold_ms: u64,
    pub inactivity_timeout_ms: u64,
    pub double_press_ms: u64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            min_travel: 100,
            max_travel: 20_000,
            default_travel: 5000,
            poll_ms: 10,
            debounce_ms: 30,
            hold_ms: 3000,
            inactivity_timeout_ms: 120_000,
            double_press_ms: 1500,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Buttons {
    /// Buttons pull the line low when pressed.
    pub active_low: bool,
}

impl Default for Buttons {
    fn default() -> Self {
        Self { active_low: true }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Led {
    pub poll_ms: u64,
    pub success_period_ms: u64,
    pub error_count: u16,
    pub error_period_ms: u64,
}

impl Default for Led {
    fn default() -> Self {
        Self {
            poll_ms: 10,
            success_period_ms: 400,
            error_count: 6,
            error_period_ms: 120,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct Storage {
    /// File backing the "calibration" namespace.
    pub path: String,
}

impl Default for Storage {
    fn default() -> Self {
        Self {
            path: "var/shade-calibration.toml".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub device: Device,
    pub pins: Pins,
    pub stepper: Stepper,
    pub report: Report,
    pub calibration: Calibration,
    pub buttons: Buttons,
    pub led: Led,
    pub storage: Storage,
    pub logging: Logging,
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Read, parse and validate a config file.
pub fn load_file(path: &Path) -> eyre::Result<Config> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| eyre::eyre!("read config {:?}: {}", path, e))?;
    let cfg = load_toml(&text).map_err(|e| eyre::eyre!("parse config {:?}: {}", path, e))?;
    cfg.validate()?;
    Ok(cfg)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Pins
        let pins = self.pins.all();
        for (i, (name_a, a)) in pins.iter().enumerate() {
            for (name_b, b) in &pins[i + 1..] {
                if a == b {
                    eyre::bail!("pins.{name_a} and pins.{name_b} share GPIO {a}");
                }
            }
        }

        // Stepper
        if self.stepper.pulse_us == 0 {
            eyre::bail!("stepper.pulse_us must be > 0");
        }
        if self.stepper.step_delay_us == 0 {
            eyre::bail!("stepper.step_delay_us must be > 0");
        }
        if self.stepper.yield_every_steps == 0 {
            eyre::bail!("stepper.yield_every_steps must be >= 1");
        }
        if self.stepper.idle_poll_ms == 0 {
            eyre::bail!("stepper.idle_poll_ms must be >= 1");
        }
        if let Some(prio) = self.stepper.realtime_priority
            && !(1..=99).contains(&prio)
        {
            eyre::bail!("stepper.realtime_priority must be in [1, 99]");
        }

        // Report
        if self.report.poll_ms == 0 {
            eyre::bail!("report.poll_ms must be >= 1");
        }
        if self.report.min_steps == 0 {
            eyre::bail!("report.min_steps must be >= 1");
        }
        if self.report.queue_depth == 0 {
            eyre::bail!("report.queue_depth must be >= 1");
        }

        // Calibration
        let c = &self.calibration;
        if c.min_travel == 0 {
            eyre::bail!("calibration.min_travel must be >= 1");
        }
        if c.min_travel > c.max_travel {
            eyre::bail!("calibration.min_travel must be <= calibration.max_travel");
        }
        if c.max_travel >= TRAVEL_SENTINEL {
            eyre::bail!("calibration.max_travel must be < {TRAVEL_SENTINEL}");
        }
        if !(c.min_travel..=c.max_travel).contains(&c.default_travel) {
            eyre::bail!("calibration.default_travel must be within [min_travel, max_travel]");
        }
        if c.poll_ms == 0 {
            eyre::bail!("calibration.poll_ms must be >= 1");
        }
        if c.debounce_ms == 0 {
            eyre::bail!("calibration.debounce_ms must be >= 1");
        }
        if c.hold_ms <= c.debounce_ms {
            eyre::bail!("calibration.hold_ms must be > calibration.debounce_ms");
        }
        if c.double_press_ms <= c.debounce_ms {
            eyre::bail!("calibration.double_press_ms must be > calibration.debounce_ms");
        }
        if c.inactivity_timeout_ms <= c.hold_ms {
            eyre::bail!("calibration.inactivity_timeout_ms must be > calibration.hold_ms");
        }

        // LED
        if self.led.poll_ms == 0 {
            eyre::bail!("led.poll_ms must be >= 1");
        }
        let periods = [self.led.success_period_ms, self.led.error_period_ms];
        if periods.iter().any(|p| !(2..=u64::from(u16::MAX)).contains(p)) {
            eyre::bail!("led blink periods must be within 2..=65535 ms");
        }
        if self.led.error_count == 0 {
            eyre::bail!("led.error_count must be >= 1");
        }

        // Storage
        if self.storage.path.trim().is_empty() {
            eyre::bail!("storage.path must not be empty");
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly");
        }

        Ok(())
    }
}
