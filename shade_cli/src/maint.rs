//! Maintenance subcommands: stored-calibration inspection and a self-check.

use std::sync::Arc;

use eyre::WrapErr;
use shade_core::mocks::{MemoryStore, RecordingReporter};
use shade_core::{
    CalibrationData, CalibrationStore, DriverCfg, DriverHardware, TravelLimits, WindowDriver,
};
use shade_hardware::{FileStore, SimulatedButton, SimulatedPin};
use shade_traits::clock::MonotonicClock;

use crate::cli::CalibrationAction;

fn open_store(cfg: &shade_config::Config) -> eyre::Result<CalibrationStore<FileStore>> {
    let kv = FileStore::open(&cfg.storage.path)
        .wrap_err_with(|| format!("open calibration store {:?}", cfg.storage.path))?;
    Ok(CalibrationStore::new(kv, TravelLimits::from(&cfg.calibration)))
}

pub fn calibration(
    cfg: &shade_config::Config,
    action: CalibrationAction,
    json: bool,
) -> eyre::Result<()> {
    let mut store = open_store(cfg)?;
    match action {
        CalibrationAction::Show => {
            // A bad record is reported here, not erased; `run` erases it on start.
            let inspected = store.inspect()?;
            let (data, stored, reason) = match inspected {
                Ok(d) => (d, true, None),
                Err(invalid) => (
                    CalibrationData::defaults(store.limits()),
                    false,
                    Some(invalid.to_string()),
                ),
            };
            if json {
                let line = serde_json::json!({
                    "home_steps": data.home_steps,
                    "travel_steps": data.travel_steps,
                    "stored": stored,
                    "reason": reason,
                });
                println!("{line}");
            } else {
                let source = if stored { "stored" } else { "default" };
                println!(
                    "home_steps={} travel_steps={} ({source})",
                    data.home_steps, data.travel_steps
                );
                if let Some(r) = reason {
                    println!("stored record not used: {r}");
                }
            }
        }
        CalibrationAction::Clear => {
            store.clear()?;
            tracing::info!(path = %cfg.storage.path, "calibration erased");
            if json {
                println!("{}", serde_json::json!({ "cleared": true }));
            } else {
                println!("calibration erased; travel {} applies on next start", store.limits().default);
            }
        }
    }
    Ok(())
}

/// Open the store read-only, then start and stop every task against simulated lines.
pub fn self_check(cfg: &shade_config::Config, json: bool) -> eyre::Result<()> {
    let store = open_store(cfg)?;
    let stored = store.inspect()?.is_ok();

    let (up, _up) = SimulatedButton::new(cfg.buttons.active_low);
    let (down, _down) = SimulatedButton::new(cfg.buttons.active_low);
    let (stop, _stop) = SimulatedButton::new(cfg.buttons.active_low);
    let hw = DriverHardware {
        step: SimulatedPin::new("step"),
        dir: SimulatedPin::new("dir"),
        enable: SimulatedPin::new("enable"),
        led: SimulatedPin::new("led"),
        up,
        down,
        stop,
        store: MemoryStore::new(),
        reporter: RecordingReporter::new(),
        on_stepper_start: None,
    };
    let driver = WindowDriver::start(hw, DriverCfg::from(cfg), Arc::new(MonotonicClock::new()))
        .wrap_err("start tasks")?;
    driver.shutdown();

    if json {
        println!(
            "{}",
            serde_json::json!({ "ok": true, "calibration_stored": stored })
        );
    } else {
        println!("self-check ok (calibration {})", if stored { "stored" } else { "default" });
    }
    Ok(())
}
