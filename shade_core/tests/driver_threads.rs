//! End-to-end runs of the driver with real threads and a real clock.
use std::sync::Arc;
use std::time::{Duration, Instant};

use shade_core::calibration::{KEY_HOME, KEY_TRAVEL, NAMESPACE};
use shade_core::config::{ButtonTiming, DriverCfg, ReportCfg, StepperCfg};
use shade_core::driver::{DriverHardware, WindowDriver};
use shade_core::mocks::{MemoryStore, RecordingReporter, SharedInput, SpyPin};
use shade_core::session::Phase;
use shade_core::state::CommandOutcome;
use shade_traits::OperationalState;
use shade_traits::clock::MonotonicClock;

struct Bench {
    driver: WindowDriver,
    step: SpyPin,
    enable: SpyPin,
    stop_button: SharedInput,
    reporter: RecordingReporter,
}

fn fast_cfg() -> DriverCfg {
    let mut cfg = DriverCfg::default();
    cfg.stepper = StepperCfg {
        pulse_us: 2,
        step_delay_us: 100,
        yield_every_steps: 50,
        idle_poll_ms: 1,
        enable_active_low: true,
    };
    cfg.report = ReportCfg {
        poll_ms: 5,
        min_interval_ms: 10,
        min_steps: 20,
        queue_depth: 2,
    };
    cfg.calibration.poll_ms = 2;
    cfg.calibration.buttons = ButtonTiming {
        debounce_ms: 5,
        hold_ms: 60,
    };
    cfg.led.poll_ms = 2;
    cfg
}

fn start(travel: u16) -> Bench {
    let store = MemoryStore::new()
        .with_value(NAMESPACE, KEY_HOME, 0)
        .with_value(NAMESPACE, KEY_TRAVEL, travel);
    let step = SpyPin::new();
    let enable = SpyPin::new();
    let stop_button = SharedInput::new(true);
    let reporter = RecordingReporter::new();
    let hw = DriverHardware {
        step: step.clone(),
        dir: SpyPin::new(),
        enable: enable.clone(),
        led: SpyPin::new(),
        up: SharedInput::new(true),
        down: SharedInput::new(true),
        stop: stop_button.clone(),
        store,
        reporter: reporter.clone(),
        on_stepper_start: None,
    };
    let driver = WindowDriver::start(hw, fast_cfg(), Arc::new(MonotonicClock::new())).unwrap();
    Bench {
        driver,
        step,
        enable,
        stop_button,
        reporter,
    }
}

fn wait_for(mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    false
}

#[test]
fn moves_to_target_and_reports_final_position() {
    let b = start(1_000);
    assert_eq!(b.driver.snapshot().travel_steps, 1_000);
    assert_eq!(b.driver.set_target(1, 10_000), CommandOutcome::Accepted);

    assert!(wait_for(|| {
        let s = b.driver.snapshot();
        !s.moving && s.current_steps == 1_000
    }));
    assert!(wait_for(|| b.reporter.last().is_some_and(|r| {
        r.position_percent100ths == 10_000 && r.state == OperationalState::Stall
    })));
    let reports = b.reporter.reports();
    assert!(reports.iter().any(|r| r.state == OperationalState::Closing));
    b.driver.shutdown();
}

#[test]
fn stepper_recovers_after_transient_pin_error() {
    let b = start(200);
    b.step.set_failing(true);
    assert_eq!(b.driver.set_target(1, 10_000), CommandOutcome::Accepted);
    // the failed pulse halts the move without counting a step
    assert!(wait_for(|| !b.driver.snapshot().moving));
    let halted = b.driver.snapshot();
    assert_eq!(halted.current_steps, 0);
    assert_eq!(halted.operational_state(), OperationalState::Stall);

    b.step.set_failing(false);
    assert_eq!(b.driver.set_target(1, 10_000), CommandOutcome::Accepted);
    assert!(wait_for(|| {
        let s = b.driver.snapshot();
        !s.moving && s.current_steps == 200
    }));
    assert!(b.step.rising_edges() >= 200);
    b.driver.shutdown();
}

#[test]
fn wrong_endpoint_is_ignored() {
    let b = start(200);
    let before = b.driver.snapshot();
    assert_eq!(b.driver.set_target(2, 10_000), CommandOutcome::WrongEndpoint);
    assert_eq!(b.driver.stop(7), CommandOutcome::WrongEndpoint);
    assert_eq!(b.driver.snapshot(), before);
}

#[test]
fn shutdown_leaves_driver_disabled() {
    let b = start(5_000);
    b.driver.set_target(1, 10_000);
    assert!(wait_for(|| b.driver.snapshot().current_steps > 10));
    let enable = b.enable.clone();
    drop(b);
    // active-low: high means released
    assert_eq!(enable.last(), Some(true));
}

#[test]
fn stop_hold_blocks_external_commands() {
    let b = start(200);
    b.stop_button.set(false);
    assert!(wait_for(|| b.driver.phase() == Phase::Ready));
    b.stop_button.set(true);
    assert!(b.driver.led_signal().is_continuous());
    assert_eq!(b.driver.set_target(1, 5_000), CommandOutcome::Blocked);
    assert!(!b.driver.snapshot().moving);
}
