use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use rstest::rstest;
use shade_core::config::LedCfg;
use shade_core::led::{LedController, LedHandle, LedSignal};
use shade_core::mocks::SpyPin;
use shade_core::util::Timebase;
use shade_traits::clock::MonotonicClock;

fn rig() -> (Arc<LedSignal>, SpyPin, LedController<SpyPin>) {
    let signal = Arc::new(LedSignal::new());
    let pin = SpyPin::new();
    let ctl = LedController::new(pin.clone(), signal.clone());
    (signal, pin, ctl)
}

/// Levels sampled every `step_ms` from `start` for `span_ms`.
fn sample(ctl: &mut LedController<SpyPin>, start: u64, span_ms: u64, step_ms: u64) -> Vec<bool> {
    (0..span_ms / step_ms)
        .map(|i| ctl.tick(start + i * step_ms).unwrap())
        .collect()
}

#[rstest]
#[case(2, 400)]
#[case(3, 400)]
#[case(6, 120)]
fn blink_runs_count_cycles_then_clears(#[case] count: u16, #[case] period_ms: u64) {
    let (signal, pin, mut ctl) = rig();
    signal.blink(count, Duration::from_millis(period_ms));
    let levels = sample(&mut ctl, 1_000, period_ms * u64::from(count) + 200, 10);

    assert_eq!(pin.rising_edges(), usize::from(count));
    assert_eq!(levels.last(), Some(&false));
    assert_eq!(signal.pending_blinks(), 0);
}

#[test]
fn each_cycle_is_half_on_half_off() {
    let (signal, _pin, mut ctl) = rig();
    signal.blink(1, Duration::from_millis(400));
    assert!(ctl.tick(0).unwrap());
    assert!(ctl.tick(199).unwrap());
    assert!(!ctl.tick(200).unwrap());
    assert!(!ctl.tick(399).unwrap());
    assert!(!ctl.tick(400).unwrap());
}

#[test]
fn continuous_overrides_blinking() {
    let (signal, pin, mut ctl) = rig();
    signal.blink(5, Duration::from_millis(100));
    ctl.tick(0).unwrap();
    signal.set_continuous(true);
    let levels = sample(&mut ctl, 10, 1_000, 10);
    assert!(levels.iter().all(|&l| l));
    assert_eq!(signal.pending_blinks(), 0);

    signal.set_continuous(false);
    assert!(!ctl.tick(2_000).unwrap());
    assert_eq!(pin.last(), Some(false));
}

#[test]
fn new_blink_restarts_schedule() {
    let (signal, pin, mut ctl) = rig();
    signal.blink(3, Duration::from_millis(100));
    // interrupted during the first cycle's off half
    sample(&mut ctl, 0, 80, 10);
    signal.blink(2, Duration::from_millis(100));
    sample(&mut ctl, 80, 400, 10);
    assert_eq!(pin.rising_edges(), 1 + 2);
    assert_eq!(signal.pending_blinks(), 0);
}

#[test]
fn handle_patterns_use_configured_timing() {
    let signal = Arc::new(LedSignal::new());
    let led = LedHandle::new(signal.clone(), LedCfg::default());
    led.on();
    assert!(signal.is_continuous());
    led.success(3);
    assert!(!signal.is_continuous());
    assert_eq!(signal.pending_blinks(), 3);
    assert_eq!(signal.period(), Duration::from_millis(400));
    led.error();
    assert_eq!(signal.pending_blinks(), 6);
    assert_eq!(signal.period(), Duration::from_millis(120));
    led.off();
    assert_eq!(signal.pending_blinks(), 0);
}

#[test]
fn pin_writes_only_on_change() {
    let (_signal, pin, mut ctl) = rig();
    sample(&mut ctl, 0, 500, 10);
    assert_eq!(pin.levels(), vec![false]);
}

#[test]
fn expired_schedule_cannot_clear_its_replacement() {
    let (signal, pin, mut ctl) = rig();
    signal.blink(1, Duration::from_millis(100));
    sample(&mut ctl, 0, 100, 10);
    let played = signal.schedule();

    signal.blink(2, Duration::from_millis(100));
    // the task retiring the first schedule after the second was published
    assert!(!signal.retire(played.seq));
    assert_eq!(signal.pending_blinks(), 2);

    sample(&mut ctl, 150, 300, 10);
    assert_eq!(pin.rising_edges(), 1 + 2);
    assert_eq!(signal.pending_blinks(), 0);
}

#[test]
fn schedule_fields_are_published_together() {
    let signal = LedSignal::new();
    let before = signal.schedule();
    signal.blink(4, Duration::from_millis(250));
    let after = signal.schedule();
    assert_eq!(after.seq, before.seq.wrapping_add(1));
    assert_eq!((after.count, after.period_ms), (4, 250));
    assert!(!after.continuous);

    signal.set_continuous(true);
    let steady = signal.schedule();
    assert_eq!(steady.seq, after.seq.wrapping_add(1));
    assert_eq!(steady.count, 0);
    assert!(steady.continuous);
}

#[test]
fn long_periods_saturate() {
    let signal = LedSignal::new();
    signal.blink(1, Duration::from_secs(120));
    assert_eq!(signal.period(), Duration::from_millis(u64::from(u16::MAX)));
}

#[test]
fn run_keeps_polling_through_pin_errors() {
    let (signal, pin, mut ctl) = rig();
    let shutdown = Arc::new(AtomicBool::new(false));
    let time = Timebase::new(Arc::new(MonotonicClock));
    pin.set_failing(true);
    signal.set_continuous(true);

    let stop = shutdown.clone();
    let flag = pin.clone();
    let worker = std::thread::spawn(move || {
        ctl.run(&time, 1, &stop).unwrap();
        ctl
    });
    std::thread::sleep(Duration::from_millis(20));
    flag.set_failing(false);
    let deadline = Instant::now() + Duration::from_secs(5);
    while pin.last() != Some(true) && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(1));
    }
    shutdown.store(true, Ordering::Relaxed);
    let ctl = worker.join().unwrap();

    assert_eq!(pin.levels().first(), Some(&true));
    assert_eq!(ctl.level(), Some(false));
}
