//! `shade run`: assemble the hardware, start the driver and feed it console commands.

use std::io::BufRead;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel as xch;
use eyre::WrapErr;
use shade_core::driver::ThreadHook;
use shade_core::{DriverCfg, DriverHardware, WindowDriver};
use shade_hardware::FileStore;
use shade_traits::clock::MonotonicClock;
use shade_traits::{InputPin, OutputPin};

use crate::console::{self, Console, Flow, SimButtons};
use crate::reporter::ConsoleReporter;

const DEFAULT_RT_PRIORITY: i32 = 80;

/// Process-wide stop flag, set by Ctrl-C or `quit`.
#[derive(Clone, Default)]
pub struct Shutdown(Arc<AtomicBool>);

impl Shutdown {
    pub fn trigger(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    /// Sleep up to `d`, returning early once the flag is set.
    pub fn sleep(&self, d: Duration) {
        let slice = Duration::from_millis(10);
        let mut left = d;
        while !left.is_zero() && !self.is_set() {
            let nap = left.min(slice);
            std::thread::sleep(nap);
            left -= nap;
        }
    }
}

pub struct RunOpts<'a> {
    pub rt: bool,
    pub rt_prio: Option<i32>,
    pub script: Option<&'a Path>,
    pub json: bool,
}

fn stepper_hook(opts: &RunOpts<'_>, cfg: &shade_config::Config) -> Option<ThreadHook> {
    if !opts.rt {
        return None;
    }
    let prio = opts
        .rt_prio
        .or(cfg.stepper.realtime_priority)
        .unwrap_or(DEFAULT_RT_PRIORITY);
    #[cfg(feature = "rt")]
    {
        if let Err(e) = shade_hardware::rt::lock_memory() {
            tracing::warn!(error = %e, "mlockall failed; continuing unlocked");
        }
        Some(Box::new(move || {
            if let Err(e) = shade_hardware::rt::promote_current_thread(prio) {
                tracing::warn!(target: "shade::motor", error = %e, prio, "realtime promotion failed; stepping at normal priority");
            }
        }))
    }
    #[cfg(not(feature = "rt"))]
    {
        tracing::warn!(prio, "--rt requested but built without the `rt` feature; ignoring");
        None
    }
}

pub fn run(cfg: &shade_config::Config, opts: &RunOpts<'_>) -> eyre::Result<()> {
    let shutdown = Shutdown::default();
    {
        let s = shutdown.clone();
        ctrlc::set_handler(move || s.trigger()).wrap_err("install Ctrl-C handler")?;
    }

    let store = FileStore::open(&cfg.storage.path)
        .wrap_err_with(|| format!("open calibration store {:?}", cfg.storage.path))?;
    let driver_cfg = DriverCfg::from(cfg);
    let reporter = ConsoleReporter::new(opts.json);
    let on_stepper_start = stepper_hook(opts, cfg);

    #[cfg(all(feature = "hardware", target_os = "linux"))]
    {
        use shade_hardware::gpio;
        let g = gpio::open_gpio()?;
        let p = &cfg.pins;
        let enable_idle_high = cfg.stepper.enable_active_low;
        let active_low = cfg.buttons.active_low;
        let hw = DriverHardware {
            step: gpio::open_output(&g, p.step, false)?,
            dir: gpio::open_output(&g, p.dir, true)?,
            enable: gpio::open_output(&g, p.enable, enable_idle_high)?,
            led: gpio::open_output(&g, p.led, false)?,
            up: gpio::open_input(&g, p.button_up, active_low)?,
            down: gpio::open_input(&g, p.button_down, active_low)?,
            stop: gpio::open_input(&g, p.button_stop, active_low)?,
            store,
            reporter,
            on_stepper_start,
        };
        drive(hw, driver_cfg, cfg, opts, None, &shutdown)
    }

    #[cfg(not(all(feature = "hardware", target_os = "linux")))]
    {
        use shade_hardware::{SimulatedButton, SimulatedPin};
        let active_low = cfg.buttons.active_low;
        let (up, up_h) = SimulatedButton::new(active_low);
        let (down, down_h) = SimulatedButton::new(active_low);
        let (stop, stop_h) = SimulatedButton::new(active_low);
        let hw = DriverHardware {
            step: SimulatedPin::new("step"),
            dir: SimulatedPin::new("dir"),
            enable: SimulatedPin::new("enable"),
            led: SimulatedPin::new("led"),
            up,
            down,
            stop,
            store,
            reporter,
            on_stepper_start,
        };
        let buttons = SimButtons {
            up: up_h,
            down: down_h,
            stop: stop_h,
        };
        drive(hw, driver_cfg, cfg, opts, Some(buttons), &shutdown)
    }
}

fn drive<P, I, R>(
    hw: DriverHardware<P, I, FileStore, R>,
    driver_cfg: DriverCfg,
    cfg: &shade_config::Config,
    opts: &RunOpts<'_>,
    buttons: Option<SimButtons>,
    shutdown: &Shutdown,
) -> eyre::Result<()>
where
    P: OutputPin + Send + 'static,
    I: InputPin + Send + 'static,
    R: shade_traits::CoverReporter + Send + 'static,
{
    let driver = WindowDriver::start(hw, driver_cfg, Arc::new(MonotonicClock::new()))?;
    let console = Console {
        driver: &driver,
        buttons,
        json: opts.json,
        settle_ms: cfg.calibration.debounce_ms + 2 * cfg.calibration.poll_ms,
        shutdown,
    };

    let result = match opts.script {
        Some(path) => run_script(&console, path),
        None => run_stdin(&console, shutdown),
    };
    tracing::info!("shutting down");
    driver.shutdown();
    result
}

fn run_script(console: &Console<'_>, path: &Path) -> eyre::Result<()> {
    let text =
        std::fs::read_to_string(path).wrap_err_with(|| format!("read script {path:?}"))?;
    for (n, line) in text.lines().enumerate() {
        if console.shutdown.is_set() {
            break;
        }
        let cmd = console::parse(line).wrap_err_with(|| format!("{path:?} line {}", n + 1))?;
        if let Some(cmd) = cmd
            && console.execute(cmd)? == Flow::Quit
        {
            break;
        }
    }
    Ok(())
}

/// Interactive mode: stdin is read on its own thread so Ctrl-C stays responsive.
/// On EOF the controller keeps running until Ctrl-C.
fn run_stdin(console: &Console<'_>, shutdown: &Shutdown) -> eyre::Result<()> {
    let (tx, rx) = xch::unbounded::<String>();
    std::thread::Builder::new()
        .name("stdin".into())
        .spawn(move || {
            for line in std::io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(line).is_err() {
                    break;
                }
            }
        })
        .wrap_err("spawn stdin reader")?;

    let mut stdin_open = true;
    while !shutdown.is_set() {
        if !stdin_open {
            shutdown.sleep(Duration::from_millis(100));
            continue;
        }
        match rx.recv_timeout(Duration::from_millis(50)) {
            Ok(line) => match console::parse(&line) {
                Ok(Some(cmd)) => {
                    if console.execute(cmd)? == Flow::Quit {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => eprintln!("error: {e}"),
            },
            Err(xch::RecvTimeoutError::Timeout) => {}
            Err(xch::RecvTimeoutError::Disconnected) => {
                tracing::debug!("stdin closed; running until Ctrl-C");
                stdin_open = false;
            }
        }
    }
    Ok(())
}
