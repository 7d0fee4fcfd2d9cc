//! Assembly of the four control tasks around one `SharedState`.
//!
//! `WindowDriver::start` loads calibration, initialises the pins and spawns
//! the stepper, report, LED and button tasks plus the report worker. The
//! driver owns every thread; `shutdown` (or drop) stops and joins them all.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use eyre::WrapErr;
use shade_traits::clock::Clock;
use shade_traits::{CoverReporter, InputPin, KeyValueStore, OutputPin};

use crate::button::ButtonPanel;
use crate::calibration::CalibrationStore;
use crate::config::DriverCfg;
use crate::error::{CoreError, Result};
use crate::led::{LedController, LedHandle, LedSignal};
use crate::report::{ReportQueue, ReportThrottler};
use crate::session::{CalibrationSession, CalibrationTask, Phase, PhaseCell};
use crate::state::{Command, CommandOutcome, MotorState, SharedState};
use crate::stepper::{StepperLoop, StepperPins};
use crate::util::Timebase;

/// Hook run on the stepper thread before it starts stepping (e.g. realtime promotion).
pub type ThreadHook = Box<dyn FnOnce() + Send>;

/// Everything the driver takes ownership of.
pub struct DriverHardware<P, I, K, R> {
    pub step: P,
    pub dir: P,
    pub enable: P,
    pub led: P,
    pub up: I,
    pub down: I,
    pub stop: I,
    pub store: K,
    pub reporter: R,
    pub on_stepper_start: Option<ThreadHook>,
}

pub struct WindowDriver {
    endpoint_id: u16,
    state: SharedState,
    phase: PhaseCell,
    led: Arc<LedSignal>,
    shutdown: Arc<AtomicBool>,
    handles: Vec<(&'static str, JoinHandle<()>)>,
    report_queue: Option<ReportQueue>,
}

impl WindowDriver {
    pub fn start<P, I, K, R>(
        hw: DriverHardware<P, I, K, R>,
        cfg: DriverCfg,
        clock: Arc<dyn Clock + Send + Sync>,
    ) -> Result<Self>
    where
        P: OutputPin + Send + 'static,
        I: InputPin + Send + 'static,
        K: KeyValueStore + Send + 'static,
        R: CoverReporter + Send + 'static,
    {
        let DriverHardware {
            step,
            dir,
            enable,
            led,
            up,
            down,
            stop,
            store,
            reporter,
            on_stepper_start,
        } = hw;
        let time = Timebase::new(clock);

        let mut store = CalibrationStore::new(store, cfg.calibration.limits);
        let calibration = store.load();
        let state = SharedState::new(MotorState::new(calibration.travel_steps));

        tracing::info!(
            target: "shade::motor",
            endpoint_id = cfg.endpoint_id,
            travel_steps = calibration.travel_steps,
            pulse_us = cfg.stepper.pulse_us,
            step_delay_us = cfg.stepper.step_delay_us,
            enable_active_low = cfg.stepper.enable_active_low,
            "starting window driver"
        );

        let mut stepper = StepperLoop::new(
            StepperPins { step, dir, enable },
            state.clone(),
            cfg.stepper.clone(),
            time.clone(),
        );
        stepper.init_pins().wrap_err("initialising stepper pins")?;

        let signal = Arc::new(LedSignal::new());
        let mut led_ctl = LedController::new(led, signal.clone());
        led_ctl.tick(time.now_ms()).wrap_err("initialising LED")?;

        let session = CalibrationSession::new(
            state.clone(),
            store,
            LedHandle::new(signal.clone(), cfg.led.clone()),
            cfg.calibration.clone(),
        );
        let phase = session.phase_cell();
        let panel = ButtonPanel::new(
            up,
            down,
            stop,
            cfg.calibration.buttons,
            cfg.calibration.buttons_active_low,
        );
        let mut calibration_task = CalibrationTask::new(panel, session, cfg.calibration.poll_ms);

        let mut driver = Self {
            endpoint_id: cfg.endpoint_id,
            state: state.clone(),
            phase,
            led: signal,
            shutdown: Arc::new(AtomicBool::new(false)),
            handles: Vec::new(),
            report_queue: None,
        };

        // From here on an early return drops `driver`, which joins whatever already started.
        let queue = ReportQueue::spawn(reporter, state.clone(), cfg.report.queue_depth)?;
        let mut throttler = ReportThrottler::new(state, queue.sender(), cfg.report.clone());
        driver.report_queue = Some(queue);

        driver.spawn("wc_stepper", move |shutdown| {
            if let Some(hook) = on_stepper_start {
                hook();
            }
            if let Err(e) = stepper.run(&shutdown) {
                tracing::error!(target: "shade::motor", error = ?e, "stepper task stopped");
            }
        })?;

        let t = time.clone();
        driver.spawn("wc_report", move |shutdown| throttler.run(&t, &shutdown))?;

        let t = time.clone();
        let led_poll = cfg.led.poll_ms;
        driver.spawn("wc_led", move |shutdown| {
            if let Err(e) = led_ctl.run(&t, led_poll, &shutdown) {
                tracing::error!(target: "shade::led", error = ?e, "LED task stopped");
            }
        })?;

        driver.spawn("wc_buttons", move |shutdown| {
            if let Err(e) = calibration_task.run(&time, &shutdown) {
                tracing::error!(target: "shade::calibration", error = ?e, "button task stopped");
            }
        })?;

        Ok(driver)
    }

    fn spawn(
        &mut self,
        name: &'static str,
        body: impl FnOnce(Arc<AtomicBool>) + Send + 'static,
    ) -> std::result::Result<(), CoreError> {
        let shutdown = self.shutdown.clone();
        let handle = std::thread::Builder::new()
            .name(name.into())
            .spawn(move || body(shutdown))
            .map_err(|e| CoreError::Spawn {
                task: name,
                reason: e.to_string(),
            })?;
        self.handles.push((name, handle));
        Ok(())
    }

    pub fn endpoint_id(&self) -> u16 {
        self.endpoint_id
    }

    /// External command entry; ignored unless addressed to our endpoint.
    pub fn apply(&self, endpoint_id: u16, cmd: Command) -> CommandOutcome {
        if endpoint_id != self.endpoint_id {
            tracing::warn!(
                target: "shade::state",
                endpoint_id,
                expected = self.endpoint_id,
                ?cmd,
                "command for unknown endpoint ignored"
            );
            return CommandOutcome::WrongEndpoint;
        }
        self.state.apply(cmd)
    }

    pub fn set_target(&self, endpoint_id: u16, position: u16) -> CommandOutcome {
        self.apply(endpoint_id, Command::SetTarget(position))
    }

    pub fn stop(&self, endpoint_id: u16) -> CommandOutcome {
        self.apply(endpoint_id, Command::Stop)
    }

    pub fn snapshot(&self) -> MotorState {
        self.state.snapshot()
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.phase.get()
    }

    pub fn led_signal(&self) -> &Arc<LedSignal> {
        &self.led
    }

    /// Stop every task and wait for them. Also done on drop.
    pub fn shutdown(mut self) {
        self.stop_threads();
    }

    fn stop_threads(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        for (name, handle) in self.handles.drain(..) {
            match handle.join() {
                Ok(()) => tracing::trace!(task = name, "task joined"),
                Err(e) => tracing::warn!(task = name, ?e, "task panicked during shutdown"),
            }
        }
        // joins the report worker
        self.report_queue.take();
    }
}

impl Drop for WindowDriver {
    fn drop(&mut self) {
        self.stop_threads();
    }
}
