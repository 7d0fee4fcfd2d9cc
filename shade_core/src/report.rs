//! Rate-limited reporting of motor state to the device framework.
//!
//! `ReportThrottler` decides *when* to report and hands a job to a
//! `ReportHandoff`; `ReportQueue` is the worker thread that owns the
//! `CoverReporter` and performs the (possibly slow) push. A lock-free
//! single-flight flag keeps at most one report outstanding. It is independent
//! of the state lock, so a stalled reporter never blocks stepping.
//!
//! Safety: the `ReportQueue` thread is shut down and joined on drop.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel as xch;
use shade_traits::{CoverReport, CoverReporter};

use crate::config::ReportCfg;
use crate::error::CoreError;
use crate::state::{Direction, MotorState, SharedState};
use crate::util::{Timebase, fmt_percent100ths};

/// Single-flight flag shared by the throttler and whoever completes the job.
#[derive(Debug, Clone, Default)]
pub struct InFlight {
    flag: Arc<AtomicBool>,
}

impl InFlight {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim the slot, or `None` if a report is already outstanding.
    pub fn try_acquire(&self) -> Option<InFlightGuard> {
        self.flag
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| InFlightGuard {
                flag: self.flag.clone(),
            })
    }

    pub fn is_busy(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

/// Releases the single-flight slot when dropped, whichever way the job ends.
#[derive(Debug)]
pub struct InFlightGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// One pending push: the state it was decided on plus the in-flight slot.
#[derive(Debug)]
pub struct ReportJob {
    snapshot: MotorState,
    _guard: InFlightGuard,
}

impl ReportJob {
    pub fn snapshot(&self) -> &MotorState {
        &self.snapshot
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum HandoffError {
    #[error("report queue full")]
    Full,
    #[error("report worker gone")]
    Disconnected,
}

/// Where the throttler puts a job. On `Err` the job has been dropped.
pub trait ReportHandoff {
    fn handoff(&mut self, job: ReportJob) -> Result<(), HandoffError>;
}

impl ReportHandoff for xch::Sender<ReportJob> {
    fn handoff(&mut self, job: ReportJob) -> Result<(), HandoffError> {
        self.try_send(job).map_err(|e| match e {
            xch::TrySendError::Full(_) => HandoffError::Full,
            xch::TrySendError::Disconnected(_) => HandoffError::Disconnected,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Nothing worth reporting.
    Idle,
    Reported,
    /// Wanted to report but one is still in flight; retried next tick.
    Busy,
    /// Hand-off refused; slot released, shadow untouched, retried next tick.
    HandoffFailed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Shadow {
    steps: Option<u16>,
    moving: bool,
    direction: Direction,
}

pub struct ReportThrottler<H> {
    state: SharedState,
    handoff: H,
    inflight: InFlight,
    cfg: ReportCfg,
    shadow: Shadow,
    last_report_ms: Option<u64>,
}

impl<H: ReportHandoff> ReportThrottler<H> {
    pub fn new(state: SharedState, handoff: H, cfg: ReportCfg) -> Self {
        Self {
            state,
            handoff,
            inflight: InFlight::new(),
            cfg,
            shadow: Shadow {
                steps: None,
                moving: false,
                direction: Direction::None,
            },
            last_report_ms: None,
        }
    }

    pub fn inflight(&self) -> &InFlight {
        &self.inflight
    }

    fn should_report(&self, snap: &MotorState, now_ms: u64) -> bool {
        let state_changed =
            snap.moving != self.shadow.moving || snap.direction != self.shadow.direction;
        let steps_changed = self.shadow.steps != Some(snap.current_steps);
        let moved_enough = self
            .shadow
            .steps
            .is_none_or(|s| s.abs_diff(snap.current_steps) >= self.cfg.min_steps);
        let time_ok = self
            .last_report_ms
            .is_none_or(|t| now_ms.saturating_sub(t) >= self.cfg.min_interval_ms);

        state_changed || (!snap.moving && steps_changed) || (snap.moving && moved_enough && time_ok)
    }

    pub fn tick(&mut self, now_ms: u64) -> TickOutcome {
        let snap = self.state.snapshot();
        if !self.should_report(&snap, now_ms) {
            return TickOutcome::Idle;
        }
        let Some(guard) = self.inflight.try_acquire() else {
            return TickOutcome::Busy;
        };
        let job = ReportJob {
            snapshot: snap,
            _guard: guard,
        };
        match self.handoff.handoff(job) {
            Ok(()) => {
                self.shadow = Shadow {
                    steps: Some(snap.current_steps),
                    moving: snap.moving,
                    direction: snap.direction,
                };
                self.last_report_ms = Some(now_ms);
                TickOutcome::Reported
            }
            Err(e) => {
                tracing::warn!(target: "shade::report", error = %e, "report hand-off failed; will retry");
                TickOutcome::HandoffFailed
            }
        }
    }

    pub fn run(&mut self, time: &Timebase, shutdown: &AtomicBool) {
        while !shutdown.load(Ordering::Relaxed) {
            self.tick(time.now_ms());
            time.sleep_ms(self.cfg.poll_ms);
        }
        tracing::trace!(target: "shade::report", "report throttler exiting");
    }
}

/// Build the framework-facing report for a state.
pub fn cover_report(s: &MotorState) -> CoverReport {
    CoverReport {
        position_percent100ths: s.current_position,
        state: s.operational_state(),
    }
}

/// Push one job. The freshest state is used when the lock is free; under
/// contention the job's own snapshot goes out instead.
pub fn deliver<R: CoverReporter>(reporter: &mut R, state: &SharedState, job: ReportJob) {
    let fresh = state.try_lock().map(|g| *g);
    let s = fresh.as_ref().unwrap_or(job.snapshot());
    let report = cover_report(s);
    match reporter.report(report) {
        Ok(()) => tracing::debug!(
            target: "shade::report",
            position = %fmt_percent100ths(report.position_percent100ths),
            state = ?report.state,
            "reported"
        ),
        Err(e) => tracing::warn!(target: "shade::report", error = %e, "reporter rejected update"),
    }
    // job (and its guard) dropped here
}

/// Worker thread owning the `CoverReporter`.
pub struct ReportQueue {
    tx: xch::Sender<ReportJob>,
    shutdown: Arc<AtomicBool>,
    join_handle: Option<std::thread::JoinHandle<()>>,
}

impl ReportQueue {
    pub fn spawn<R: CoverReporter + Send + 'static>(
        mut reporter: R,
        state: SharedState,
        depth: usize,
    ) -> Result<Self, CoreError> {
        let (tx, rx) = xch::bounded::<ReportJob>(depth.max(1));
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_clone = shutdown.clone();

        let join_handle = std::thread::Builder::new()
            .name("wc_report_worker".into())
            .spawn(move || {
                loop {
                    match rx.recv_timeout(Duration::from_millis(50)) {
                        Ok(job) => deliver(&mut reporter, &state, job),
                        Err(xch::RecvTimeoutError::Timeout) => {
                            if shutdown_clone.load(Ordering::Relaxed) {
                                break;
                            }
                        }
                        Err(xch::RecvTimeoutError::Disconnected) => break,
                    }
                }
                tracing::trace!(target: "shade::report", "report worker exiting");
            })
            .map_err(|e| CoreError::Spawn {
                task: "wc_report_worker",
                reason: e.to_string(),
            })?;

        Ok(Self {
            tx,
            shutdown,
            join_handle: Some(join_handle),
        })
    }

    pub fn sender(&self) -> xch::Sender<ReportJob> {
        self.tx.clone()
    }
}

impl Drop for ReportQueue {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Some(handle) = self.join_handle.take()
            && let Err(e) = handle.join()
        {
            tracing::warn!(target: "shade::report", ?e, "report worker panicked during shutdown");
        }
    }
}
