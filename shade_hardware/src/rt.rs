//! Realtime support for the stepper thread: SCHED_FIFO promotion and memory locking.

use crate::error::{HwError, Result};

/// Promote the calling thread to SCHED_FIFO with `prio`, clamped to the system range.
#[cfg(target_os = "linux")]
pub fn promote_current_thread(prio: i32) -> Result<i32> {
    use libc::{SCHED_FIFO, sched_get_priority_max, sched_get_priority_min, sched_param};

    let (min, max) = unsafe { (sched_get_priority_min(SCHED_FIFO), sched_get_priority_max(SCHED_FIFO)) };
    if min < 0 || max < 0 {
        return Err(HwError::Io(std::io::Error::last_os_error()));
    }
    let clamped = prio.clamp(min, max);
    let param = sched_param {
        sched_priority: clamped,
    };
    // pthread_setschedparam only touches the calling thread, unlike sched_setscheduler(0)
    let rc = unsafe { libc::pthread_setschedparam(libc::pthread_self(), SCHED_FIFO, &param) };
    if rc != 0 {
        return Err(HwError::Io(std::io::Error::from_raw_os_error(rc)));
    }
    tracing::info!(priority = clamped, "thread promoted to SCHED_FIFO");
    Ok(clamped)
}

#[cfg(not(target_os = "linux"))]
pub fn promote_current_thread(_prio: i32) -> Result<i32> {
    Err(HwError::Unsupported("SCHED_FIFO"))
}

/// Lock the resident pages into RAM so the stepper never page-faults mid-pulse.
#[cfg(unix)]
pub fn lock_memory() -> Result<()> {
    let rc = unsafe { libc::mlockall(libc::MCL_CURRENT) };
    if rc != 0 {
        return Err(HwError::Io(std::io::Error::last_os_error()));
    }
    tracing::info!("process memory locked (MCL_CURRENT)");
    Ok(())
}

#[cfg(not(unix))]
pub fn lock_memory() -> Result<()> {
    Err(HwError::Unsupported("mlockall"))
}
