//! Test doubles for the hardware and framework seams.
//!
//! All of them are cheap `Clone` handles over shared state, so a test can
//! keep one copy for inspection after handing the other to a task.
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use shade_traits::{CoverReport, CoverReporter, InputPin, KeyValueStore, OutputPin};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

fn locked<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Output pin that records every level written to it.
#[derive(Debug, Clone, Default)]
pub struct SpyPin {
    levels: Arc<Mutex<Vec<bool>>>,
    fail: Arc<AtomicBool>,
}

impl SpyPin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn levels(&self) -> Vec<bool> {
        locked(&self.levels).clone()
    }

    pub fn last(&self) -> Option<bool> {
        locked(&self.levels).last().copied()
    }

    /// Low-to-high transitions seen so far (a write of `true` after `false` or at start).
    pub fn rising_edges(&self) -> usize {
        let levels = locked(&self.levels);
        let mut prev = false;
        let mut n = 0;
        for &l in levels.iter() {
            if l && !prev {
                n += 1;
            }
            prev = l;
        }
        n
    }

    /// Make subsequent writes fail with a GPIO error.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }
}

impl OutputPin for SpyPin {
    fn set_level(&mut self, high: bool) -> Result<(), BoxError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(Box::new(std::io::Error::other("gpio write failed")));
        }
        locked(&self.levels).push(high);
        Ok(())
    }
}

/// Input pin whose level a test sets directly.
#[derive(Debug, Clone, Default)]
pub struct SharedInput {
    level: Arc<AtomicBool>,
    fail: Arc<AtomicBool>,
}

impl SharedInput {
    pub fn new(high: bool) -> Self {
        Self {
            level: Arc::new(AtomicBool::new(high)),
            fail: Arc::default(),
        }
    }

    pub fn set(&self, high: bool) {
        self.level.store(high, Ordering::Relaxed);
    }

    /// Make subsequent reads fail with a GPIO error.
    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }
}

impl InputPin for SharedInput {
    fn is_high(&mut self) -> Result<bool, BoxError> {
        if self.fail.load(Ordering::Relaxed) {
            return Err(Box::new(std::io::Error::other("gpio read failed")));
        }
        Ok(self.level.load(Ordering::Relaxed))
    }
}

#[derive(Debug, Default)]
struct MemInner {
    staged: BTreeMap<(String, String), u16>,
    committed: BTreeMap<(String, String), u16>,
    commits: usize,
    fail_reads: bool,
    fail_writes: bool,
    fail_commit: bool,
}

/// In-memory key-value store with separate staged/committed views and
/// failure injection.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<MemInner>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a committed value (as if written on a previous boot).
    pub fn with_value(self, namespace: &str, key: &str, value: u16) -> Self {
        {
            let mut g = locked(&self.inner);
            let k = (namespace.to_owned(), key.to_owned());
            g.staged.insert(k.clone(), value);
            g.committed.insert(k, value);
        }
        self
    }

    /// Value as of the last successful commit.
    pub fn committed(&self, namespace: &str, key: &str) -> Option<u16> {
        locked(&self.inner)
            .committed
            .get(&(namespace.to_owned(), key.to_owned()))
            .copied()
    }

    pub fn commit_count(&self) -> usize {
        locked(&self.inner).commits
    }

    pub fn fail_reads(&self, fail: bool) {
        locked(&self.inner).fail_reads = fail;
    }

    pub fn fail_writes(&self, fail: bool) {
        locked(&self.inner).fail_writes = fail;
    }

    pub fn fail_commit(&self, fail: bool) {
        locked(&self.inner).fail_commit = fail;
    }
}

impl KeyValueStore for MemoryStore {
    fn get_u16(&self, namespace: &str, key: &str) -> Result<Option<u16>, BoxError> {
        let g = locked(&self.inner);
        if g.fail_reads {
            return Err(Box::new(std::io::Error::other("store read failed")));
        }
        Ok(g.staged.get(&(namespace.to_owned(), key.to_owned())).copied())
    }

    fn set_u16(&mut self, namespace: &str, key: &str, value: u16) -> Result<(), BoxError> {
        let mut g = locked(&self.inner);
        if g.fail_writes {
            return Err(Box::new(std::io::Error::other("store write failed")));
        }
        g.staged.insert((namespace.to_owned(), key.to_owned()), value);
        Ok(())
    }

    fn remove(&mut self, namespace: &str, key: &str) -> Result<(), BoxError> {
        let mut g = locked(&self.inner);
        if g.fail_writes {
            return Err(Box::new(std::io::Error::other("store write failed")));
        }
        g.staged.remove(&(namespace.to_owned(), key.to_owned()));
        Ok(())
    }

    fn commit(&mut self) -> Result<(), BoxError> {
        let mut g = locked(&self.inner);
        if g.fail_commit {
            return Err(Box::new(std::io::Error::other("store commit failed")));
        }
        g.committed = g.staged.clone();
        g.commits += 1;
        Ok(())
    }
}

/// Reporter that keeps every report it was given, optionally slow or failing.
#[derive(Debug, Clone, Default)]
pub struct RecordingReporter {
    reports: Arc<Mutex<Vec<CoverReport>>>,
    delay: Duration,
    fail: Arc<AtomicBool>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Each `report` call sleeps this long first (a slow framework).
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn reports(&self) -> Vec<CoverReport> {
        locked(&self.reports).clone()
    }

    pub fn last(&self) -> Option<CoverReport> {
        locked(&self.reports).last().copied()
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::Relaxed);
    }
}

impl CoverReporter for RecordingReporter {
    fn report(&mut self, report: CoverReport) -> Result<(), BoxError> {
        if !self.delay.is_zero() {
            std::thread::sleep(self.delay);
        }
        if self.fail.load(Ordering::Relaxed) {
            return Err(Box::new(std::io::Error::other("framework busy")));
        }
        locked(&self.reports).push(report);
        Ok(())
    }
}
