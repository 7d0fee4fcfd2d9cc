//! Seams between the window-covering core and everything it drives or is driven by.
//!
//! The core only ever talks to digital lines, a durable key-value store, a clock
//! and the device framework's reporting call. Backends live in `shade_hardware`
//! (or in tests).
pub mod clock;

pub use clock::{Clock, MonotonicClock};

/// A digital output line (STEP, DIR, ENABLE, LED).
pub trait OutputPin {
    fn set_level(&mut self, high: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// A digital input line (calibration buttons).
pub trait InputPin {
    fn is_high(&mut self) -> Result<bool, Box<dyn std::error::Error + Send + Sync>>;
}

/// Durable, namespaced storage of small integers.
///
/// Writes are staged by `set_u16`/`remove` and become durable on `commit`.
/// A backend must make a commit all-or-nothing with respect to its medium.
pub trait KeyValueStore {
    fn get_u16(
        &self,
        namespace: &str,
        key: &str,
    ) -> Result<Option<u16>, Box<dyn std::error::Error + Send + Sync>>;
    fn set_u16(
        &mut self,
        namespace: &str,
        key: &str,
        value: u16,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn remove(
        &mut self,
        namespace: &str,
        key: &str,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
    fn commit(&mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Motion as seen by the device framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationalState {
    Stall,
    Opening,
    Closing,
}

/// One position/state push to the device framework.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoverReport {
    /// 0..=10000, hundredths of a percent closed.
    pub position_percent100ths: u16,
    pub state: OperationalState,
}

/// The device framework's synchronous "update attributes" call.
pub trait CoverReporter {
    fn report(&mut self, report: CoverReport)
    -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
