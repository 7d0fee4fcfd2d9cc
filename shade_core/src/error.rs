use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum CoreError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("hardware fault: {0}")]
    HardwareFault(String),
    #[error("failed to start task {task}: {reason}")]
    Spawn { task: &'static str, reason: String },
    #[error("calibration storage: {0}")]
    Storage(#[from] StoreError),
}

/// Failures of the calibration store's persistence medium.
#[derive(Debug, Error, Clone)]
pub enum StoreError {
    #[error("read {key}: {reason}")]
    Read { key: &'static str, reason: String },
    #[error("write {key}: {reason}")]
    Write { key: &'static str, reason: String },
    #[error("commit: {0}")]
    Commit(String),
}

/// Why a persisted calibration record was discarded.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum InvalidCalibration {
    #[error("home_steps missing")]
    MissingHome,
    #[error("travel_steps missing")]
    MissingTravel,
    #[error("home_steps is {0}, expected 0")]
    HomeNotZero(u16),
    #[error("travel_steps {travel} outside [{min}, {max}]")]
    TravelOutOfRange { travel: u16, min: u16, max: u16 },
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
