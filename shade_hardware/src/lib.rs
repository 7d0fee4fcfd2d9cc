//! Concrete backends for the window-covering controller.
//!
//! - `sim`: simulated lines and buttons (always available)
//! - `store`: crash-safe file-backed key-value store
//! - `gpio`: Raspberry Pi GPIO (feature `hardware`, Linux only)
//! - `rt`: realtime promotion of the stepper thread (feature `rt`)
pub mod error;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod gpio;
#[cfg(feature = "rt")]
pub mod rt;
pub mod sim;
pub mod store;

pub use error::HwError;
pub use sim::{ButtonHandle, SimulatedButton, SimulatedPin};
pub use store::FileStore;
