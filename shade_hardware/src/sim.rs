//! Simulated lines for running the controller without a board.
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use shade_traits::{InputPin, OutputPin};

/// Output line that remembers its level and counts rising edges.
#[derive(Debug, Clone)]
pub struct SimulatedPin {
    name: &'static str,
    level: Arc<AtomicBool>,
    rising_edges: Arc<AtomicU64>,
}

impl SimulatedPin {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            level: Arc::new(AtomicBool::new(false)),
            rising_edges: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn is_high(&self) -> bool {
        self.level.load(Ordering::Relaxed)
    }

    /// Number of low→high transitions so far (step pulses for a STEP line).
    pub fn rising_edges(&self) -> u64 {
        self.rising_edges.load(Ordering::Relaxed)
    }
}

impl OutputPin for SimulatedPin {
    fn set_level(&mut self, high: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let was = self.level.swap(high, Ordering::Relaxed);
        if high && !was {
            self.rising_edges.fetch_add(1, Ordering::Relaxed);
        }
        if was != high {
            tracing::trace!(pin = self.name, high, "sim pin level");
        }
        Ok(())
    }
}

/// Push button wired to an input line; pressed state is driven through a
/// [`ButtonHandle`].
#[derive(Debug)]
pub struct SimulatedButton {
    pressed: Arc<AtomicBool>,
    active_low: bool,
}

/// Remote control for a [`SimulatedButton`].
#[derive(Debug, Clone)]
pub struct ButtonHandle {
    pressed: Arc<AtomicBool>,
}

impl SimulatedButton {
    pub fn new(active_low: bool) -> (Self, ButtonHandle) {
        let pressed = Arc::new(AtomicBool::new(false));
        (
            Self {
                pressed: pressed.clone(),
                active_low,
            },
            ButtonHandle { pressed },
        )
    }
}

impl ButtonHandle {
    pub fn press(&self) {
        self.pressed.store(true, Ordering::Relaxed);
    }

    pub fn release(&self) {
        self.pressed.store(false, Ordering::Relaxed);
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed.load(Ordering::Relaxed)
    }
}

impl InputPin for SimulatedButton {
    fn is_high(&mut self) -> Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        let pressed = self.pressed.load(Ordering::Relaxed);
        Ok(pressed != self.active_low)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pin_counts_rising_edges_only() {
        let mut pin = SimulatedPin::new("step");
        let probe = pin.clone();
        for _ in 0..3 {
            pin.set_level(true).unwrap();
            pin.set_level(true).unwrap();
            pin.set_level(false).unwrap();
        }
        assert_eq!(probe.rising_edges(), 3);
        assert!(!probe.is_high());
    }

    #[test]
    fn active_low_button_reads_low_when_pressed() {
        let (mut button, handle) = SimulatedButton::new(true);
        assert!(button.is_high().unwrap());
        handle.press();
        assert!(!button.is_high().unwrap());
        handle.release();
        assert!(button.is_high().unwrap());
    }
}
