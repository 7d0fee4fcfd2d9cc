//! Raspberry Pi GPIO lines via rppal.
use rppal::gpio::Gpio;
use shade_traits::{InputPin, OutputPin};

use crate::error::{HwError, Result};

pub struct GpioOutput {
    pin: rppal::gpio::OutputPin,
}

pub struct GpioInput {
    pin: rppal::gpio::InputPin,
}

pub fn open_output(gpio: &Gpio, bcm: u8, initial_high: bool) -> Result<GpioOutput> {
    let pin = gpio
        .get(bcm)
        .map_err(|e| HwError::Gpio(format!("open output {bcm}: {e}")))?;
    let pin = if initial_high {
        pin.into_output_high()
    } else {
        pin.into_output_low()
    };
    Ok(GpioOutput { pin })
}

/// Buttons are read with the internal pull-up when they short to ground.
pub fn open_input(gpio: &Gpio, bcm: u8, active_low: bool) -> Result<GpioInput> {
    let pin = gpio
        .get(bcm)
        .map_err(|e| HwError::Gpio(format!("open input {bcm}: {e}")))?;
    let pin = if active_low {
        pin.into_input_pullup()
    } else {
        pin.into_input_pulldown()
    };
    Ok(GpioInput { pin })
}

pub fn open_gpio() -> Result<Gpio> {
    Gpio::new().map_err(|e| HwError::Gpio(format!("open gpio: {e}")))
}

impl OutputPin for GpioOutput {
    fn set_level(&mut self, high: bool) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if high {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
        Ok(())
    }
}

impl InputPin for GpioInput {
    fn is_high(&mut self) -> std::result::Result<bool, Box<dyn std::error::Error + Send + Sync>> {
        Ok(self.pin.is_high())
    }
}
