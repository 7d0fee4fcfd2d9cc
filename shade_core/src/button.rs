//! Debounced calibration buttons.
//!
//! Each `ButtonChannel` turns a raw level into at most one `Press` per physical
//! press and one `Hold` once that press outlasts the hold threshold. After any
//! accepted transition the channel ignores the raw level for the debounce time.
use eyre::WrapErr;
use shade_traits::InputPin;

use crate::config::ButtonTiming;
use crate::error::Result;
use crate::hw_error::map_hw_error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Up,
    Down,
    Stop,
}

impl Button {
    pub const ALL: [Button; 3] = [Button::Up, Button::Down, Button::Stop];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonState {
    #[default]
    Released,
    Pressed,
    Held,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonEvent {
    Press(Button),
    Hold(Button),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ButtonChannel {
    state: ButtonState,
    last_transition_ms: Option<u64>,
    press_start_ms: u64,
}

/// What a channel produced on one sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Press,
    Hold,
}

impl ButtonChannel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ButtonState {
        self.state
    }

    /// Feed one sample of the (already polarity-corrected) input.
    pub fn update(&mut self, asserted: bool, now_ms: u64, timing: &ButtonTiming) -> Option<Edge> {
        let settled = self
            .last_transition_ms
            .is_none_or(|t| now_ms.saturating_sub(t) >= timing.debounce_ms);

        match self.state {
            ButtonState::Released => {
                if asserted && settled {
                    self.state = ButtonState::Pressed;
                    self.last_transition_ms = Some(now_ms);
                    self.press_start_ms = now_ms;
                    return Some(Edge::Press);
                }
            }
            ButtonState::Pressed => {
                if !asserted {
                    if settled {
                        self.state = ButtonState::Released;
                        self.last_transition_ms = Some(now_ms);
                    }
                } else if now_ms.saturating_sub(self.press_start_ms) >= timing.hold_ms {
                    self.state = ButtonState::Held;
                    return Some(Edge::Hold);
                }
            }
            ButtonState::Held => {
                if !asserted && settled {
                    self.state = ButtonState::Released;
                    self.last_transition_ms = Some(now_ms);
                }
            }
        }
        None
    }
}

/// The three inputs plus their channels.
pub struct ButtonPanel<I: InputPin> {
    inputs: [(Button, I); 3],
    channels: [ButtonChannel; 3],
    timing: ButtonTiming,
    active_low: bool,
}

impl<I: InputPin> ButtonPanel<I> {
    pub fn new(up: I, down: I, stop: I, timing: ButtonTiming, active_low: bool) -> Self {
        Self {
            inputs: [(Button::Up, up), (Button::Down, down), (Button::Stop, stop)],
            channels: [ButtonChannel::new(); 3],
            timing,
            active_low,
        }
    }

    /// Sample every input once; events come out in UP, DOWN, STOP order.
    pub fn poll(&mut self, now_ms: u64) -> Result<Vec<ButtonEvent>> {
        let mut events = Vec::new();
        for ((button, input), channel) in self.inputs.iter_mut().zip(self.channels.iter_mut()) {
            let high = input
                .is_high()
                .map_err(|e| eyre::Report::new(map_hw_error(&*e)))
                .wrap_err_with(|| format!("reading {button:?} button"))?;
            let asserted = high != self.active_low;
            match channel.update(asserted, now_ms, &self.timing) {
                Some(Edge::Press) => events.push(ButtonEvent::Press(*button)),
                Some(Edge::Hold) => events.push(ButtonEvent::Hold(*button)),
                None => {}
            }
        }
        Ok(events)
    }

    pub fn state(&self, button: Button) -> ButtonState {
        let idx = match button {
            Button::Up => 0,
            Button::Down => 1,
            Button::Stop => 2,
        };
        self.channels[idx].state()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const T: ButtonTiming = ButtonTiming {
        debounce_ms: 30,
        hold_ms: 3000,
    };

    #[test]
    fn bounce_after_press_is_ignored() {
        let mut ch = ButtonChannel::new();
        assert_eq!(ch.update(true, 0, &T), Some(Edge::Press));
        assert_eq!(ch.update(false, 5, &T), None);
        assert_eq!(ch.update(true, 10, &T), None);
        assert_eq!(ch.state(), ButtonState::Pressed);
        // settled release, then a fresh press after the lockout
        assert_eq!(ch.update(false, 40, &T), None);
        assert_eq!(ch.state(), ButtonState::Released);
        assert_eq!(ch.update(true, 50, &T), None);
        assert_eq!(ch.update(true, 70, &T), Some(Edge::Press));
    }

    #[test]
    fn hold_fires_once() {
        let mut ch = ButtonChannel::new();
        assert_eq!(ch.update(true, 0, &T), Some(Edge::Press));
        assert_eq!(ch.update(true, 2999, &T), None);
        assert_eq!(ch.update(true, 3000, &T), Some(Edge::Hold));
        assert_eq!(ch.update(true, 5000, &T), None);
        assert_eq!(ch.state(), ButtonState::Held);
        assert_eq!(ch.update(false, 5010, &T), None);
        assert_eq!(ch.state(), ButtonState::Released);
    }
}
