//! Line-oriented command layer: the stand-in for the external command
//! source (move/stop) plus simulated button presses for calibration.

use std::time::Duration;

use shade_core::util::fmt_percent100ths;
use shade_core::{Button, CommandOutcome, POSITION_MAX, WindowDriver};
use shade_hardware::ButtonHandle;

use crate::run::Shutdown;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Target(u16),
    Open,
    Close,
    Stop,
    /// Press and hold a button for the given milliseconds.
    Press(Button, u64),
    Wait(u64),
    Status,
    Quit,
}

const DEFAULT_PRESS_MS: u64 = 100;

fn number<T: std::str::FromStr>(word: Option<&str>, what: &str) -> eyre::Result<T> {
    let w = word.ok_or_else(|| eyre::eyre!("missing {what}"))?;
    w.parse()
        .map_err(|_| eyre::eyre!("invalid {what} '{w}'"))
}

/// Parse one line. Blank lines and `#` comments give `None`.
pub fn parse(line: &str) -> eyre::Result<Option<ConsoleCommand>> {
    let line = line.split('#').next().unwrap_or("").trim();
    let mut words = line.split_whitespace();
    let Some(head) = words.next() else {
        return Ok(None);
    };
    let cmd = match head.to_ascii_lowercase().as_str() {
        "target" => {
            let p: u16 = number(words.next(), "position (0..=10000)")?;
            if p > POSITION_MAX {
                eyre::bail!("position {p} out of range (0..=10000)");
            }
            ConsoleCommand::Target(p)
        }
        "open" => ConsoleCommand::Open,
        "close" => ConsoleCommand::Close,
        "stop" => ConsoleCommand::Stop,
        "press" => {
            let button = match words.next().map(str::to_ascii_lowercase).as_deref() {
                Some("up") => Button::Up,
                Some("down") => Button::Down,
                Some("stop") => Button::Stop,
                Some(other) => eyre::bail!("unknown button '{other}' (up|down|stop)"),
                None => eyre::bail!("missing button (up|down|stop)"),
            };
            let ms = match words.next() {
                Some(w) => number(Some(w), "hold time (ms)")?,
                None => DEFAULT_PRESS_MS,
            };
            ConsoleCommand::Press(button, ms)
        }
        "wait" => ConsoleCommand::Wait(number(words.next(), "wait time (ms)")?),
        "status" => ConsoleCommand::Status,
        "quit" | "exit" => ConsoleCommand::Quit,
        other => eyre::bail!("unknown command '{other}'"),
    };
    if let Some(extra) = words.next() {
        eyre::bail!("unexpected argument '{extra}'");
    }
    Ok(Some(cmd))
}

/// Handles for the simulated calibration buttons.
#[derive(Clone)]
pub struct SimButtons {
    pub up: ButtonHandle,
    pub down: ButtonHandle,
    pub stop: ButtonHandle,
}

impl SimButtons {
    fn get(&self, b: Button) -> &ButtonHandle {
        match b {
            Button::Up => &self.up,
            Button::Down => &self.down,
            Button::Stop => &self.stop,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct Console<'a> {
    pub driver: &'a WindowDriver,
    pub buttons: Option<SimButtons>,
    pub json: bool,
    /// Pause after a release so the debouncer sees it before the next press.
    pub settle_ms: u64,
    pub shutdown: &'a Shutdown,
}

fn outcome_name(o: CommandOutcome) -> &'static str {
    match o {
        CommandOutcome::Accepted => "Accepted",
        CommandOutcome::Blocked => "Blocked",
        CommandOutcome::WrongEndpoint => "WrongEndpoint",
    }
}

impl Console<'_> {
    fn print_outcome(&self, command: &str, position: Option<u16>, o: CommandOutcome) {
        if self.json {
            let line = serde_json::json!({
                "event": "command",
                "command": command,
                "position": position,
                "outcome": outcome_name(o),
            });
            println!("{line}");
        } else {
            match position {
                Some(p) => println!("{command} {}: {}", fmt_percent100ths(p), outcome_name(o)),
                None => println!("{command}: {}", outcome_name(o)),
            }
        }
    }

    fn print_status(&self) {
        let s = self.driver.snapshot();
        let phase = self.driver.phase();
        if self.json {
            let line = serde_json::json!({
                "event": "status",
                "position": s.current_position,
                "target": s.target_position,
                "steps": s.current_steps,
                "travel": s.travel_steps,
                "moving": s.moving,
                "direction": format!("{:?}", s.direction),
                "phase": format!("{phase:?}"),
            });
            println!("{line}");
        } else {
            println!(
                "status position={} target={} steps={}/{} moving={} direction={:?} phase={phase:?}",
                fmt_percent100ths(s.current_position),
                fmt_percent100ths(s.target_position),
                s.current_steps,
                s.travel_steps,
                s.moving,
                s.direction
            );
        }
    }

    pub fn execute(&self, cmd: ConsoleCommand) -> eyre::Result<Flow> {
        let ep = self.driver.endpoint_id();
        match cmd {
            ConsoleCommand::Target(p) => {
                self.print_outcome("target", Some(p), self.driver.set_target(ep, p));
            }
            ConsoleCommand::Open => {
                self.print_outcome("open", Some(0), self.driver.set_target(ep, 0));
            }
            ConsoleCommand::Close => {
                let o = self.driver.set_target(ep, POSITION_MAX);
                self.print_outcome("close", Some(POSITION_MAX), o);
            }
            ConsoleCommand::Stop => self.print_outcome("stop", None, self.driver.stop(ep)),
            ConsoleCommand::Press(button, ms) => {
                let Some(buttons) = &self.buttons else {
                    eyre::bail!("press needs the simulated backend (built with `hardware`)");
                };
                let h = buttons.get(button);
                tracing::debug!(?button, ms, "simulated press");
                h.press();
                self.shutdown.sleep(Duration::from_millis(ms));
                h.release();
                self.shutdown.sleep(Duration::from_millis(self.settle_ms));
            }
            ConsoleCommand::Wait(ms) => self.shutdown.sleep(Duration::from_millis(ms)),
            ConsoleCommand::Status => self.print_status(),
            ConsoleCommand::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }
}
