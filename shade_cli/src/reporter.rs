//! Stand-in for the device framework: prints every report to stdout.

use std::io::Write;

use shade_core::util::fmt_percent100ths;
use shade_traits::{CoverReport, CoverReporter, OperationalState};

pub fn state_name(s: OperationalState) -> &'static str {
    match s {
        OperationalState::Stall => "Stall",
        OperationalState::Opening => "Opening",
        OperationalState::Closing => "Closing",
    }
}

pub struct ConsoleReporter {
    json: bool,
}

impl ConsoleReporter {
    pub fn new(json: bool) -> Self {
        Self { json }
    }
}

impl CoverReporter for ConsoleReporter {
    fn report(
        &mut self,
        report: CoverReport,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let mut out = std::io::stdout().lock();
        if self.json {
            let line = serde_json::json!({
                "event": "report",
                "position": report.position_percent100ths,
                "state": state_name(report.state),
            });
            writeln!(out, "{line}")?;
        } else {
            writeln!(
                out,
                "report position={} state={}",
                fmt_percent100ths(report.position_percent100ths),
                state_name(report.state)
            )?;
        }
        Ok(())
    }
}
