//! CLI argument definitions and shared statics.

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::OnceLock;

pub static FILE_GUARD: OnceLock<tracing_appender::non_blocking::WorkerGuard> = OnceLock::new();
/// Whether the user asked for JSON output (controls structured error output).
pub static JSON_MODE: OnceLock<bool> = OnceLock::new();

#[derive(Parser, Debug)]
#[command(name = "shade", version, about = "Stepper window-covering controller")]
pub struct Cli {
    /// Path to config TOML (typed)
    #[arg(long, value_name = "FILE", default_value = "etc/shade.toml")]
    pub config: PathBuf,

    /// Log and print as JSON lines instead of pretty
    #[arg(long, action = ArgAction::SetTrue)]
    pub json: bool,

    /// Console log level (error|warn|info|debug|trace); overrides logging.level
    #[arg(long = "log-level", value_name = "LEVEL")]
    pub log_level: Option<String>,

    /// Command to execute
    #[command(subcommand)]
    pub cmd: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the controller and accept console commands
    Run {
        /// Promote the stepper thread to SCHED_FIFO (Linux, `rt` feature)
        #[arg(
            long,
            action = ArgAction::SetTrue,
            long_help = "Promote the stepper thread to SCHED_FIFO on Linux.\n\nAlso locks resident memory (mlockall). Only the stepper thread is promoted; the report, LED and button tasks keep normal priority. Needs CAP_SYS_NICE (or root) and a binary built with the `rt` feature. Failure is logged and the controller keeps running at normal priority."
        )]
        rt: bool,
        /// SCHED_FIFO priority for --rt (1..=99); defaults to stepper.realtime_priority or 80
        #[arg(long, value_name = "PRIO")]
        rt_prio: Option<i32>,
        /// Read console commands from FILE instead of stdin, then exit
        #[arg(long, value_name = "FILE")]
        script: Option<PathBuf>,
    },
    /// Inspect or erase the stored calibration
    Calibration {
        #[command(subcommand)]
        action: CalibrationAction,
    },
    /// Quick health check (config, store, task start-up)
    SelfCheck,
}

#[derive(Subcommand, Debug, Clone, Copy)]
pub enum CalibrationAction {
    /// Print the stored home/travel and whether it is usable
    Show,
    /// Erase the stored calibration (defaults apply on next start)
    Clear,
}
