mod cli;
mod console;
mod error_fmt;
mod logging;
mod maint;
mod reporter;
mod run;

use clap::Parser;

use crate::cli::{Cli, Commands, JSON_MODE};
use crate::error_fmt::{exit_code_for_error, format_error_json, humanize};

fn main() {
    let cli = Cli::parse();
    let _ = JSON_MODE.set(cli.json);

    if let Err(err) = real_main(&cli) {
        if JSON_MODE.get().copied().unwrap_or(false) {
            eprintln!("{}", format_error_json(&err));
        } else {
            eprintln!("{}", humanize(&err));
        }
        std::process::exit(exit_code_for_error(&err));
    }
}

fn real_main(cli: &Cli) -> eyre::Result<()> {
    color_eyre::install()?;
    let cfg = shade_config::load_file(&cli.config)?;
    logging::init(cli, &cfg.logging)?;
    tracing::debug!(config = ?cli.config, "config loaded");

    match &cli.cmd {
        Commands::Run {
            rt,
            rt_prio,
            script,
        } => run::run(
            &cfg,
            &run::RunOpts {
                rt: *rt,
                rt_prio: *rt_prio,
                script: script.as_deref(),
                json: cli.json,
            },
        ),
        Commands::Calibration { action } => maint::calibration(&cfg, *action, cli.json),
        Commands::SelfCheck => maint::self_check(&cfg, cli.json),
    }
}
