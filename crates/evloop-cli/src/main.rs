// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! evloop CLI: demos and servers on the cooperative event loop.

mod cli;
mod commands;
mod logger;
mod output;
mod settings;
mod tasks;

use std::process;

use clap::Parser;

use cli::{Cli, Command};
use settings::Settings;

fn main() {
    let cli = Cli::parse();
    output::init();
    logger::init(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("{}: {:#}", output::error_label(), e);
        process::exit(1);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let mut settings = Settings::load(cli.config.as_deref(), cli.cycle_delay_ms)?;

    match cli.command {
        Command::Demo { intervals } => commands::demo::cmd_demo(settings.event_loop, &intervals),
        Command::Serve { addr } => {
            let addr = addr.unwrap_or(settings.server.addr);
            commands::serve::cmd_serve(settings.event_loop, &addr)
        }
        Command::Reactor { addr, workers } => {
            if let Some(addr) = addr {
                settings.server.addr = addr;
            }
            if let Some(workers) = workers {
                settings.server.workers = workers;
            }
            commands::reactor::cmd_reactor(&settings.server)
        }
    }
}
