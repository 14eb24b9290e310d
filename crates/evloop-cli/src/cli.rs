// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Command-line definition.

use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

/// Cooperative event loop demos and servers.
#[derive(Parser, Debug)]
#[command(name = "evloop", version, about)]
pub struct Cli {
    /// More log output (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    /// TOML file with `[event_loop]` and `[server]` tables.
    #[arg(long, global = true, env = "EVLOOP_CONFIG")]
    pub config: Option<PathBuf>,

    /// Sleep between scheduler cycles, in milliseconds. Overrides the
    /// config file; without either the loop busy-polls.
    #[arg(long, global = true, env = "EVLOOP_CYCLE_DELAY_MS")]
    pub cycle_delay_ms: Option<u64>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Read numbers from stdin and print their Fibonacci values, while
    /// interval timers tick alongside.
    Demo {
        /// Interval timer periods in seconds.
        #[arg(long = "interval", default_values_t = vec![6, 2])]
        intervals: Vec<u64>,
    },
    /// HTTP server running as a coroutine on the event loop.
    Serve {
        #[arg(long, env = "EVLOOP_ADDR")]
        addr: Option<String>,
    },
    /// Reactor HTTP server handing connections to a worker pool.
    Reactor {
        #[arg(long, env = "EVLOOP_ADDR")]
        addr: Option<String>,

        /// Worker threads (0 = one per core).
        #[arg(long, env = "EVLOOP_WORKERS")]
        workers: Option<usize>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn demo_defaults_to_two_intervals() {
        let cli = Cli::try_parse_from(["evloop", "demo"]).unwrap();
        match cli.command {
            Command::Demo { intervals } => assert_eq!(intervals, vec![6, 2]),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(cli.verbose, 0);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "evloop",
            "reactor",
            "--addr",
            "127.0.0.1:9000",
            "--workers",
            "3",
            "--cycle-delay-ms",
            "5",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.cycle_delay_ms, Some(5));
        match cli.command {
            Command::Reactor { addr, workers } => {
                assert_eq!(addr.as_deref(), Some("127.0.0.1:9000"));
                assert_eq!(workers, Some(3));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn subcommand_is_required() {
        assert!(Cli::try_parse_from(["evloop"]).is_err());
    }
}
