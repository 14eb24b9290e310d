// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Config file plus command-line overrides.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use evloop_rt::LoopConfig;
use evloop_server::ServerConfig;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub event_loop: LoopConfig,
    pub server: ServerConfig,
}

impl Settings {
    /// Read `path` if given. A `cycle_delay_ms` from the command line wins
    /// over the file; with neither, the loop busy-polls.
    pub fn load(path: Option<&Path>, cycle_delay_ms: Option<u64>) -> anyhow::Result<Self> {
        let mut settings = match path {
            Some(path) => {
                let source = fs::read_to_string(path)
                    .with_context(|| format!("reading config {}", path.display()))?;
                Self::from_toml_str(&source)
                    .with_context(|| format!("parsing config {}", path.display()))?
            }
            None => Self {
                event_loop: LoopConfig::busy_poll(),
                server: ServerConfig::default(),
            },
        };

        if let Some(ms) = cycle_delay_ms {
            let policy = settings.event_loop.on_task_error;
            settings.event_loop =
                LoopConfig::with_cycle_delay(Duration::from_millis(ms)).failure_policy(policy);
        }
        Ok(settings)
    }

    pub fn from_toml_str(source: &str) -> anyhow::Result<Self> {
        Ok(Self {
            event_loop: LoopConfig::from_toml_str(source)?,
            server: ServerConfig::from_toml_str(source)?,
        })
    }
}
