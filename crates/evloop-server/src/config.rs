// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! `[server]` table of the evloop config file.

use std::time::Duration;

use serde::Deserialize;

use crate::error::ServerError;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_addr")]
    pub addr: String,
    /// Worker threads. 0 means one per available core.
    #[serde(default)]
    pub workers: usize,
    /// Upper bound on one selector wait, so `stop()` is noticed.
    #[serde(default = "default_poll_timeout_ms")]
    pub poll_timeout_ms: u64,
    /// Close accepted connections that stay silent this long. 0 disables.
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
}

fn default_addr() -> String {
    "0.0.0.0:8000".into()
}

fn default_poll_timeout_ms() -> u64 {
    500
}

fn default_idle_timeout_ms() -> u64 {
    30_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            workers: 0,
            poll_timeout_ms: default_poll_timeout_ms(),
            idle_timeout_ms: default_idle_timeout_ms(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    server: ServerConfig,
}

impl ServerConfig {
    pub fn from_toml_str(source: &str) -> Result<Self, ServerError> {
        let file: ConfigFile = toml::from_str(source)?;
        Ok(file.server)
    }

    pub fn poll_timeout(&self) -> Duration {
        Duration::from_millis(self.poll_timeout_ms)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        (self.idle_timeout_ms > 0).then(|| Duration::from_millis(self.idle_timeout_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_keys() {
        let cfg = ServerConfig::from_toml_str("[server]\nworkers = 3\n").unwrap();
        assert_eq!(cfg.workers, 3);
        assert_eq!(cfg.addr, "0.0.0.0:8000");
        assert_eq!(cfg.poll_timeout(), Duration::from_millis(500));
        assert_eq!(cfg.idle_timeout(), Some(Duration::from_secs(30)));
    }

    #[test]
    fn missing_table_is_default() {
        let cfg = ServerConfig::from_toml_str("[event_loop]\ncycle_delay_ms = 1\n").unwrap();
        assert_eq!(cfg, ServerConfig::default());
    }

    #[test]
    fn zero_idle_timeout_disables_cutoff() {
        let cfg = ServerConfig::from_toml_str("[server]\nidle_timeout_ms = 0\n").unwrap();
        assert_eq!(cfg.idle_timeout(), None);
    }
}
