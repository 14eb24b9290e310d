// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Event loop configuration.
//!
//! The inter-cycle delay trades latency for CPU: with no delay the loop
//! busy-polls. There is deliberately no `Default`; callers pick one.
//!
//! ```toml
//! [event_loop]
//! cycle_delay_ms = 2
//! on_task_error = "isolate"
//! ```

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;

use crate::error::LoopError;

/// What a task error does to the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Stop the loop and return the error from `run_forever`.
    #[default]
    Abort,
    /// Drop the failing chain, log it, keep going.
    Isolate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct LoopConfig {
    /// Sleep after every cycle, in milliseconds. `None` busy-polls.
    #[serde(default)]
    pub cycle_delay_ms: Option<u64>,
    #[serde(default)]
    pub on_task_error: FailurePolicy,
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    event_loop: Option<LoopConfig>,
}

impl LoopConfig {
    /// No delay between cycles.
    pub fn busy_poll() -> Self {
        Self {
            cycle_delay_ms: None,
            on_task_error: FailurePolicy::Abort,
        }
    }

    /// Sleep `delay` after every cycle. Sub-millisecond delays round up
    /// to 1ms; delays past `u64::MAX` ms saturate.
    pub fn with_cycle_delay(delay: Duration) -> Self {
        let ms = delay.as_nanos().div_ceil(1_000_000);
        Self {
            cycle_delay_ms: Some(u64::try_from(ms).unwrap_or(u64::MAX)),
            on_task_error: FailurePolicy::Abort,
        }
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.on_task_error = policy;
        self
    }

    pub fn cycle_delay(&self) -> Option<Duration> {
        self.cycle_delay_ms.map(Duration::from_millis)
    }

    /// Parse the `[event_loop]` table of a TOML document. A document
    /// without the table yields a busy-polling config.
    pub fn from_toml_str(source: &str) -> Result<Self, LoopError> {
        let file: ConfigFile = toml::from_str(source)?;
        Ok(file.event_loop.unwrap_or_else(Self::busy_poll))
    }

    pub fn load(path: &Path) -> Result<Self, LoopError> {
        let source = fs::read_to_string(path)
            .map_err(|e| LoopError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_toml_str(&source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn parses_event_loop_table() {
        let cfg = LoopConfig::from_toml_str(
            r#"
            [event_loop]
            cycle_delay_ms = 5
            on_task_error = "isolate"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.cycle_delay(), Some(Duration::from_millis(5)));
        assert_eq!(cfg.on_task_error, FailurePolicy::Isolate);
    }

    #[test]
    fn missing_table_busy_polls() {
        let cfg = LoopConfig::from_toml_str("[server]\nworkers = 4\n").unwrap();
        assert_eq!(cfg, LoopConfig::busy_poll());
        assert_eq!(cfg.cycle_delay(), None);
    }

    #[test]
    fn bad_policy_is_a_parse_error() {
        let err = LoopConfig::from_toml_str("[event_loop]\non_task_error = \"retry\"\n").unwrap_err();
        assert!(matches!(err, LoopError::ConfigParse(_)));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[event_loop]\ncycle_delay_ms = 1").unwrap();
        let cfg = LoopConfig::load(file.path()).unwrap();
        assert_eq!(cfg, LoopConfig::with_cycle_delay(Duration::from_millis(1)));
    }

    #[test]
    fn sub_millisecond_delay_rounds_up() {
        let cfg = LoopConfig::with_cycle_delay(Duration::from_micros(200));
        assert_eq!(cfg.cycle_delay(), Some(Duration::from_millis(1)));
        let cfg = LoopConfig::with_cycle_delay(Duration::from_micros(1500));
        assert_eq!(cfg.cycle_delay(), Some(Duration::from_millis(2)));
        let cfg = LoopConfig::with_cycle_delay(Duration::ZERO);
        assert_eq!(cfg.cycle_delay(), Some(Duration::ZERO));
        let cfg = LoopConfig::with_cycle_delay(Duration::MAX);
        assert_eq!(cfg.cycle_delay_ms, Some(u64::MAX));
    }

    #[test]
    fn load_missing_file_is_config_error() {
        let err = LoopConfig::load(Path::new("/nonexistent/evloop.toml")).unwrap_err();
        assert!(matches!(err, LoopError::Config(_)));
    }
}
