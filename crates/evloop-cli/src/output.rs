// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Terminal output helpers.
//!
//! Respects NO_COLOR and FORCE_COLOR.

use colored::{ColoredString, Colorize};

pub fn init() {
    if std::env::var("NO_COLOR").is_ok() {
        colored::control::set_override(false);
    } else if std::env::var("FORCE_COLOR").is_ok() {
        colored::control::set_override(true);
    }
}

pub fn error_label() -> ColoredString {
    "error".red().bold()
}

pub fn banner(what: &str, addr: &str) -> String {
    format!("{} {} on {}", "evloop".green().bold(), what, addr.cyan())
}

/// Seconds since the epoch with millisecond precision, for task output.
pub fn timestamp() -> String {
    let now = chrono::Utc::now();
    format!("{}.{:03}", now.timestamp(), now.timestamp_subsec_millis())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_has_millis() {
        let ts = timestamp();
        let (secs, millis) = ts.split_once('.').unwrap();
        assert!(secs.parse::<i64>().unwrap() > 0);
        assert_eq!(millis.len(), 3);
    }
}
