// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Runs the `evloop` binary.

use std::process::Command;

fn evloop() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_evloop"));
    cmd.env("NO_COLOR", "1").env_remove("RUST_LOG");
    cmd
}

#[test]
fn help_lists_subcommands() {
    let out = evloop().arg("--help").output().unwrap();
    assert!(out.status.success());
    let text = String::from_utf8_lossy(&out.stdout);
    for sub in ["demo", "serve", "reactor"] {
        assert!(text.contains(sub), "missing {} in:\n{}", sub, text);
    }
}

#[test]
fn unreadable_config_exits_nonzero() {
    let out = evloop()
        .args(["--config", "/nonexistent/evloop.toml", "serve"])
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    let err = String::from_utf8_lossy(&out.stderr);
    assert!(err.contains("error: reading config /nonexistent/evloop.toml"), "{}", err);
}

#[test]
fn malformed_config_reports_parse_error() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[event_loop]\ncycle_delay_ms = \"soon\"\n").unwrap();

    let out = evloop()
        .arg("--config")
        .arg(&path)
        .arg("serve")
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&out.stderr).contains("parsing config"));
}
