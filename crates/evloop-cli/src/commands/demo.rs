// SPDX-License-Identifier: (MIT OR Apache-2.0)
use std::io;
use std::time::Duration;

use anyhow::Context;
use evloop_rt::{EventLoop, LoopConfig};
use tracing::info;

use crate::tasks::{Interval, ReadInput};

pub fn cmd_demo(config: LoopConfig, intervals: &[u64]) -> anyhow::Result<()> {
    let mut ev: EventLoop<u64> = EventLoop::new(config).context("creating event loop")?;
    ev.add_task(ReadInput::new(io::stdin(), io::stdout()))?;
    for &secs in intervals {
        ev.add_task(Interval::new(Duration::from_secs(secs), io::stdout()))?;
    }
    info!(intervals = ?intervals, "type a number and press enter");
    ev.run_forever()?;
    Ok(())
}
