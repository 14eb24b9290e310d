// SPDX-License-Identifier: (MIT OR Apache-2.0)
use std::net::TcpListener;

use anyhow::Context;
use evloop_rt::{EventLoop, LoopConfig};
use evloop_server::HttpAcceptor;

use crate::output;

pub fn cmd_serve(config: LoopConfig, addr: &str) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).with_context(|| format!("binding {}", addr))?;
    let acceptor = HttpAcceptor::new(listener)?;
    println!("{}", output::banner("coroutine server", &acceptor.local_addr()?.to_string()));

    let mut ev: EventLoop<()> = EventLoop::new(config).context("creating event loop")?;
    ev.add_task(acceptor)?;
    ev.run_forever()?;
    Ok(())
}
