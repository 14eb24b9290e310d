// SPDX-License-Identifier: (MIT OR Apache-2.0)
use anyhow::Context;
use evloop_server::{HttpHandler, PooledHandler, ServerConfig, TcpServer, WorkerPool};

use crate::output;

pub fn cmd_reactor(config: &ServerConfig) -> anyhow::Result<()> {
    let mut pool = WorkerPool::new(config.workers).context("starting worker pool")?;
    let handler = PooledHandler::new(HttpHandler, pool.handle());
    let mut server = TcpServer::bind(config.addr.as_str(), handler)
        .with_context(|| format!("binding {}", config.addr))?;
    if let Some(timeout) = config.idle_timeout() {
        server = server.with_idle_timeout(timeout);
    }
    println!(
        "{} ({} workers)",
        output::banner("reactor server", &server.local_addr().to_string()),
        pool.size()
    );

    let result = server.serve(config.poll_timeout());
    pool.stop();
    result?;
    Ok(())
}
