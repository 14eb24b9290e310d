// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Reactor-style TCP server.
//!
//! One thread multiplexes the listener and every idle connection over a
//! [`Selector`]. A connection that turns readable is taken out of the
//! selector and handed to the [`RequestHandler`], which owns it from then
//! on. Wrap the handler in a [`PooledHandler`](crate::PooledHandler) to keep
//! slow requests off the accept thread.

use std::collections::HashMap;
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use evloop_rt::{Interest, Selector};
use tracing::{debug, error, info, warn};

use crate::error::ServerError;
use crate::handler::RequestHandler;

/// Shared flag that ends [`TcpServer::serve`] after its current poll.
#[derive(Debug, Clone, Default)]
pub struct ServerHandle {
    shutdown: Arc<AtomicBool>,
}

impl ServerHandle {
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Release);
    }

    pub fn is_stopped(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }
}

pub struct TcpServer<H> {
    listener: TcpListener,
    addr: SocketAddr,
    selector: Selector,
    handler: H,
    /// Accepted connections waiting for their first readable event.
    connections: HashMap<RawFd, Parked>,
    idle_timeout: Option<Duration>,
    handle: ServerHandle,
}

struct Parked {
    stream: TcpStream,
    peer: SocketAddr,
    since: Instant,
}

impl<H: RequestHandler> TcpServer<H> {
    /// Bind a non-blocking listener. Port 0 picks a free port; see
    /// [`local_addr`](Self::local_addr).
    pub fn bind<A: ToSocketAddrs>(addr: A, handler: H) -> Result<Self, ServerError> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        let addr = listener.local_addr()?;
        Ok(Self {
            listener,
            addr,
            selector: Selector::new()?,
            handler,
            connections: HashMap::new(),
            idle_timeout: None,
            handle: ServerHandle::default(),
        })
    }

    /// Close connections that send nothing for `timeout` after accept.
    /// Without one they wait until the server stops.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn handle(&self) -> ServerHandle {
        self.handle.clone()
    }

    pub fn stop(&self) {
        self.handle.stop();
    }

    /// Accept and dispatch until stopped. Each selector wait is capped at
    /// `poll_timeout` so a stop request is seen promptly.
    pub fn serve(&mut self, poll_timeout: Duration) -> Result<(), ServerError> {
        let listener_fd = self.listener.as_raw_fd();
        self.selector.register(listener_fd, Interest::Readable)?;
        info!(addr = %self.addr, "server listening");

        while !self.handle.is_stopped() {
            for fd in self.selector.poll(Some(poll_timeout))? {
                if fd == listener_fd {
                    self.accept()?;
                    self.selector.register(listener_fd, Interest::Readable)?;
                } else if let Some(conn) = self.connections.remove(&fd) {
                    self.dispatch(conn.stream, conn.peer);
                }
            }
            self.close_idle()?;
        }

        self.selector.unregister(listener_fd)?;
        info!(addr = %self.addr, pending = self.connections.len(), "server stopped");
        Ok(())
    }

    /// Number of accepted connections not yet handed to the handler.
    pub fn pending_connections(&self) -> usize {
        self.connections.len()
    }

    fn accept(&mut self) -> Result<(), ServerError> {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    // Handlers use plain blocking reads once the socket is readable.
                    stream.set_nonblocking(false)?;
                    let fd = stream.as_raw_fd();
                    self.selector.register(fd, Interest::Readable)?;
                    debug!(peer = %peer, fd, "accepted");
                    self.connections.insert(
                        fd,
                        Parked {
                            stream,
                            peer,
                            since: Instant::now(),
                        },
                    );
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    // Out of fds and the like: drop this round, keep serving.
                    warn!(error = %e, "accept failed");
                    return Ok(());
                }
            }
        }
    }

    fn close_idle(&mut self) -> Result<(), ServerError> {
        let Some(timeout) = self.idle_timeout else {
            return Ok(());
        };
        let idle: Vec<RawFd> = self
            .connections
            .iter()
            .filter(|(_, conn)| conn.since.elapsed() >= timeout)
            .map(|(&fd, _)| fd)
            .collect();
        for fd in idle {
            self.selector.unregister(fd)?;
            if let Some(conn) = self.connections.remove(&fd) {
                debug!(peer = %conn.peer, "closing idle connection");
            }
        }
        Ok(())
    }

    fn dispatch(&self, stream: TcpStream, peer: SocketAddr) {
        if let Err(e) = self.handler.handle(stream, peer) {
            error!(peer = %peer, error = %e, "handler failed");
        }
    }
}

impl<H> std::fmt::Debug for TcpServer<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpServer")
            .field("addr", &self.addr)
            .field("connections", &self.connections.len())
            .field("stopped", &self.handle.is_stopped())
            .finish()
    }
}
