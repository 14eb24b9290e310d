// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! HTTP server as a single coroutine on the event loop.
//!
//! Serves one connection at a time: wait for the listener, accept, wait
//! for the connection, read the request head, reply, close, repeat.

use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::rc::Rc;

use evloop_rt::{Coroutine, Outcome, Pending, TaskError};
use tracing::{debug, warn};

use crate::handler::HttpHandler;

const READ_CHUNK: usize = 1024;

/// A head that has not ended by this size is answered as it stands.
const MAX_HEAD: usize = 8 * 1024;

enum State {
    Listening,
    Reading(Connection),
    Finished,
}

struct Connection {
    stream: Rc<TcpStream>,
    peer: SocketAddr,
    head: Vec<u8>,
}

/// True once `head` holds the blank line that ends a request head.
fn head_complete(head: &[u8]) -> bool {
    head.windows(4).any(|w| w == b"\r\n\r\n") || head.windows(2).any(|w| w == b"\n\n")
}

pub struct HttpAcceptor {
    listener: Rc<TcpListener>,
    state: State,
    served: usize,
    limit: Option<usize>,
}

impl HttpAcceptor {
    /// Take over `listener` and switch it to non-blocking mode.
    pub fn new(listener: TcpListener) -> io::Result<Self> {
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener: Rc::new(listener),
            state: State::Listening,
            served: 0,
            limit: None,
        })
    }

    /// Complete after `n` connections instead of serving forever.
    pub fn with_limit(mut self, n: usize) -> Self {
        self.limit = Some(n);
        self
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn served(&self) -> usize {
        self.served
    }

    fn accept<V>(&mut self) -> Result<Outcome<V>, TaskError> {
        match self.listener.accept() {
            Ok((stream, peer)) => {
                stream.set_nonblocking(true)?;
                debug!(peer = %peer, "accepted");
                let stream = Rc::new(stream);
                self.state = State::Reading(Connection {
                    stream: stream.clone(),
                    peer,
                    head: Vec::new(),
                });
                Ok(Outcome::await_resource(stream))
            }
            // Another waiter drained the backlog first.
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                Ok(Outcome::await_resource(self.listener.clone()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Read what is available. Waits on the connection again until the
    /// head is complete, the peer stops sending, or the head is too long.
    fn read_head<V>(&mut self, mut conn: Connection) -> Result<Outcome<V>, TaskError> {
        let mut buf = [0u8; READ_CHUNK];
        loop {
            match (&*conn.stream).read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    conn.head.extend_from_slice(&buf[..n]);
                    if head_complete(&conn.head) || conn.head.len() >= MAX_HEAD {
                        break;
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    let stream = conn.stream.clone();
                    self.state = State::Reading(conn);
                    return Ok(Outcome::await_resource(stream));
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    warn!(peer = %conn.peer, error = %e, "read failed");
                    return self.finish(conn, None);
                }
            }
        }
        let reply = HttpHandler::respond(&conn.head);
        self.finish(conn, Some(reply))
    }

    fn finish<V>(&mut self, conn: Connection, reply: Option<&[u8]>) -> Result<Outcome<V>, TaskError> {
        if let Some(reply) = reply {
            if let Err(e) = (&*conn.stream).write_all(reply) {
                warn!(peer = %conn.peer, error = %e, "write failed");
            }
        }
        let _ = conn.stream.shutdown(Shutdown::Write);
        drop(conn);

        self.served += 1;
        if self.limit.is_some_and(|limit| self.served >= limit) {
            self.state = State::Finished;
            return Ok(Outcome::Done(None));
        }
        self.state = State::Listening;
        Ok(Outcome::await_resource(self.listener.clone()))
    }
}

impl<V> Coroutine<V> for HttpAcceptor {
    fn resume(&mut self, input: Pending<V>) -> Result<Outcome<V>, TaskError> {
        match std::mem::replace(&mut self.state, State::Listening) {
            State::Listening if input.resource().is_none() => {
                Ok(Outcome::await_resource(self.listener.clone()))
            }
            State::Listening => self.accept(),
            State::Reading(conn) => self.read_head(conn),
            State::Finished => {
                self.state = State::Finished;
                Err(TaskError::Exhausted)
            }
        }
    }

    fn is_complete(&self) -> bool {
        matches!(self.state, State::Finished)
    }

    fn name(&self) -> &str {
        "http-acceptor"
    }
}

impl std::fmt::Debug for HttpAcceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpAcceptor")
            .field("addr", &self.listener.local_addr().ok())
            .field("served", &self.served)
            .finish()
    }
}
