// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! TCP servers built on the evloop readiness multiplexer.
//!
//! Two shapes: [`TcpServer`] is a reactor that hands readable
//! connections to a [`RequestHandler`], optionally on a [`WorkerPool`];
//! [`HttpAcceptor`] is a coroutine that runs on an
//! [`EventLoop`](evloop_rt::EventLoop) next to other tasks.

pub mod acceptor;
pub mod config;
pub mod error;
pub mod handler;
pub mod pool;
pub mod server;

pub use acceptor::HttpAcceptor;
pub use config::ServerConfig;
pub use error::ServerError;
pub use handler::{
    close_socket, parse_request, EchoHandler, HttpHandler, PooledHandler, Request,
    RequestHandler, BAD_REQUEST_RESPONSE, TEST_HTTP_RESPONSE,
};
pub use pool::{PoolHandle, WorkerPool};
pub use server::{ServerHandle, TcpServer};
