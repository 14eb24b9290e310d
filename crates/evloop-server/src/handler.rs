// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Connection handlers for [`TcpServer`](crate::TcpServer).

use std::collections::BTreeMap;
use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;

use tracing::{debug, error};

use crate::error::ServerError;
use crate::pool::PoolHandle;

/// Body of every successful HTTP response.
pub const TEST_HTTP_RESPONSE: &[u8] = b"HTTP/1.1 200 OK\n\ntest\n";

pub const BAD_REQUEST_RESPONSE: &[u8] = b"HTTP/1.1 400 Bad Request\n";

const READ_CHUNK: usize = 1024;

/// Serves one accepted connection.
///
/// The handler owns the stream and must close it before returning.
pub trait RequestHandler: Send + Sync + 'static {
    fn handle(&self, stream: TcpStream, addr: SocketAddr) -> Result<(), ServerError>;
}

impl<H: RequestHandler> RequestHandler for Arc<H> {
    fn handle(&self, stream: TcpStream, addr: SocketAddr) -> Result<(), ServerError> {
        (**self).handle(stream, addr)
    }
}

/// Half-close the write side so the peer sees EOF, then drop the socket.
pub fn close_socket(stream: TcpStream) {
    let _ = stream.shutdown(Shutdown::Write);
}

/// Replies with a debug rendering of whatever the peer sent first.
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoHandler;

impl RequestHandler for EchoHandler {
    fn handle(&self, mut stream: TcpStream, addr: SocketAddr) -> Result<(), ServerError> {
        let mut buf = [0u8; READ_CHUNK];
        let result = stream.read(&mut buf).and_then(|n| {
            let body = String::from_utf8_lossy(&buf[..n]);
            debug!(peer = %addr, bytes = n, "echo");
            stream.write_all(format!("{{body: {:?}}}", body).as_bytes())
        });
        close_socket(stream);
        Ok(result?)
    }
}

/// A parsed HTTP request head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub method: String,
    pub path: String,
    pub version: String,
    pub headers: BTreeMap<String, String>,
}

/// Read a request head: lines up to the first blank line or EOF.
///
/// Returns `Ok(None)` when the head is empty or malformed: a request line
/// that is not exactly three words, or a header line without a colon.
pub fn parse_request<R: BufRead>(mut reader: R) -> io::Result<Option<Request>> {
    let mut lines = Vec::new();
    loop {
        let mut raw = Vec::new();
        if reader.read_until(b'\n', &mut raw)? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&raw);
        let line = line.trim_end_matches(['\r', '\n']);
        if line.is_empty() {
            break;
        }
        lines.push(line.to_string());
    }

    let Some((first, rest)) = lines.split_first() else {
        return Ok(None);
    };
    let mut words = first.split_whitespace();
    let (Some(method), Some(path), Some(version), None) =
        (words.next(), words.next(), words.next(), words.next())
    else {
        return Ok(None);
    };

    let mut headers = BTreeMap::new();
    for line in rest {
        let Some((name, value)) = line.split_once(':') else {
            return Ok(None);
        };
        headers.insert(name.trim().to_string(), value.trim().to_string());
    }

    Ok(Some(Request {
        method: method.to_string(),
        path: path.to_string(),
        version: version.to_string(),
        headers,
    }))
}

/// Minimal HTTP/1.1 responder.
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpHandler;

impl HttpHandler {
    pub fn response_for(request: Option<&Request>) -> &'static [u8] {
        match request {
            Some(_) => TEST_HTTP_RESPONSE,
            None => BAD_REQUEST_RESPONSE,
        }
    }

    /// Parse `raw` as a request head and pick the reply.
    pub fn respond(raw: &[u8]) -> &'static [u8] {
        // Reading from a byte slice cannot fail.
        let request = parse_request(raw).ok().flatten();
        Self::response_for(request.as_ref())
    }
}

impl RequestHandler for HttpHandler {
    fn handle(&self, mut stream: TcpStream, addr: SocketAddr) -> Result<(), ServerError> {
        let result = parse_request(BufReader::new(&stream)).and_then(|request| {
            match &request {
                Some(r) => debug!(peer = %addr, method = %r.method, path = %r.path, "request"),
                None => debug!(peer = %addr, "malformed request"),
            }
            stream.write_all(Self::response_for(request.as_ref()))
        });
        close_socket(stream);
        Ok(result?)
    }
}

/// Runs the wrapped handler on a worker pool instead of the accept thread.
#[derive(Clone)]
pub struct PooledHandler<H> {
    inner: Arc<H>,
    pool: PoolHandle,
}

impl<H: RequestHandler> PooledHandler<H> {
    pub fn new(inner: H, pool: PoolHandle) -> Self {
        Self {
            inner: Arc::new(inner),
            pool,
        }
    }
}

impl<H: RequestHandler> RequestHandler for PooledHandler<H> {
    fn handle(&self, stream: TcpStream, addr: SocketAddr) -> Result<(), ServerError> {
        let inner = self.inner.clone();
        self.pool.submit(move || {
            if let Err(e) = inner.handle(stream, addr) {
                error!(peer = %addr, error = %e, "handler failed");
            }
        })
    }
}

impl<H> std::fmt::Debug for PooledHandler<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PooledHandler")
            .field("handler", &std::any::type_name::<H>())
            .finish()
    }
}
