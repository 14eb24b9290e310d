// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Pollable resources.
//!
//! Anything with a file descriptor can be waited on. Identity is the fd:
//! two handles with the same fd are the same resource to the selector.

use std::os::unix::io::{AsRawFd, RawFd};
use std::rc::Rc;

/// Capability to be watched for readiness.
pub trait Pollable {
    /// Stable identity used as the wait-set key.
    fn token(&self) -> RawFd;
}

impl<T: AsRawFd + ?Sized> Pollable for T {
    fn token(&self) -> RawFd {
        self.as_raw_fd()
    }
}

/// Shared handle to a pollable resource. The task keeps its own clone
/// and gets this one back when the resource is ready.
pub type Resource = Rc<dyn Pollable>;

/// I/O interest for selector registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Interest {
    #[default]
    Readable,
    Writable,
    ReadWrite,
}

impl Interest {
    pub(crate) fn to_epoll_events(self) -> u32 {
        match self {
            Interest::Readable => libc::EPOLLIN as u32,
            Interest::Writable => libc::EPOLLOUT as u32,
            Interest::ReadWrite => (libc::EPOLLIN | libc::EPOLLOUT) as u32,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn token_is_raw_fd() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let fd = listener.as_raw_fd();
        let resource: Resource = Rc::new(listener);
        assert_eq!(resource.token(), fd);
    }

    #[test]
    fn readable_is_default() {
        assert_eq!(Interest::default(), Interest::Readable);
        assert_eq!(Interest::Readable.to_epoll_events(), libc::EPOLLIN as u32);
    }
}
