// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Readiness multiplexer backed by epoll (Linux).
//!
//! Owned by a single event loop, so no locking. Level-triggered. A
//! resource leaves the wait set as soon as it is reported ready; the
//! scheduler keeps reports that belong to other parked tasks in a
//! backlog until those tasks are re-checked.

use std::collections::{HashMap, HashSet};
use std::io;
use std::os::unix::io::RawFd;
use std::time::Duration;

use tracing::{debug, trace};

use crate::resource::Interest;

/// Max events drained per `epoll_wait`. The rest stay pending
/// (level-triggered) and show up on the next poll.
const MAX_EVENTS: usize = 64;

pub struct Selector {
    epoll_fd: RawFd,
    /// fd → interest, for resources still waiting.
    waiting: HashMap<RawFd, Interest>,
    /// Reported ready by a poll but not yet claimed via `take_ready`.
    ready: HashSet<RawFd>,
}

impl Selector {
    pub fn new() -> io::Result<Self> {
        let epoll_fd = unsafe { libc::epoll_create1(libc::EPOLL_CLOEXEC) };
        if epoll_fd < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self {
            epoll_fd,
            waiting: HashMap::new(),
            ready: HashSet::new(),
        })
    }

    /// Register interest in `fd`.
    ///
    /// Idempotent: an fd that is already waiting, or already reported
    /// ready and unclaimed, is left as is and `Ok(false)` is returned.
    /// A repeat registration still re-arms the kernel side, so an fd that
    /// was closed and reused under the same number is picked up again.
    pub fn register(&mut self, fd: RawFd, interest: Interest) -> io::Result<bool> {
        if self.ready.contains(&fd) {
            return Ok(false);
        }

        if let Some(existing) = self.waiting.get(&fd).copied() {
            match self.ctl(libc::EPOLL_CTL_MOD, fd, existing) {
                Ok(()) => {}
                Err(e) if e.raw_os_error() == Some(libc::ENOENT) => {
                    // Kernel dropped it (fd closed); re-add under the same key.
                    self.ctl(libc::EPOLL_CTL_ADD, fd, existing)?;
                }
                Err(e) => return Err(e),
            }
            return Ok(false);
        }

        match self.ctl(libc::EPOLL_CTL_ADD, fd, interest) {
            Ok(()) => {}
            Err(e) if e.raw_os_error() == Some(libc::EEXIST) => {
                self.ctl(libc::EPOLL_CTL_MOD, fd, interest)?;
            }
            Err(e) => return Err(e),
        }
        self.waiting.insert(fd, interest);
        debug!(fd, ?interest, "registered");
        Ok(true)
    }

    /// Forget `fd`, whether waiting or ready-but-unclaimed.
    pub fn unregister(&mut self, fd: RawFd) -> io::Result<()> {
        self.ready.remove(&fd);
        if self.waiting.remove(&fd).is_some() {
            self.del(fd)?;
        }
        Ok(())
    }

    /// Wait up to `timeout` (`None` blocks) and return the fds that became
    /// ready. Reported fds are removed from the wait set.
    pub fn poll(&mut self, timeout: Option<Duration>) -> io::Result<Vec<RawFd>> {
        let mut events: [libc::epoll_event; MAX_EVENTS] =
            [libc::epoll_event { events: 0, u64: 0 }; MAX_EVENTS];

        let n = unsafe {
            libc::epoll_wait(
                self.epoll_fd,
                events.as_mut_ptr(),
                MAX_EVENTS as i32,
                timeout_ms(timeout),
            )
        };

        if n < 0 {
            let err = io::Error::last_os_error();
            if err.kind() == io::ErrorKind::Interrupted {
                return Ok(Vec::new());
            }
            return Err(err);
        }

        let mut reported = Vec::with_capacity(n as usize);
        for event in events.iter().take(n as usize) {
            let fd = event.u64 as RawFd;
            if self.waiting.remove(&fd).is_some() {
                self.del(fd)?;
                reported.push(fd);
            }
        }
        if !reported.is_empty() {
            trace!(?reported, "poll");
        }
        Ok(reported)
    }

    /// Claim readiness of `fd` without blocking.
    ///
    /// Checks the backlog first, then does a zero-timeout poll. Other fds
    /// reported by that poll go to the backlog for their own tasks.
    pub fn take_ready(&mut self, fd: RawFd) -> io::Result<bool> {
        if self.ready.remove(&fd) {
            return Ok(true);
        }
        let reported = self.poll(Some(Duration::ZERO))?;
        self.ready.extend(reported);
        Ok(self.ready.remove(&fd))
    }

    /// True while `fd` is waiting or ready-but-unclaimed.
    pub fn is_registered(&self, fd: RawFd) -> bool {
        self.waiting.contains_key(&fd) || self.ready.contains(&fd)
    }

    /// Number of fds still waiting for readiness.
    pub fn waiting(&self) -> usize {
        self.waiting.len()
    }

    fn ctl(&self, op: libc::c_int, fd: RawFd, interest: Interest) -> io::Result<()> {
        let mut ev = libc::epoll_event {
            events: interest.to_epoll_events(),
            u64: fd as u64,
        };
        let ret = unsafe { libc::epoll_ctl(self.epoll_fd, op, fd, &mut ev) };
        if ret < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }

    fn del(&self, fd: RawFd) -> io::Result<()> {
        let ret = unsafe {
            libc::epoll_ctl(self.epoll_fd, libc::EPOLL_CTL_DEL, fd, std::ptr::null_mut())
        };
        if ret < 0 {
            let err = io::Error::last_os_error();
            // ENOENT / EBADF: fd already closed, kernel already forgot it.
            if err.raw_os_error() != Some(libc::ENOENT) && err.raw_os_error() != Some(libc::EBADF)
            {
                return Err(err);
            }
        }
        Ok(())
    }
}

impl std::fmt::Debug for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Selector")
            .field("epoll_fd", &self.epoll_fd)
            .field("waiting", &self.waiting.len())
            .field("ready", &self.ready.len())
            .finish()
    }
}

impl Drop for Selector {
    fn drop(&mut self) {
        for &fd in self.waiting.keys() {
            unsafe {
                libc::epoll_ctl(self.epoll_fd, libc::EPOLL_CTL_DEL, fd, std::ptr::null_mut());
            }
        }
        unsafe {
            libc::close(self.epoll_fd);
        }
    }
}

fn timeout_ms(timeout: Option<Duration>) -> i32 {
    match timeout {
        None => -1,
        Some(d) => {
            let mut ms = d.as_millis();
            // Round sub-millisecond waits up so they don't become busy polls.
            if d.subsec_nanos() % 1_000_000 != 0 {
                ms += 1;
            }
            ms.min(i32::MAX as u128) as i32
        }
    }
}
