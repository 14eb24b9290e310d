// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Cooperative sleep.
//!
//! Yields a bare tick on every dispatch until the deadline has passed,
//! so other tasks run in between. Accuracy depends on queue depth and
//! the loop's cycle delay.

use std::marker::PhantomData;
use std::time::{Duration, Instant};

use crate::coroutine::{Coroutine, Outcome, Pending};
use crate::error::TaskError;

/// Sleep coroutine. Delegate to it with [`Outcome::AwaitChild`].
///
/// The clock starts on the first dispatch, not at construction, and the
/// first dispatch always yields: even `sleep(0)` needs a second cycle.
pub struct Sleep<V> {
    duration: Duration,
    started: bool,
    /// `None` after start means the deadline is past `Instant`'s range.
    deadline: Option<Instant>,
    complete: bool,
    _value: PhantomData<fn() -> V>,
}

impl<V> Sleep<V> {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            started: false,
            deadline: None,
            complete: false,
            _value: PhantomData,
        }
    }

    pub fn duration(&self) -> Duration {
        self.duration
    }
}

/// Shorthand for `Sleep::new(duration)`.
pub fn sleep<V>(duration: Duration) -> Sleep<V> {
    Sleep::new(duration)
}

impl<V> Coroutine<V> for Sleep<V> {
    fn resume(&mut self, _input: Pending<V>) -> Result<Outcome<V>, TaskError> {
        if self.complete {
            return Err(TaskError::Exhausted);
        }
        if !self.started {
            self.started = true;
            self.deadline = Instant::now().checked_add(self.duration);
            return Ok(Outcome::tick());
        }
        match self.deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.complete = true;
                Ok(Outcome::Done(None))
            }
            _ => Ok(Outcome::tick()),
        }
    }

    fn is_complete(&self) -> bool {
        self.complete
    }

    fn name(&self) -> &str {
        "sleep"
    }
}
