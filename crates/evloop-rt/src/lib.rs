// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Cooperative single-threaded event loop.
//!
//! Many tasks share one thread by suspending at explicit points. A
//! task is a [`Coroutine`]: each resumption runs to the next suspension
//! point and reports an [`Outcome`]: a plain value, a resource to wait
//! on, a child to delegate to, or completion. [`EventLoop`] keeps a FIFO
//! ready queue, resumes one record per step, and threads child results
//! back to parents through a per-chain continuation stack.
//!
//! Components:
//! - `coroutine`: suspend/resume contract, closure adapter
//! - `resource`: pollable capability (anything with an fd)
//! - `selector`: epoll readiness multiplexer
//! - `task`: task records, continuation stacks
//! - `scheduler`: the dispatch loop
//! - `sleep`: cooperative timed delay
//! - `config`: loop tuning (cycle delay, failure policy)

pub mod config;
pub mod coroutine;
pub mod error;
pub mod resource;
pub mod scheduler;
pub mod selector;
pub mod sleep;
pub mod task;

pub use config::{FailurePolicy, LoopConfig};
pub use coroutine::{from_fn, BoxCoroutine, Coroutine, FnCoroutine, Outcome, Pending};
pub use error::{LoopError, TaskError};
pub use resource::{Interest, Pollable, Resource};
pub use scheduler::{EventLoop, LoopStats, StopHandle};
pub use selector::Selector;
pub use sleep::{sleep, Sleep};
pub use task::{ContinuationStack, TaskId};
