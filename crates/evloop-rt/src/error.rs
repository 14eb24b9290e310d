// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Error types for tasks and the event loop.

use std::io;

use crate::task::TaskId;

/// Why a suspendable function aborted a resumption.
///
/// Returned from [`Coroutine::resume`](crate::Coroutine::resume). The
/// scheduler never retries; the error ends the task chain.
#[derive(Debug, thiserror::Error)]
pub enum TaskError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    #[error("{0}")]
    Failed(String),

    #[error("resumed after completion")]
    Exhausted,
}

impl TaskError {
    pub fn failed(msg: impl Into<String>) -> Self {
        TaskError::Failed(msg.into())
    }
}

/// Errors surfaced by [`EventLoop`](crate::EventLoop).
#[derive(Debug, thiserror::Error)]
pub enum LoopError {
    /// `add_task` was handed something that cannot be resumed.
    #[error("invalid task: {0}")]
    InvalidTask(String),

    /// A task aborted during a dispatch step (fail-fast policy).
    #[error("task {task} aborted: {source}")]
    TaskAborted {
        task: TaskId,
        #[source]
        source: TaskError,
    },

    /// The readiness multiplexer failed.
    #[error("selector error: {0}")]
    Io(#[from] io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("config parse error: {0}")]
    ConfigParse(#[from] toml::de::Error),
}
