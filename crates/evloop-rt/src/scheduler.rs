// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Cooperative single-threaded scheduler.
//!
//! A FIFO ready queue of task records and a loop that pops one record,
//! resumes it at most once, and re-queues according to the outcome.
//! Tasks parked on a resource stay in the queue and are re-checked with
//! a zero-timeout poll when their turn comes, so a parked task never
//! holds up a ready one.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

use tracing::{debug, info, trace, warn};

use crate::config::{FailurePolicy, LoopConfig};
use crate::coroutine::{BoxCoroutine, Coroutine, Outcome, Pending};
use crate::error::{LoopError, TaskError};
use crate::resource::Interest;
use crate::selector::Selector;
use crate::task::{ContinuationStack, TaskId, TaskRecord};

/// Counters since the loop was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Records popped from the ready queue.
    pub steps: u64,
    /// Coroutine resumptions.
    pub resumed: u64,
    /// Steps that re-queued a task without resuming it.
    pub parked: u64,
    /// Children started via `AwaitChild`.
    pub delegated: u64,
    /// Root tasks that ran to completion.
    pub completed: u64,
    /// Chains dropped under `FailurePolicy::Isolate`.
    pub failed: u64,
}

/// Stops a running loop from inside a task, a signal handler, or
/// another thread. The current dispatch step always finishes first.
#[derive(Debug, Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
}

impl StopHandle {
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

pub struct EventLoop<V> {
    ready: VecDeque<TaskRecord<V>>,
    selector: Selector,
    config: LoopConfig,
    running: Arc<AtomicBool>,
    next_id: u64,
    stats: LoopStats,
}

impl<V> EventLoop<V> {
    /// Create a stopped loop with its own selector.
    pub fn new(config: LoopConfig) -> Result<Self, LoopError> {
        Ok(Self {
            ready: VecDeque::new(),
            selector: Selector::new()?,
            config,
            running: Arc::new(AtomicBool::new(false)),
            next_id: 0,
            stats: LoopStats::default(),
        })
    }

    /// Schedule a fresh root task at the back of the queue.
    pub fn add_task<C>(&mut self, coroutine: C) -> Result<TaskId, LoopError>
    where
        C: Coroutine<V> + 'static,
    {
        self.add_task_with(Box::new(coroutine), Pending::Absent, ContinuationStack::new())
    }

    /// Schedule a task with an initial input and a pre-built
    /// continuation stack. When the coroutine finishes, the top of
    /// `parents` resumes with its final value.
    ///
    /// Fails with [`LoopError::InvalidTask`] if the coroutine, or any
    /// parent, has already completed.
    pub fn add_task_with(
        &mut self,
        coroutine: BoxCoroutine<V>,
        initial: Pending<V>,
        parents: ContinuationStack<V>,
    ) -> Result<TaskId, LoopError> {
        if coroutine.is_complete() {
            return Err(LoopError::InvalidTask(format!(
                "`{}` has already completed",
                coroutine.name()
            )));
        }
        if parents.frames().any(|p| p.is_complete()) {
            return Err(LoopError::InvalidTask(format!(
                "continuation stack of `{}` holds a completed coroutine",
                coroutine.name()
            )));
        }
        if let Some(resource) = initial.resource() {
            self.selector.register(resource.token(), Interest::Readable)?;
        }

        let id = TaskId(self.next_id);
        self.next_id += 1;
        debug!(task = %id, name = coroutine.name(), "task added");
        self.ready
            .push_back(TaskRecord::new(id, coroutine, initial, parents));
        Ok(id)
    }

    /// Run until [`stop`](Self::stop) is called or a task aborts under
    /// [`FailurePolicy::Abort`]. An empty queue keeps spinning.
    pub fn run_forever(&mut self) -> Result<(), LoopError> {
        self.run(false)
    }

    /// Like [`run_forever`](Self::run_forever) but also returns once the
    /// ready queue is empty.
    pub fn run_until_idle(&mut self) -> Result<(), LoopError> {
        self.run(true)
    }

    fn run(&mut self, until_idle: bool) -> Result<(), LoopError> {
        self.running.store(true, Ordering::Release);
        info!(tasks = self.ready.len(), delay = ?self.config.cycle_delay(), "event loop started");

        let result = loop {
            if !self.running.load(Ordering::Acquire) {
                break Ok(());
            }
            if until_idle && self.ready.is_empty() {
                break Ok(());
            }
            if let Err(e) = self.step() {
                break Err(e);
            }
            if let Some(delay) = self.config.cycle_delay() {
                thread::sleep(delay);
            }
        };

        self.running.store(false, Ordering::Release);
        info!(
            steps = self.stats.steps,
            completed = self.stats.completed,
            abandoned = self.ready.len(),
            "event loop stopped"
        );
        result
    }

    /// Stop after the current dispatch step. Queued and parked records
    /// are abandoned in place; nothing is notified.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }

    pub fn stop_handle(&self) -> StopHandle {
        StopHandle {
            running: self.running.clone(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Dispatch the front record, if any. Returns whether one was
    /// dispatched.
    pub fn step(&mut self) -> Result<bool, LoopError> {
        match self.ready.pop_front() {
            Some(record) => {
                self.dispatch(record)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn dispatch(&mut self, record: TaskRecord<V>) -> Result<(), LoopError> {
        self.stats.steps += 1;
        let TaskRecord {
            id,
            mut coroutine,
            pending,
            mut parents,
        } = record;

        let input = match pending {
            Pending::Resource(resource) => {
                if !self.selector.take_ready(resource.token())? {
                    self.stats.parked += 1;
                    trace!(task = %id, fd = resource.token(), "parked");
                    self.ready.push_back(TaskRecord::new(
                        id,
                        coroutine,
                        Pending::Resource(resource),
                        parents,
                    ));
                    return Ok(());
                }
                Pending::Resource(resource)
            }
            other => other,
        };

        self.stats.resumed += 1;
        let outcome = match coroutine.resume(input) {
            Ok(outcome) => outcome,
            Err(source) => return self.task_failed(id, coroutine.name(), &parents, source),
        };

        match outcome {
            Outcome::Done(value) => match parents.pop() {
                Some(parent) => {
                    trace!(task = %id, child = coroutine.name(), parent = parent.name(), "child done");
                    self.ready
                        .push_back(TaskRecord::new(id, parent, value.into(), parents));
                }
                None => {
                    self.stats.completed += 1;
                    debug!(task = %id, name = coroutine.name(), "task finished");
                }
            },
            Outcome::AwaitChild(child) => {
                self.stats.delegated += 1;
                trace!(task = %id, parent = coroutine.name(), child = child.name(), depth = parents.depth() + 1, "delegated");
                parents.push(coroutine);
                self.ready
                    .push_back(TaskRecord::new(id, child, Pending::Absent, parents));
            }
            Outcome::AwaitResource(resource) => {
                if let Err(e) = self.selector.register(resource.token(), Interest::Readable) {
                    return self.task_failed(id, coroutine.name(), &parents, e.into());
                }
                self.ready.push_back(TaskRecord::new(
                    id,
                    coroutine,
                    Pending::Resource(resource),
                    parents,
                ));
            }
            Outcome::Value(value) => {
                self.ready
                    .push_back(TaskRecord::new(id, coroutine, value.into(), parents));
            }
        }
        Ok(())
    }

    fn task_failed(
        &mut self,
        id: TaskId,
        name: &str,
        parents: &ContinuationStack<V>,
        source: TaskError,
    ) -> Result<(), LoopError> {
        match self.config.on_task_error {
            FailurePolicy::Abort => Err(LoopError::TaskAborted { task: id, source }),
            FailurePolicy::Isolate => {
                self.stats.failed += 1;
                warn!(task = %id, name, error = %source, abandoned = parents.depth(), "task failed, chain dropped");
                Ok(())
            }
        }
    }

    /// Records in the ready queue, parked ones included.
    pub fn len(&self) -> usize {
        self.ready.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ready.is_empty()
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn selector(&self) -> &Selector {
        &self.selector
    }
}

impl<V> fmt::Debug for EventLoop<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventLoop")
            .field("queued", &self.ready.len())
            .field("running", &self.is_running())
            .field("config", &self.config)
            .field("selector", &self.selector)
            .field("stats", &self.stats)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coroutine::from_fn;

    fn busy() -> EventLoop<i64> {
        EventLoop::new(LoopConfig::busy_poll()).unwrap()
    }

    #[test]
    fn ids_are_sequential() {
        let mut ev = busy();
        let a = ev.add_task(from_fn("a", |_: Pending<i64>| Ok(Outcome::Done(None)))).unwrap();
        let b = ev.add_task(from_fn("b", |_: Pending<i64>| Ok(Outcome::Done(None)))).unwrap();
        assert_eq!((a, b), (TaskId(0), TaskId(1)));
        assert_eq!(ev.len(), 2);
    }

    #[test]
    fn completed_coroutine_is_rejected() {
        let mut ev = busy();
        let mut co = from_fn("once", |_: Pending<i64>| Ok(Outcome::done(1)));
        co.resume(Pending::Absent).unwrap();

        let err = ev.add_task(co).unwrap_err();
        assert!(matches!(err, LoopError::InvalidTask(_)));
        assert!(ev.is_empty());
    }

    #[test]
    fn completed_parent_in_stack_is_rejected() {
        let mut ev = busy();
        let mut parent = from_fn("done-parent", |_: Pending<i64>| Ok(Outcome::done(1)));
        parent.resume(Pending::Absent).unwrap();
        let mut stack = ContinuationStack::new();
        stack.push(Box::new(parent));

        let child = from_fn("child", |_: Pending<i64>| Ok(Outcome::Done(None)));
        let err = ev
            .add_task_with(Box::new(child), Pending::Absent, stack)
            .unwrap_err();
        assert!(matches!(err, LoopError::InvalidTask(ref msg) if msg.contains("child")));
        assert!(ev.is_empty());
    }

    #[test]
    fn step_on_empty_queue() {
        let mut ev = busy();
        assert!(!ev.step().unwrap());
        assert_eq!(ev.stats().steps, 0);
    }

    #[test]
    fn plain_values_are_threaded_back() {
        let mut ev = busy();
        let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let log = seen.clone();
        let mut n = 0;
        ev.add_task(from_fn("counter", move |input: Pending<i64>| {
            log.borrow_mut().push(input.into_value());
            n += 1;
            if n < 3 {
                Ok(Outcome::value(n * 10))
            } else {
                Ok(Outcome::Done(None))
            }
        }))
        .unwrap();

        ev.run_until_idle().unwrap();
        assert_eq!(*seen.borrow(), vec![None, Some(10), Some(20)]);
        assert_eq!(ev.stats().completed, 1);
    }

    #[test]
    fn abort_policy_surfaces_task_error() {
        let mut ev = busy();
        let id = ev
            .add_task(from_fn("bad", |_: Pending<i64>| Err(TaskError::failed("boom"))))
            .unwrap();
        match ev.run_until_idle() {
            Err(LoopError::TaskAborted { task, .. }) => assert_eq!(task, id),
            other => panic!("expected TaskAborted, got {:?}", other),
        }
        assert!(!ev.is_running());
    }

    #[test]
    fn isolate_policy_keeps_running() {
        let mut ev: EventLoop<i64> =
            EventLoop::new(LoopConfig::busy_poll().failure_policy(FailurePolicy::Isolate)).unwrap();
        ev.add_task(from_fn("bad", |_: Pending<i64>| Err(TaskError::failed("boom"))))
            .unwrap();
        ev.add_task(from_fn("good", |_: Pending<i64>| Ok(Outcome::done(1))))
            .unwrap();

        ev.run_until_idle().unwrap();
        assert_eq!(ev.stats().failed, 1);
        assert_eq!(ev.stats().completed, 1);
    }
}
