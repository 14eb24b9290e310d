// SPDX-License-Identifier: (MIT OR Apache-2.0)
//! Task records and continuation stacks.
//!
//! A record is the scheduler's unit of work: the coroutine to resume,
//! the input it will be resumed with, and the parents waiting on it.
//! Records are moved, never shared: popped from the ready queue,
//! dispatched, then rebuilt and pushed back if the chain is still live.

use std::fmt;

use crate::coroutine::{BoxCoroutine, Pending};

/// Identity of a root task. Every record in its delegation chain
/// (children and resumed parents) carries the same id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Parents awaiting a delegated child, most recent on top.
///
/// Owned by exactly one chain. Acyclicity is assumed, not checked.
pub struct ContinuationStack<V> {
    frames: Vec<BoxCoroutine<V>>,
}

impl<V> ContinuationStack<V> {
    pub fn new() -> Self {
        Self { frames: Vec::new() }
    }

    pub fn push(&mut self, parent: BoxCoroutine<V>) {
        self.frames.push(parent);
    }

    pub fn pop(&mut self) -> Option<BoxCoroutine<V>> {
        self.frames.pop()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Bottom to top.
    pub(crate) fn frames(&self) -> impl Iterator<Item = &BoxCoroutine<V>> {
        self.frames.iter()
    }
}

impl<V> Default for ContinuationStack<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> FromIterator<BoxCoroutine<V>> for ContinuationStack<V> {
    /// Frames are pushed in iteration order; the last one ends up on top.
    fn from_iter<I: IntoIterator<Item = BoxCoroutine<V>>>(iter: I) -> Self {
        Self {
            frames: iter.into_iter().collect(),
        }
    }
}

impl<V> fmt::Debug for ContinuationStack<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.frames.iter().map(|c| c.name()))
            .finish()
    }
}

/// One entry of the ready queue.
pub(crate) struct TaskRecord<V> {
    pub id: TaskId,
    pub coroutine: BoxCoroutine<V>,
    pub pending: Pending<V>,
    pub parents: ContinuationStack<V>,
}

impl<V> TaskRecord<V> {
    pub fn new(
        id: TaskId,
        coroutine: BoxCoroutine<V>,
        pending: Pending<V>,
        parents: ContinuationStack<V>,
    ) -> Self {
        Self {
            id,
            coroutine,
            pending,
            parents,
        }
    }
}

impl<V> fmt::Debug for TaskRecord<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskRecord")
            .field("id", &self.id)
            .field("coroutine", &self.coroutine.name())
            .field("parked", &self.pending.resource().is_some())
            .field("depth", &self.parents.depth())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coroutine::{from_fn, Outcome};

    fn named(name: &str) -> BoxCoroutine<()> {
        Box::new(from_fn(name, |_input: Pending<()>| Ok(Outcome::Done(None))))
    }

    #[test]
    fn stack_is_lifo() {
        let mut stack: ContinuationStack<()> = [named("outer"), named("inner")].into_iter().collect();
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.pop().unwrap().name(), "inner");
        stack.push(named("again"));
        assert_eq!(stack.pop().unwrap().name(), "again");
        assert_eq!(stack.pop().unwrap().name(), "outer");
        assert!(stack.is_empty());
    }

    #[test]
    fn task_id_display() {
        assert_eq!(TaskId(3).to_string(), "#3");
    }
}
